// 🧹 Sales Transformer - cleaning, defaulting, and USD normalization
// Policy order is fixed: null-fill → date parse → month derivation →
// date defaulting → amount coercion → currency conversion → dedup

use std::collections::HashMap;

use chrono::NaiveDate;
use log::{info, warn};
use serde::Serialize;

use crate::extract::RawSalesRecord;
use crate::rates::{to_usd, ExchangeRates};

pub const UNKNOWN_AFFILIATE: &str = "Unknown";
pub const UNKNOWN_CATEGORY: &str = "Uncategorized";
pub const DEFAULT_CURRENCY: &str = "USD";
pub const UNKNOWN_MONTH: &str = "Unknown";

/// A sales record after every defaulting, parsing, and conversion rule
/// has been applied. No field is ever empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedSalesRecord {
    pub order_id: i64,
    pub affiliate_name: String,
    pub sales_amount: f64,
    pub currency: String,
    /// Calendar date "YYYY-MM-DD"; defaulted to the processing date when
    /// the raw value failed parsing
    pub order_date: String,
    pub category: String,
    /// Derived via the currency normalizer; 0.0 for unusable inputs
    pub sales_amount_usd: f64,
    /// "YYYY-MM" of the parsed date, or "Unknown" when the raw date was
    /// missing or unparseable
    pub month: String,
}

/// Clean a raw batch into normalized records.
///
/// Per-record data-quality problems are absorbed by the defaulting rules
/// and never abort the batch. Duplicate order_ids keep the last occurrence,
/// in the position where the id first appeared.
pub fn transform(
    raw_records: Vec<RawSalesRecord>,
    rates: &ExchangeRates,
    today: NaiveDate,
) -> Vec<NormalizedSalesRecord> {
    let raw_count = raw_records.len();

    let mut records: Vec<NormalizedSalesRecord> = Vec::with_capacity(raw_count);
    let mut slot_by_order: HashMap<i64, usize> = HashMap::new();

    for raw in raw_records {
        let record = normalize(raw, rates, today);
        match slot_by_order.get(&record.order_id) {
            // Last write wins for a duplicated order_id
            Some(&slot) => records[slot] = record,
            None => {
                slot_by_order.insert(record.order_id, records.len());
                records.push(record);
            }
        }
    }

    info!(
        "Transformation complete: {} records ({} duplicates dropped)",
        records.len(),
        raw_count - records.len()
    );

    records
}

fn normalize(raw: RawSalesRecord, rates: &ExchangeRates, today: NaiveDate) -> NormalizedSalesRecord {
    let affiliate_name = fill(raw.affiliate_name, UNKNOWN_AFFILIATE);
    let category = fill(raw.category, UNKNOWN_CATEGORY);
    let currency = fill(raw.currency, DEFAULT_CURRENCY);

    // Month comes from the parsed date BEFORE defaulting, so an originally
    // missing date reports as "Unknown" even though the stored order_date
    // is defaulted below.
    let parsed_date = raw.order_date.as_deref().and_then(parse_date);
    let month = match parsed_date {
        Some(date) => date.format("%Y-%m").to_string(),
        None => UNKNOWN_MONTH.to_string(),
    };
    let order_date = parsed_date.unwrap_or(today).format("%Y-%m-%d").to_string();

    let sales_amount = raw
        .sales_amount
        .as_deref()
        .map(str::trim)
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|a| a.is_finite())
        .unwrap_or(0.0);

    let sales_amount_usd = to_usd(sales_amount, &currency, rates);
    if sales_amount != 0.0 && sales_amount_usd == 0.0 {
        warn!(
            "Order {}: amount {} {} could not be converted, stored as 0.0 USD",
            raw.order_id, sales_amount, currency
        );
    }

    NormalizedSalesRecord {
        order_id: raw.order_id,
        affiliate_name,
        sales_amount,
        currency,
        order_date,
        category,
        sales_amount_usd,
        month,
    }
}

/// Treat an absent or blank value as missing
fn fill(value: Option<String>, default: &str) -> String {
    match value {
        Some(s) if !s.trim().is_empty() => s,
        _ => default.to_string(),
    }
}

/// Parse a calendar date (supports YYYY-MM-DD and MM/DD/YYYY)
fn parse_date(date_str: &str) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(date_str, "%Y-%m-%d") {
        return Some(date);
    }

    if let Ok(date) = NaiveDate::parse_from_str(date_str, "%m/%d/%Y") {
        return Some(date);
    }

    None
}

// ============================================================================
// TESTS
// ============================================================================
