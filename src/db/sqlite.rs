// Embedded dialect: SQLite via rusqlite, WAL mode, INSERT OR REPLACE upserts

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use log::info;
use rusqlite::{params, Connection};

use super::{AggregateRow, SalesStore, SalesSummary};
use crate::rates::ExchangeRates;
use crate::transform::NormalizedSalesRecord;

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open SQLite database at {}", db_path.display()))?;

        // WAL mode for crash recovery
        conn.pragma_update(None, "journal_mode", "WAL")?;

        info!("Connected to SQLite database at {}", db_path.display());
        Ok(SqliteStore { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Ok(SqliteStore { conn })
    }
}

impl SalesStore for SqliteStore {
    fn create_tables(&mut self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS exchange_rates (
                currency TEXT PRIMARY KEY,
                rate REAL NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS sales (
                order_id INTEGER PRIMARY KEY,
                affiliate_name TEXT,
                sales_amount REAL,
                currency TEXT,
                order_date TEXT,
                category TEXT,
                sales_amount_usd REAL,
                month TEXT
            )",
            [],
        )?;

        Ok(())
    }

    fn load_data(
        &mut self,
        records: &[NormalizedSalesRecord],
        rates: &ExchangeRates,
    ) -> Result<()> {
        let updated_at = Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();

        // Dropping the transaction without commit rolls everything back
        let tx = self.conn.transaction()?;

        for (currency, rate) in rates.iter() {
            tx.execute(
                "INSERT OR REPLACE INTO exchange_rates (currency, rate, updated_at)
                 VALUES (?1, ?2, ?3)",
                params![currency, rate, updated_at],
            )?;
        }

        for record in records {
            tx.execute(
                "INSERT OR REPLACE INTO sales
                 (order_id, affiliate_name, sales_amount, currency, order_date,
                  category, sales_amount_usd, month)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    record.order_id,
                    record.affiliate_name,
                    record.sales_amount,
                    record.currency,
                    record.order_date,
                    record.category,
                    record.sales_amount_usd,
                    record.month,
                ],
            )?;
        }

        tx.commit()?;

        info!(
            "Loaded {} sales records and {} rates into SQLite",
            records.len(),
            rates.len()
        );
        Ok(())
    }

    // The embedded dialect has no materialized fact tables
    fn has_fact_tables(&self) -> bool {
        false
    }

    fn store_aggregates(
        &mut self,
        _affiliate: &[AggregateRow],
        _category: &[AggregateRow],
        _monthly: &[AggregateRow],
    ) -> Result<()> {
        Ok(())
    }

    fn affiliate_totals(&mut self) -> Result<Vec<AggregateRow>> {
        grouped_totals(
            &self.conn,
            "SELECT affiliate_name, SUM(sales_amount_usd) AS total_sales_usd
             FROM sales GROUP BY affiliate_name ORDER BY total_sales_usd DESC",
        )
    }

    fn category_totals(&mut self) -> Result<Vec<AggregateRow>> {
        grouped_totals(
            &self.conn,
            "SELECT category, SUM(sales_amount_usd) AS total_sales_usd
             FROM sales GROUP BY category ORDER BY total_sales_usd DESC",
        )
    }

    fn monthly_totals(&mut self) -> Result<Vec<AggregateRow>> {
        grouped_totals(
            &self.conn,
            "SELECT month, SUM(sales_amount_usd) AS total_sales_usd
             FROM sales GROUP BY month ORDER BY month",
        )
    }

    fn summary(&mut self) -> Result<SalesSummary> {
        let summary = self.conn.query_row(
            "SELECT
                COUNT(order_id),
                COALESCE(SUM(sales_amount_usd), 0.0),
                COALESCE(AVG(sales_amount_usd), 0.0),
                COALESCE(MIN(sales_amount_usd), 0.0),
                COALESCE(MAX(sales_amount_usd), 0.0)
             FROM sales",
            [],
            |row| {
                Ok(SalesSummary {
                    total_orders: row.get(0)?,
                    total_sales_usd: row.get(1)?,
                    avg_order_value_usd: row.get(2)?,
                    min_order_value_usd: row.get(3)?,
                    max_order_value_usd: row.get(4)?,
                })
            },
        )?;

        Ok(summary)
    }
}

fn grouped_totals(conn: &Connection, sql: &str) -> Result<Vec<AggregateRow>> {
    let mut stmt = conn.prepare(sql)?;

    let rows = stmt
        .query_map([], |row| {
            Ok(AggregateRow {
                key: row.get(0)?,
                total_sales_usd: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn test_record(order_id: i64, affiliate: &str, month: &str, usd: f64) -> NormalizedSalesRecord {
        NormalizedSalesRecord {
            order_id,
            affiliate_name: affiliate.to_string(),
            sales_amount: usd,
            currency: "USD".to_string(),
            order_date: "2024-01-15".to_string(),
            category: "Tech".to_string(),
            sales_amount_usd: usd,
            month: month.to_string(),
        }
    }

    fn test_rates() -> ExchangeRates {
        ExchangeRates::new(HashMap::from([("EUR".to_string(), 0.91)]))
    }

    fn loaded_store(records: &[NormalizedSalesRecord]) -> SqliteStore {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.create_tables().unwrap();
        store.load_data(records, &test_rates()).unwrap();
        store
    }

    fn row_count(store: &SqliteStore, table: &str) -> i64 {
        store
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                row.get(0)
            })
            .unwrap()
    }

    #[test]
    fn test_create_tables_is_idempotent() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.create_tables().unwrap();
        store.create_tables().unwrap();
    }

    #[test]
    fn test_load_twice_is_idempotent() {
        let records = vec![
            test_record(1, "Acme", "2024-01", 100.0),
            test_record(2, "Globex", "2024-02", 50.0),
        ];
        let mut store = loaded_store(&records);

        assert_eq!(row_count(&store, "sales"), 2);
        assert_eq!(row_count(&store, "exchange_rates"), 1);

        store.load_data(&records, &test_rates()).unwrap();

        assert_eq!(row_count(&store, "sales"), 2);
        assert_eq!(row_count(&store, "exchange_rates"), 1);
        assert_eq!(store.summary().unwrap().total_sales_usd, 150.0);
    }

    #[test]
    fn test_reload_replaces_by_order_id() {
        let mut store = loaded_store(&[test_record(1, "Acme", "2024-01", 100.0)]);

        store
            .load_data(&[test_record(1, "Initech", "2024-03", 75.0)], &test_rates())
            .unwrap();

        let totals = store.affiliate_totals().unwrap();
        assert_eq!(totals, vec![AggregateRow::new("Initech", 75.0)]);
    }

    #[test]
    fn test_affiliate_totals_descending() {
        let store_records = vec![
            test_record(1, "Small", "2024-01", 10.0),
            test_record(2, "Big", "2024-01", 500.0),
            test_record(3, "Big", "2024-02", 100.0),
        ];
        let mut store = loaded_store(&store_records);

        let totals = store.affiliate_totals().unwrap();

        assert_eq!(
            totals,
            vec![
                AggregateRow::new("Big", 600.0),
                AggregateRow::new("Small", 10.0),
            ]
        );
    }

    #[test]
    fn test_monthly_totals_ascending_unknown_last() {
        let store_records = vec![
            test_record(1, "A", "2024-02", 20.0),
            test_record(2, "A", "2024-01", 10.0),
            test_record(3, "A", "Unknown", 5.0),
        ];
        let mut store = loaded_store(&store_records);

        let totals = store.monthly_totals().unwrap();

        let months: Vec<&str> = totals.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(months, vec!["2024-01", "2024-02", "Unknown"]);
    }

    #[test]
    fn test_summary_matches_group_totals() {
        let store_records = vec![
            test_record(1, "A", "2024-01", 100.0),
            test_record(2, "B", "2024-01", 50.0),
            test_record(3, "A", "2024-02", 25.0),
        ];
        let mut store = loaded_store(&store_records);

        let summary = store.summary().unwrap();
        let affiliate_sum: f64 = store
            .affiliate_totals()
            .unwrap()
            .iter()
            .map(|r| r.total_sales_usd)
            .sum();

        assert_eq!(summary.total_orders, 3);
        assert_eq!(summary.total_sales_usd, 175.0);
        assert_eq!(summary.total_sales_usd, affiliate_sum);
        assert_eq!(summary.min_order_value_usd, 25.0);
        assert_eq!(summary.max_order_value_usd, 100.0);
        assert!((summary.avg_order_value_usd - 175.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_summary_on_empty_table_is_zeros() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.create_tables().unwrap();

        assert_eq!(store.summary().unwrap(), SalesSummary::default());
        assert!(store.affiliate_totals().unwrap().is_empty());
        assert!(store.monthly_totals().unwrap().is_empty());
    }

    #[test]
    fn test_load_failure_rolls_back_whole_batch() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.create_tables().unwrap();
        let old_rates = ExchangeRates::new(HashMap::from([("EUR".to_string(), 0.80)]));
        store.load_data(&[], &old_rates).unwrap();

        // Breaking the sales table makes the record insert fail after the
        // rate upsert has already run inside the same transaction
        store.conn.execute("DROP TABLE sales", []).unwrap();

        let new_rates = ExchangeRates::new(HashMap::from([("EUR".to_string(), 0.91)]));
        let result = store.load_data(&[test_record(1, "Acme", "2024-01", 100.0)], &new_rates);
        assert!(result.is_err());

        // The preceding rate upsert was rolled back with the batch
        let rate: f64 = store
            .conn
            .query_row(
                "SELECT rate FROM exchange_rates WHERE currency = 'EUR'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(rate, 0.80);
    }

    #[test]
    fn test_store_aggregates_is_noop_without_fact_tables() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.create_tables().unwrap();

        assert!(!store.has_fact_tables());
        store
            .store_aggregates(&[AggregateRow::new("A", 1.0)], &[], &[])
            .unwrap();
    }
}
