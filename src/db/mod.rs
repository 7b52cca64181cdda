// 🗄️ Persistence Layer - one logical schema, two SQL dialects
// Embedded SQLite and client-server PostgreSQL behind a single trait;
// every write path is one transaction, every write is an upsert

pub mod postgres;
pub mod sqlite;

use anyhow::Result;
use serde::Serialize;

use crate::config::DatabaseConfig;
use crate::rates::ExchangeRates;
use crate::transform::NormalizedSalesRecord;

pub use self::postgres::PostgresStore;
pub use self::sqlite::SqliteStore;

// ============================================================================
// QUERY RESULT TYPES
// ============================================================================

/// One grouping-query row: group key + summed USD total.
/// The `last_updated` stamp on persisted fact rows is applied at write time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRow {
    pub key: String,
    pub total_sales_usd: f64,
}

impl AggregateRow {
    pub fn new(key: &str, total_sales_usd: f64) -> Self {
        AggregateRow {
            key: key.to_string(),
            total_sales_usd,
        }
    }
}

/// Global summary over all persisted sales (zeros for an empty table)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SalesSummary {
    pub total_orders: i64,
    pub total_sales_usd: f64,
    pub avg_order_value_usd: f64,
    pub min_order_value_usd: f64,
    pub max_order_value_usd: f64,
}

// ============================================================================
// STORE CONTRACT
// ============================================================================

/// Backend-agnostic contract shared by both dialects.
///
/// Writes are transactional and all-or-nothing: a single-row failure rolls
/// back the whole call. Re-running any write with the same input leaves the
/// store unchanged (upsert by primary key).
pub trait SalesStore {
    /// Idempotent schema provisioning; safe to call on every run
    fn create_tables(&mut self) -> Result<()>;

    /// Upsert every exchange rate (keyed by currency) and every normalized
    /// record (keyed by order_id) in one transaction
    fn load_data(&mut self, records: &[NormalizedSalesRecord], rates: &ExchangeRates)
        -> Result<()>;

    /// Whether this dialect materializes the three aggregate fact tables
    fn has_fact_tables(&self) -> bool;

    /// Upsert the recomputed aggregates into the fact tables, one
    /// transaction. No-op for dialects without fact tables.
    fn store_aggregates(
        &mut self,
        affiliate: &[AggregateRow],
        category: &[AggregateRow],
        monthly: &[AggregateRow],
    ) -> Result<()>;

    /// Sum of sales_amount_usd grouped by affiliate, descending by total
    fn affiliate_totals(&mut self) -> Result<Vec<AggregateRow>>;

    /// Sum of sales_amount_usd grouped by category, descending by total
    fn category_totals(&mut self) -> Result<Vec<AggregateRow>>;

    /// Sum of sales_amount_usd grouped by month, ascending by month string
    /// ("Unknown" sorts after "YYYY-MM" values)
    fn monthly_totals(&mut self) -> Result<Vec<AggregateRow>>;

    /// Count, sum, mean, min, max of sales_amount_usd over all rows
    fn summary(&mut self) -> Result<SalesSummary>;
}

/// Open the backend selected by the configuration. The connection is owned
/// exclusively by the pipeline for its whole lifetime; an unavailable
/// backend is fatal at startup, not retried.
pub fn connect(config: &DatabaseConfig) -> Result<Box<dyn SalesStore>> {
    match config {
        DatabaseConfig::Sqlite { db_path } => Ok(Box::new(SqliteStore::open(db_path)?)),
        DatabaseConfig::Postgres {
            host,
            port,
            database,
            user,
            password,
        } => Ok(Box::new(PostgresStore::connect(
            host, *port, database, user, password,
        )?)),
    }
}
