// Sales ETL Pipeline - Core Library
// Exposes all modules for use in the CLI binary and integration tests

pub mod chart;
pub mod config;
pub mod db;
pub mod extract;
pub mod rates;
pub mod report;
pub mod transform;

// Re-export commonly used types
pub use config::{Config, ConfigError, DatabaseConfig};
pub use db::{connect, AggregateRow, SalesStore, SalesSummary};
pub use extract::{read_sales_csv, ExtractError, RawSalesRecord};
pub use rates::{fetch_exchange_rates, to_usd, ExchangeRates};
pub use report::ReportGenerator;
pub use transform::{transform, NormalizedSalesRecord};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
