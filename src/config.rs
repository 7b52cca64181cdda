// ⚙️ Configuration - environment-driven settings for the pipeline
// Built once at startup and passed by reference to every component

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unsupported database type: {0}")]
    UnsupportedBackend(String),
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

// ============================================================================
// DATABASE CONFIGURATION
// ============================================================================

/// Backend selector plus per-dialect connection parameters
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseConfig {
    /// Embedded file-based store
    Sqlite { db_path: PathBuf },

    /// Client-server store
    Postgres {
        host: String,
        port: u16,
        database: String,
        user: String,
        password: String,
    },
}

// ============================================================================
// PIPELINE CONFIGURATION
// ============================================================================

#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the raw sales CSV
    pub csv_path: PathBuf,

    /// Directory receiving the report artifacts (created if absent)
    pub reports_dir: PathBuf,

    /// Exchange rate API endpoint
    pub exchange_rate_api_url: String,

    /// Static currency → rate table used when the API is unavailable
    pub exchange_rate_fallback: HashMap<String, f64>,

    pub database: DatabaseConfig,
}

impl Config {
    /// Load configuration from environment variables (and a `.env` file
    /// when present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let db_type = env_or("DB_TYPE", "sqlite").to_lowercase();
        let database = match db_type.as_str() {
            "sqlite" => DatabaseConfig::Sqlite {
                db_path: PathBuf::from(env_or("SQLITE_DB_PATH", "sales_database.sqlite")),
            },
            "postgresql" => DatabaseConfig::Postgres {
                host: env_or("PG_HOST", "localhost"),
                port: parse_env("PG_PORT", 5432)?,
                database: env_or("PG_DATABASE", "sales"),
                user: env_or("PG_USER", "postgres"),
                password: env_or("PG_PASSWORD", "password"),
            },
            other => return Err(ConfigError::UnsupportedBackend(other.to_string())),
        };

        Ok(Config {
            csv_path: PathBuf::from(env_or("CSV_PATH", "sales_data.csv")),
            reports_dir: PathBuf::from(env_or("REPORTS_DIR", "reports")),
            exchange_rate_api_url: env_or(
                "EXCHANGE_RATE_API_URL",
                "https://api.exchangerate-api.com/v4/latest/USD",
            ),
            exchange_rate_fallback: default_fallback_rates(),
            database,
        })
    }
}

/// Static fallback table: rates are units of currency per 1 USD
pub fn default_fallback_rates() -> HashMap<String, f64> {
    HashMap::from([
        ("USD".to_string(), 1.0),
        ("EUR".to_string(), 0.91),
        ("GBP".to_string(), 0.78),
    ])
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => value.parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value,
        }),
        Err(_) => Ok(default),
    }
}

// ============================================================================
// TESTS
// ============================================================================
