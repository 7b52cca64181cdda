// 📂 CSV Extraction - raw sales rows from a delimited file
// All non-key fields deserialize loosely; data quality is the transformer's job

use std::path::Path;

use anyhow::{Context, Result};
use log::info;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    /// Distinct from a generic read failure so the caller can log the path
    #[error("sales CSV not found at {0}")]
    InputNotFound(String),
}

/// One row as it appears in the source file. Only `order_id` is required;
/// every other field may be missing or malformed.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSalesRecord {
    pub order_id: i64,

    #[serde(default)]
    pub affiliate_name: Option<String>,

    /// Numeric or malformed text; coerced later
    #[serde(default)]
    pub sales_amount: Option<String>,

    #[serde(default)]
    pub currency: Option<String>,

    #[serde(default)]
    pub order_date: Option<String>,

    #[serde(default)]
    pub category: Option<String>,
}

/// Read the full batch of raw records.
///
/// A missing file is `ExtractError::InputNotFound`; a row that cannot be
/// deserialized at all (e.g. no order_id) is a structural error and fails
/// the whole batch.
pub fn read_sales_csv(csv_path: &Path) -> Result<Vec<RawSalesRecord>> {
    let mut rdr = match csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(csv_path)
    {
        Ok(rdr) => rdr,
        Err(err) => {
            return Err(match err.kind() {
                csv::ErrorKind::Io(io_err) if io_err.kind() == std::io::ErrorKind::NotFound => {
                    ExtractError::InputNotFound(csv_path.display().to_string()).into()
                }
                _ => anyhow::Error::new(err)
                    .context(format!("Failed to open sales CSV at {}", csv_path.display())),
            })
        }
    };

    let mut records = Vec::new();
    for result in rdr.deserialize() {
        let record: RawSalesRecord = result.context("Failed to deserialize sales row")?;
        records.push(record);
    }

    info!(
        "Extracted {} raw records from {}",
        records.len(),
        csv_path.display()
    );

    Ok(records)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_read_full_rows() {
        let file = write_csv(
            "order_id,affiliate_name,sales_amount,currency,order_date,category\n\
             1,Acme,100.50,EUR,2024-01-15,Tech\n\
             2,Globex,75,USD,2024-02-01,Home\n",
        );

        let records = read_sales_csv(file.path()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].order_id, 1);
        assert_eq!(records[0].affiliate_name.as_deref(), Some("Acme"));
        assert_eq!(records[0].sales_amount.as_deref(), Some("100.50"));
        assert_eq!(records[1].currency.as_deref(), Some("USD"));
    }

    #[test]
    fn test_missing_fields_become_none() {
        let file = write_csv(
            "order_id,affiliate_name,sales_amount,currency,order_date,category\n\
             1,,abc,,not-a-date,\n",
        );

        let records = read_sales_csv(file.path()).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].affiliate_name, None);
        assert_eq!(records[0].currency, None);
        assert_eq!(records[0].category, None);
        // Malformed values survive as text for the transformer to coerce
        assert_eq!(records[0].sales_amount.as_deref(), Some("abc"));
        assert_eq!(records[0].order_date.as_deref(), Some("not-a-date"));
    }

    #[test]
    fn test_missing_file_is_input_not_found() {
        let err = read_sales_csv(Path::new("/no/such/sales.csv")).unwrap_err();

        let extract_err = err.downcast_ref::<ExtractError>();
        assert!(matches!(extract_err, Some(ExtractError::InputNotFound(_))));
    }

    #[test]
    fn test_row_without_order_id_fails_batch() {
        let file = write_csv(
            "order_id,affiliate_name,sales_amount,currency,order_date,category\n\
             ,Acme,100,USD,2024-01-15,Tech\n",
        );

        assert!(read_sales_csv(file.path()).is_err());
    }
}
