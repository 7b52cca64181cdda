// 📊 Aggregation & Report Engine - grouping queries, CSV exports, fact tables
// Failures here are contained: already-persisted data stays intact and the
// caller gets a boolean instead of an error

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{error, info};

use crate::chart;
use crate::db::{AggregateRow, SalesStore};

pub struct ReportGenerator {
    reports_dir: PathBuf,
}

impl ReportGenerator {
    pub fn new(reports_dir: &Path) -> Self {
        ReportGenerator {
            reports_dir: reports_dir.to_path_buf(),
        }
    }

    /// Run all queries and write every artifact. Never propagates: internal
    /// failures are logged and surfaced as `false`.
    pub fn generate_reports(&self, store: &mut dyn SalesStore) -> bool {
        match self.run(store) {
            Ok(()) => {
                info!("Report generation completed successfully");
                true
            }
            Err(err) => {
                error!("Report generation failed: {:#}", err);
                false
            }
        }
    }

    fn run(&self, store: &mut dyn SalesStore) -> Result<()> {
        fs::create_dir_all(&self.reports_dir).with_context(|| {
            format!(
                "Failed to create reports directory {}",
                self.reports_dir.display()
            )
        })?;

        let affiliate = store.affiliate_totals()?;
        let category = store.category_totals()?;
        let monthly = store.monthly_totals()?;
        let summary = store.summary()?;

        write_totals_csv(
            &self.reports_dir.join("affiliate_sales.csv"),
            "affiliate_name",
            &affiliate,
        )?;
        write_totals_csv(
            &self.reports_dir.join("category_sales.csv"),
            "category",
            &category,
        )?;
        write_totals_csv(
            &self.reports_dir.join("monthly_sales.csv"),
            "month",
            &monthly,
        )?;

        // Full recompute replaces any overlapping fact rows
        if store.has_fact_tables() {
            store.store_aggregates(&affiliate, &category, &monthly)?;
        }

        let document_path = self.reports_dir.join("sales_report.svg");
        chart::render_report_document(&document_path, &affiliate, &category, &monthly, &summary)?;
        info!("Report document written to {}", document_path.display());

        Ok(())
    }
}

/// One header row plus one row per group. An empty result set still
/// produces a valid header-only file.
fn write_totals_csv(path: &Path, key_header: &str, rows: &[AggregateRow]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    writer.write_record([key_header, "total_sales_usd"])?;
    for row in rows {
        let total = row.total_sales_usd.to_string();
        writer.write_record([row.key.as_str(), total.as_str()])?;
    }
    writer.flush()?;

    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
