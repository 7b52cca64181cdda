// Sales ETL Pipeline - CLI entry point
// extract → transform → load → report, sequential and single-threaded

use anyhow::Result;
use chrono::Utc;
use log::{error, info};

use sales_etl::{db, fetch_exchange_rates, read_sales_csv, transform, Config, ReportGenerator};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = run() {
        error!("ETL process failed: {:#}", err);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let config = Config::from_env()?;
    info!("Starting ETL process");

    info!("Starting extraction phase");
    let raw_records = read_sales_csv(&config.csv_path)?;
    let rates = fetch_exchange_rates(
        &config.exchange_rate_api_url,
        &config.exchange_rate_fallback,
    );

    info!("Starting transformation phase");
    let records = transform(raw_records, &rates, Utc::now().date_naive());

    info!("Starting loading phase");
    let mut store = db::connect(&config.database)?;
    store.create_tables()?;
    store.load_data(&records, &rates)?;

    info!("Starting report generation phase");
    let generator = ReportGenerator::new(&config.reports_dir);
    if !generator.generate_reports(store.as_mut()) {
        // Loaded data stays persisted; only the run status reflects the failure
        anyhow::bail!("report generation failed");
    }

    info!("ETL process completed successfully");
    Ok(())
}
