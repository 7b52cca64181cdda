// Client-server dialect: PostgreSQL, ON CONFLICT upserts, plus the three
// materialized aggregate fact tables the embedded dialect does not carry

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use log::info;
use postgres::{Client, NoTls, Transaction};

use super::{AggregateRow, SalesStore, SalesSummary};
use crate::rates::ExchangeRates;
use crate::transform::NormalizedSalesRecord;

pub struct PostgresStore {
    client: Client,
}

impl PostgresStore {
    pub fn connect(
        host: &str,
        port: u16,
        database: &str,
        user: &str,
        password: &str,
    ) -> Result<Self> {
        let client = postgres::Config::new()
            .host(host)
            .port(port)
            .dbname(database)
            .user(user)
            .password(password)
            .connect(NoTls)
            .with_context(|| format!("Failed to connect to PostgreSQL at {}:{}", host, port))?;

        info!("Connected to PostgreSQL database at {}:{}", host, port);
        Ok(PostgresStore { client })
    }
}

impl SalesStore for PostgresStore {
    fn create_tables(&mut self) -> Result<()> {
        self.client.batch_execute(
            "CREATE TABLE IF NOT EXISTS exchange_rates (
                currency TEXT PRIMARY KEY,
                rate DOUBLE PRECISION NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            );

            CREATE TABLE IF NOT EXISTS sales (
                order_id BIGINT PRIMARY KEY,
                affiliate_name TEXT,
                sales_amount DOUBLE PRECISION,
                currency TEXT,
                order_date DATE,
                category TEXT,
                sales_amount_usd DOUBLE PRECISION,
                month TEXT
            );

            CREATE TABLE IF NOT EXISTS fact_affiliate_sales (
                affiliate_name TEXT PRIMARY KEY,
                total_sales_usd DOUBLE PRECISION NOT NULL,
                last_updated TIMESTAMPTZ NOT NULL
            );

            CREATE TABLE IF NOT EXISTS fact_category_sales (
                category TEXT PRIMARY KEY,
                total_sales_usd DOUBLE PRECISION NOT NULL,
                last_updated TIMESTAMPTZ NOT NULL
            );

            CREATE TABLE IF NOT EXISTS fact_monthly_sales (
                month TEXT PRIMARY KEY,
                total_sales_usd DOUBLE PRECISION NOT NULL,
                last_updated TIMESTAMPTZ NOT NULL
            );",
        )?;

        Ok(())
    }

    fn load_data(
        &mut self,
        records: &[NormalizedSalesRecord],
        rates: &ExchangeRates,
    ) -> Result<()> {
        let updated_at = Utc::now();

        // Dropping the transaction without commit rolls everything back
        let mut tx = self.client.transaction()?;

        for (currency, rate) in rates.iter() {
            tx.execute(
                "INSERT INTO exchange_rates (currency, rate, updated_at)
                 VALUES ($1, $2, $3)
                 ON CONFLICT (currency) DO UPDATE
                 SET rate = EXCLUDED.rate, updated_at = EXCLUDED.updated_at",
                &[currency, rate, &updated_at],
            )?;
        }

        for record in records {
            // Guaranteed "YYYY-MM-DD" by the transformer
            let order_date = NaiveDate::parse_from_str(&record.order_date, "%Y-%m-%d")
                .with_context(|| format!("Invalid order_date for order {}", record.order_id))?;

            tx.execute(
                "INSERT INTO sales
                 (order_id, affiliate_name, sales_amount, currency, order_date,
                  category, sales_amount_usd, month)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                 ON CONFLICT (order_id) DO UPDATE
                 SET affiliate_name = EXCLUDED.affiliate_name,
                     sales_amount = EXCLUDED.sales_amount,
                     currency = EXCLUDED.currency,
                     order_date = EXCLUDED.order_date,
                     category = EXCLUDED.category,
                     sales_amount_usd = EXCLUDED.sales_amount_usd,
                     month = EXCLUDED.month",
                &[
                    &record.order_id,
                    &record.affiliate_name,
                    &record.sales_amount,
                    &record.currency,
                    &order_date,
                    &record.category,
                    &record.sales_amount_usd,
                    &record.month,
                ],
            )?;
        }

        tx.commit()?;

        info!(
            "Loaded {} sales records and {} rates into PostgreSQL",
            records.len(),
            rates.len()
        );
        Ok(())
    }

    fn has_fact_tables(&self) -> bool {
        true
    }

    fn store_aggregates(
        &mut self,
        affiliate: &[AggregateRow],
        category: &[AggregateRow],
        monthly: &[AggregateRow],
    ) -> Result<()> {
        let mut tx = self.client.transaction()?;

        upsert_facts(&mut tx, "fact_affiliate_sales", "affiliate_name", affiliate)?;
        upsert_facts(&mut tx, "fact_category_sales", "category", category)?;
        upsert_facts(&mut tx, "fact_monthly_sales", "month", monthly)?;

        tx.commit()?;

        info!(
            "Stored {} affiliate, {} category, {} monthly fact rows",
            affiliate.len(),
            category.len(),
            monthly.len()
        );
        Ok(())
    }

    fn affiliate_totals(&mut self) -> Result<Vec<AggregateRow>> {
        grouped_totals(
            &mut self.client,
            "SELECT affiliate_name, SUM(sales_amount_usd) AS total_sales_usd
             FROM sales GROUP BY affiliate_name ORDER BY total_sales_usd DESC",
        )
    }

    fn category_totals(&mut self) -> Result<Vec<AggregateRow>> {
        grouped_totals(
            &mut self.client,
            "SELECT category, SUM(sales_amount_usd) AS total_sales_usd
             FROM sales GROUP BY category ORDER BY total_sales_usd DESC",
        )
    }

    fn monthly_totals(&mut self) -> Result<Vec<AggregateRow>> {
        grouped_totals(
            &mut self.client,
            "SELECT month, SUM(sales_amount_usd) AS total_sales_usd
             FROM sales GROUP BY month ORDER BY month",
        )
    }

    fn summary(&mut self) -> Result<SalesSummary> {
        let row = self.client.query_one(
            "SELECT
                COUNT(order_id),
                CAST(COALESCE(SUM(sales_amount_usd), 0) AS DOUBLE PRECISION),
                CAST(COALESCE(AVG(sales_amount_usd), 0) AS DOUBLE PRECISION),
                CAST(COALESCE(MIN(sales_amount_usd), 0) AS DOUBLE PRECISION),
                CAST(COALESCE(MAX(sales_amount_usd), 0) AS DOUBLE PRECISION)
             FROM sales",
            &[],
        )?;

        Ok(SalesSummary {
            total_orders: row.get(0),
            total_sales_usd: row.get(1),
            avg_order_value_usd: row.get(2),
            min_order_value_usd: row.get(3),
            max_order_value_usd: row.get(4),
        })
    }
}

fn upsert_facts(
    tx: &mut Transaction<'_>,
    table: &str,
    key_column: &str,
    rows: &[AggregateRow],
) -> Result<()> {
    let last_updated = Utc::now();

    // Table and column names come from the fixed schema above, never input
    let sql = format!(
        "INSERT INTO {table} ({key_column}, total_sales_usd, last_updated)
         VALUES ($1, $2, $3)
         ON CONFLICT ({key_column}) DO UPDATE
         SET total_sales_usd = EXCLUDED.total_sales_usd,
             last_updated = EXCLUDED.last_updated"
    );

    for row in rows {
        tx.execute(sql.as_str(), &[&row.key, &row.total_sales_usd, &last_updated])?;
    }

    Ok(())
}

fn grouped_totals(client: &mut Client, sql: &str) -> Result<Vec<AggregateRow>> {
    let rows = client
        .query(sql, &[])?
        .into_iter()
        .map(|row| AggregateRow {
            key: row.get(0),
            total_sales_usd: row.get(1),
        })
        .collect();

    Ok(rows)
}
