// 💱 Exchange Rates - live fetch with a static fallback table
// Rates are units of currency per 1 USD; conversion to USD divides by the rate

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{info, warn};
use serde::Deserialize;

/// Fixed timeout for the rate API request
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// RATE TABLE
// ============================================================================

/// Point-in-time snapshot of currency → rate, keyed by currency code.
/// USD itself always maps to 1.0 implicitly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExchangeRates {
    rates: HashMap<String, f64>,
}

impl ExchangeRates {
    pub fn new(rates: HashMap<String, f64>) -> Self {
        ExchangeRates { rates }
    }

    /// Rate for a currency; a code missing from the table is treated as
    /// parity with USD (1.0). Documented fallback, not a failure.
    pub fn rate_for(&self, currency: &str) -> f64 {
        *self.rates.get(currency).unwrap_or(&1.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &f64)> {
        self.rates.iter()
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

// ============================================================================
// CURRENCY NORMALIZER
// ============================================================================

/// Convert an amount in the given currency to USD.
///
/// Never panics: an unusable amount or currency, or a non-finite result
/// (e.g. a zero rate in the table), maps to 0.0.
pub fn to_usd(amount: f64, currency: &str, rates: &ExchangeRates) -> f64 {
    if !amount.is_finite() || currency.is_empty() {
        return 0.0;
    }

    if currency == "USD" {
        return amount;
    }

    let usd = amount / rates.rate_for(currency);
    if usd.is_finite() {
        usd
    } else {
        0.0
    }
}

// ============================================================================
// RATE SOURCE
// ============================================================================

#[derive(Debug, Deserialize)]
struct RateApiResponse {
    rates: HashMap<String, f64>,
}

/// Fetch the live rate table, falling back to the static table on any
/// failure (non-200 status, timeout, transport error, malformed body).
/// The fallback is a first-class code path, never an error.
pub fn fetch_exchange_rates(api_url: &str, fallback: &HashMap<String, f64>) -> ExchangeRates {
    match try_fetch(api_url) {
        Ok(rates) => {
            info!("Fetched live exchange rates for {} currencies", rates.len());
            ExchangeRates::new(rates)
        }
        Err(err) => {
            warn!("Exchange rate fetch failed ({:#}), using fallback table", err);
            ExchangeRates::new(fallback.clone())
        }
    }
}

fn try_fetch(api_url: &str) -> Result<HashMap<String, f64>> {
    let client = reqwest::blocking::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")?;

    let response = client
        .get(api_url)
        .send()
        .with_context(|| format!("Rate API request to {} failed", api_url))?;

    if !response.status().is_success() {
        anyhow::bail!("rate API returned status {}", response.status());
    }

    let body = response.text().context("Failed to read rate API body")?;
    let parsed: RateApiResponse =
        serde_json::from_str(&body).context("Malformed rate API body")?;
    Ok(parsed.rates)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;

    fn test_rates() -> ExchangeRates {
        ExchangeRates::new(HashMap::from([
            ("EUR".to_string(), 0.91),
            ("GBP".to_string(), 0.78),
        ]))
    }

    #[test]
    fn test_usd_passes_through() {
        assert_eq!(to_usd(100.0, "USD", &test_rates()), 100.0);
    }

    #[test]
    fn test_foreign_amount_divides_by_rate() {
        let usd = to_usd(100.0, "EUR", &test_rates());
        assert!((usd - 100.0 / 0.91).abs() < 1e-9);
        assert!((usd - 109.89).abs() < 0.01);
    }

    #[test]
    fn test_unknown_currency_is_parity() {
        // Missing from the table → rate 1.0, amount unchanged
        assert_eq!(to_usd(42.0, "JPY", &test_rates()), 42.0);
    }

    #[test]
    fn test_unusable_inputs_map_to_zero() {
        let rates = test_rates();

        assert_eq!(to_usd(f64::NAN, "EUR", &rates), 0.0);
        assert_eq!(to_usd(f64::INFINITY, "EUR", &rates), 0.0);
        assert_eq!(to_usd(100.0, "", &rates), 0.0);

        // Zero rate would divide to infinity
        let zero_rate = ExchangeRates::new(HashMap::from([("XXX".to_string(), 0.0)]));
        assert_eq!(to_usd(100.0, "XXX", &zero_rate), 0.0);
    }

    #[test]
    fn test_non_negative_finite_for_valid_input() {
        let rates = test_rates();
        for amount in [0.0, 0.01, 1.0, 99.99, 1_000_000.0] {
            for currency in ["USD", "EUR", "GBP", "JPY"] {
                let usd = to_usd(amount, currency, &rates);
                assert!(usd.is_finite());
                assert!(usd >= 0.0);
            }
        }
    }

    /// Serve exactly one HTTP response on a local port, then hang up.
    fn one_shot_server(response: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf);
                let _ = stream.write_all(response.as_bytes());
            }
        });
        format!("http://{}/", addr)
    }

    #[test]
    fn test_http_500_falls_back_exactly() {
        let url = one_shot_server("HTTP/1.1 500 Internal Server Error\r\ncontent-length: 0\r\n\r\n");
        let fallback = crate::config::default_fallback_rates();

        let rates = fetch_exchange_rates(&url, &fallback);

        assert_eq!(rates, ExchangeRates::new(fallback));
    }

    #[test]
    fn test_malformed_body_falls_back() {
        let url =
            one_shot_server("HTTP/1.1 200 OK\r\ncontent-length: 8\r\n\r\nnot json");
        let fallback = crate::config::default_fallback_rates();

        let rates = fetch_exchange_rates(&url, &fallback);

        assert_eq!(rates, ExchangeRates::new(fallback));
    }

    #[test]
    fn test_live_rates_parsed_from_200() {
        let body = r#"{"base":"USD","rates":{"EUR":0.93,"GBP":0.80}}"#;
        let response = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\n\r\n{}",
            body.len(),
            body
        );
        let url = one_shot_server(Box::leak(response.into_boxed_str()));

        let rates = fetch_exchange_rates(&url, &crate::config::default_fallback_rates());

        assert_eq!(rates.len(), 2);
        assert_eq!(rates.rate_for("EUR"), 0.93);
    }

    #[test]
    fn test_unreachable_host_falls_back() {
        // Bind-then-drop leaves a port nothing is listening on
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let fallback = crate::config::default_fallback_rates();

        let rates = fetch_exchange_rates(&format!("http://127.0.0.1:{}/", port), &fallback);

        assert_eq!(rates, ExchangeRates::new(fallback));
    }
}
