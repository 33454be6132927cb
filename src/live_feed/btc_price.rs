// =============================================================================
// BTC Spot Price Source
// =============================================================================
//
// GET <endpoint>, e.g. https://api.coinbase.com/v2/prices/BTC-USD/spot
//
//   { "data": { "base": "BTC", "currency": "USD", "amount": "97231.45" } }
//
// The amount arrives as a decimal string and is rounded to whole dollars.

use anyhow::{Context, Result};
use tracing::{debug, instrument};

/// Fetches the spot price of a single trading pair.
pub struct SpotPriceClient {
    client: reqwest::Client,
    endpoint: String,
}

impl SpotPriceClient {
    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    #[instrument(skip(self), name = "btc_price::fetch")]
    pub async fn fetch(&self) -> Result<u64> {
        let resp = self
            .client
            .get(&self.endpoint)
            .send()
            .await
            .with_context(|| format!("GET {}", self.endpoint))?;

        let status = resp.status();
        let body: serde_json::Value = resp
            .json()
            .await
            .context("failed to parse spot price response body")?;

        if !status.is_success() {
            anyhow::bail!("spot price API returned {}: {}", status, body);
        }

        let price = parse_spot_price(&body)?;
        debug!(price, "BTC spot price fetched");
        Ok(price)
    }
}

/// Extract `data.amount` and round it to the nearest whole dollar.
pub fn parse_spot_price(body: &serde_json::Value) -> Result<u64> {
    let amount = body
        .pointer("/data/amount")
        .context("spot price response has no `data.amount`")?;

    let value: f64 = match amount {
        serde_json::Value::String(s) => s
            .trim()
            .parse()
            .with_context(|| format!("spot price amount is not a number: {s:?}"))?,
        serde_json::Value::Number(n) => n.as_f64().context("spot price amount out of range")?,
        other => anyhow::bail!("unexpected spot price amount: {other}"),
    };

    let rounded = value.round();
    if !rounded.is_finite() || rounded < 1.0 {
        anyhow::bail!("spot price is not positive: {value}");
    }
    Ok(rounded as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rounds_string_amount() {
        let body = json!({ "data": { "base": "BTC", "currency": "USD", "amount": "97231.51" } });
        assert_eq!(parse_spot_price(&body).unwrap(), 97_232);
        let body = json!({ "data": { "amount": "85000.49" } });
        assert_eq!(parse_spot_price(&body).unwrap(), 85_000);
    }

    #[test]
    fn accepts_numeric_amount() {
        assert_eq!(parse_spot_price(&json!({ "data": { "amount": 100001 } })).unwrap(), 100_001);
    }

    #[test]
    fn malformed_amount_is_error() {
        assert!(parse_spot_price(&json!({ "data": { "amount": "n/a" } })).is_err());
        assert!(parse_spot_price(&json!({ "data": {} })).is_err());
        assert!(parse_spot_price(&json!({ "errors": [] })).is_err());
        assert!(parse_spot_price(&json!({ "data": { "amount": "-1" } })).is_err());
        assert!(parse_spot_price(&json!({ "data": { "amount": "0.4" } })).is_err());
    }
}
