// =============================================================================
// FX Rate Source — USD → local currency
// =============================================================================
//
// GET <endpoint>  (USD base), e.g. https://api.exchangerate-api.com/v4/latest/USD
//
//   { "base": "USD", "rates": { "KES": 129.2, "UGX": 3701.5, ... } }
//
// Only the configured target currency is read. A missing code, or a rate that
// is not a positive finite number, is an error so the caller's fallback
// policy applies.

use anyhow::{Context, Result};
use tracing::{debug, instrument};

/// Fetches the USD rate for a single target currency.
pub struct FxRateClient {
    client: reqwest::Client,
    endpoint: String,
    currency: String,
}

impl FxRateClient {
    /// Create a client that re-uses an existing HTTP client.
    pub fn with_client(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            currency: currency.into(),
        }
    }

    /// Fetch the latest USD → target rate.
    #[instrument(skip(self), name = "fx_rate::fetch", fields(currency = %self.currency))]
    pub async fn fetch(&self) -> Result<f64> {
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
            .context("failed to parse FX response body")?;

        if !status.is_success() {
            anyhow::bail!("FX API returned {}: {}", status, body);
        }

        let rate = parse_rate(&body, &self.currency)?;
        debug!(currency = %self.currency, rate, "FX rate fetched");
        Ok(rate)
    }
}

/// Extract `rates.<currency>` from an FX response body.
pub fn parse_rate(body: &serde_json::Value, currency: &str) -> Result<f64> {
    let rate = body
        .get("rates")
        .context("FX response has no `rates` object")?
        .get(currency)
        .and_then(|v| v.as_f64())
        .with_context(|| format!("FX response has no numeric rate for {currency}"))?;

    if !rate.is_finite() || rate <= 0.0 {
        anyhow::bail!("FX rate for {currency} is not positive: {rate}");
    }
    Ok(rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_target_currency() {
        let body = json!({ "base": "USD", "rates": { "KES": 129.25, "EUR": 0.92 } });
        assert!((parse_rate(&body, "KES").unwrap() - 129.25).abs() < 1e-12);
    }

    #[test]
    fn missing_currency_is_error() {
        let body = json!({ "rates": { "EUR": 0.92 } });
        assert!(parse_rate(&body, "KES").is_err());
        assert!(parse_rate(&json!({}), "KES").is_err());
    }

    #[test]
    fn zero_or_string_rate_is_error() {
        assert!(parse_rate(&json!({ "rates": { "KES": 0 } }), "KES").is_err());
        assert!(parse_rate(&json!({ "rates": { "KES": "129.2" } }), "KES").is_err());
    }
}
