// =============================================================================
// Live Users Source — remote record store counter
// =============================================================================
//
// PostgREST-style query against the record store:
//
//   GET <base_url>/rest/v1/<table>?select=<column>&limit=1
//   apikey: <key>
//   Authorization: Bearer <key>
//
//   [ { "count": 28514 } ]
//
// The count may come back as a JSON number or a numeric string. An unset
// base URL counts as a failure so the random-walk fallback keeps the counter
// moving in local setups.

use anyhow::{Context, Result};
use tracing::{debug, instrument};

use crate::runtime_config::LiveUsersSource;

pub struct LiveUsersClient {
    client: reqwest::Client,
    source: LiveUsersSource,
}

impl LiveUsersClient {
    pub fn with_client(client: reqwest::Client, source: LiveUsersSource) -> Self {
        Self { client, source }
    }

    fn query_url(&self) -> String {
        format!(
            "{}/rest/v1/{}?select={}&limit=1",
            self.source.base_url.trim_end_matches('/'),
            self.source.table,
            self.source.column
        )
    }

    #[instrument(skip(self), name = "live_users::fetch")]
    pub async fn fetch(&self) -> Result<u64> {
        if self.source.base_url.is_empty() {
            anyhow::bail!("live user source is not configured");
        }

        let url = self.query_url();
        let resp = self
            .client
            .get(&url)
            .header("apikey", &self.source.api_key)
            .bearer_auth(&self.source.api_key)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;

        let status = resp.status();
        let body: serde_json::Value = resp
            .json()
            .await
            .context("failed to parse live user response body")?;

        if !status.is_success() {
            anyhow::bail!("live user source returned {}: {}", status, body);
        }

        let count = parse_count(&body, &self.source.column)?;
        debug!(count, "live user count fetched");
        Ok(count)
    }
}

/// Read the count column from the first returned row (or a bare object).
pub fn parse_count(body: &serde_json::Value, column: &str) -> Result<u64> {
    let row = match body {
        serde_json::Value::Array(rows) => rows.first().context("live user query returned no rows")?,
        serde_json::Value::Object(_) => body,
        other => anyhow::bail!("unexpected live user response: {other}"),
    };

    let field = row
        .get(column)
        .with_context(|| format!("live user row has no `{column}` field"))?;

    match field {
        serde_json::Value::Number(n) => n
            .as_u64()
            .with_context(|| format!("live user count is not a non-negative integer: {n}")),
        serde_json::Value::String(s) => s
            .trim()
            .parse::<u64>()
            .with_context(|| format!("live user count is not numeric: {s:?}")),
        other => anyhow::bail!("unexpected live user count: {other}"),
    }
}
