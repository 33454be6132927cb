// =============================================================================
// Runtime Configuration — service settings with atomic save
// =============================================================================
//
// Every tunable of the projection service lives here: refresh cadence, per
// fetch timeout, live source endpoints, seed signal values, the fallback
// strategy per source, and the selection the dashboard opens with.
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash. All fields carry `#[serde(default)]` so that adding new fields
// never breaks loading an older config file.
//
// `load` validates before returning: seeds must describe a valid market
// signal, fetches must time out within one refresh period, FX and BTC keep
// their last known value on failure and the live user count always walks.
//
// =============================================================================

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::live_feed::{FallbackPolicy, FallbackTable};
use crate::market_signal::MarketSignal;
use crate::types::{Region, Scenario};

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_refresh_interval_ms() -> u64 {
    15_000
}

fn default_fetch_timeout_ms() -> u64 {
    5_000
}

fn default_local_currency() -> String {
    "KES".to_string()
}

fn default_fx_endpoint() -> String {
    "https://api.exchangerate-api.com/v4/latest/USD".to_string()
}

fn default_btc_endpoint() -> String {
    "https://api.coinbase.com/v2/prices/BTC-USD/spot".to_string()
}

fn default_live_users_table() -> String {
    "live_users".to_string()
}

fn default_live_users_column() -> String {
    "count".to_string()
}

fn default_seed_exchange_rate() -> f64 {
    162.8
}

fn default_seed_btc_price() -> u64 {
    95_000
}

fn default_seed_live_users() -> u64 {
    28_472
}

// =============================================================================
// LiveUsersSource
// =============================================================================

/// Where the live active-user counter is read from.
///
/// `base_url` and `api_key` are normally injected from the environment at
/// startup and are never written back to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveUsersSource {
    /// Record store root, e.g. `https://<project>.supabase.co`. Empty means
    /// unconfigured, which the fetcher treats as a failed source.
    #[serde(default, skip_serializing)]
    pub base_url: String,

    #[serde(default, skip_serializing)]
    pub api_key: String,

    #[serde(default = "default_live_users_table")]
    pub table: String,

    #[serde(default = "default_live_users_column")]
    pub column: String,
}

impl Default for LiveUsersSource {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            table: default_live_users_table(),
            column: default_live_users_column(),
        }
    }
}

// =============================================================================
// SeedSignal
// =============================================================================

/// Values the market signal starts from before the first refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedSignal {
    #[serde(default = "default_seed_exchange_rate")]
    pub exchange_rate: f64,

    #[serde(default = "default_seed_btc_price")]
    pub btc_price: u64,

    #[serde(default = "default_seed_live_users")]
    pub live_users: u64,
}

impl Default for SeedSignal {
    fn default() -> Self {
        Self {
            exchange_rate: default_seed_exchange_rate(),
            btc_price: default_seed_btc_price(),
            live_users: default_seed_live_users(),
        }
    }
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Top-level runtime configuration for the projection service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    // --- Refresh loop ------------------------------------------------------

    /// Period between refresh cycles.
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,

    /// Upper bound on any single source fetch. Kept below the refresh period
    /// so cycles cannot pile up behind a hung request.
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    // --- Selection ---------------------------------------------------------

    #[serde(default)]
    pub default_scenario: Scenario,

    #[serde(default)]
    pub default_region: Region,

    // --- Sources -----------------------------------------------------------

    /// ISO code of the local display currency (FX target).
    #[serde(default = "default_local_currency")]
    pub local_currency: String,

    /// USD-based FX rate endpoint.
    #[serde(default = "default_fx_endpoint")]
    pub fx_endpoint: String,

    /// BTC-USD spot price endpoint.
    #[serde(default = "default_btc_endpoint")]
    pub btc_endpoint: String,

    #[serde(default)]
    pub live_users: LiveUsersSource,

    // --- Seeds & fallbacks -------------------------------------------------

    #[serde(default)]
    pub seed: SeedSignal,

    #[serde(default)]
    pub fallbacks: FallbackTable,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: default_refresh_interval_ms(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            default_scenario: Scenario::default(),
            default_region: Region::default(),
            local_currency: default_local_currency(),
            fx_endpoint: default_fx_endpoint(),
            btc_endpoint: default_btc_endpoint(),
            live_users: LiveUsersSource::default(),
            seed: SeedSignal::default(),
            fallbacks: FallbackTable::default(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("invalid runtime config in {}", path.display()))?;

        info!(
            path = %path.display(),
            refresh_interval_ms = config.refresh_interval_ms,
            scenario = %config.default_scenario,
            region = %config.default_region,
            "runtime config loaded"
        );

        Ok(config)
    }

    /// Reject settings that would let the market signal leave its valid range.
    pub fn validate(&self) -> Result<()> {
        if self.fetch_timeout_ms == 0 {
            bail!("fetch_timeout_ms must be positive");
        }
        if self.fetch_timeout_ms >= self.refresh_interval_ms {
            bail!(
                "fetch_timeout_ms ({}) must be shorter than refresh_interval_ms ({})",
                self.fetch_timeout_ms,
                self.refresh_interval_ms
            );
        }
        if self.local_currency.trim().is_empty() {
            bail!("local_currency must not be empty");
        }

        if !self.seed.exchange_rate.is_finite() || self.seed.exchange_rate <= 0.0 {
            bail!("seed.exchange_rate must be positive, got {}", self.seed.exchange_rate);
        }
        if self.seed.btc_price == 0 {
            bail!("seed.btc_price must be positive");
        }

        if self.fallbacks.exchange_rate != FallbackPolicy::LastKnownGood {
            bail!("fallbacks.exchange_rate must be last_known_good");
        }
        if self.fallbacks.btc_price != FallbackPolicy::LastKnownGood {
            bail!("fallbacks.btc_price must be last_known_good");
        }
        match self.fallbacks.live_users {
            FallbackPolicy::RandomWalk { max_step } if max_step >= 1 => {}
            other => bail!("fallbacks.live_users must be random_walk with max_step >= 1, got {other:?}"),
        }

        Ok(())
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise runtime config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "runtime config saved (atomic)");
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms.max(1))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms.max(1))
    }

    /// The market signal the service starts from.
    pub fn seed_signal(&self) -> MarketSignal {
        MarketSignal::seeded(
            self.seed.exchange_rate,
            self.seed.btc_price,
            self.seed.live_users,
        )
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.refresh_interval_ms, 15_000);
        assert!(cfg.fetch_timeout() < cfg.refresh_interval());
        assert_eq!(cfg.default_scenario, Scenario::Base);
        assert_eq!(cfg.default_region, Region::Kenya);
        assert_eq!(cfg.local_currency, "KES");
        assert_eq!(cfg.live_users.table, "live_users");
        assert!(cfg.live_users.base_url.is_empty());
        assert_eq!(cfg.fallbacks.exchange_rate, FallbackPolicy::LastKnownGood);
        assert_eq!(cfg.fallbacks.live_users, FallbackPolicy::RandomWalk { max_step: 5 });
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: RuntimeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.fetch_timeout_ms, 5_000);
        assert_eq!(cfg.seed.btc_price, 95_000);
        assert_eq!(cfg.seed.live_users, 28_472);
        assert!((cfg.seed.exchange_rate - 162.8).abs() < f64::EPSILON);
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{ "default_region": "eastAfrica", "refresh_interval_ms": 30000,
                        "seed": { "btc_price": 101000 } }"#;
        let cfg: RuntimeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.default_region, Region::EastAfrica);
        assert_eq!(cfg.default_scenario, Scenario::Base);
        assert_eq!(cfg.refresh_interval(), Duration::from_secs(30));
        assert_eq!(cfg.seed.btc_price, 101_000);
        assert_eq!(cfg.seed.live_users, 28_472);
    }

    #[test]
    fn secrets_are_not_serialised() {
        let mut cfg = RuntimeConfig::default();
        cfg.live_users.base_url = "https://example.supabase.co".into();
        cfg.live_users.api_key = "anon-key".into();
        let json = serde_json::to_string(&cfg).unwrap();
        assert!(!json.contains("anon-key"));
        assert!(!json.contains("example.supabase.co"));
    }

    #[test]
    fn save_then_load_keeps_selection() {
        let dir = std::env::temp_dir().join(format!("honeycoin-cfg-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("runtime_config.json");

        let mut cfg = RuntimeConfig::default();
        cfg.default_scenario = Scenario::Best;
        cfg.default_region = Region::Africa;
        cfg.save(&path).unwrap();

        let loaded = RuntimeConfig::load(&path).unwrap();
        assert_eq!(loaded.default_scenario, Scenario::Best);
        assert_eq!(loaded.default_region, Region::Africa);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(RuntimeConfig::load("/definitely/not/here/runtime_config.json").is_err());
    }

    #[test]
    fn default_config_is_valid() {
        RuntimeConfig::default().validate().unwrap();
    }

    fn rejects(json: &str, needle: &str) {
        let cfg: RuntimeConfig = serde_json::from_str(json).unwrap();
        let err = cfg.validate().unwrap_err().to_string();
        assert!(err.contains(needle), "{err}");
    }

    #[test]
    fn rejects_non_positive_seeds() {
        rejects(r#"{ "seed": { "btc_price": 0 } }"#, "seed.btc_price");
        rejects(r#"{ "seed": { "exchange_rate": 0.0 } }"#, "seed.exchange_rate");
        rejects(r#"{ "seed": { "exchange_rate": -3.5 } }"#, "seed.exchange_rate");

        let mut cfg = RuntimeConfig::default();
        cfg.seed.exchange_rate = f64::NAN;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_timeout_not_shorter_than_period() {
        rejects(
            r#"{ "refresh_interval_ms": 5000, "fetch_timeout_ms": 5000 }"#,
            "fetch_timeout_ms",
        );
        rejects(r#"{ "fetch_timeout_ms": 0 }"#, "fetch_timeout_ms");
    }

    #[test]
    fn rejects_walking_fx_or_btc() {
        rejects(
            r#"{ "fallbacks": { "exchange_rate": { "kind": "random_walk", "max_step": 5 } } }"#,
            "fallbacks.exchange_rate",
        );
        rejects(
            r#"{ "fallbacks": { "btc_price": { "kind": "random_walk", "max_step": 1 } } }"#,
            "fallbacks.btc_price",
        );
    }

    #[test]
    fn rejects_frozen_live_users() {
        rejects(
            r#"{ "fallbacks": { "live_users": { "kind": "last_known_good" } } }"#,
            "fallbacks.live_users",
        );
        rejects(
            r#"{ "fallbacks": { "live_users": { "kind": "random_walk", "max_step": 0 } } }"#,
            "fallbacks.live_users",
        );
    }

    #[test]
    fn load_rejects_invalid_file() {
        let dir = std::env::temp_dir().join(format!("honeycoin-bad-cfg-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("runtime_config.json");
        std::fs::write(
            &path,
            r#"{ "seed": { "exchange_rate": 2.0, "btc_price": 0 },
                 "fallbacks": { "exchange_rate": { "kind": "random_walk", "max_step": 5 },
                                "live_users": { "kind": "last_known_good" } } }"#,
        )
        .unwrap();

        let err = RuntimeConfig::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("invalid runtime config"));
        std::fs::remove_dir_all(&dir).ok();
    }
}
