// =============================================================================
// Live Feed Module
// =============================================================================
//
// Refreshes the market signal from three independent sources:
//
//   1. FX rate        — USD → local currency
//   2. BTC spot price — drives the crypto boost tier
//   3. Live users     — active-user counter from the remote record store
//
// Each source fails on its own. A failed source never aborts the cycle; its
// value is resolved through the fallback policy configured for it:
//
//   exchange_rate  =>  last known good
//   btc_price      =>  last known good
//   live_users     =>  random walk of at most ±5 from the previous count
//
// `SignalFetcher::refresh` therefore always returns a complete signal.

pub mod btc_price;
pub mod fx_rate;
pub mod http_feed;
pub mod live_users;

pub use http_feed::HttpMarketFeed;

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::market_signal::MarketSignal;

// =============================================================================
// MarketFeed
// =============================================================================

/// The three live retrievals behind a market signal refresh.
pub trait MarketFeed: Send + Sync + 'static {
    /// Local-currency units per USD.
    fn exchange_rate(&self) -> impl Future<Output = Result<f64>> + Send;

    /// BTC spot price, rounded to whole USD.
    fn btc_price(&self) -> impl Future<Output = Result<u64>> + Send;

    /// Current active-user count.
    fn live_users(&self) -> impl Future<Output = Result<u64>> + Send;
}

// =============================================================================
// Fallback policies
// =============================================================================

/// What a source resolves to when its fetch fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Keep the previous value unchanged.
    LastKnownGood,
    /// Move the previous value by a uniform integer step in
    /// `[-max_step, +max_step]`.
    RandomWalk { max_step: u32 },
}

/// A value a fallback policy can be applied to.
pub trait Walkable: Copy {
    fn step(self, delta: i64) -> Self;
}

impl Walkable for u64 {
    fn step(self, delta: i64) -> Self {
        self.saturating_add_signed(delta)
    }
}

impl Walkable for f64 {
    fn step(self, delta: i64) -> Self {
        (self + delta as f64).max(0.0)
    }
}

impl FallbackPolicy {
    /// Resolve the value for a failed source given its previous value.
    pub fn resolve<T: Walkable, R: Rng>(&self, previous: T, rng: &mut R) -> T {
        match *self {
            Self::LastKnownGood => previous,
            Self::RandomWalk { max_step } => {
                let bound = i64::from(max_step);
                previous.step(rng.gen_range(-bound..=bound))
            }
        }
    }
}

/// Per-source fallback policy table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackTable {
    #[serde(default = "FallbackTable::default_exchange_rate")]
    pub exchange_rate: FallbackPolicy,
    #[serde(default = "FallbackTable::default_btc_price")]
    pub btc_price: FallbackPolicy,
    #[serde(default = "FallbackTable::default_live_users")]
    pub live_users: FallbackPolicy,
}

impl FallbackTable {
    fn default_exchange_rate() -> FallbackPolicy {
        FallbackPolicy::LastKnownGood
    }

    fn default_btc_price() -> FallbackPolicy {
        FallbackPolicy::LastKnownGood
    }

    fn default_live_users() -> FallbackPolicy {
        FallbackPolicy::RandomWalk { max_step: 5 }
    }
}

impl Default for FallbackTable {
    fn default() -> Self {
        Self {
            exchange_rate: Self::default_exchange_rate(),
            btc_price: Self::default_btc_price(),
            live_users: Self::default_live_users(),
        }
    }
}

// =============================================================================
// Refresh report
// =============================================================================

/// How a single source was resolved in one refresh cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceOutcome {
    Live,
    Fallback { policy: FallbackPolicy, error: String },
}

impl SourceOutcome {
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live)
    }
}

/// Per-source outcome of one refresh cycle.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub exchange_rate: SourceOutcome,
    pub btc_price: SourceOutcome,
    pub live_users: SourceOutcome,
}

impl RefreshReport {
    /// Number of sources that fell back this cycle.
    pub fn fallback_count(&self) -> usize {
        [&self.exchange_rate, &self.btc_price, &self.live_users]
            .iter()
            .filter(|o| !o.is_live())
            .count()
    }
}

/// A freshly built signal together with how each field was obtained.
#[derive(Debug, Clone)]
pub struct Refreshed {
    pub signal: MarketSignal,
    pub report: RefreshReport,
}

// =============================================================================
// SignalFetcher
// =============================================================================

/// Runs the three retrievals concurrently and merges them into a new signal.
pub struct SignalFetcher<F> {
    feed: F,
    fallbacks: FallbackTable,
    fetch_timeout: Duration,
}

impl<F: MarketFeed> SignalFetcher<F> {
    pub fn new(feed: F, fallbacks: FallbackTable, fetch_timeout: Duration) -> Self {
        Self {
            feed,
            fallbacks,
            fetch_timeout,
        }
    }

    /// Build the next signal from `current`. Never fails.
    pub async fn refresh(&self, current: &MarketSignal) -> MarketSignal {
        self.refresh_with_report(current).await.signal
    }

    /// Like [`refresh`](Self::refresh), also reporting which sources fell back.
    pub async fn refresh_with_report(&self, current: &MarketSignal) -> Refreshed {
        let started_at = Utc::now();

        let (fx, btc, users) = tokio::join!(
            bounded(self.fetch_timeout, self.feed.exchange_rate()),
            bounded(self.fetch_timeout, self.feed.btc_price()),
            bounded(self.fetch_timeout, self.feed.live_users()),
        );

        let mut rng = rand::thread_rng();
        let (exchange_rate, fx_outcome) = settle(
            "exchange_rate",
            fx,
            current.exchange_rate,
            self.fallbacks.exchange_rate,
            &mut rng,
        );
        let (btc_price, btc_outcome) = settle(
            "btc_price",
            btc,
            current.btc_price,
            self.fallbacks.btc_price,
            &mut rng,
        );
        let (live_users, users_outcome) = settle(
            "live_users",
            users,
            current.live_users,
            self.fallbacks.live_users,
            &mut rng,
        );

        let finished_at = Utc::now();
        let signal = MarketSignal {
            exchange_rate,
            btc_price,
            live_users,
            last_update: Some(finished_at),
        };

        debug!(
            exchange_rate,
            btc_price,
            live_users,
            "market signal refreshed"
        );

        Refreshed {
            signal,
            report: RefreshReport {
                started_at,
                finished_at,
                exchange_rate: fx_outcome,
                btc_price: btc_outcome,
                live_users: users_outcome,
            },
        }
    }
}

/// Apply the per-fetch deadline.
async fn bounded<T>(limit: Duration, fut: impl Future<Output = Result<T>>) -> Result<T> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(anyhow::anyhow!("timed out after {} ms", limit.as_millis())),
    }
}

/// Resolve one source: the fetched value, or its fallback.
fn settle<T: Walkable, R: Rng>(
    source: &'static str,
    fetched: Result<T>,
    previous: T,
    policy: FallbackPolicy,
    rng: &mut R,
) -> (T, SourceOutcome) {
    match fetched {
        Ok(value) => (value, SourceOutcome::Live),
        Err(e) => {
            let error = format!("{e:#}");
            warn!(source, error = %error, policy = ?policy, "live source failed — using fallback");
            (
                policy.resolve(previous, rng),
                SourceOutcome::Fallback { policy, error },
            )
        }
    }
}
