// =============================================================================
// Market Signal — live inputs to the projection engine
// =============================================================================
//
// A `MarketSignal` is a plain value: FX rate, BTC spot price, live user count
// and the time of the last completed refresh. The refresh scheduler is the
// only writer; it replaces the whole snapshot in one swap so readers never
// observe a half-updated signal.
// =============================================================================

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Snapshot of every externally-sourced value driving the projections.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketSignal {
    /// Local-currency units per USD.
    pub exchange_rate: f64,
    /// BTC spot price in whole USD.
    pub btc_price: u64,
    /// Active users currently online.
    pub live_users: u64,
    /// Completion time of the last refresh cycle; `None` before the first.
    pub last_update: Option<DateTime<Utc>>,
}

impl MarketSignal {
    /// Seed values used as last-known-good before the first refresh.
    pub fn seeded(exchange_rate: f64, btc_price: u64, live_users: u64) -> Self {
        Self {
            exchange_rate,
            btc_price,
            live_users,
            last_update: None,
        }
    }
}

impl Default for MarketSignal {
    fn default() -> Self {
        Self::seeded(162.8, 95_000, 28_472)
    }
}

// =============================================================================
// SignalStore
// =============================================================================

/// Single-writer holder of the current `MarketSignal`.
///
/// Readers copy the snapshot out; the refresh loop installs a complete new
/// snapshot per cycle. `installs` counts how many snapshots have been
/// installed since startup.
pub struct SignalStore {
    current: RwLock<MarketSignal>,
    installs: AtomicU64,
}

impl SignalStore {
    pub fn new(initial: MarketSignal) -> Self {
        Self {
            current: RwLock::new(initial),
            installs: AtomicU64::new(0),
        }
    }

    /// Copy of the current snapshot.
    pub fn current(&self) -> MarketSignal {
        *self.current.read()
    }

    /// Replace the snapshot wholesale.
    pub fn install(&self, signal: MarketSignal) {
        *self.current.write() = signal;
        self.installs.fetch_add(1, Ordering::SeqCst);
    }

    pub fn install_count(&self) -> u64 {
        self.installs.load(Ordering::SeqCst)
    }
}
