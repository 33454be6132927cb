// =============================================================================
// Central Application State — HoneyCoin projection service
// =============================================================================
//
// Ties together the pieces the dashboard reads: the runtime config, the live
// market signal, the user's scenario/region selection and the outcome of the
// last refresh cycle. `build_snapshot` derives the current projection on
// demand, so nothing here accumulates hidden state.
//
// Thread safety:
//   - Atomic counters for lock-free version tracking.
//   - parking_lot::RwLock for the selection, config and refresh status.
//   - The market signal is swapped wholesale through `SignalStore`.
// =============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info};

use crate::live_feed::{RefreshReport, Refreshed};
use crate::market_signal::{MarketSignal, SignalStore};
use crate::projection::{ProjectionEngine, ProjectionResult};
use crate::runtime_config::RuntimeConfig;
use crate::scenario_table::{self, Catalog};
use crate::types::{Region, Scenario, Selection};

/// Outcome of the most recently installed refresh cycle.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshStatus {
    /// 1-based cycle number since the scheduler started.
    pub cycle: u64,
    pub report: RefreshReport,
}

/// Central application state shared across all async tasks via `Arc<AppState>`.
pub struct AppState {
    // ── Version tracking ────────────────────────────────────────────────
    /// Incremented on every signal install and selection change. The
    /// WebSocket feed uses this to detect changes and push updates.
    pub state_version: AtomicU64,

    /// WebSocket message sequence number (incremented per message sent).
    pub ws_sequence_number: AtomicU64,

    // ── Configuration ───────────────────────────────────────────────────
    pub runtime_config: Arc<RwLock<RuntimeConfig>>,

    // ── Live inputs ─────────────────────────────────────────────────────
    pub signal_store: Arc<SignalStore>,
    pub last_refresh: RwLock<Option<RefreshStatus>>,

    // ── Selection & projection ──────────────────────────────────────────
    pub selection: RwLock<Selection>,
    pub engine: ProjectionEngine,

    // ── Timing ──────────────────────────────────────────────────────────
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Construct the state from `config`: the signal starts at the configured
    /// seed values and the selection at the configured defaults.
    pub fn new(config: RuntimeConfig) -> Self {
        let selection = Selection {
            scenario: config.default_scenario,
            region: config.default_region,
        };
        let seed = config.seed_signal();
        let engine = ProjectionEngine::new(config.local_currency.clone());

        Self {
            state_version: AtomicU64::new(1),
            ws_sequence_number: AtomicU64::new(0),
            runtime_config: Arc::new(RwLock::new(config)),
            signal_store: Arc::new(SignalStore::new(seed)),
            last_refresh: RwLock::new(None),
            selection: RwLock::new(selection),
            engine,
            start_time: std::time::Instant::now(),
        }
    }

    // ── Version Management ──────────────────────────────────────────────

    pub fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::SeqCst)
    }

    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }

    // ── Signal ──────────────────────────────────────────────────────────

    pub fn current_signal(&self) -> MarketSignal {
        self.signal_store.current()
    }

    /// Install the result of refresh cycle `cycle`.
    ///
    /// The signal swap happens under the `last_refresh` write lock, so a
    /// snapshot never pairs a signal with another cycle's report.
    pub fn install_refresh(&self, cycle: u64, refreshed: Refreshed) {
        let mut last = self.last_refresh.write();
        self.signal_store.install(refreshed.signal);
        *last = Some(RefreshStatus {
            cycle,
            report: refreshed.report,
        });
        drop(last);
        self.increment_version();
        debug!(cycle, "market signal installed");
    }

    // ── Selection ───────────────────────────────────────────────────────

    pub fn current_selection(&self) -> Selection {
        *self.selection.read()
    }

    /// Apply a (partial) selection change and return the resulting selection.
    pub fn select(&self, scenario: Option<Scenario>, region: Option<Region>) -> Selection {
        let updated = {
            let mut sel = self.selection.write();
            if let Some(s) = scenario {
                sel.scenario = s;
            }
            if let Some(r) = region {
                sel.region = r;
            }
            *sel
        };

        {
            let mut config = self.runtime_config.write();
            config.default_scenario = updated.scenario;
            config.default_region = updated.region;
        }

        self.increment_version();
        info!(scenario = %updated.scenario, region = %updated.region, "selection changed");
        updated
    }

    // ── Projection ──────────────────────────────────────────────────────

    /// Projection for arbitrary keys under the current signal.
    pub fn project(&self, scenario: Scenario, region: Region) -> ProjectionResult {
        self.engine.project(scenario, region, &self.current_signal())
    }

    // ── Snapshot Builder ────────────────────────────────────────────────

    /// Build a complete, serialisable snapshot of the dashboard state.
    ///
    /// This is the payload sent by `GET /api/v1/state`, the export endpoint
    /// and the WebSocket push feed.
    pub fn build_snapshot(&self) -> DashboardSnapshot {
        let now = Utc::now();
        let version = self.current_state_version();
        let (signal, last_refresh) = {
            let last = self.last_refresh.read();
            (self.current_signal(), last.clone())
        };
        let sel = self.current_selection();
        let rf = scenario_table::region_factor(sel.region);

        DashboardSnapshot {
            state_version: version,
            server_time: now.timestamp_millis(),
            uptime_secs: self.start_time.elapsed().as_secs(),
            ws_sequence_number: self.ws_sequence_number.load(Ordering::Relaxed),
            local_currency: self.engine.currency_code().to_string(),
            signal,
            signal_installs: self.signal_store.install_count(),
            selection: SelectionView {
                scenario: sel.scenario,
                region: sel.region,
                region_name: rf.name,
                region_factor: rf.factor,
            },
            projection: self.engine.project(sel.scenario, sel.region, &signal),
            last_refresh,
            catalog: scenario_table::catalog(),
        }
    }
}

// =============================================================================
// Serialisable snapshot types
// =============================================================================

/// Full dashboard state snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub state_version: u64,
    pub server_time: i64,
    pub uptime_secs: u64,
    pub ws_sequence_number: u64,
    pub local_currency: String,
    pub signal: MarketSignal,
    /// Refresh cycles installed since startup.
    pub signal_installs: u64,
    pub selection: SelectionView,
    pub projection: ProjectionResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_refresh: Option<RefreshStatus>,
    pub catalog: Catalog,
}

/// Current selection with its region display data resolved.
#[derive(Debug, Clone, Serialize)]
pub struct SelectionView {
    pub scenario: Scenario,
    pub region: Region,
    pub region_name: &'static str,
    pub region_factor: f64,
}
