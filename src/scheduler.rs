// =============================================================================
// Refresh Scheduler — periodic market signal refresh
// =============================================================================
//
// On start the first cycle runs immediately, then one cycle per period until
// stopped. Cycles run back to back inside a single task, so there is never
// more than one refresh in flight; a slow cycle delays the next tick rather
// than queueing a backlog.
//
// Stop semantics:
//   - `stop()` cancels the pending timer and wakes the task.
//   - A refresh already in flight is allowed to finish, but its result is
//     discarded. Once `stop()` returns no further install can happen: the
//     install runs while holding the stop flag's read guard, and `stop()`
//     needs the write side.
//   - Dropping the handle raises the same flag, with the same guarantee.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::app_state::AppState;
use crate::live_feed::{MarketFeed, SignalFetcher};

/// Drives a `SignalFetcher` on a fixed period and installs its results.
pub struct RefreshScheduler<F> {
    fetcher: Arc<SignalFetcher<F>>,
    state: Arc<AppState>,
    period: Duration,
}

/// Handle to a running scheduler. Dropping it also stops the scheduler.
pub struct RefreshHandle {
    stop_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl<F: MarketFeed> RefreshScheduler<F> {
    pub fn new(fetcher: SignalFetcher<F>, state: Arc<AppState>, period: Duration) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            state,
            period,
        }
    }

    /// Spawn the refresh loop on the current tokio runtime.
    pub fn start(self) -> RefreshHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        info!(period_ms = self.period.as_millis() as u64, "refresh scheduler starting");
        let task = tokio::spawn(self.run(stop_rx));
        RefreshHandle {
            stop_tx,
            task: Some(task),
        }
    }

    async fn run(self, mut stop_rx: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cycle: u64 = 0;

        loop {
            tokio::select! {
                biased;
                _ = stop_rx.changed() => break,
                _ = interval.tick() => {}
            }

            cycle += 1;
            let current = self.state.current_signal();
            let refreshed = self.fetcher.refresh_with_report(&current).await;

            {
                let stopped = stop_rx.borrow();
                if *stopped {
                    debug!(cycle, "scheduler stopped mid-cycle — refresh discarded");
                    break;
                }
                let fallbacks = refreshed.report.fallback_count();
                self.state.install_refresh(cycle, refreshed);
                if fallbacks > 0 {
                    debug!(cycle, fallbacks, "refresh installed with fallbacks");
                }
            }
        }

        info!(cycles = cycle, "refresh scheduler stopped");
    }
}

impl RefreshHandle {
    /// Stop the scheduler. No install happens after this returns.
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    /// Stop and wait for the loop (and any in-flight refresh) to wind down.
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!(error = %e, "refresh scheduler task failed");
            }
        }
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live_feed::tests::StubFeed;
    use crate::live_feed::FallbackTable;
    use crate::runtime_config::RuntimeConfig;

    fn scheduler(feed: StubFeed, period: Duration) -> (RefreshScheduler<StubFeed>, Arc<AppState>) {
        let state = Arc::new(AppState::new(RuntimeConfig::default()));
        let fetcher = SignalFetcher::new(feed, FallbackTable::default(), Duration::from_secs(1));
        (RefreshScheduler::new(fetcher, state.clone(), period), state)
    }

    async fn wait_for_installs(state: &AppState, n: u64) -> bool {
        for _ in 0..200 {
            if state.signal_store.install_count() >= n {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[tokio::test]
    async fn first_refresh_runs_immediately() {
        let (sched, state) = scheduler(StubFeed::healthy(), Duration::from_secs(3600));
        let handle = sched.start();
        assert!(wait_for_installs(&state, 1).await);
        assert_eq!(state.current_signal().btc_price, 101_500);
        assert!(state.current_signal().last_update.is_some());
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn repeats_on_period() {
        let (sched, state) = scheduler(StubFeed::healthy(), Duration::from_millis(20));
        let handle = sched.start();
        assert!(wait_for_installs(&state, 3).await);
        assert!(state.last_refresh.read().as_ref().unwrap().cycle >= 3);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn no_installs_after_stop() {
        let (sched, state) = scheduler(StubFeed::down(), Duration::from_millis(10));
        let handle = sched.start();
        assert!(wait_for_installs(&state, 2).await);
        handle.stop();
        let frozen = state.signal_store.install_count();
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(state.signal_store.install_count(), frozen);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn in_flight_result_is_discarded_on_stop() {
        let feed = StubFeed {
            delay: Duration::from_millis(150),
            ..StubFeed::healthy()
        };
        let (sched, state) = scheduler(feed, Duration::from_secs(3600));
        let handle = sched.start();
        tokio::time::sleep(Duration::from_millis(30)).await;
        handle.shutdown().await;
        assert_eq!(state.signal_store.install_count(), 0);
        assert_eq!(state.current_signal(), RuntimeConfig::default().seed_signal());
    }

    #[tokio::test]
    async fn dropping_handle_mid_refresh_discards_result() {
        let feed = StubFeed {
            delay: Duration::from_millis(150),
            ..StubFeed::healthy()
        };
        let (sched, state) = scheduler(feed, Duration::from_secs(3600));
        let handle = sched.start();
        tokio::time::sleep(Duration::from_millis(30)).await;
        drop(handle);
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(state.signal_store.install_count(), 0);
        assert_eq!(state.current_signal(), RuntimeConfig::default().seed_signal());
    }

    #[tokio::test]
    async fn shutdown_reports_clean_exit() {
        let (sched, state) = scheduler(StubFeed::healthy(), Duration::from_millis(10));
        let handle = sched.start();
        assert!(wait_for_installs(&state, 1).await);
        handle.shutdown().await;
        let frozen = state.signal_store.install_count();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(state.signal_store.install_count(), frozen);
    }

    #[tokio::test]
    async fn dropping_handle_stops_loop() {
        let (sched, state) = scheduler(StubFeed::healthy(), Duration::from_millis(10));
        let handle = sched.start();
        assert!(wait_for_installs(&state, 1).await);
        drop(handle);
        let frozen = state.signal_store.install_count();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(state.signal_store.install_count(), frozen);
    }
}
