//! Three independent, non-overlapping periodic jobs: the
//! analysis cycle, the position monitor, and the outcome tracker. Each job
//! runs on its own `tokio::time::interval`; an `AtomicBool` per job enforces
//! `max_instances = 1` by skipping a tick if the previous invocation hasn't
//! finished. A `watch` channel carries the shutdown signal, but it is only
//! consulted between ticks, never while a job is running, so an in-flight
//! invocation always runs to completion before the task exits.
use crate::cycle::{signal_outcome_candidates, AnalysisCycle};
use brokers::Broker;
use db::Storage;
use outcome::OutcomeTracker;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use trading::monitor::PositionMonitor;

/// Config knobs for the three jobs.
#[derive(Debug, Clone, Copy)]
pub struct ScheduleConfig {
    pub analysis_cycle_interval: Duration,
    pub position_monitor_interval: Duration,
    pub outcome_tracker_interval: Duration,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            analysis_cycle_interval: Duration::from_secs(60),
            position_monitor_interval: Duration::from_secs(120),
            outcome_tracker_interval: Duration::from_secs(300),
        }
    }
}

pub struct Scheduler {
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl Scheduler {
    /// Spawns the three jobs. Returns a handle that stops them all on `shutdown()`.
    pub fn start(
        config: ScheduleConfig,
        analysis_cycle: Arc<Mutex<AnalysisCycle>>,
        position_monitor: Arc<PositionMonitor>,
        outcome_tracker: Arc<OutcomeTracker>,
        outcome_store: Arc<dyn Storage>,
        market_data_broker: Arc<dyn Broker>,
    ) -> Self {
        let (shutdown_tx, rx) = watch::channel(false);

        let analysis_handle = spawn_job("analysis_cycle", config.analysis_cycle_interval, rx.clone(), move || {
            let analysis_cycle = analysis_cycle.clone();
            async move {
                let mut cycle = analysis_cycle.lock().await;
                let result = cycle.run().await;
                info!(
                    signals_found = result.signals_found,
                    signals_validated = result.signals_validated,
                    orders_placed = result.orders_placed,
                    errors = result.errors.len(),
                    duration_ms = result.duration_ms,
                    "analysis cycle completed"
                );
            }
        });

        let monitor_handle = spawn_job("position_monitor", config.position_monitor_interval, rx.clone(), move || {
            let position_monitor = position_monitor.clone();
            async move {
                if let Err(err) = position_monitor.run().await {
                    warn!(%err, "position monitor pass failed");
                }
            }
        });

        let outcome_handle = spawn_job("outcome_tracker", config.outcome_tracker_interval, rx.clone(), move || {
            let outcome_tracker = outcome_tracker.clone();
            let outcome_store = outcome_store.clone();
            let market_data_broker = market_data_broker.clone();
            async move {
                match signal_outcome_candidates(outcome_store.as_ref()) {
                    Ok(candidates) => {
                        if let Err(err) = outcome_tracker.create_missing_outcomes(&candidates) {
                            warn!(%err, "outcome tracker: creating new outcome rows failed");
                        }
                    }
                    Err(err) => warn!(%err, "outcome tracker: collecting candidates failed"),
                }
                match outcome_tracker.update_unresolved_outcomes(market_data_broker.as_ref(), chrono::Utc::now()).await {
                    Ok(updated) => info!(updated, "outcome tracker pass completed"),
                    Err(err) => warn!(%err, "outcome tracker: updating unresolved outcomes failed"),
                }
            }
        });

        Self { shutdown_tx, handles: vec![analysis_handle, monitor_handle, outcome_handle] }
    }

    /// Signals all jobs to stop after their current tick and waits for them.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for handle in self.handles {
            if let Err(err) = handle.await {
                warn!(%err, "scheduler job task panicked");
            }
        }
    }
}

fn spawn_job<F, Fut>(name: &'static str, period: Duration, mut shutdown: watch::Receiver<bool>, mut job: F) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send,
{
    let running = Arc::new(AtomicBool::new(false));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            if *shutdown.borrow() {
                break;
            }
            if running.swap(true, Ordering::SeqCst) {
                warn!(job = name, "skipping tick: previous invocation still running");
                continue;
            }
            job().await;
            running.store(false, Ordering::SeqCst);
            if *shutdown.borrow() {
                break;
            }
        }
        info!(job = name, "scheduler job stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    /// With `max_instances = 1`, overlapping invocations are dropped rather
    /// than queued: a job that outlives its own period must have ticks
    /// skipped, not queued up.
    #[tokio::test(start_paused = true)]
    async fn overlapping_ticks_are_dropped_not_queued() {
        let (_tx, rx) = watch::channel(false);
        let starts = Arc::new(AtomicUsize::new(0));
        let counter = starts.clone();
        let handle = spawn_job("slow_job", Duration::from_millis(10), rx, move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(35)).await;
            }
        });

        // Five periods elapse while each invocation takes 3.5 periods to run:
        // at most two invocations can have started, never five.
        tokio::time::advance(Duration::from_millis(50)).await;
        tokio::task::yield_now().await;
        assert!(starts.load(Ordering::SeqCst) <= 2, "overlapping ticks must be skipped, got {} starts", starts.load(Ordering::SeqCst));
        handle.abort();
    }

    /// The scheduler stops accepting new triggers once the shutdown signal
    /// flips: no further ticks fire.
    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_further_ticks() {
        let (tx, rx) = watch::channel(false);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let handle = spawn_job("quick_job", Duration::from_millis(10), rx, move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::advance(Duration::from_millis(25)).await;
        tokio::task::yield_now().await;
        let before_shutdown = calls.load(Ordering::SeqCst);
        assert!(before_shutdown >= 1);

        tx.send(true).unwrap();
        tokio::time::advance(Duration::from_millis(100)).await;
        tokio::task::yield_now().await;
        handle.await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), before_shutdown, "no tick should run after shutdown is signalled");
    }
}
