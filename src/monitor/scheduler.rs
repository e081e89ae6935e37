// src/monitor/scheduler.rs
use super::state::{Snapshot, StateTracker};
use crate::config::Config;
use crate::metrics::MetricsCollector;
use crate::notify::NotificationSink;
use crate::probe::{ProbeResult, Prober, Target};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio::time::{interval, timeout, Duration, MissedTickBehavior};
use tracing::{error, info, warn};

/// Extra time granted to a prober beyond the target's own timeout before
/// the loop gives up on it.
const PROBE_GRACE: Duration = Duration::from_secs(1);
const MIN_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    /// No target changed, nothing was sent.
    NotNeeded,
    Sent,
    Failed,
}

#[derive(Debug, Clone)]
pub struct RoundReport {
    pub round: u64,
    pub changed: bool,
    pub online: usize,
    pub total: usize,
    pub notification: Notification,
}

/// Requests an orderly stop of [`Monitor::run`].
///
/// A stop requested while the loop waits for the next round takes effect
/// immediately; one requested mid-round lets that round finish first.
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        let _ = self.tx.send(true);
    }
}

/// The polling loop: probes every target once per interval, folds the
/// results into the [`StateTracker`] and notifies the sink on changes.
pub struct Monitor {
    targets: Vec<Target>,
    interval: Duration,
    prober: Arc<dyn Prober>,
    sink: Arc<dyn NotificationSink>,
    tracker: StateTracker,
    metrics: Option<Arc<MetricsCollector>>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Monitor {
    pub fn new(
        targets: Vec<Target>,
        interval: Duration,
        prober: Arc<dyn Prober>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let tracker = StateTracker::new(&targets);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            targets,
            interval: interval.max(MIN_INTERVAL),
            prober,
            sink,
            tracker,
            metrics: None,
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
        }
    }

    pub fn from_config(
        config: &Config,
        prober: Arc<dyn Prober>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self::new(config.targets(), config.interval(), prober, sink)
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        metrics.update_target_counts(0, self.targets.len());
        self.metrics = Some(metrics);
        self
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown_tx.clone(),
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        self.tracker.snapshot()
    }

    /// Run rounds until a shutdown is requested.
    pub async fn run(&mut self) {
        let mut ticker = interval(self.interval);
        // An overrunning round pushes the schedule back instead of bursting.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut shutdown_rx = self.shutdown_rx.clone();

        info!(
            "Starting monitor for {} target(s) with interval: {:?}",
            self.targets.len(),
            self.interval
        );

        loop {
            tokio::select! {
                biased;

                res = shutdown_rx.changed() => {
                    if res.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    self.run_round().await;
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Monitor shutting down after {} round(s)", self.tracker.round());
    }

    /// Execute exactly one round: dispatch, collect, evaluate, notify.
    pub async fn run_round(&mut self) -> RoundReport {
        let start = Instant::now();
        info!("Checking statuses...");

        let results = self.probe_all().await;

        if let Some(metrics) = &self.metrics {
            for result in &results {
                metrics.record_probe(&result.key, result.reachable, result.elapsed);
            }
        }

        let changed = self.tracker.update(&results);
        let snapshot = self.tracker.snapshot();
        let online = snapshot.online_count();
        let total = snapshot.len();

        if let Some(metrics) = &self.metrics {
            for (key, status) in &snapshot.statuses {
                metrics.update_target_status(key, status.online);
            }
            metrics.update_target_counts(online, total);
            metrics.record_round(changed, start.elapsed());
        }

        info!(
            "Round {} complete: {} online, {} offline{}",
            snapshot.round,
            online,
            total - online,
            if changed { ", status changed" } else { "" }
        );

        let notification = if changed {
            self.notify(&snapshot).await
        } else {
            Notification::NotNeeded
        };

        RoundReport {
            round: snapshot.round,
            changed,
            online,
            total,
            notification,
        }
    }

    async fn notify(&self, snapshot: &Snapshot) -> Notification {
        let delivered = match self.sink.notify(snapshot).await {
            Ok(()) => true,
            Err(e) => {
                error!("Couldn't send status change notification: {}", e);
                false
            }
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_notification(delivered);
        }

        if delivered {
            Notification::Sent
        } else {
            Notification::Failed
        }
    }

    async fn probe_all(&self) -> Vec<ProbeResult> {
        let mut tasks = Vec::with_capacity(self.targets.len());

        for target in &self.targets {
            let prober = self.prober.clone();
            let target = target.clone();
            let task = tokio::spawn(async move {
                let deadline = target.timeout.saturating_add(PROBE_GRACE);
                let outcome = timeout(deadline, prober.probe(&target)).await;
                match outcome {
                    Ok(result) => result,
                    Err(_) => {
                        warn!("Probe for {} exceeded {:?}", target.address(), deadline);
                        ProbeResult {
                            key: target.key,
                            reachable: false,
                            elapsed: deadline,
                        }
                    }
                }
            });
            tasks.push(task);
        }

        // Wait for every probe of this round before touching state
        let joined = futures::future::join_all(tasks).await;

        joined
            .into_iter()
            .zip(&self.targets)
            .map(|(result, target)| match result {
                Ok(probe_result) => probe_result,
                Err(e) => {
                    error!("Probe task for {} failed: {}", target.key, e);
                    ProbeResult {
                        key: target.key.clone(),
                        reachable: false,
                        elapsed: Duration::ZERO,
                    }
                }
            })
            .collect()
    }
}
