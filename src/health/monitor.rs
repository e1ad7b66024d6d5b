//! # Backend Status Monitor
//!
//! Drives the [`HealthProber`] on a fixed cadence and owns the single
//! authoritative [`BackendStatus`] value.
//!
//! Every tick starts a new probe cycle numbered from a monotonically
//! increasing sequence. Cycles may overlap in wall-clock time when a probe is
//! slower than the poll interval, but only the most recently *started* cycle
//! may publish its verdict. A result that settles after a newer cycle has
//! begun is discarded.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::config::{FlickerPolicy, HealthConfig};
use crate::constants::defaults;
use crate::events::Observable;
use crate::health::prober::{HealthProber, LivenessVerdict};
use crate::logging::log_status_transition;

/// Backend availability as shown to the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendStatus {
    /// A probe is in flight
    Loading,
    Active,
    Inactive,
}

impl BackendStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendStatus::Loading => "loading",
            BackendStatus::Active => "active",
            BackendStatus::Inactive => "inactive",
        }
    }
}

impl fmt::Display for BackendStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<LivenessVerdict> for BackendStatus {
    fn from(verdict: LivenessVerdict) -> Self {
        match verdict {
            LivenessVerdict::Success => BackendStatus::Active,
            LivenessVerdict::Failure => BackendStatus::Inactive,
        }
    }
}

/// What happened to one probe cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleOutcome {
    pub cycle: u64,
    pub verdict: LivenessVerdict,
    /// False when a newer cycle had started before this one settled
    pub applied: bool,
}

/// Sequence guard plus the published status
///
/// The cycle counter and the publication happen under the same lock, so a
/// stale completion can never interleave with a newer cycle's emission.
#[derive(Debug)]
struct StatusPublisher {
    latest_cycle: Mutex<u64>,
    status: Observable<BackendStatus>,
    policy: FlickerPolicy,
}

impl StatusPublisher {
    fn begin_cycle(&self) -> u64 {
        let mut latest = self.latest_cycle.lock();
        *latest += 1;
        let cycle = *latest;

        let current = self.status.current();
        let emit_loading = match self.policy {
            FlickerPolicy::EveryCycle => true,
            FlickerPolicy::SuppressWhileActive => current != BackendStatus::Active,
        };
        if emit_loading {
            self.status.publish(BackendStatus::Loading);
        }
        cycle
    }

    fn complete_cycle(&self, cycle: u64, verdict: LivenessVerdict) -> bool {
        let latest = self.latest_cycle.lock();
        let previous = self.status.current();
        let next = BackendStatus::from(verdict);

        if *latest != cycle {
            debug!(
                cycle,
                latest = *latest,
                verdict = ?verdict,
                "Discarding result from superseded probe cycle"
            );
            log_status_transition(cycle, previous.as_str(), next.as_str(), false);
            return false;
        }

        self.status.publish(next);
        log_status_transition(cycle, previous.as_str(), next.as_str(), true);
        true
    }

    /// Invalidate every in-flight cycle
    fn retire_in_flight(&self) {
        *self.latest_cycle.lock() += 1;
    }
}

/// Periodic liveness poller owning the backend status signal
#[derive(Debug)]
pub struct BackendStatusMonitor {
    prober: HealthProber,
    config: HealthConfig,
    publisher: Arc<StatusPublisher>,
}

impl BackendStatusMonitor {
    /// Status starts as `Loading` until the first cycle settles
    pub fn new(prober: HealthProber, config: HealthConfig) -> Self {
        let publisher = StatusPublisher {
            latest_cycle: Mutex::new(0),
            status: Observable::new(BackendStatus::Loading, defaults::OBSERVABLE_BUFFER),
            policy: config.flicker_policy,
        };
        Self {
            prober,
            config,
            publisher: Arc::new(publisher),
        }
    }

    pub fn current(&self) -> BackendStatus {
        self.publisher.status.current()
    }

    /// Latest status, replayed to late subscribers
    pub fn status(&self) -> watch::Receiver<BackendStatus> {
        self.publisher.status.watch()
    }

    /// Every emission in order, including repeated `Loading`
    pub fn status_changes(&self) -> broadcast::Receiver<BackendStatus> {
        self.publisher.status.subscribe()
    }

    /// Begin a probe cycle now and return the future that finishes it
    ///
    /// The cycle number is claimed (and `Loading` emitted per the flicker
    /// policy) before this returns, so the order of calls decides which cycle
    /// is newest regardless of when the returned futures are polled.
    pub fn start_cycle(&self) -> impl Future<Output = CycleOutcome> + Send + 'static {
        let cycle = self.publisher.begin_cycle();
        let prober = self.prober.clone();
        let publisher = Arc::clone(&self.publisher);
        let timeout = self.config.probe_timeout();

        async move {
            let verdict = prober.probe(timeout).await;
            let applied = publisher.complete_cycle(cycle, verdict);
            CycleOutcome {
                cycle,
                verdict,
                applied,
            }
        }
    }

    /// Spawn the polling loop; the first cycle starts immediately
    pub fn start(&self) -> MonitorHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let period = self.config.poll_interval();
        let monitor = Self {
            prober: self.prober.clone(),
            config: self.config.clone(),
            publisher: Arc::clone(&self.publisher),
        };

        info!(
            poll_interval_ms = self.config.poll_interval_ms,
            probe_timeout_ms = self.config.probe_timeout_ms,
            flicker_policy = ?self.config.flicker_policy,
            "Starting backend status monitor"
        );

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        // Cycles run detached so a slow probe never delays the next tick
                        tokio::spawn(monitor.start_cycle());
                    }
                }
            }

            monitor.publisher.retire_in_flight();
            info!("Backend status monitor stopped");
        });

        MonitorHandle {
            shutdown: shutdown_tx,
            task,
        }
    }
}

/// Running poll loop; dropping the handle also stops the loop
#[derive(Debug)]
pub struct MonitorHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop polling; results of cycles still in flight are discarded
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            debug!(error = %e, "Monitor task ended abnormally");
        }
    }
}
