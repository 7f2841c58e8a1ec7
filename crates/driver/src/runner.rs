//! Fixed-rate driver loop
//!
//! Polls the gate at a fixed interval. A poll that finds the gate not
//! ready is a silent skip; there is no backlog and no catch-up.

use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, trace};

use contracts::{FrameSnapshot, FusionBlueprint};
use sync_engine::SharedGate;

use crate::cycle::{CycleReport, FusionCycle};
use crate::error::DriverError;

/// Loop state. `Ready` and `Processing` only last within one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DriverState {
    #[default]
    Idle,
    Ready,
    Processing,
}

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub poll_interval: Duration,
    pub tolerance_sec: f64,
    /// Stop after this many completed cycles
    pub max_cycles: Option<u64>,
}

impl LoopConfig {
    pub fn from_blueprint(blueprint: &FusionBlueprint) -> Result<Self, DriverError> {
        if !(blueprint.driver.poll_rate_hz > 0.0 && blueprint.driver.poll_rate_hz.is_finite()) {
            return Err(DriverError::InvalidSetting {
                field: "driver.poll_rate_hz",
                message: format!("must be > 0, got {}", blueprint.driver.poll_rate_hz),
            });
        }
        Ok(Self {
            poll_interval: blueprint.driver.poll_interval(),
            tolerance_sec: blueprint.sync.tolerance_sec,
            max_cycles: None,
        })
    }

    pub fn with_max_cycles(mut self, max_cycles: Option<u64>) -> Self {
        self.max_cycles = max_cycles;
        self
    }
}

/// Counters for one driver run
#[derive(Debug, Clone, Default)]
pub struct DriverStats {
    pub polls: u64,
    pub idle_polls: u64,
    pub cycles: u64,
    pub heavy_published: u64,
    pub publications_dropped: u64,
    pub last_timestamp: Option<f64>,
    pub max_skew: f64,
    pub duration: Duration,
}

impl DriverStats {
    /// Completed cycles per second of run time
    pub fn cycle_rate(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.cycles as f64 / secs
        } else {
            0.0
        }
    }

    fn record(&mut self, report: &CycleReport) {
        self.cycles += 1;
        self.heavy_published += u64::from(report.summary.heavy);
        self.publications_dropped += report.summary.dropped as u64;
        self.last_timestamp = Some(report.timestamp);
        self.max_skew = self.max_skew.max(report.skew);
    }
}

/// Sees every consumed snapshot before it is processed
pub type SnapshotObserver = Box<dyn FnMut(&FrameSnapshot) + Send>;

pub struct DriverLoop {
    gate: SharedGate,
    cycle: FusionCycle,
    config: LoopConfig,
    state: DriverState,
    stats: DriverStats,
    observer: Option<SnapshotObserver>,
}

impl DriverLoop {
    pub fn new(gate: SharedGate, cycle: FusionCycle, config: LoopConfig) -> Self {
        Self {
            gate,
            cycle,
            config,
            state: DriverState::Idle,
            stats: DriverStats::default(),
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: SnapshotObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn stats(&self) -> &DriverStats {
        &self.stats
    }

    pub fn cycle(&self) -> &FusionCycle {
        &self.cycle
    }

    fn transition(&mut self, next: DriverState) {
        trace!(from = ?self.state, to = ?next, "Driver state");
        self.state = next;
    }

    /// One poll. Check and consume happen under a single gate lock.
    pub fn poll_once(&mut self) -> Option<CycleReport> {
        self.stats.polls += 1;

        let Some(snapshot) = self.gate.try_consume(self.config.tolerance_sec) else {
            self.stats.idle_polls += 1;
            metrics::counter!("driver_idle_polls_total").increment(1);
            return None;
        };

        self.transition(DriverState::Ready);
        if let Some(observer) = self.observer.as_mut() {
            observer(&snapshot);
        }
        self.transition(DriverState::Processing);
        let report = self.cycle.process(snapshot);
        self.stats.record(&report);
        self.transition(DriverState::Idle);

        Some(report)
    }

    fn limit_reached(&self) -> bool {
        self.config
            .max_cycles
            .is_some_and(|max| self.stats.cycles >= max)
    }

    /// Poll until shutdown is signalled, the shutdown sender is dropped,
    /// or `max_cycles` is reached.
    #[instrument(name = "driver_run", skip_all)]
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> DriverStats {
        let started = Instant::now();
        let period = self.config.poll_interval.max(Duration::from_micros(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(max_cycles = ?self.config.max_cycles, "Driver loop started");

        loop {
            if *shutdown.borrow() || self.limit_reached() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {
                    if let Some(report) = self.poll_once() {
                        if report.frame_count.is_multiple_of(100) {
                            debug!(cycles = report.frame_count, "Driver progress");
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        self.stats.duration = started.elapsed();
        info!(
            cycles = self.stats.cycles,
            idle_polls = self.stats.idle_polls,
            rate = format!("{:.2}", self.stats.cycle_rate()),
            "Driver loop stopped"
        );
        self.stats
    }
}
