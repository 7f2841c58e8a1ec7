//! Fusion metrics
//!
//! Prometheus-facing recorders plus an in-memory aggregator for the
//! end-of-run summary.

use std::collections::HashMap;

use contracts::{FrameSnapshot, GateStats};
use metrics::{counter, gauge, histogram};

/// Record one consumed frame.
///
/// Call once per processing cycle, with the snapshot `consume_all` returned.
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_snapshot;
///
/// if let Some(snapshot) = gate.try_consume(tolerance) {
///     record_snapshot(&snapshot);
///     // ...
/// }
/// ```
pub fn record_snapshot(snapshot: &FrameSnapshot) {
    counter!("loam_fusion_frames_total").increment(1);
    gauge!("loam_fusion_last_anchor_timestamp").set(snapshot.t_anchor);
    histogram!("loam_fusion_frame_skew_ms").record(snapshot.skew * 1000.0);

    for packet in &snapshot.packets {
        let offset_ms = (packet.timestamp - snapshot.t_anchor) * 1000.0;
        gauge!("loam_fusion_stream_offset_ms", "stream_id" => packet.stream_id.to_string())
            .set(offset_ms);
        histogram!("loam_fusion_stream_offset_ms_hist", "stream_id" => packet.stream_id.to_string())
            .record(offset_ms.abs());
    }
}

/// Export gate counters as gauges.
pub fn record_gate_stats(stats: &GateStats) {
    gauge!("loam_fusion_gate_pending_streams").set(stats.pending.len() as f64);
    for (stream_id, arrivals) in &stats.arrivals {
        gauge!("loam_fusion_gate_arrivals", "stream_id" => stream_id.to_string())
            .set(*arrivals as f64);
    }
    for (stream_id, overwritten) in &stats.overwritten {
        gauge!("loam_fusion_gate_overwritten", "stream_id" => stream_id.to_string())
            .set(*overwritten as f64);
    }
}

/// In-memory aggregation of per-frame timing
#[derive(Debug, Clone, Default)]
pub struct FusionMetricsAggregator {
    pub total_frames: u64,
    /// Frame skew (ms)
    pub skew_stats: RunningStats,
    /// |stream timestamp - anchor timestamp| per stream (ms)
    pub offset_stats: HashMap<String, RunningStats>,
    pub arrivals: HashMap<String, u64>,
    /// Samples lost to overwrite, per stream
    pub overwritten: HashMap<String, u64>,
}

impl FusionMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, snapshot: &FrameSnapshot) {
        self.total_frames += 1;
        self.skew_stats.push(snapshot.skew * 1000.0);
        for packet in &snapshot.packets {
            self.offset_stats
                .entry(packet.stream_id.to_string())
                .or_default()
                .push((packet.timestamp - snapshot.t_anchor).abs() * 1000.0);
        }
    }

    /// Take the final gate counters (they are cumulative, so this replaces)
    pub fn absorb_gate_stats(&mut self, stats: &GateStats) {
        self.arrivals = stats
            .arrivals
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect();
        self.overwritten = stats
            .overwritten
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect();
    }

    pub fn summary(&self) -> MetricsSummary {
        let total_arrivals: u64 = self.arrivals.values().sum();
        let total_overwritten: u64 = self.overwritten.values().sum();
        MetricsSummary {
            total_frames: self.total_frames,
            total_arrivals,
            total_overwritten,
            overwrite_rate: if total_arrivals > 0 {
                total_overwritten as f64 / total_arrivals as f64 * 100.0
            } else {
                0.0
            },
            skew_ms: StatsSummary::from(&self.skew_stats),
            stream_offsets_ms: self
                .offset_stats
                .iter()
                .map(|(k, v)| (k.clone(), StatsSummary::from(v)))
                .collect(),
            stream_overwritten: self.overwritten.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_frames: u64,
    pub total_arrivals: u64,
    pub total_overwritten: u64,
    /// Percent of arrivals lost to overwrite
    pub overwrite_rate: f64,
    pub skew_ms: StatsSummary,
    pub stream_offsets_ms: HashMap<String, StatsSummary>,
    pub stream_overwritten: HashMap<String, u64>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Fusion Metrics Summary ===")?;
        writeln!(f, "Frames: {}", self.total_frames)?;
        writeln!(f, "Arrivals: {}", self.total_arrivals)?;
        writeln!(
            f,
            "Overwritten samples: {} ({:.2}%)",
            self.total_overwritten, self.overwrite_rate
        )?;
        writeln!(f, "Frame skew (ms): {}", self.skew_ms)?;

        let mut streams: Vec<_> = self.stream_offsets_ms.iter().collect();
        streams.sort_by(|a, b| a.0.cmp(b.0));
        if !streams.is_empty() {
            writeln!(f, "Offset from anchor (ms):")?;
            for (stream, stats) in streams {
                writeln!(f, "  {stream}: {stats}")?;
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online mean / variance (Welford)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
            return;
        }

        self.min = self.min.min(value);
        self.max = self.max.max(value);
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
