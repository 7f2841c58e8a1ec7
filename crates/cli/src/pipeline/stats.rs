//! Pipeline statistics.

use std::time::Duration;

use dispatcher::MetricsSnapshot as SinkSnapshot;
use driver::DriverStats;
use ingestion::MetricsSnapshot as IngestionSnapshot;
use observability::MetricsSummary;

/// Everything a finished run reports
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    pub driver: DriverStats,
    pub ingestion: IngestionSnapshot,
    /// Final counters per sink, in configuration order
    pub sink_reports: Vec<(String, SinkSnapshot)>,
    pub corrections_applied: u64,
    pub fusion: MetricsSummary,
    pub active_streams: usize,
    pub active_sinks: usize,
    pub duration: Duration,
}

impl PipelineStats {
    /// Completed cycles per wall second
    pub fn cycle_rate(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.driver.cycles as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Percent of polls that found no ready frame
    pub fn idle_rate(&self) -> f64 {
        if self.driver.polls > 0 {
            self.driver.idle_polls as f64 / self.driver.polls as f64 * 100.0
        } else {
            0.0
        }
    }

    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    Pipeline Statistics                       ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Cycles: {}", self.driver.cycles);
        println!("   ├─ Cycle rate: {:.2}/s", self.cycle_rate());
        println!(
            "   ├─ Polls: {} ({:.1}% idle)",
            self.driver.polls,
            self.idle_rate()
        );
        println!("   ├─ Max skew: {:.3} ms", self.driver.max_skew * 1000.0);
        match self.driver.last_timestamp {
            Some(t) => println!("   ├─ Last anchor timestamp: {:.3}", t),
            None => println!("   ├─ Last anchor timestamp: -"),
        }
        println!("   ├─ Active streams: {}", self.active_streams);
        println!("   └─ Active sinks: {}", self.active_sinks);

        println!("\n📥 Ingestion");
        println!("   ├─ Packets received: {}", self.ingestion.packets_received);
        println!("   ├─ Packets rejected: {}", self.ingestion.packets_rejected);
        println!(
            "   ├─ Corrections received: {} ({} dropped)",
            self.ingestion.corrections_received, self.ingestion.corrections_dropped
        );
        println!("   └─ Corrections applied: {}", self.corrections_applied);

        println!("\n📤 Publication");
        println!("   ├─ Heavy payloads: {}", self.driver.heavy_published);
        println!(
            "   └─ Dropped at publisher: {}",
            self.driver.publications_dropped
        );

        if !self.sink_reports.is_empty() {
            println!("\n🗄  Sinks");
            for (i, (name, report)) in self.sink_reports.iter().enumerate() {
                let prefix = if i == self.sink_reports.len() - 1 { "└─" } else { "├─" };
                println!(
                    "   {} {}: odom={} tf={} heavy={} failed={} dropped={}",
                    prefix,
                    name,
                    report.odometry_writes,
                    report.transform_writes,
                    report.heavy_writes,
                    report.failure_count,
                    report.dropped_count
                );
            }
        }

        println!("\n{}", self.fusion);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rates_guard_against_zero() {
        let stats = PipelineStats::default();
        assert_eq!(stats.cycle_rate(), 0.0);
        assert_eq!(stats.idle_rate(), 0.0);
    }

    #[test]
    fn idle_rate_from_polls() {
        let stats = PipelineStats {
            driver: DriverStats {
                polls: 10,
                idle_polls: 7,
                cycles: 3,
                ..Default::default()
            },
            duration: Duration::from_secs(2),
            ..Default::default()
        };
        assert!((stats.idle_rate() - 70.0).abs() < 1e-9);
        assert!((stats.cycle_rate() - 1.5).abs() < 1e-9);
    }
}
