//! Stream synchronization gate.

use std::collections::HashMap;

use contracts::{
    ContractError, FrameSnapshot, FusionBlueprint, GateStats, SkewCheck, StreamId, StreamPacket,
};
use tracing::instrument;

use crate::slot::{Arrival, StreamSlot};

/// Gate settings, taken from the blueprint once at construction
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Declared streams, in declaration order
    pub streams: Vec<StreamId>,
    /// Stream whose timestamp stamps the snapshot
    pub anchor: StreamId,
    /// Default tolerance for [`SyncGate::is_ready_default`]
    pub tolerance_sec: f64,
    pub skew_check: SkewCheck,
}

impl GateConfig {
    pub fn from_blueprint(blueprint: &FusionBlueprint) -> Self {
        Self {
            streams: blueprint.stream_ids().map(StreamId::from).collect(),
            anchor: StreamId::from(blueprint.sync.anchor_stream.as_str()),
            tolerance_sec: blueprint.sync.tolerance_sec,
            skew_check: blueprint.sync.skew_check,
        }
    }
}

/// One slot per declared stream and a readiness predicate over them.
///
/// Not synchronized on its own; share it through [`crate::SharedGate`].
#[derive(Debug)]
pub struct SyncGate {
    config: GateConfig,
    /// Slots in declaration order
    slots: Vec<StreamSlot>,
    /// Stream id -> slot position
    index: HashMap<StreamId, usize>,
    anchor_idx: usize,
    consumed_count: u64,
}

impl SyncGate {
    /// Create a gate with one empty slot per declared stream.
    ///
    /// # Errors
    /// The anchor is not among the declared streams.
    pub fn new(config: GateConfig) -> Result<Self, ContractError> {
        let index: HashMap<StreamId, usize> = config
            .streams
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();

        let anchor_idx = *index.get(&config.anchor).ok_or_else(|| {
            ContractError::config_validation(
                "sync.anchor_stream",
                format!("anchor stream '{}' is not declared", config.anchor),
            )
        })?;

        let slots = config.streams.iter().map(|_| StreamSlot::new()).collect();

        Ok(Self {
            config,
            slots,
            index,
            anchor_idx,
            consumed_count: 0,
        })
    }

    pub fn from_blueprint(blueprint: &FusionBlueprint) -> Result<Self, ContractError> {
        Self::new(GateConfig::from_blueprint(blueprint))
    }

    /// Store a sample, replacing any unconsumed sample of the same stream.
    ///
    /// # Errors
    /// The stream is not declared, or the timestamp is NaN or infinite.
    /// Nothing is stored.
    #[instrument(
        level = "trace",
        name = "gate_record_arrival",
        skip(self, packet),
        fields(stream_id = %packet.stream_id, timestamp = packet.timestamp)
    )]
    pub fn record_arrival(&mut self, packet: StreamPacket) -> Result<Arrival, ContractError> {
        let Some(&idx) = self.index.get(&packet.stream_id) else {
            metrics::counter!("gate_unknown_stream_total").increment(1);
            return Err(ContractError::unknown_stream(packet.stream_id.as_str()));
        };
        if !packet.timestamp.is_finite() {
            metrics::counter!("gate_invalid_timestamp_total", "stream_id" => packet.stream_id.to_string())
                .increment(1);
            return Err(ContractError::invalid_timestamp(
                packet.stream_id.as_str(),
                packet.timestamp,
            ));
        }

        let stream_id = packet.stream_id.clone();
        let arrival = self.slots[idx].store(packet);

        metrics::counter!("gate_arrivals_total", "stream_id" => stream_id.to_string())
            .increment(1);
        if arrival == Arrival::Overwrote {
            tracing::debug!(stream_id = %stream_id, "unconsumed sample overwritten");
            metrics::counter!("gate_overwritten_total", "stream_id" => stream_id.to_string())
                .increment(1);
        }

        Ok(arrival)
    }

    /// True iff every slot is unconsumed and the timestamp skew is within
    /// `tolerance_sec`.
    pub fn is_ready(&self, tolerance_sec: f64) -> bool {
        if !self.all_unconsumed() {
            return false;
        }
        match self.skew() {
            Some(skew) => skew <= tolerance_sec,
            None => false,
        }
    }

    /// [`Self::is_ready`] with the configured tolerance
    pub fn is_ready_default(&self) -> bool {
        self.is_ready(self.config.tolerance_sec)
    }

    /// Current skew under the configured check mode, if every slot holds a
    /// sample.
    ///
    /// Pairwise: largest minus smallest timestamp. Anchor: largest distance
    /// from the anchor's timestamp.
    pub fn skew(&self) -> Option<f64> {
        let mut timestamps = Vec::with_capacity(self.slots.len());
        for slot in &self.slots {
            timestamps.push(slot.timestamp()?);
        }

        let skew = match self.config.skew_check {
            SkewCheck::Pairwise => {
                let (min, max) = timestamps
                    .iter()
                    .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &t| {
                        (lo.min(t), hi.max(t))
                    });
                max - min
            }
            SkewCheck::Anchor => {
                let anchor = timestamps[self.anchor_idx];
                timestamps
                    .iter()
                    .map(|t| (t - anchor).abs())
                    .fold(0.0, f64::max)
            }
        };
        Some(skew)
    }

    /// Clear every unconsumed flag and return a snapshot of the slots.
    ///
    /// Call only after `is_ready` returned true. Returns `None` (flags still
    /// cleared) when the anchor slot has never received a sample.
    #[instrument(level = "trace", name = "gate_consume_all", skip(self))]
    pub fn consume_all(&mut self) -> Option<FrameSnapshot> {
        let skew = self.skew().unwrap_or(0.0);
        let t_anchor = self.slots[self.anchor_idx].timestamp();

        let packets = self
            .slots
            .iter()
            .filter_map(|slot| slot.packet().cloned())
            .collect();

        for slot in &mut self.slots {
            slot.mark_consumed();
        }
        self.consumed_count += 1;

        let t_anchor = t_anchor?;
        metrics::histogram!("gate_anchor_skew_seconds").record(skew);

        Some(FrameSnapshot {
            anchor: self.config.anchor.clone(),
            t_anchor,
            skew,
            packets,
        })
    }

    /// Readiness check and consume in one step.
    pub fn try_consume(&mut self, tolerance_sec: f64) -> Option<FrameSnapshot> {
        if self.is_ready(tolerance_sec) {
            self.consume_all()
        } else {
            None
        }
    }

    /// Unconsumed flag of one stream
    pub fn is_unconsumed(&self, stream_id: &str) -> Option<bool> {
        self.index
            .get(stream_id)
            .map(|&idx| self.slots[idx].is_unconsumed())
    }

    /// Streams still waiting for a fresh sample
    pub fn missing_streams(&self) -> Vec<StreamId> {
        self.config
            .streams
            .iter()
            .zip(&self.slots)
            .filter(|(_, slot)| !slot.is_unconsumed())
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Number of `consume_all` calls so far
    pub fn consumed_count(&self) -> u64 {
        self.consumed_count
    }

    pub fn stats(&self) -> GateStats {
        let mut stats = GateStats::default();
        for (id, slot) in self.config.streams.iter().zip(&self.slots) {
            if slot.is_unconsumed() {
                stats.pending.push(id.clone());
            }
            stats.arrivals.insert(id.clone(), slot.arrivals());
            stats.overwritten.insert(id.clone(), slot.overwritten());
            if let Some(t) = slot.timestamp() {
                stats.oldest_timestamp = Some(stats.oldest_timestamp.map_or(t, |o| o.min(t)));
                stats.newest_timestamp = Some(stats.newest_timestamp.map_or(t, |n| n.max(t)));
            }
        }
        stats
    }

    fn all_unconsumed(&self) -> bool {
        self.slots.iter().all(StreamSlot::is_unconsumed)
    }
}
