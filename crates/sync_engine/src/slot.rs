//! Single-sample slot for one input stream.
//!
//! Depth is exactly one: a new arrival replaces whatever the slot held,
//! consumed or not. Losing an unconsumed sample this way is counted, not
//! reported as an error.

use std::fmt;

use contracts::StreamPacket;

/// Outcome of storing a sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arrival {
    /// Slot was empty or already consumed
    Fresh,
    /// An unconsumed sample was replaced
    Overwrote,
}

/// Latest sample of one stream plus its unconsumed flag
#[derive(Default)]
pub struct StreamSlot {
    packet: Option<StreamPacket>,
    unconsumed: bool,
    arrivals: u64,
    overwritten: u64,
}

impl fmt::Debug for StreamSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSlot")
            .field("timestamp", &self.timestamp())
            .field("unconsumed", &self.unconsumed)
            .field("arrivals", &self.arrivals)
            .field("overwritten", &self.overwritten)
            .finish()
    }
}

impl StreamSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a sample and raise the unconsumed flag
    #[inline]
    pub fn store(&mut self, packet: StreamPacket) -> Arrival {
        let arrival = if self.unconsumed {
            self.overwritten += 1;
            Arrival::Overwrote
        } else {
            Arrival::Fresh
        };
        self.packet = Some(packet);
        self.unconsumed = true;
        self.arrivals += 1;
        arrival
    }

    /// Lower the flag. The sample stays readable.
    #[inline]
    pub fn mark_consumed(&mut self) {
        self.unconsumed = false;
    }

    #[inline]
    pub fn is_unconsumed(&self) -> bool {
        self.unconsumed
    }

    #[inline]
    pub fn packet(&self) -> Option<&StreamPacket> {
        self.packet.as_ref()
    }

    #[inline]
    pub fn timestamp(&self) -> Option<f64> {
        self.packet.as_ref().map(|p| p.timestamp)
    }

    pub fn arrivals(&self) -> u64 {
        self.arrivals
    }

    pub fn overwritten(&self) -> u64 {
        self.overwritten
    }
}
