//! StreamSource trait - upstream producer abstraction
//!
//! Producers push samples through a callback from their own execution
//! context; the fusion layer never pulls.

use std::sync::Arc;

use crate::{CorrectionMessage, StreamPacket};

/// Stream data callback type
pub type StreamDataCallback = Arc<dyn Fn(StreamPacket) + Send + Sync>;

/// Correction pair callback type
pub type CorrectionCallback = Arc<dyn Fn(CorrectionMessage) + Send + Sync>;

/// A producer of one input stream.
///
/// Implemented by the mock feature producers; a real upstream stage plugs in
/// the same way.
///
/// ```ignore
/// let source: Box<dyn StreamSource> = make_source();
/// source.listen(Arc::new(move |packet| gate.record_arrival(packet)));
/// // ...
/// source.stop();
/// ```
pub trait StreamSource: Send + Sync {
    /// Stream this source feeds
    fn stream_id(&self) -> &str;

    /// Register data callback. Repeated calls while listening are ignored.
    fn listen(&self, callback: StreamDataCallback);

    /// Stop producing
    fn stop(&self);

    fn is_listening(&self) -> bool;
}

/// A producer of correction pose pairs (the slow-rate refinement stage).
pub trait CorrectionSource: Send + Sync {
    /// Register correction callback. Repeated calls while listening are ignored.
    fn listen(&self, callback: CorrectionCallback);

    /// Stop producing
    fn stop(&self);

    fn is_listening(&self) -> bool;
}
