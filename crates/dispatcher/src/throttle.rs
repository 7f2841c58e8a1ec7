//! Heavy payload throttling

use crate::error::DispatcherError;

/// Emits heavy payloads on frame counts `1, 1 + k, 1 + 2k, ...`.
///
/// The phase is `n % k == 1`, not `== 0`: the first frame of every window
/// of `k` carries the payload. `k < 2` emits on every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottlePolicy {
    ratio: u32,
}

impl ThrottlePolicy {
    /// # Errors
    /// `ratio` is zero.
    pub fn new(ratio: u32) -> Result<Self, DispatcherError> {
        if ratio == 0 {
            return Err(DispatcherError::InvalidRatio { ratio });
        }
        Ok(Self { ratio })
    }

    /// Every frame carries the heavy payload
    pub const fn every_frame() -> Self {
        Self { ratio: 1 }
    }

    pub fn ratio(&self) -> u32 {
        self.ratio
    }

    /// Whether frame count `n` carries the heavy payload
    #[inline]
    pub fn should_emit_heavy(&self, n: u64) -> bool {
        let k = u64::from(self.ratio);
        k < 2 || n % k == 1
    }
}
