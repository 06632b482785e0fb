//! Loudness metering for the capture callback.
//!
//! `rms`/`normalized_level` are pure functions; [`LiveLevel`] is the
//! lock-free holder the callback publishes through so UI polling never
//! blocks the audio thread.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Fixed meter gain. Calibrated so typical speech RMS (~0.05) lands
/// mid-scale and loud speech (>= 0.1) saturates to 1.0.
pub const LEVEL_GAIN: f32 = 10.0;

/// Root-mean-square magnitude of a chunk of samples
///
/// Empty input yields 0.0 rather than dividing by zero.
#[must_use]
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    // f32 accumulation is fine at chunk sizes (a few thousand samples)
    #[allow(clippy::cast_precision_loss)]
    let energy: f32 = samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32;
    energy.sqrt()
}

/// Normalized loudness in [0.0, 1.0]: `min(1.0, rms * LEVEL_GAIN)`
#[must_use]
pub fn normalized_level(samples: &[f32]) -> f32 {
    (rms(samples) * LEVEL_GAIN).min(1.0)
}

/// Shared meter value the audio callback writes and the UI side reads.
///
/// Stores f32 bits in an atomic so publication from the callback is a
/// single store with no locking.
#[derive(Clone, Debug)]
pub struct LiveLevel {
    bits: Arc<AtomicU32>,
}

impl LiveLevel {
    /// Create a meter reading 0.0
    #[must_use]
    pub fn new() -> Self {
        Self {
            bits: Arc::new(AtomicU32::new(0.0_f32.to_bits())),
        }
    }

    /// Publish a normalized level
    pub fn set(&self, level: f32) {
        self.bits.store(level.to_bits(), Ordering::Relaxed);
    }

    /// Most recently published level
    #[must_use]
    pub fn level(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

impl Default for LiveLevel {
    fn default() -> Self {
        Self::new()
    }
}
