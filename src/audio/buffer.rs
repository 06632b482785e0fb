//! Mutex-guarded sample accumulator shared between the audio callback and
//! the control thread.

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Append-only sequence of 16 kHz mono samples accumulated across callbacks.
///
/// Append, drain, and clear are mutually exclusive through a single mutex
/// held only for the duration of the operation; conversion math happens
/// outside the lock. Samples only ever leave through [`drain`], which takes
/// the whole accumulated sequence atomically and resets the buffer.
///
/// [`drain`]: CaptureBuffer::drain
#[derive(Debug, Default)]
pub struct CaptureBuffer {
    samples: Mutex<Vec<f32>>,
}

impl CaptureBuffer {
    /// Create an empty buffer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append converted samples in hardware delivery order
    pub fn append(&self, chunk: &[f32]) {
        self.lock().extend_from_slice(chunk);
    }

    /// Atomically take all accumulated samples, leaving the buffer empty.
    ///
    /// Returns `None` when nothing has been accumulated, distinguishing
    /// "no samples" from a non-empty-but-short recording.
    #[must_use]
    pub fn drain(&self) -> Option<Vec<f32>> {
        let mut guard = self.lock();
        if guard.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut *guard))
        }
    }

    /// Discard any accumulated samples
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of accumulated samples
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the buffer holds no samples
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // Appends cannot leave the vector in a torn state, so a poisoned lock
    // (panicking appender) is recovered rather than propagated.
    fn lock(&self) -> MutexGuard<'_, Vec<f32>> {
        self.samples.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
