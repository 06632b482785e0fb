//! Audio capture pipeline: level metering, format conversion, buffering,
//! and the capture session state machine.

/// Thread-synchronized sample accumulator
pub mod buffer;
/// RMS level metering
pub mod level;
/// Sample-rate and channel conversion
pub mod resample;
/// Capture session lifecycle
pub mod session;
/// Hardware input abstraction
pub mod source;

use anyhow::{Context, Result};
use std::path::Path;

/// Sample rate required by the downstream Whisper engine (Hz).
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Channel count required by the downstream Whisper engine.
pub const TARGET_CHANNELS: u16 = 1;

/// Native format of a hardware input stream.
///
/// Only the input side varies by device; the output format is fixed at
/// [`TARGET_SAMPLE_RATE`] / [`TARGET_CHANNELS`] / f32 for the lifetime of
/// the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputFormat {
    /// Hardware sample rate in Hz
    pub sample_rate: u32,
    /// Number of interleaved channels
    pub channels: u16,
}

impl InputFormat {
    /// Whether samples in this format can be accumulated without conversion
    #[must_use]
    pub const fn matches_target(&self) -> bool {
        self.sample_rate == TARGET_SAMPLE_RATE && self.channels == TARGET_CHANNELS
    }
}

/// One buffer of interleaved samples delivered by a single hardware callback.
///
/// Borrows the callback's data and must not be retained past the callback
/// invocation.
#[derive(Debug)]
pub struct AudioChunk<'a> {
    /// Interleaved float samples in the hardware's native layout
    pub samples: &'a [f32],
    /// Format the samples were delivered in
    pub format: InputFormat,
}

/// Write 16 kHz mono samples to a WAV file for debugging
///
/// # Errors
/// Returns error if directory creation or file write fails
pub fn write_debug_wav(samples: &[f32], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("failed to create debug directory")?;
    }

    let spec = hound::WavSpec {
        channels: TARGET_CHANNELS,
        sample_rate: TARGET_SAMPLE_RATE,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };

    let mut writer = hound::WavWriter::create(path, spec).context("failed to create WAV file")?;
    for &sample in samples {
        writer.write_sample(sample).context("failed to write sample")?;
    }
    writer.finalize().context("failed to finalize WAV file")?;

    tracing::info!(
        path = %path.display(),
        samples = samples.len(),
        "saved debug WAV"
    );
    Ok(())
}
