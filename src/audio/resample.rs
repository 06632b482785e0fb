//! Per-chunk conversion from the hardware's native format to 16 kHz mono.
//!
//! Each chunk is converted independently: interleaved channels are averaged
//! down to mono, a short FIR low-pass tames aliasing when decimating, and a
//! linear interpolator performs the rate change. Good enough for speech
//! snippets where latency matters more than phase accuracy.

use std::f32::consts::PI;
use thiserror::Error;
use tracing::debug;

use super::{AudioChunk, InputFormat, TARGET_CHANNELS, TARGET_SAMPLE_RATE};

const MAX_FIR_TAPS: usize = 129;

/// Format validation errors raised when building a converter
#[derive(Debug, Error)]
pub enum FormatError {
    /// The fixed target format failed its defensive validation
    #[error("target format construction failed ({sample_rate} Hz, {channels} ch)")]
    Target {
        /// Target rate that failed validation
        sample_rate: u32,
        /// Target channel count that failed validation
        channels: u16,
    },

    /// The hardware reported a nonsensical input format
    #[error("invalid input format ({sample_rate} Hz, {channels} ch)")]
    Input {
        /// Reported hardware sample rate
        sample_rate: u32,
        /// Reported hardware channel count
        channels: u16,
    },
}

/// Stateless per-chunk converter for one input format.
///
/// Owns no cross-call buffers; the FIR taps are precomputed at construction
/// because the input format is fixed for the lifetime of a capture session.
#[derive(Debug, Clone)]
pub struct ChunkConverter {
    input: InputFormat,
    passthrough: bool,
    fir: Option<Vec<f32>>,
}

impl ChunkConverter {
    /// Build a converter from the hardware format to the fixed target
    ///
    /// # Errors
    /// Returns [`FormatError::Target`] if the fixed target constants fail
    /// validation (defensive, should not occur) and [`FormatError::Input`]
    /// for a zero sample rate or channel count.
    pub fn new(input: InputFormat) -> Result<Self, FormatError> {
        if TARGET_SAMPLE_RATE == 0 || TARGET_CHANNELS != 1 {
            return Err(FormatError::Target {
                sample_rate: TARGET_SAMPLE_RATE,
                channels: TARGET_CHANNELS,
            });
        }
        if input.sample_rate == 0 || input.channels == 0 {
            return Err(FormatError::Input {
                sample_rate: input.sample_rate,
                channels: input.channels,
            });
        }

        // When decimating, run a small low-pass first so high-frequency
        // speech from 44.1/48 kHz microphones does not alias.
        #[allow(clippy::cast_precision_loss)]
        let fir = (input.sample_rate > TARGET_SAMPLE_RATE).then(|| {
            let cutoff =
                (TARGET_SAMPLE_RATE as f32 * 0.5 / input.sample_rate as f32).min(0.499);
            design_low_pass(cutoff, decimation_tap_count(input.sample_rate))
        });

        Ok(Self {
            input,
            passthrough: input.matches_target(),
            fir,
        })
    }

    /// Format this converter accepts
    #[must_use]
    pub const fn input_format(&self) -> InputFormat {
        self.input
    }

    /// Whether conversion is an identity copy
    #[must_use]
    pub const fn is_passthrough(&self) -> bool {
        self.passthrough
    }

    /// Convert one chunk to 16 kHz mono.
    ///
    /// Returns an empty vector for zero-length input or a chunk whose format
    /// does not match the session's input format; the caller skips
    /// accumulation for that chunk and recording continues.
    #[must_use]
    pub fn convert(&self, chunk: &AudioChunk<'_>) -> Vec<f32> {
        if chunk.samples.is_empty() {
            return Vec::new();
        }
        if chunk.format != self.input {
            debug!(
                expected_rate = self.input.sample_rate,
                got_rate = chunk.format.sample_rate,
                expected_channels = self.input.channels,
                got_channels = chunk.format.channels,
                "chunk format does not match session format, dropping"
            );
            return Vec::new();
        }
        if self.passthrough {
            return chunk.samples.to_vec();
        }

        let mono = downmix_to_mono(chunk.samples, usize::from(self.input.channels));
        if self.input.sample_rate == TARGET_SAMPLE_RATE {
            return mono;
        }

        #[allow(clippy::cast_precision_loss)]
        let ratio = TARGET_SAMPLE_RATE as f32 / self.input.sample_rate as f32;
        match &self.fir {
            Some(taps) => resample_linear(&apply_fir(&mono, taps), ratio),
            None => resample_linear(&mono, ratio),
        }
    }
}

/// Average interleaved frames down to one channel.
///
/// A trailing partial frame (torn at a device buffer boundary) is averaged
/// over the channels present rather than discarded.
#[allow(clippy::cast_precision_loss)]
fn downmix_to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }

    let mut mono = Vec::with_capacity(samples.len() / channels + 1);
    let mut acc = 0.0_f32;
    let mut count = 0_usize;
    for &sample in samples {
        acc += sample;
        count += 1;
        if count == channels {
            mono.push(acc / channels as f32);
            acc = 0.0;
            count = 0;
        }
    }
    if count > 0 {
        mono.push(acc / count as f32);
    }
    mono
}

/// Linear-interpolation rate conversion.
///
/// Output length is `round(input_len * ratio)` so the frame count obeys the
/// target/input rate ratio exactly.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn resample_linear(input: &[f32], ratio: f32) -> Vec<f32> {
    let output_len = (input.len() as f32 * ratio).round() as usize;
    let mut output = Vec::with_capacity(output_len);

    for i in 0..output_len {
        let src_idx = i as f32 / ratio;
        let idx = src_idx.floor() as usize;
        let frac = src_idx - idx as f32;

        if idx + 1 < input.len() {
            output.push(input[idx].mul_add(1.0 - frac, input[idx + 1] * frac));
        } else {
            output.push(input.last().copied().unwrap_or(0.0));
        }
    }

    output
}

/// Tap count scaled with the decimation ratio: short for near-equal rates,
/// longer when collapsing 48 kHz into 16 kHz.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn decimation_tap_count(input_rate: u32) -> usize {
    let decimation_ratio = input_rate as f32 / TARGET_SAMPLE_RATE as f32;
    let mut taps = (decimation_ratio * 4.0).ceil().max(11.0) as usize;
    if taps % 2 == 0 {
        taps += 1;
    }
    taps.min(MAX_FIR_TAPS)
}

/// Normalized Hamming-windowed sinc taps for the anti-aliasing low-pass.
/// Unity DC gain, so conversion introduces no overall gain.
#[allow(clippy::cast_precision_loss)]
fn design_low_pass(normalized_cutoff: f32, taps: usize) -> Vec<f32> {
    let mut coeffs = Vec::with_capacity(taps);
    let m = (taps - 1) as f32;

    for n in 0..taps {
        let centered = n as f32 - m / 2.0;
        let x = 2.0 * PI * normalized_cutoff * centered;
        let sinc = if centered == 0.0 {
            2.0 * normalized_cutoff
        } else {
            (2.0 * normalized_cutoff * x.sin()) / x
        };
        let window = if taps <= 1 {
            1.0
        } else {
            0.46_f32.mul_add(-((2.0 * PI * n as f32) / m).cos(), 0.54)
        };
        coeffs.push(sinc * window);
    }

    let sum: f32 = coeffs.iter().sum();
    if sum != 0.0 {
        for coeff in &mut coeffs {
            *coeff /= sum;
        }
    }

    coeffs
}

fn apply_fir(input: &[f32], coeffs: &[f32]) -> Vec<f32> {
    if input.is_empty() || coeffs.len() <= 1 {
        return input.to_vec();
    }

    let half = coeffs.len() / 2;
    let mut output = Vec::with_capacity(input.len());
    for n in 0..input.len() {
        let mut acc = 0.0_f32;
        for (k, coeff) in coeffs.iter().enumerate() {
            if let Some(idx) = (n + k).checked_sub(half) {
                if let Some(sample) = input.get(idx) {
                    acc = sample.mul_add(*coeff, acc);
                }
            }
        }
        output.push(acc);
    }
    output
}
