//! Whisper inference engine.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::controller::Transcriber;

/// Errors that can occur during transcription
#[derive(Debug, Error)]
pub enum TranscriptionError {
    /// Failed to load Whisper model
    #[error("failed to load whisper model from {path}: {source}")]
    ModelLoad {
        /// Path to model file
        path: String,
        /// Underlying error
        source: anyhow::Error,
    },

    /// Failed to create Whisper inference state
    #[error("failed to create whisper state")]
    StateCreation,

    /// Transcription inference failed
    #[error("failed to transcribe audio")]
    Transcription(#[from] anyhow::Error),
}

/// Whisper transcription engine
pub struct WhisperEngine {
    /// Whisper context, exclusive access per transcription
    ctx: Arc<Mutex<WhisperContext>>,
    /// Number of CPU threads for inference
    threads: i32,
    /// Beam search width
    beam_size: i32,
    /// Language code (None = auto-detect)
    language: Option<String>,
}

impl WhisperEngine {
    /// Sampling strategy from the configured beam size
    const fn get_sampling_strategy(beam_size: i32) -> SamplingStrategy {
        if beam_size > 1 {
            SamplingStrategy::BeamSearch {
                beam_size,
                patience: -1.0,
            }
        } else {
            SamplingStrategy::Greedy { best_of: 1 }
        }
    }

    /// Load the model at `model_path`
    ///
    /// # Errors
    /// Returns error if the model file is missing or invalid, or if
    /// `threads`/`beam_size` are zero or exceed `i32::MAX`
    pub fn new(
        model_path: &Path,
        threads: usize,
        beam_size: usize,
        language: Option<String>,
    ) -> Result<Self, TranscriptionError> {
        if threads == 0 {
            return Err(TranscriptionError::ModelLoad {
                path: model_path.display().to_string(),
                source: anyhow::anyhow!("threads must be > 0"),
            });
        }
        if beam_size == 0 {
            return Err(TranscriptionError::ModelLoad {
                path: model_path.display().to_string(),
                source: anyhow::anyhow!("beam_size must be > 0"),
            });
        }

        // whisper-rs takes i32 for both
        let threads_i32 = i32::try_from(threads).map_err(|_| TranscriptionError::ModelLoad {
            path: model_path.display().to_string(),
            source: anyhow::anyhow!("threads value too large (max: {})", i32::MAX),
        })?;
        let beam_size_i32 =
            i32::try_from(beam_size).map_err(|_| TranscriptionError::ModelLoad {
                path: model_path.display().to_string(),
                source: anyhow::anyhow!("beam_size value too large (max: {})", i32::MAX),
            })?;

        tracing::info!(
            path = %model_path.display(),
            threads = threads,
            beam_size = beam_size,
            language = ?language,
            "loading whisper model"
        );

        let path_str = model_path
            .to_str()
            .ok_or_else(|| TranscriptionError::ModelLoad {
                path: model_path.display().to_string(),
                source: anyhow::anyhow!("model path contains invalid UTF-8"),
            })?;

        let params = WhisperContextParameters::default();
        let ctx = WhisperContext::new_with_params(path_str, params).map_err(|e| {
            TranscriptionError::ModelLoad {
                path: model_path.display().to_string(),
                source: anyhow::anyhow!("{e:?}"),
            }
        })?;

        tracing::info!("whisper model loaded successfully");

        Ok(Self {
            ctx: Arc::new(Mutex::new(ctx)),
            threads: threads_i32,
            beam_size: beam_size_i32,
            language,
        })
    }

    /// Transcribe 16kHz mono f32 samples, optionally biased toward a
    /// vocabulary hint passed as the initial prompt
    ///
    /// # Errors
    /// Returns error if Whisper inference fails or the mutex is poisoned
    fn transcribe_impl(
        &self,
        samples: &[f32],
        vocabulary: Option<&str>,
    ) -> Result<String, TranscriptionError> {
        let _span = tracing::debug_span!("transcription", samples = samples.len()).entered();
        tracing::debug!("starting transcription");

        let mut state = self
            .ctx
            .lock()
            .map_err(|e| anyhow::anyhow!("mutex poisoned: {e}"))?
            .create_state()
            .map_err(|_| TranscriptionError::StateCreation)?;

        let strategy = Self::get_sampling_strategy(self.beam_size);
        let mut params = FullParams::new(strategy);
        params.set_n_threads(self.threads);
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);
        params.set_language(self.language.as_deref());
        params.set_translate(false);
        if let Some(hint) = vocabulary {
            params.set_initial_prompt(hint);
        }

        let start = std::time::Instant::now();
        state
            .full(params, samples)
            .context("whisper inference failed")?;
        let inference_duration = start.elapsed();

        let mut result = String::new();
        for segment in state.as_iter() {
            result.push_str(&segment.to_string());
        }
        let result = result.trim().to_owned();

        tracing::info!(
            segments = state.full_n_segments(),
            text_len = result.len(),
            inference_ms = inference_duration.as_millis(),
            "transcription completed"
        );

        Ok(result)
    }
}

impl Transcriber for WhisperEngine {
    fn transcribe(
        &self,
        samples: &[f32],
        vocabulary: Option<String>,
    ) -> Result<String, TranscriptionError> {
        self.transcribe_impl(samples, vocabulary.as_deref())
    }
}

// SAFETY: the WhisperContext is wrapped in Arc<Mutex<>> and every method
// acquires the lock before touching it; no mutable state lives outside the
// mutex. whisper-rs documents WhisperContext as thread-safe under external
// synchronization.
#[allow(unsafe_code)]
unsafe impl Send for WhisperEngine {}
#[allow(unsafe_code)]
unsafe impl Sync for WhisperEngine {}
