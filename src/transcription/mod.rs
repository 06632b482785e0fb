//! Whisper model download and inference.

/// First-run model download
pub mod download;
/// Whisper inference engine
pub mod engine;

pub use download::ensure_model_downloaded;
pub use engine::{TranscriptionError, WhisperEngine};
