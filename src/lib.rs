//! Speakez - macOS push-to-talk dictation
//!
//! Hold a global hotkey to record from the microphone, release to
//! transcribe with Whisper and insert the text at the cursor.

/// Audio capture, level metering, and format conversion
pub mod audio;
/// Configuration management
pub mod config;
/// Push-to-talk recording state machine
pub mod controller;
/// Input handling (hotkeys, text insertion)
pub mod input;
/// macOS permission checks
pub mod permissions;
/// Logging setup
pub mod telemetry;
/// Whisper model download and inference
pub mod transcription;
