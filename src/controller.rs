//! Bridges hotkey signals to the capture session and hands finished
//! recordings to the transcription and insertion collaborators.

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::audio::session::{CaptureError, CaptureSession, StopOutcome};
use crate::audio::source::AudioSource;
use crate::audio::TARGET_SAMPLE_RATE;
use crate::input::insert::InsertError;
use crate::transcription::TranscriptionError;

/// Minimum accepted recording length: 0.5 seconds at the target rate
/// (8000 samples). Shorter recordings are discarded without transcription.
pub const MIN_DURATION_SAMPLES: usize = (TARGET_SAMPLE_RATE / 2) as usize;

/// Speech-recognition collaborator. Synchronous-but-slow; the controller
/// always invokes it from a blocking worker context.
#[cfg_attr(test, mockall::automock)]
pub trait Transcriber: Send + Sync {
    /// Transcribe 16 kHz mono samples to text, optionally biased by a
    /// vocabulary-hint string
    ///
    /// # Errors
    /// Returns error if inference fails
    fn transcribe(
        &self,
        samples: &[f32],
        vocabulary: Option<String>,
    ) -> Result<String, TranscriptionError>;
}

/// Text-insertion collaborator
#[cfg_attr(test, mockall::automock)]
pub trait TextInserter: Send + Sync {
    /// Insert text at the current cursor position
    ///
    /// # Errors
    /// Returns error if insertion fails
    fn insert(&self, text: &str) -> Result<(), InsertError>;
}

/// Controller phase. Only one recording may be active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for a key-down
    Idle,
    /// Hotkey held, capture session active
    Recording,
    /// Transcription in flight
    Processing,
}

/// What became of one push-to-talk cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Text transcribed and inserted at the cursor
    Inserted(String),
    /// The session produced zero samples
    NoAudio,
    /// Below the minimum duration; discarded silently
    TooShort,
    /// Transcription produced no text; nothing inserted
    NoSpeech,
    /// Cancelled by the user; audio discarded
    Cancelled,
    /// Signal arrived in a phase where it has no meaning
    Ignored,
}

/// Controller-level failures, distinguished by stage
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Recording failed to start or stop cleanly
    #[error("capture failed")]
    Capture(#[from] CaptureError),

    /// The transcription collaborator failed
    #[error("transcription failed")]
    Transcription(#[from] TranscriptionError),

    /// The insertion collaborator failed
    #[error("text insertion failed")]
    Insertion(#[from] InsertError),

    /// The transcription worker task was aborted
    #[error("transcription task aborted")]
    WorkerJoin(#[from] tokio::task::JoinError),
}

/// Push-to-talk orchestrator: `Idle -> Recording -> Processing -> Idle`.
pub struct RecordingController<S: AudioSource> {
    session: CaptureSession<S>,
    transcriber: Arc<dyn Transcriber>,
    inserter: Arc<dyn TextInserter>,
    vocabulary: Option<String>,
    debug_wav: Option<PathBuf>,
    phase: Phase,
}

impl<S: AudioSource> RecordingController<S> {
    /// Create an idle controller wiring the session to its collaborators
    pub fn new(
        session: CaptureSession<S>,
        transcriber: Arc<dyn Transcriber>,
        inserter: Arc<dyn TextInserter>,
    ) -> Self {
        Self {
            session,
            transcriber,
            inserter,
            vocabulary: None,
            debug_wav: None,
            phase: Phase::Idle,
        }
    }

    /// Vocabulary-hint string passed through to the transcriber
    pub fn set_vocabulary(&mut self, vocabulary: Option<String>) {
        self.vocabulary = vocabulary;
    }

    /// Dump each accepted recording to this WAV path before transcription
    pub fn set_debug_wav(&mut self, path: Option<PathBuf>) {
        self.debug_wav = path;
    }

    /// Current controller phase
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// The session driven by this controller
    pub const fn session(&self) -> &CaptureSession<S> {
        &self.session
    }

    /// Hotkey pressed: begin recording if idle.
    ///
    /// A key-down during `Recording` or `Processing` is ignored.
    ///
    /// # Errors
    /// Returns error if the capture session fails to start; the phase
    /// stays `Idle`.
    pub fn key_down(&mut self) -> Result<(), ControllerError> {
        if self.phase != Phase::Idle {
            debug!(phase = ?self.phase, "key-down ignored");
            return Ok(());
        }

        self.session.start()?;
        self.phase = Phase::Recording;
        info!("recording started");
        Ok(())
    }

    /// Hotkey released: stop recording and run the transcription hand-off.
    ///
    /// Recordings below [`MIN_DURATION_SAMPLES`] are discarded without
    /// invoking the transcriber. Transcription runs on a blocking worker;
    /// the audio subsystem is already torn down by then.
    ///
    /// # Errors
    /// Returns error if transcription or insertion fails; the phase always
    /// returns to `Idle`.
    pub async fn key_up(&mut self) -> Result<Outcome, ControllerError> {
        if self.phase != Phase::Recording {
            debug!(phase = ?self.phase, "key-up ignored");
            return Ok(Outcome::Ignored);
        }

        let samples = match self.session.stop() {
            StopOutcome::NoData => {
                info!("no audio captured");
                self.phase = Phase::Idle;
                return Ok(Outcome::NoAudio);
            }
            StopOutcome::Audio(samples) if samples.len() < MIN_DURATION_SAMPLES => {
                info!(
                    samples = samples.len(),
                    minimum = MIN_DURATION_SAMPLES,
                    "recording below minimum duration, discarding"
                );
                self.phase = Phase::Idle;
                return Ok(Outcome::TooShort);
            }
            StopOutcome::Audio(samples) => samples,
        };

        self.phase = Phase::Processing;
        info!(samples = samples.len(), "handing audio to transcription");

        let transcriber = Arc::clone(&self.transcriber);
        let vocabulary = self.vocabulary.clone();
        let debug_wav = self.debug_wav.clone();
        let joined = tokio::task::spawn_blocking(move || {
            if let Some(path) = debug_wav {
                if let Err(err) = crate::audio::write_debug_wav(&samples, &path) {
                    warn!(error = %err, "failed to write debug WAV");
                }
            }
            transcriber.transcribe(&samples, vocabulary)
        })
        .await;

        self.phase = Phase::Idle;
        let text = match joined {
            Ok(Ok(text)) => text,
            Ok(Err(err)) => return Err(ControllerError::Transcription(err)),
            Err(err) => return Err(ControllerError::WorkerJoin(err)),
        };

        if text.is_empty() {
            info!("transcription produced no text");
            return Ok(Outcome::NoSpeech);
        }

        self.inserter.insert(&text)?;
        info!(text_len = text.len(), "text inserted");
        Ok(Outcome::Inserted(text))
    }

    /// Escape/cancel: stop and discard unconditionally.
    ///
    /// The session is always left idle with an empty buffer; no
    /// transcription is invoked regardless of how much audio accumulated.
    pub fn cancel(&mut self) -> Outcome {
        if self.phase != Phase::Recording {
            debug!(phase = ?self.phase, "cancel ignored");
            return Outcome::Ignored;
        }

        match self.session.stop() {
            StopOutcome::Audio(samples) => {
                info!(discarded = samples.len(), "recording cancelled");
            }
            StopOutcome::NoData => info!("recording cancelled with no samples"),
        }
        self.phase = Phase::Idle;
        Outcome::Cancelled
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)] // Test assertions with known exact values
mod tests {
    use super::*;
    use crate::audio::source::{ChunkTap, DeviceInfo, SourceError};
    use crate::audio::{AudioChunk, InputFormat};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeInner {
        tap: Option<ChunkTap>,
        started: bool,
    }

    #[derive(Clone)]
    struct FakeSource {
        format: InputFormat,
        fail_start: bool,
        inner: Arc<Mutex<FakeInner>>,
    }

    impl FakeSource {
        fn mono16k() -> Self {
            Self {
                format: InputFormat {
                    sample_rate: 16_000,
                    channels: 1,
                },
                fail_start: false,
                inner: Arc::new(Mutex::new(FakeInner::default())),
            }
        }

        fn feed(&self, samples: &[f32]) {
            let mut inner = self.inner.lock().unwrap();
            if !inner.started {
                return;
            }
            let format = self.format;
            if let Some(tap) = inner.tap.as_mut() {
                tap(AudioChunk { samples, format });
            }
        }
    }

    impl AudioSource for FakeSource {
        fn list_devices(&self) -> Result<Vec<DeviceInfo>, SourceError> {
            Ok(Vec::new())
        }

        fn input_format(&self) -> Result<InputFormat, SourceError> {
            Ok(self.format)
        }

        fn register_tap(&mut self, tap: ChunkTap) -> Result<(), SourceError> {
            self.inner.lock().unwrap().tap = Some(tap);
            Ok(())
        }

        fn unregister_tap(&mut self) {
            let mut inner = self.inner.lock().unwrap();
            inner.tap = None;
            inner.started = false;
        }

        fn start(&mut self) -> Result<(), SourceError> {
            if self.fail_start {
                return Err(SourceError::Unavailable("fake".to_owned()));
            }
            self.inner.lock().unwrap().started = true;
            Ok(())
        }

        fn stop(&mut self) {
            self.inner.lock().unwrap().started = false;
        }
    }

    fn controller_with(
        source: FakeSource,
        transcriber: MockTranscriber,
        inserter: MockTextInserter,
    ) -> RecordingController<FakeSource> {
        RecordingController::new(
            CaptureSession::new(source),
            Arc::new(transcriber),
            Arc::new(inserter),
        )
    }

    #[tokio::test]
    async fn test_minimum_duration_boundary_rejects_7999() {
        let source = FakeSource::mono16k();
        let handle = source.clone();
        let transcriber = MockTranscriber::new(); // no expectations: must not be called
        let inserter = MockTextInserter::new();
        let mut controller = controller_with(source, transcriber, inserter);

        controller.key_down().unwrap();
        handle.feed(&vec![0.1; 7999]);

        let outcome = controller.key_up().await.unwrap();
        assert_eq!(outcome, Outcome::TooShort);
        assert_eq!(controller.phase(), Phase::Idle);
    }

    #[tokio::test]
    async fn test_minimum_duration_boundary_accepts_8000() {
        let source = FakeSource::mono16k();
        let handle = source.clone();

        let mut transcriber = MockTranscriber::new();
        transcriber
            .expect_transcribe()
            .withf(|samples, _| samples.len() == 8000)
            .times(1)
            .returning(|_, _| Ok("hello world".to_owned()));

        let mut inserter = MockTextInserter::new();
        inserter
            .expect_insert()
            .withf(|text| text == "hello world")
            .times(1)
            .returning(|_| Ok(()));

        let mut controller = controller_with(source, transcriber, inserter);
        controller.key_down().unwrap();
        handle.feed(&vec![0.1; 8000]);

        let outcome = controller.key_up().await.unwrap();
        assert_eq!(outcome, Outcome::Inserted("hello world".to_owned()));
        assert_eq!(controller.phase(), Phase::Idle);
    }

    #[tokio::test]
    async fn test_cancel_discards_without_transcription() {
        let source = FakeSource::mono16k();
        let handle = source.clone();
        let transcriber = MockTranscriber::new();
        let inserter = MockTextInserter::new();
        let mut controller = controller_with(source, transcriber, inserter);

        controller.key_down().unwrap();
        handle.feed(&vec![0.1; 32_000]);

        assert_eq!(controller.cancel(), Outcome::Cancelled);
        assert_eq!(controller.phase(), Phase::Idle);

        // The buffer was drained by the cancel; a fresh cycle starts empty.
        controller.key_down().unwrap();
        let outcome = controller.key_up().await.unwrap();
        assert_eq!(outcome, Outcome::NoAudio);
    }

    #[tokio::test]
    async fn test_key_up_while_idle_is_ignored() {
        let mut controller = controller_with(
            FakeSource::mono16k(),
            MockTranscriber::new(),
            MockTextInserter::new(),
        );
        let outcome = controller.key_up().await.unwrap();
        assert_eq!(outcome, Outcome::Ignored);
    }

    #[tokio::test]
    async fn test_key_down_while_recording_is_ignored() {
        let mut controller = controller_with(
            FakeSource::mono16k(),
            MockTranscriber::new(),
            MockTextInserter::new(),
        );

        controller.key_down().unwrap();
        assert_eq!(controller.phase(), Phase::Recording);

        controller.key_down().unwrap();
        assert_eq!(controller.phase(), Phase::Recording);
    }

    #[tokio::test]
    async fn test_failed_start_stays_idle() {
        let mut source = FakeSource::mono16k();
        source.fail_start = true;
        let mut controller =
            controller_with(source, MockTranscriber::new(), MockTextInserter::new());

        let result = controller.key_down();
        assert!(matches!(result, Err(ControllerError::Capture(_))));
        assert_eq!(controller.phase(), Phase::Idle);
    }

    #[tokio::test]
    async fn test_transcription_failure_surfaces_and_resets() {
        let source = FakeSource::mono16k();
        let handle = source.clone();

        let mut transcriber = MockTranscriber::new();
        transcriber.expect_transcribe().times(1).returning(|_, _| {
            Err(TranscriptionError::Transcription(anyhow::anyhow!(
                "inference failed"
            )))
        });

        let mut controller =
            controller_with(source, transcriber, MockTextInserter::new());
        controller.key_down().unwrap();
        handle.feed(&vec![0.1; 16_000]);

        let result = controller.key_up().await;
        assert!(matches!(result, Err(ControllerError::Transcription(_))));
        assert_eq!(controller.phase(), Phase::Idle);
    }

    #[tokio::test]
    async fn test_empty_transcript_skips_insertion() {
        let source = FakeSource::mono16k();
        let handle = source.clone();

        let mut transcriber = MockTranscriber::new();
        transcriber
            .expect_transcribe()
            .times(1)
            .returning(|_, _| Ok(String::new()));

        let mut controller =
            controller_with(source, transcriber, MockTextInserter::new());
        controller.key_down().unwrap();
        handle.feed(&vec![0.1; 16_000]);

        let outcome = controller.key_up().await.unwrap();
        assert_eq!(outcome, Outcome::NoSpeech);
    }

    #[tokio::test]
    async fn test_vocabulary_hint_forwarded() {
        let source = FakeSource::mono16k();
        let handle = source.clone();

        let mut transcriber = MockTranscriber::new();
        transcriber
            .expect_transcribe()
            .withf(|_, vocabulary| vocabulary.as_deref() == Some("Speakez, CGEvent"))
            .times(1)
            .returning(|_, _| Ok("ok".to_owned()));

        let mut inserter = MockTextInserter::new();
        inserter.expect_insert().times(1).returning(|_| Ok(()));

        let mut controller = controller_with(source, transcriber, inserter);
        controller.set_vocabulary(Some("Speakez, CGEvent".to_owned()));
        controller.key_down().unwrap();
        handle.feed(&vec![0.1; 16_000]);

        let outcome = controller.key_up().await.unwrap();
        assert_eq!(outcome, Outcome::Inserted("ok".to_owned()));
    }
}
