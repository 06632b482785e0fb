//! Capture session: device attachment, the per-chunk callback, level
//! reporting, and buffer accumulation behind a strict Idle/Capturing
//! state machine.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use thiserror::Error;
use tracing::{debug, info};

use super::buffer::CaptureBuffer;
use super::level::{normalized_level, LiveLevel};
use super::resample::{ChunkConverter, FormatError};
use super::source::{AudioSource, ChunkTap, SourceError};
use super::AudioChunk;

/// Where the session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No tap registered, no stream active
    Idle,
    /// Stream active, chunks accumulating
    Capturing,
}

/// Tagged result of stopping a session
#[derive(Debug, Clone, PartialEq)]
pub enum StopOutcome {
    /// Drained 16 kHz mono samples in hardware delivery order
    Audio(Vec<f32>),
    /// The session was idle or produced zero samples
    NoData,
}

/// Failures starting a capture session. The session is left `Idle` in
/// every failure case.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The hardware input format could not be read
    #[error("failed to read hardware input format")]
    InputFormat(#[source] SourceError),

    /// Format validation failed (fixed target format is checked defensively)
    #[error("format construction failed")]
    FormatConstruction(#[from] FormatError),

    /// The tap could not be attached to the device
    #[error("failed to attach input tap")]
    TapRegistration(#[source] SourceError),

    /// The underlying stream failed to begin; the tap has been rolled back
    #[error("audio engine failed to start")]
    EngineStart(#[source] SourceError),
}

/// Best-effort level observer.
///
/// Invoked on a dedicated dispatch thread, never on the audio callback:
/// the callback posts each level through a channel and moves on, so a
/// slow or blocking listener lags behind the meter without stalling
/// capture. Delivery is fire-and-forget.
pub type LevelListener = Arc<dyn Fn(f32) + Send + Sync>;

/// Orchestrates one exclusively-owned hardware tap.
///
/// `start`/`stop` run on the control thread while the tap fires on the
/// audio thread; the only shared state is the mutex-guarded
/// [`CaptureBuffer`] and the atomic [`LiveLevel`].
pub struct CaptureSession<S: AudioSource> {
    source: S,
    buffer: Arc<CaptureBuffer>,
    level: LiveLevel,
    level_listener: Option<LevelListener>,
    level_thread: Option<thread::JoinHandle<()>>,
    state: SessionState,
}

impl<S: AudioSource> CaptureSession<S> {
    /// Create an idle session owning `source`
    pub fn new(source: S) -> Self {
        Self {
            source,
            buffer: Arc::new(CaptureBuffer::new()),
            level: LiveLevel::new(),
            level_listener: None,
            level_thread: None,
            state: SessionState::Idle,
        }
    }

    /// Register a best-effort level observer, replacing any previous one
    pub fn set_level_listener(&mut self, listener: LevelListener) {
        self.level_listener = Some(listener);
    }

    /// Current lifecycle state
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Handle to the live meter for UI polling
    #[must_use]
    pub fn live_level(&self) -> LiveLevel {
        self.level.clone()
    }

    /// Access to the underlying source
    pub const fn source(&self) -> &S {
        &self.source
    }

    /// Start capturing.
    ///
    /// Calling while already `Capturing` is a no-op: the existing session
    /// continues and no duplicate tap is registered.
    ///
    /// # Errors
    /// Returns [`CaptureError`] if the input format cannot be read, format
    /// validation fails, or the stream fails to begin. The tap is rolled
    /// back and the state remains `Idle` on every error path.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        if self.state == SessionState::Capturing {
            debug!("start while already capturing (no-op)");
            return Ok(());
        }

        let start = std::time::Instant::now();
        self.buffer.clear();

        let input = self
            .source
            .input_format()
            .map_err(CaptureError::InputFormat)?;
        let converter = ChunkConverter::new(input)?;
        info!(
            sample_rate = input.sample_rate,
            channels = input.channels,
            conversion = !converter.is_passthrough(),
            "starting capture session"
        );

        // Listener notification runs on its own dispatch thread so the
        // audio callback only ever does a channel send for it.
        let level_tx = self.level_listener.clone().map(|listener| {
            let (tx, rx) = mpsc::channel::<f32>();
            self.level_thread = Some(thread::spawn(move || {
                while let Ok(value) = rx.recv() {
                    listener(value);
                }
            }));
            tx
        });

        if let Err(err) = self.source.register_tap(make_tap(
            converter,
            Arc::clone(&self.buffer),
            self.level.clone(),
            level_tx,
        )) {
            self.join_level_thread();
            return Err(CaptureError::TapRegistration(err));
        }

        if let Err(err) = self.source.start() {
            // Roll the tap back before reporting failure so a retry starts
            // from a clean slate.
            self.source.unregister_tap();
            self.join_level_thread();
            return Err(CaptureError::EngineStart(err));
        }

        self.state = SessionState::Capturing;
        info!(latency_us = start.elapsed().as_micros(), "capture started");
        Ok(())
    }

    /// Stop capturing and drain the accumulated buffer.
    ///
    /// Stopping while `Idle` returns [`StopOutcome::NoData`] immediately.
    /// The buffer is always left empty afterwards, whatever the caller
    /// decides to do with the result.
    pub fn stop(&mut self) -> StopOutcome {
        if self.state == SessionState::Idle {
            debug!("stop while idle (no data)");
            return StopOutcome::NoData;
        }

        let start = std::time::Instant::now();
        self.source.unregister_tap();
        self.source.stop();
        // Dropping the tap closed the level channel; wait for the dispatch
        // thread to deliver anything still queued and exit.
        self.join_level_thread();
        self.state = SessionState::Idle;
        self.level.set(0.0);

        match self.buffer.drain() {
            Some(samples) => {
                info!(
                    samples = samples.len(),
                    latency_us = start.elapsed().as_micros(),
                    "capture stopped"
                );
                StopOutcome::Audio(samples)
            }
            None => {
                info!("capture stopped with no samples");
                StopOutcome::NoData
            }
        }
    }

    fn join_level_thread(&mut self) {
        if let Some(handle) = self.level_thread.take() {
            if handle.join().is_err() {
                debug!("level dispatch thread panicked");
            }
        }
    }
}

/// Build the per-chunk callback.
///
/// Runs on the audio thread: convert outside the lock, store the level in
/// the atomic meter, post it to the listener dispatch channel without
/// waiting, append under the buffer mutex. A chunk that fails to convert
/// is dropped and recording continues.
fn make_tap(
    converter: ChunkConverter,
    buffer: Arc<CaptureBuffer>,
    level: LiveLevel,
    level_tx: Option<mpsc::Sender<f32>>,
) -> ChunkTap {
    Box::new(move |chunk: AudioChunk<'_>| {
        let converted = converter.convert(&chunk);
        if converted.is_empty() {
            debug!(
                input_samples = chunk.samples.len(),
                "chunk conversion produced no samples, dropping"
            );
            return;
        }

        let value = normalized_level(&converted);
        level.set(value);
        if let Some(tx) = &level_tx {
            // Unbounded send never blocks; a hung-up receiver just means
            // the session already stopped.
            let _ = tx.send(value);
        }

        buffer.append(&converted);
    })
}
