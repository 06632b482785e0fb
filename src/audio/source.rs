//! Hardware input abstraction.
//!
//! [`AudioSource`] is the capability the capture session depends on:
//! enumerate devices, attach a tap to the selected device's raw output,
//! and start/stop the underlying stream. [`CpalSource`] is the production
//! adapter; tests substitute a fake that feeds synthetic chunks.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use thiserror::Error;
use tracing::{info, warn};

use super::{AudioChunk, InputFormat};

/// Input device identity for enumeration and selection
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    /// Stable identifier used for selection
    pub id: String,
    /// Human-readable device name
    pub name: String,
}

/// Callback receiving one chunk per hardware buffer.
///
/// Invoked on a thread owned by the audio subsystem; it must complete
/// quickly and must not block. The chunk borrows the callback's data and
/// must not be retained.
pub type ChunkTap = Box<dyn FnMut(AudioChunk<'_>) + Send + 'static>;

/// Hardware input errors
#[derive(Debug, Error)]
pub enum SourceError {
    /// No input device is available on this host
    #[error("no input device available")]
    NoDevice,

    /// The configured device name did not match any input device
    #[error("input device '{0}' not found")]
    DeviceNotFound(String),

    /// Device enumeration failed
    #[error("failed to enumerate input devices")]
    Devices(#[from] cpal::DevicesError),

    /// The device's default input config could not be read
    #[error("failed to query input format")]
    Config(#[from] cpal::DefaultStreamConfigError),

    /// The input stream could not be built
    #[error("failed to build input stream")]
    Build(#[from] cpal::BuildStreamError),

    /// The input stream failed to begin
    #[error("failed to start input stream")]
    Play(#[from] cpal::PlayStreamError),

    /// The device delivers samples in a format this pipeline cannot read
    #[error("unsupported sample format: {0}")]
    UnsupportedSampleFormat(String),

    /// `start()` was called with no tap registered
    #[error("no tap registered")]
    NoTap,

    /// Adapter-specific failure (also used by test fakes)
    #[error("input stream unavailable: {0}")]
    Unavailable(String),
}

/// A tappable audio input.
///
/// One source is exclusively owned by one capture session. After
/// `unregister_tap` or `stop` return, no further tap invocations occur.
pub trait AudioSource {
    /// Enumerate available input devices
    ///
    /// # Errors
    /// Returns error if the host cannot enumerate devices
    fn list_devices(&self) -> Result<Vec<DeviceInfo>, SourceError>;

    /// Native format the device will deliver chunks in
    ///
    /// # Errors
    /// Returns error if the device's default config cannot be read
    fn input_format(&self) -> Result<InputFormat, SourceError>;

    /// Attach the per-chunk callback. Replaces any previously registered tap.
    ///
    /// # Errors
    /// Returns error if the source cannot accept a tap
    fn register_tap(&mut self, tap: ChunkTap) -> Result<(), SourceError>;

    /// Detach the tap, tearing down the stream if one is active
    fn unregister_tap(&mut self);

    /// Begin delivering chunks to the registered tap
    ///
    /// # Errors
    /// Returns error if no tap is registered or the stream fails to begin
    fn start(&mut self) -> Result<(), SourceError>;

    /// Stop the stream; no tap invocations occur after this returns
    fn stop(&mut self);
}

/// CPAL-backed input source
pub struct CpalSource {
    device: cpal::Device,
    tap: Option<ChunkTap>,
    stream: Option<cpal::Stream>,
}

impl CpalSource {
    /// Open the default input device, or a specific one by name
    ///
    /// # Errors
    /// Returns error if no device is available or the named device is missing
    pub fn new(preferred_device: Option<&str>) -> Result<Self, SourceError> {
        let host = cpal::default_host();
        let device = match preferred_device {
            Some(name) => {
                let mut devices = host.input_devices()?;
                devices
                    .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                    .ok_or_else(|| SourceError::DeviceNotFound(name.to_owned()))?
            }
            None => host.default_input_device().ok_or(SourceError::NoDevice)?,
        };

        let source = Self {
            device,
            tap: None,
            stream: None,
        };
        info!(device = %source.device_name(), "opened input device");
        Ok(source)
    }

    /// Name of the active input device
    #[must_use]
    pub fn device_name(&self) -> String {
        self.device.name().unwrap_or_else(|_| "unknown".to_owned())
    }
}

impl AudioSource for CpalSource {
    fn list_devices(&self) -> Result<Vec<DeviceInfo>, SourceError> {
        let host = cpal::default_host();
        let mut found = Vec::new();
        for device in host.input_devices()? {
            if let Ok(name) = device.name() {
                found.push(DeviceInfo {
                    id: name.clone(),
                    name,
                });
            }
        }
        Ok(found)
    }

    fn input_format(&self) -> Result<InputFormat, SourceError> {
        let config = self.device.default_input_config()?;
        Ok(InputFormat {
            sample_rate: config.sample_rate(),
            channels: config.channels(),
        })
    }

    fn register_tap(&mut self, tap: ChunkTap) -> Result<(), SourceError> {
        self.tap = Some(tap);
        Ok(())
    }

    fn unregister_tap(&mut self) {
        self.tap = None;
        // Dropping the stream is CPAL's unregistration guarantee: once the
        // stream is gone, no further data callbacks run.
        if let Some(stream) = self.stream.take() {
            if let Err(err) = stream.pause() {
                warn!(error = %err, "failed to pause input stream during tap removal");
            }
        }
    }

    fn start(&mut self) -> Result<(), SourceError> {
        if self.stream.is_some() {
            return Ok(());
        }
        let mut tap = self.tap.take().ok_or(SourceError::NoTap)?;

        let supported = self.device.default_input_config()?;
        let sample_format = supported.sample_format();
        let config: StreamConfig = supported.into();
        let format = InputFormat {
            sample_rate: config.sample_rate,
            channels: config.channels,
        };
        info!(
            sample_rate = format.sample_rate,
            channels = format.channels,
            format = ?sample_format,
            "starting input stream"
        );

        let err_fn = |err| warn!("audio stream error: {err}");

        // Convert every supported sample type to f32 in the callback so the
        // rest of the pipeline stays format-agnostic.
        let stream = match sample_format {
            SampleFormat::F32 => self.device.build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    tap(AudioChunk {
                        samples: data,
                        format,
                    });
                },
                err_fn,
                None,
            )?,
            SampleFormat::I16 => {
                let mut scratch: Vec<f32> = Vec::new();
                self.device.build_input_stream(
                    &config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        scratch.clear();
                        scratch.extend(data.iter().map(|&s| f32::from(s) / 32_768.0_f32));
                        tap(AudioChunk {
                            samples: &scratch,
                            format,
                        });
                    },
                    err_fn,
                    None,
                )?
            }
            SampleFormat::U16 => {
                let mut scratch: Vec<f32> = Vec::new();
                self.device.build_input_stream(
                    &config,
                    move |data: &[u16], _: &cpal::InputCallbackInfo| {
                        scratch.clear();
                        scratch.extend(
                            data.iter()
                                .map(|&s| (f32::from(s) - 32_768.0_f32) / 32_768.0_f32),
                        );
                        tap(AudioChunk {
                            samples: &scratch,
                            format,
                        });
                    },
                    err_fn,
                    None,
                )?
            }
            other => {
                return Err(SourceError::UnsupportedSampleFormat(format!("{other:?}")));
            }
        };

        stream.play()?;
        self.stream = Some(stream);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(err) = stream.pause() {
                warn!(error = %err, "failed to pause input stream");
            }
        }
    }
}
