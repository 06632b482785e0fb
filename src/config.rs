//! Configuration loaded from `~/.speakez.toml`.
//!
//! The config is an explicitly constructed value passed by reference into
//! the components that need it at construction time; [`Settings`] carries
//! it plus observer registration for change notification. There is no
//! process-wide settings singleton.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

/// Top-level application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Push-to-talk hotkey bindings
    pub hotkey: HotkeyConfig,
    /// Input device selection and debug options
    pub audio: AudioConfig,
    /// Whisper model selection and tuning
    pub model: ModelConfig,
    /// Log destination
    pub telemetry: TelemetryConfig,
}

/// Hotkey bindings
#[derive(Debug, Deserialize, Clone)]
pub struct HotkeyConfig {
    /// Modifier names ("Control", "Option", "Command", "Shift")
    pub modifiers: Vec<String>,
    /// Talk key held while recording
    pub key: String,
    /// Cancel key: stop and discard the active recording
    pub cancel_key: String,
}

/// Audio input options
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AudioConfig {
    /// Input device name; `None` selects the system default
    #[serde(default)]
    pub input_device: Option<String>,
    /// When set, each accepted recording is dumped here as a WAV file
    #[serde(default)]
    pub debug_wav_path: Option<String>,
}

/// Whisper model options
#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    /// ggml model name ("tiny", "base", "small", ...)
    pub name: String,
    /// Path to the model file; downloaded on first run if missing
    pub path: String,
    /// Language code; `None` auto-detects
    #[serde(default)]
    pub language: Option<String>,
    /// CPU threads for inference
    pub threads: usize,
    /// Beam search width (1 = greedy)
    pub beam_size: usize,
    /// Vocabulary hint biasing recognition toward domain terms
    #[serde(default)]
    pub vocabulary: Option<String>,
}

/// Log destination options
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    /// Log to a file instead of stdout
    pub enabled: bool,
    /// Log file path when enabled
    pub log_path: String,
}

impl Config {
    /// Load config from `~/.speakez.toml`, writing a default on first run
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            Self::create_default(&config_path).context("failed to create default config")?;
        }

        let contents = fs::read_to_string(&config_path).context("failed to read config file")?;
        let config: Self = toml::from_str(&contents).context("failed to parse config TOML")?;
        Ok(config)
    }

    fn config_path() -> Result<PathBuf> {
        let home = std::env::var("HOME").context("HOME environment variable not set")?;
        Ok(PathBuf::from(home).join(".speakez.toml"))
    }

    fn create_default(path: &PathBuf) -> Result<()> {
        fs::write(path, DEFAULT_CONFIG).context("failed to write default config")?;
        Ok(())
    }

    /// Expand `~` in paths to the home directory
    ///
    /// # Errors
    /// Returns error if `HOME` is not set
    pub fn expand_path(path: &str) -> Result<PathBuf> {
        if let Some(stripped) = path.strip_prefix("~/") {
            let home = std::env::var("HOME").context("HOME environment variable not set")?;
            Ok(PathBuf::from(home).join(stripped))
        } else {
            Ok(PathBuf::from(path))
        }
    }
}

const DEFAULT_CONFIG: &str = r#"[hotkey]
modifiers = ["Control", "Option"]
key = "Z"
cancel_key = "Escape"

[audio]
# input_device = "MacBook Pro Microphone"

[model]
name = "small"
path = "~/.speakez/models/ggml-small.bin"
threads = 4
beam_size = 5
# language = "en"
# vocabulary = "Speakez, CGEvent, whisper"

[telemetry]
enabled = true
log_path = "~/.speakez/speakez.log"
"#;

/// Observer invoked with the new config after a change
pub type ConfigObserver = Box<dyn Fn(&Config) + Send>;

/// Explicitly constructed settings value with change notification.
///
/// Components read the config once at construction; anything that needs to
/// react to changes registers an observer instead of polling shared state.
pub struct Settings {
    current: Config,
    observers: Vec<ConfigObserver>,
}

impl Settings {
    /// Wrap a loaded config
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            current: config,
            observers: Vec::new(),
        }
    }

    /// The current configuration
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.current
    }

    /// Register a change observer
    pub fn subscribe(&mut self, observer: impl Fn(&Config) + Send + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Replace the configuration and notify every observer
    pub fn replace(&mut self, config: Config) {
        self.current = config;
        for observer in &self.observers {
            observer(&self.current);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_default_config_parses() {
        let config: Config = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.hotkey.key, "Z");
        assert_eq!(config.hotkey.cancel_key, "Escape");
        assert!(config.audio.input_device.is_none());
        assert_eq!(config.model.name, "small");
        assert_eq!(config.model.threads, 4);
        assert!(config.model.language.is_none());
        assert!(config.telemetry.enabled);
    }

    #[test]
    fn test_optional_fields_deserialize() {
        let toml_str = r#"
            [hotkey]
            modifiers = ["Command"]
            key = "D"
            cancel_key = "Escape"

            [audio]
            input_device = "USB Microphone"
            debug_wav_path = "/tmp/last.wav"

            [model]
            name = "tiny"
            path = "/tmp/ggml-tiny.bin"
            threads = 2
            beam_size = 1
            language = "en"
            vocabulary = "Speakez"

            [telemetry]
            enabled = false
            log_path = ""
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.audio.input_device.as_deref(), Some("USB Microphone"));
        assert_eq!(config.model.language.as_deref(), Some("en"));
        assert_eq!(config.model.vocabulary.as_deref(), Some("Speakez"));
    }

    #[test]
    fn test_expand_path_with_tilde() {
        let home = std::env::var("HOME").unwrap();
        let result = Config::expand_path("~/models/x.bin").unwrap();
        assert_eq!(result, PathBuf::from(home).join("models/x.bin"));
    }

    #[test]
    fn test_expand_path_absolute() {
        let result = Config::expand_path("/var/tmp/x.bin").unwrap();
        assert_eq!(result, PathBuf::from("/var/tmp/x.bin"));
    }

    #[test]
    fn test_settings_notifies_observers() {
        let base: Config = toml::from_str(DEFAULT_CONFIG).unwrap();
        let mut settings = Settings::new(base.clone());

        let notified = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&notified);
        settings.subscribe(move |config| {
            assert_eq!(config.model.name, "tiny");
            counter.fetch_add(1, Ordering::Relaxed);
        });

        let mut updated = base;
        updated.model.name = "tiny".to_owned();
        settings.replace(updated);

        assert_eq!(notified.load(Ordering::Relaxed), 1);
        assert_eq!(settings.config().model.name, "tiny");
    }

    #[test]
    fn test_observer_forwards_reloadable_fields() {
        let base: Config = toml::from_str(DEFAULT_CONFIG).unwrap();
        let mut settings = Settings::new(base.clone());

        // Mirrors the runtime wiring: the observer ships the hot-reloadable
        // fields through a channel for the owning loop to apply
        let (tx, rx) = std::sync::mpsc::channel();
        settings.subscribe(move |config| {
            let _ = tx.send((
                config.model.vocabulary.clone(),
                config.audio.debug_wav_path.clone(),
            ));
        });

        let mut updated = base;
        updated.model.vocabulary = Some("Speakez, CGEvent".to_owned());
        updated.audio.debug_wav_path = Some("/tmp/last.wav".to_owned());
        settings.replace(updated);

        let (vocabulary, debug_wav) = rx.try_recv().unwrap();
        assert_eq!(vocabulary.as_deref(), Some("Speakez, CGEvent"));
        assert_eq!(debug_wav.as_deref(), Some("/tmp/last.wav"));
        assert!(rx.try_recv().is_err());
    }
}
