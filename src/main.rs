//! Speakez entry point: wire the config, audio pipeline, transcription
//! engine, and hotkey loop together.

use anyhow::{Context, Result};
use global_hotkey::GlobalHotKeyEvent;
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};

use speakez::audio::session::CaptureSession;
use speakez::audio::source::{AudioSource, CpalSource};
use speakez::config::{Config, Settings};
use speakez::controller::{Outcome, RecordingController};
use speakez::input::hotkey::{HotkeyListener, HotkeySignal};
use speakez::input::insert::CursorInserter;
use speakez::transcription::{ensure_model_downloaded, WhisperEngine};
use speakez::{permissions, telemetry};

#[tokio::main]
#[allow(clippy::print_stdout)] // Startup status lines before logging takes over
async fn main() -> Result<()> {
    let config = Config::load()?;
    println!("✓ Config loaded from ~/.speakez.toml");

    telemetry::init(config.telemetry.enabled, &config.telemetry.log_path)?;
    info!("speakez starting");
    println!("✓ Logging initialized");

    permissions::request_all_permissions()?;
    println!("✓ Permissions OK");

    // Model download and load both block; keep them off the runtime threads
    let model_name = config.model.name.clone();
    let model_path = Config::expand_path(&config.model.path)?;
    let threads = config.model.threads;
    let beam_size = config.model.beam_size;
    let language = config.model.language.clone();
    let engine = tokio::task::spawn_blocking(move || -> Result<WhisperEngine> {
        ensure_model_downloaded(&model_name, &model_path)?;
        let engine = WhisperEngine::new(&model_path, threads, beam_size, language)?;
        Ok(engine)
    })
    .await
    .context("model load task panicked")??;
    println!("✓ Whisper model loaded");

    let source = CpalSource::new(config.audio.input_device.as_deref())?;
    match source.list_devices() {
        Ok(devices) => {
            let names: Vec<_> = devices.into_iter().map(|d| d.name).collect();
            info!(selected = %source.device_name(), available = ?names, "input device");
        }
        Err(err) => warn!("failed to enumerate input devices: {}", err),
    }
    let session = CaptureSession::new(source);
    let mut controller =
        RecordingController::new(session, Arc::new(engine), Arc::new(CursorInserter));
    controller.set_vocabulary(config.model.vocabulary.clone());
    if let Some(path) = &config.audio.debug_wav_path {
        controller.set_debug_wav(Some(Config::expand_path(path)?));
    }
    println!("✓ Audio pipeline ready");

    let listener = HotkeyListener::new(&config.hotkey)?;
    println!(
        "✓ Hotkey registered: {:?} + {} (cancel: {})",
        config.hotkey.modifiers, config.hotkey.key, config.hotkey.cancel_key
    );

    // The settings value owns the config from here on. SIGHUP reloads the
    // file; the observer forwards the fields that can change without a
    // restart, and the loop below applies them to the controller.
    let mut settings = Settings::new(config);
    let (updates_tx, updates_rx) = std::sync::mpsc::channel();
    settings.subscribe(move |config| {
        let _ = updates_tx.send((
            config.model.vocabulary.clone(),
            config.audio.debug_wav_path.clone(),
        ));
    });
    let mut reload = signal(SignalKind::hangup()).context("failed to install SIGHUP handler")?;

    info!("event loop starting (press Ctrl+C to exit)");
    println!("\nSpeakez is running. Hold the hotkey to dictate.");
    println!("Press Ctrl+C to exit.\n");

    let receiver = GlobalHotKeyEvent::receiver();
    loop {
        if let Ok(event) = receiver.try_recv() {
            match listener.map_event(&event) {
                Some(HotkeySignal::Pressed) => {
                    if let Err(err) = controller.key_down() {
                        error!("failed to start recording: {}", err);
                    }
                }
                Some(HotkeySignal::Released) => match controller.key_up().await {
                    Ok(Outcome::Inserted(text)) => {
                        info!(text_len = text.len(), "inserted transcription");
                    }
                    Ok(Outcome::NoSpeech) => info!("no speech detected"),
                    Ok(Outcome::TooShort | Outcome::NoAudio) => {
                        info!("recording discarded (too short or empty)");
                    }
                    Ok(Outcome::Cancelled | Outcome::Ignored) => {}
                    Err(err) => error!("transcription failed: {}", err),
                },
                Some(HotkeySignal::Cancelled) => {
                    if controller.cancel() == Outcome::Cancelled {
                        warn!("recording cancelled");
                    }
                }
                None => {}
            }
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                println!("\nShutting down...");
                break;
            }
            _ = reload.recv() => {
                match Config::load() {
                    Ok(new_config) => {
                        info!("configuration reloaded");
                        settings.replace(new_config);
                    }
                    Err(err) => error!("config reload failed: {}", err),
                }
            }
            // 10ms poll interval avoids busy-waiting on the hotkey channel
            () = tokio::time::sleep(tokio::time::Duration::from_millis(10)) => {}
        }

        // Changes that do not need a restart take effect between cycles;
        // hotkeys, device, and model keep their startup values until then.
        while let Ok((vocabulary, debug_wav)) = updates_rx.try_recv() {
            controller.set_vocabulary(vocabulary);
            match debug_wav.as_deref().map(Config::expand_path).transpose() {
                Ok(path) => controller.set_debug_wav(path),
                Err(err) => warn!("invalid debug WAV path in reloaded config: {}", err),
            }
        }
    }

    Ok(())
}
