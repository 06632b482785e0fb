//! Global hotkey registration.
//!
//! Maps raw `global-hotkey` events to the discrete push-to-talk signals
//! the controller consumes. The press/release state machine lives in the
//! controller; this layer only translates.

use anyhow::{anyhow, Context, Result};
use global_hotkey::{
    hotkey::{Code, HotKey, Modifiers},
    GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState,
};
use tracing::info;

use crate::config::HotkeyConfig;

/// Discrete push-to-talk signals delivered to the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeySignal {
    /// Talk key went down: start recording
    Pressed,
    /// Talk key came up: stop and transcribe
    Released,
    /// Cancel key went down: stop and discard
    Cancelled,
}

/// Registered global hotkeys for one process
pub struct HotkeyListener {
    manager: GlobalHotKeyManager,
    talk: HotKey,
    cancel: HotKey,
}

impl HotkeyListener {
    /// Register the talk and cancel hotkeys from config
    ///
    /// # Errors
    /// Returns error if registration fails or the config names an unknown
    /// modifier or key
    pub fn new(config: &HotkeyConfig) -> Result<Self> {
        let manager = GlobalHotKeyManager::new().context("failed to create hotkey manager")?;

        let modifiers = parse_modifiers(&config.modifiers)?;
        let talk = HotKey::new(Some(modifiers), parse_key(&config.key)?);
        let cancel = HotKey::new(Some(modifiers), parse_key(&config.cancel_key)?);

        manager
            .register(talk)
            .context("failed to register talk hotkey")?;
        if let Err(err) = manager.register(cancel) {
            // Keep registration all-or-nothing
            let _ = manager.unregister(talk);
            return Err(err).context("failed to register cancel hotkey");
        }

        info!(
            modifiers = ?config.modifiers,
            key = %config.key,
            cancel_key = %config.cancel_key,
            "registered hotkeys"
        );

        Ok(Self {
            manager,
            talk,
            cancel,
        })
    }

    /// Translate a raw event into a push-to-talk signal, if it concerns us
    #[must_use]
    pub fn map_event(&self, event: &GlobalHotKeyEvent) -> Option<HotkeySignal> {
        if event.id == self.talk.id() {
            return Some(match event.state {
                HotKeyState::Pressed => HotkeySignal::Pressed,
                HotKeyState::Released => HotkeySignal::Released,
            });
        }
        if event.id == self.cancel.id() && event.state == HotKeyState::Pressed {
            return Some(HotkeySignal::Cancelled);
        }
        None
    }
}

impl Drop for HotkeyListener {
    fn drop(&mut self) {
        for hotkey in [self.talk, self.cancel] {
            if let Err(err) = self.manager.unregister(hotkey) {
                tracing::error!("failed to unregister hotkey: {}", err);
            }
        }
    }
}

fn parse_modifiers(modifiers: &[String]) -> Result<Modifiers> {
    let mut result = Modifiers::empty();
    for modifier in modifiers {
        match modifier.as_str() {
            "Control" | "Ctrl" => result |= Modifiers::CONTROL,
            "Option" | "Alt" => result |= Modifiers::ALT,
            "Command" | "Super" => result |= Modifiers::SUPER,
            "Shift" => result |= Modifiers::SHIFT,
            _ => return Err(anyhow!("unknown modifier: {}", modifier)),
        }
    }
    Ok(result)
}

fn parse_key(key: &str) -> Result<Code> {
    match key {
        "A" => Ok(Code::KeyA),
        "B" => Ok(Code::KeyB),
        "C" => Ok(Code::KeyC),
        "D" => Ok(Code::KeyD),
        "E" => Ok(Code::KeyE),
        "F" => Ok(Code::KeyF),
        "G" => Ok(Code::KeyG),
        "H" => Ok(Code::KeyH),
        "I" => Ok(Code::KeyI),
        "J" => Ok(Code::KeyJ),
        "K" => Ok(Code::KeyK),
        "L" => Ok(Code::KeyL),
        "M" => Ok(Code::KeyM),
        "N" => Ok(Code::KeyN),
        "O" => Ok(Code::KeyO),
        "P" => Ok(Code::KeyP),
        "Q" => Ok(Code::KeyQ),
        "R" => Ok(Code::KeyR),
        "S" => Ok(Code::KeyS),
        "T" => Ok(Code::KeyT),
        "U" => Ok(Code::KeyU),
        "V" => Ok(Code::KeyV),
        "W" => Ok(Code::KeyW),
        "X" => Ok(Code::KeyX),
        "Y" => Ok(Code::KeyY),
        "Z" => Ok(Code::KeyZ),
        "Escape" | "Esc" => Ok(Code::Escape),
        "Space" => Ok(Code::Space),
        _ => Err(anyhow!("unsupported key: {}", key)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_modifiers_aliases() {
        let parsed =
            parse_modifiers(&["Ctrl".to_owned(), "Alt".to_owned(), "Shift".to_owned()]).unwrap();
        assert!(parsed.contains(Modifiers::CONTROL));
        assert!(parsed.contains(Modifiers::ALT));
        assert!(parsed.contains(Modifiers::SHIFT));
        assert!(!parsed.contains(Modifiers::SUPER));
    }

    #[test]
    fn test_parse_modifiers_unknown() {
        assert!(parse_modifiers(&["Hyper".to_owned()]).is_err());
    }

    #[test]
    fn test_parse_key_letters_and_escape() {
        assert_eq!(parse_key("Z").unwrap(), Code::KeyZ);
        assert_eq!(parse_key("Escape").unwrap(), Code::Escape);
        assert_eq!(parse_key("Esc").unwrap(), Code::Escape);
        assert!(parse_key("F13").is_err());
    }
}
