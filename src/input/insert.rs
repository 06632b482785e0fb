//! Text insertion at the cursor.
//!
//! Uses `CGEventKeyboardSetUnicodeString` to simulate keyboard input on
//! macOS. Requires Input Monitoring permission, verified at startup. Some
//! apps block CGEvent insertion (secure input); those failures are silent
//! by platform design.

use thiserror::Error;
#[cfg(target_os = "macos")]
use tracing::{error, info};

use crate::controller::TextInserter;

/// Text insertion errors
#[derive(Debug, Error)]
pub enum InsertError {
    /// Failed to create the CGEvent source (permission likely revoked)
    #[error("failed to create CGEvent source")]
    EventSourceCreation,

    /// Failed to create the keyboard CGEvent
    #[error("failed to create keyboard CGEvent")]
    EventCreation,

    /// Text is empty
    #[error("text is empty")]
    EmptyText,

    /// Insertion is not supported on this platform
    #[error("text insertion not supported on this platform")]
    Unsupported,
}

/// Preview of text for logging: truncates >50 chars on a char boundary
#[must_use]
pub fn text_preview(text: &str) -> String {
    if text.len() > 50 {
        let mut end = 47.min(text.len());
        while end > 0 && !text.is_char_boundary(end) {
            end -= 1;
        }
        if end == 0 {
            return "...".to_owned();
        }
        format!("{}...", &text[..end])
    } else {
        text.to_owned()
    }
}

/// Insert text at the current cursor position
///
/// # Errors
/// Returns error if the text is empty or CGEvent creation fails
#[cfg(target_os = "macos")]
pub fn insert_text(text: &str) -> Result<(), InsertError> {
    use core_graphics::event::{CGEvent, CGEventTapLocation};
    use core_graphics::event_source::{CGEventSource, CGEventSourceStateID};

    if text.is_empty() {
        return Err(InsertError::EmptyText);
    }

    let source = CGEventSource::new(CGEventSourceStateID::HIDSystemState).map_err(|()| {
        error!("CGEventSource creation failed - Input Monitoring permission may be revoked");
        InsertError::EventSourceCreation
    })?;

    // Dummy keycode; the unicode string below overrides it
    let event =
        CGEvent::new_keyboard_event(source, 0, true).map_err(|()| InsertError::EventCreation)?;

    // encode_utf16 on &str always yields valid UTF-16, which is what
    // set_string_from_utf16_unchecked requires.
    let utf16: Vec<u16> = text.encode_utf16().collect();
    event.set_string_from_utf16_unchecked(&utf16);

    // post() reports nothing; a target app with secure input enabled fails
    // silently.
    event.post(CGEventTapLocation::HID);

    info!(
        text_len = text.len(),
        text_preview = %text_preview(text),
        "posted text to HID system"
    );
    Ok(())
}

/// Insert text at the current cursor position
///
/// # Errors
/// Always returns [`InsertError::Unsupported`] off macOS
#[cfg(not(target_os = "macos"))]
pub fn insert_text(text: &str) -> Result<(), InsertError> {
    if text.is_empty() {
        return Err(InsertError::EmptyText);
    }
    Err(InsertError::Unsupported)
}

/// CGEvent-backed inserter used in production
pub struct CursorInserter;

impl TextInserter for CursorInserter {
    fn insert(&self, text: &str) -> Result<(), InsertError> {
        insert_text(text)
    }
}
