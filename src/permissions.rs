//! Startup permission preflight.
//!
//! macOS gates microphone capture, global event posting, and keyboard
//! simulation behind separate privacy permissions. Probing them up front
//! turns a silent mid-session failure into an actionable startup error.

use anyhow::Result;

/// Check microphone permission
///
/// # Errors
/// Currently never returns error; macOS prompts on first capture
#[allow(clippy::unnecessary_wraps)] // Consistent API with the other permission checks
pub fn check_microphone_permission() -> Result<()> {
    tracing::info!("checking microphone permission");

    // macOS prompts automatically on the first CoreAudio capture; there is
    // no reliable way to probe without starting a stream.
    tracing::warn!("microphone permission will be requested on first audio capture");

    Ok(())
}

/// Check accessibility permission, needed for posting events to other apps
///
/// # Errors
/// Returns error if accessibility permission is denied (macOS only)
pub fn check_accessibility_permission() -> Result<()> {
    tracing::info!("checking accessibility permission");

    #[cfg(target_os = "macos")]
    {
        let source = core_graphics::event_source::CGEventSource::new(
            core_graphics::event_source::CGEventSourceStateID::CombinedSessionState,
        );

        if source.is_err() {
            anyhow::bail!(
                "accessibility permission denied - enable in System Settings > Privacy & Security > Accessibility"
            );
        }

        tracing::info!("accessibility permission granted");
    }

    Ok(())
}

/// Check Input Monitoring permission, needed for global hotkeys and
/// CGEvent text insertion
///
/// # Errors
/// Returns error if Input Monitoring permission is denied (macOS only)
pub fn check_input_monitoring_permission() -> Result<()> {
    tracing::info!("checking input monitoring permission");

    #[cfg(target_os = "macos")]
    {
        use core_graphics::event::CGEvent;
        use core_graphics::event_source::{CGEventSource, CGEventSourceStateID};

        // HIDSystemState sources require Input Monitoring
        let source = CGEventSource::new(CGEventSourceStateID::HIDSystemState).map_err(|()| {
            anyhow::anyhow!(
                "Input Monitoring permission denied\n\n\
                Enable in: System Settings → Privacy & Security → Input Monitoring\n\
                Add and enable Speakez, then restart.\n"
            )
        })?;

        // Creating a keyboard event exercises the full permission chain
        CGEvent::new_keyboard_event(source, 0, true).map_err(|()| {
            anyhow::anyhow!(
                "Failed to create CGEvent - Input Monitoring may be restricted\n\n\
                Enable in: System Settings → Privacy & Security → Input Monitoring\n"
            )
        })?;

        tracing::info!("input monitoring permission granted");
    }

    Ok(())
}

/// Run every permission check before any subsystem starts
///
/// # Errors
/// Returns error if any permission check fails
pub fn request_all_permissions() -> Result<()> {
    tracing::info!("requesting all permissions");

    check_microphone_permission()?;
    check_accessibility_permission()?;
    check_input_monitoring_permission()?;

    tracing::info!("all permissions checked");
    Ok(())
}
