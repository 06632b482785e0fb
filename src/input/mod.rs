//! Input handling: global hotkey signals and text insertion.

/// Global hotkey registration and signal mapping
pub mod hotkey;
/// Text insertion at the cursor via CGEvent
pub mod insert;
