//! Hotkey detection module
//!
//! On Linux, provides kernel-level key event detection using evdev.
//! This works on all Wayland compositors because it operates at the
//! Linux input subsystem level.
//!
//! The listener translates physical key presses into the two abstract
//! signals the orchestrator understands: toggle and stop. When built-in
//! detection is disabled, the daemon accepts the same signals via
//! SIGUSR1/SIGUSR2 from compositor keybindings.
//!
//! Linux: requires the user to be in the 'input' group.

#[cfg(target_os = "linux")]
pub mod evdev_listener;

use crate::config::HotkeyConfig;
use crate::error::HotkeyError;
use tokio::sync::mpsc;

/// Abstract signals delivered by the hotkey source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyEvent {
    /// Start a recording, or finish the one in progress
    Toggle,
    /// Force-stop the recording in progress
    Stop,
}

/// Trait for hotkey detection implementations
#[async_trait::async_trait]
pub trait HotkeyListener: Send + Sync {
    /// Start listening for hotkey events.
    /// Returns a channel receiver for events.
    async fn start(&mut self) -> Result<mpsc::Receiver<HotkeyEvent>, HotkeyError>;

    /// Stop listening and clean up
    async fn stop(&mut self) -> Result<(), HotkeyError>;
}

/// Factory function to create the appropriate hotkey listener
#[cfg(target_os = "linux")]
pub fn create_listener(config: &HotkeyConfig) -> Result<Box<dyn HotkeyListener>, HotkeyError> {
    Ok(Box::new(evdev_listener::EvdevListener::new(config)?))
}

/// Built-in hotkey detection is Linux-only; elsewhere, use the signal
/// interface (SIGUSR1/SIGUSR2) with system keybindings instead.
#[cfg(not(target_os = "linux"))]
pub fn create_listener(_config: &HotkeyConfig) -> Result<Box<dyn HotkeyListener>, HotkeyError> {
    Err(HotkeyError::Evdev(
        "Built-in hotkey detection is only supported on Linux. \
         Bind SIGUSR1/SIGUSR2 to system shortcuts instead."
            .to_string(),
    ))
}
