//! Error types for diktat
//!
//! Uses thiserror for ergonomic error definitions with clear messages
//! that guide users toward fixing common issues.

use thiserror::Error;

/// Top-level error type for the diktat application
#[derive(Error, Debug)]
pub enum DiktatError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Hotkey error: {0}")]
    Hotkey(#[from] HotkeyError),

    #[error("Audio capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Clipboard error: {0}")]
    Clipboard(#[from] ClipboardError),

    #[error("Transcription error: {0}")]
    Transcribe(#[from] TranscribeError),

    #[error("Rewrite error: {0}")]
    Rewrite(#[from] RewriteError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to hotkey detection
#[derive(Error, Debug)]
pub enum HotkeyError {
    #[error("Cannot open input device '{0}'. Is the user in the 'input' group?\n  Run: sudo usermod -aG input $USER\n  Then log out and back in.")]
    DeviceAccess(String),

    #[error("Unknown key name: '{0}'. Use evtest or wev to find valid key names.")]
    UnknownKey(String),

    #[error("No keyboard device found in /dev/input/")]
    NoKeyboard,

    #[error("evdev error: {0}")]
    Evdev(String),
}

/// Errors related to the shared clipboard
#[derive(Error, Debug)]
pub enum ClipboardError {
    #[error("wl-paste not found in PATH. Install wl-clipboard via your package manager.")]
    WlPasteNotFound,

    #[error("wl-copy not found in PATH. Install wl-clipboard via your package manager.")]
    WlCopyNotFound,

    #[error("Clipboard read failed: {0}")]
    ReadFailed(String),

    #[error("Clipboard write failed: {0}")]
    WriteFailed(String),

    #[error("Copy-selection trigger failed: {0}")]
    CopyTriggerFailed(String),
}

/// Errors related to audio capture
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Microphone access denied. Check your audio permissions.")]
    PermissionDenied,

    #[error("Audio device not found: '{0}'. List devices with: pactl list sources short")]
    DeviceNotFound(String),

    #[error("Audio connection failed: {0}")]
    Connection(String),

    #[error("Audio stream error: {0}")]
    Stream(String),

    #[error("No audio was captured. Check your microphone.")]
    EmptyRecording,

    #[error("Capture stop timed out after {0} seconds")]
    Timeout(u32),
}

/// Errors returned by the remote transcription endpoint,
/// classified by failure mode so retry policy can reason about them
#[derive(Error, Debug)]
pub enum TranscribeError {
    #[error("Endpoint rejected the audio payload: {0}")]
    BadInput(String),

    #[error("Endpoint rate limit hit: {0}")]
    RateLimited(String),

    #[error("Remote server error: {0}")]
    Server(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Endpoint returned an empty transcript")]
    EmptyResult,

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Errors returned by the remote rewrite endpoint
#[derive(Error, Debug)]
pub enum RewriteError {
    #[error("Endpoint rejected the rewrite request: {0}")]
    BadInput(String),

    #[error("Endpoint rate limit hit: {0}")]
    RateLimited(String),

    #[error("Remote server error: {0}")]
    Server(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Endpoint returned an empty rewrite")]
    EmptyResult,

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using DiktatError
pub type Result<T> = std::result::Result<T, DiktatError>;

#[cfg(target_os = "linux")]
impl From<evdev::Error> for HotkeyError {
    fn from(e: evdev::Error) -> Self {
        HotkeyError::Evdev(e.to_string())
    }
}
