//! Shared clipboard bridge
//!
//! Wraps the Wayland clipboard tools (wl-paste, wl-copy) and key injection
//! via ydotool behind one trait so the orchestrator and mode detector can
//! run against stubs in tests.
//!
//! `trigger_copy` injects Ctrl+C into the focused window: if the user has
//! text selected somewhere, that selection lands on the clipboard, which is
//! the only platform-agnostic signal that a fresh selection exists.
//!
//! Requires: wl-clipboard and ydotool installed, ydotoold daemon running.

use crate::error::ClipboardError;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Trait for clipboard access and copy/ESC key injection
#[async_trait::async_trait]
pub trait ClipboardBridge: Send + Sync {
    /// Read the current clipboard text. An empty clipboard yields an
    /// empty string, not an error.
    async fn read(&self) -> Result<String, ClipboardError>;

    /// Write text to the clipboard
    async fn write(&self, text: &str) -> Result<(), ClipboardError>;

    /// Issue an OS-level copy action on whatever is currently selected,
    /// without knowing whether anything is selected
    async fn trigger_copy(&self) -> Result<(), ClipboardError>;

    /// Best-effort: drop active selections in other windows so a stale
    /// highlight is not re-copied next session
    async fn clear_selections(&self) -> Result<(), ClipboardError>;
}

/// Wayland clipboard implementation (wl-paste / wl-copy / ydotool)
pub struct WaylandClipboard;

impl WaylandClipboard {
    pub fn new() -> Self {
        Self
    }

    /// Inject a key chord via ydotool, given press/release event codes
    async fn inject_keys(&self, events: &[&str]) -> Result<(), ClipboardError> {
        let output = Command::new("ydotool")
            .arg("key")
            .args(events)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| ClipboardError::CopyTriggerFailed(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ClipboardError::CopyTriggerFailed(stderr.to_string()));
        }

        Ok(())
    }
}

impl Default for WaylandClipboard {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ClipboardBridge for WaylandClipboard {
    async fn read(&self) -> Result<String, ClipboardError> {
        let output = Command::new("wl-paste")
            .arg("--no-newline")
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ClipboardError::WlPasteNotFound
                } else {
                    ClipboardError::ReadFailed(e.to_string())
                }
            })?;

        // wl-paste exits non-zero when the clipboard holds no text;
        // that is a valid empty clipboard, not a failure
        if !output.status.success() {
            return Ok(String::new());
        }

        String::from_utf8(output.stdout)
            .map_err(|e| ClipboardError::ReadFailed(format!("Non-UTF8 clipboard: {}", e)))
    }

    async fn write(&self, text: &str) -> Result<(), ClipboardError> {
        let mut child = Command::new("wl-copy")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ClipboardError::WlCopyNotFound
                } else {
                    ClipboardError::WriteFailed(e.to_string())
                }
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .await
                .map_err(|e| ClipboardError::WriteFailed(e.to_string()))?;
            drop(stdin);
        }

        let status = child
            .wait()
            .await
            .map_err(|e| ClipboardError::WriteFailed(e.to_string()))?;

        if !status.success() {
            return Err(ClipboardError::WriteFailed(
                "wl-copy exited with error".to_string(),
            ));
        }

        tracing::debug!("Clipboard written ({} chars)", text.len());
        Ok(())
    }

    async fn trigger_copy(&self) -> Result<(), ClipboardError> {
        // 29 = KEY_LEFTCTRL, 46 = KEY_C; key_code:1 press, key_code:0 release
        self.inject_keys(&["29:1", "46:1", "46:0", "29:0"]).await
    }

    async fn clear_selections(&self) -> Result<(), ClipboardError> {
        // 1 = KEY_ESC
        self.inject_keys(&["1:1", "1:0"]).await
    }
}
