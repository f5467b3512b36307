//! Daemon module - main event loop orchestration
//!
//! Binds hotkey events and Unix signals to the recording orchestrator and
//! mirrors its status snapshot into the state file for external consumers.

use crate::audio;
use crate::clipboard::WaylandClipboard;
use crate::clock::SystemClock;
use crate::config::Config;
use crate::error::Result;
use crate::hotkey::{self, HotkeyEvent};
use crate::orchestrator::Orchestrator;
use crate::rewrite;
use crate::transcribe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};

/// Write state to file for external integrations (e.g., Waybar)
fn write_state_file(path: &PathBuf, state: &str) {
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            tracing::warn!("Failed to create state file directory: {}", e);
            return;
        }
    }

    if let Err(e) = std::fs::write(path, state) {
        tracing::warn!("Failed to write state file: {}", e);
    } else {
        tracing::trace!("State file updated: {}", state);
    }
}

/// Remove state file on shutdown
fn cleanup_state_file(path: &PathBuf) {
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            tracing::warn!("Failed to remove state file: {}", e);
        }
    }
}

/// Write PID file for external control via signals
fn write_pid_file() -> Option<PathBuf> {
    let pid_path = Config::runtime_dir().join("pid");

    if let Some(parent) = pid_path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            tracing::warn!("Failed to create PID file directory: {}", e);
            return None;
        }
    }

    let pid = std::process::id();
    if let Err(e) = std::fs::write(&pid_path, pid.to_string()) {
        tracing::warn!("Failed to write PID file: {}", e);
        return None;
    }

    tracing::debug!("PID file written: {:?} (pid={})", pid_path, pid);
    Some(pid_path)
}

/// Remove PID file on shutdown
fn cleanup_pid_file(path: &PathBuf) {
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            tracing::warn!("Failed to remove PID file: {}", e);
        }
    }
}

/// Main daemon that wires hotkeys and signals to the orchestrator
pub struct Daemon {
    config: Config,
    state_file_path: Option<PathBuf>,
    pid_file_path: Option<PathBuf>,
}

impl Daemon {
    pub fn new(config: Config) -> Self {
        let state_file_path = config.resolve_state_file();

        Self {
            config,
            state_file_path,
            pid_file_path: None,
        }
    }

    /// Update the state file if configured
    fn update_state(&self, state_word: &str) {
        if let Some(ref path) = self.state_file_path {
            write_state_file(path, state_word);
        }
    }

    /// Run the daemon main loop
    pub async fn run(&mut self) -> Result<()> {
        tracing::info!("Starting diktat daemon");

        self.pid_file_path = write_pid_file();

        // Signal handlers for external control and graceful shutdown
        let mut sigusr1 = signal(SignalKind::user_defined1())
            .map_err(|e| crate::error::DiktatError::Config(format!("SIGUSR1 handler: {}", e)))?;
        let mut sigusr2 = signal(SignalKind::user_defined2())
            .map_err(|e| crate::error::DiktatError::Config(format!("SIGUSR2 handler: {}", e)))?;
        let mut sigterm = signal(SignalKind::terminate())
            .map_err(|e| crate::error::DiktatError::Config(format!("SIGTERM handler: {}", e)))?;

        if let Some(ref path) = self.state_file_path {
            tracing::info!("State file: {:?}", path);
        }

        // Build the orchestrator with the production collaborators
        let clipboard = Box::new(WaylandClipboard::new());
        let capture = audio::create_capture(&self.config.audio)?;
        let transcriber = transcribe::create_transcriber(&self.config.transcription)?;
        let rewriter = rewrite::create_rewriter(&self.config.rewrite)?;

        let mut orchestrator = Orchestrator::new(
            &self.config,
            clipboard,
            capture,
            transcriber,
            rewriter,
            Arc::new(SystemClock),
        )?;

        // Hotkey listener (if enabled)
        let mut hotkey_listener = if self.config.hotkey.enabled {
            tracing::info!(
                "Hotkeys: toggle={}, stop={}",
                self.config.hotkey.toggle_key,
                self.config.hotkey.stop_key
            );
            Some(hotkey::create_listener(&self.config.hotkey)?)
        } else {
            tracing::info!(
                "Built-in hotkeys disabled, listening on SIGUSR1 (toggle) / SIGUSR2 (stop)"
            );
            None
        };

        let mut hotkey_rx = if let Some(ref mut listener) = hotkey_listener {
            Some(listener.start().await?)
        } else {
            None
        };

        // Recording timeout
        let max_duration = Duration::from_secs(self.config.audio.max_duration_secs as u64);

        self.update_state("idle");

        // Main event loop: one orchestrator, one logical thread of control.
        // Hotkey events arriving while a session is mid-transcription queue
        // on the channel and hit the orchestrator's no-op guards.
        loop {
            tokio::select! {
                // Hotkey events (only if the listener is enabled)
                Some(hotkey_event) = async {
                    match &mut hotkey_rx {
                        Some(rx) => rx.recv().await,
                        None => std::future::pending().await,
                    }
                } => {
                    match hotkey_event {
                        HotkeyEvent::Toggle => orchestrator.toggle().await,
                        HotkeyEvent::Stop => orchestrator.stop().await,
                    }
                }

                // Safety timeout for runaway recordings
                _ = tokio::time::sleep(Duration::from_millis(100)),
                    if orchestrator.recording_duration().is_some() =>
                {
                    if let Some(duration) = orchestrator.recording_duration() {
                        if duration > max_duration {
                            tracing::warn!(
                                "Recording timeout ({:.0}s limit), stopping",
                                max_duration.as_secs_f32()
                            );
                            orchestrator.stop().await;
                        }
                    }
                }

                // SIGUSR1: toggle recording (compositor keybindings)
                _ = sigusr1.recv() => {
                    tracing::debug!("Received SIGUSR1 (toggle)");
                    orchestrator.toggle().await;
                }

                // SIGUSR2: stop recording (compositor keybindings)
                _ = sigusr2.recv() => {
                    tracing::debug!("Received SIGUSR2 (stop)");
                    orchestrator.stop().await;
                }

                // Graceful shutdown (SIGINT from Ctrl+C)
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Received SIGINT, shutting down...");
                    break;
                }

                // Graceful shutdown (SIGTERM from systemctl stop)
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM, shutting down...");
                    break;
                }
            }

            let status = orchestrator.status();
            self.update_state(status.phase.as_state_word());
            if let Some(ref error) = status.last_error {
                tracing::debug!("Last session error: {}", error);
            }
        }

        // Cleanup
        if let Some(mut listener) = hotkey_listener {
            listener.stop().await?;
        }

        if let Some(ref path) = self.state_file_path {
            cleanup_state_file(path);
        }
        if let Some(ref path) = self.pid_file_path {
            cleanup_pid_file(path);
        }

        tracing::info!("Daemon stopped");

        Ok(())
    }
}
