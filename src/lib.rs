//! Diktat: voice dictation and AI-assisted text editing for the clipboard
//!
//! This library provides the core functionality for:
//! - Detecting hotkey presses via evdev (kernel-level, works on all compositors)
//! - Deciding per recording between plain dictation and command-on-selection
//!   by diffing the clipboard across a triggered copy
//! - Capturing audio via cpal (supports PipeWire, PulseAudio, ALSA)
//! - Transcribing speech through a remote endpoint with escalating retries
//! - Rewriting selected text through a remote endpoint, with a local
//!   fast-track for deterministic commands
//! - Writing results back to the clipboard without echo feedback loops
//!
//! # Architecture
//!
//! ```text
//!  hotkey / SIGUSR1 ──▶ Daemon ──▶ Orchestrator (session state machine)
//!                                       │
//!                        ┌──────────────┼────────────────┐
//!                        ▼              ▼                ▼
//!                  Mode Detector   Audio Capture   Retry Engine
//!                  (clipboard      (cpal)          (remote speech-to-text)
//!                   diff + echo                          │
//!                   guard)                               ▼
//!                        │                    dictation │ command
//!                        │                              ▼
//!                        │                    Command Dispatcher
//!                        │                    (fast-track / rewrite endpoint)
//!                        └──────────────┬───────────────┘
//!                                       ▼
//!                              clipboard write + echo stamp
//! ```

pub mod audio;
pub mod clipboard;
pub mod clock;
pub mod command;
pub mod config;
pub mod daemon;
pub mod detect;
pub mod error;
pub mod hotkey;
pub mod orchestrator;
pub mod rewrite;
pub mod state;
pub mod transcribe;

pub use config::Config;
pub use daemon::Daemon;
pub use error::{DiktatError, Result};
pub use orchestrator::Orchestrator;
