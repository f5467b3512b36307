//! Session state for the recording orchestrator
//!
//! Defines the phases of one capture session:
//! Idle → Recording → Transcribing → (RewritingText) → Idle
//! with a short Detecting window while the mode probe runs.

use std::time::Instant;

/// Phase of the current session. Exactly one phase is active at any instant;
/// sessions never overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for a toggle signal
    Idle,
    /// Probing the clipboard to decide the session mode
    Detecting,
    /// Microphone capture in progress
    Recording,
    /// Audio handed to the transcription endpoint
    Transcribing,
    /// Transcript handed to the rewrite endpoint
    RewritingText,
}

impl Phase {
    /// Single-word form written to the state file for external consumers
    pub fn as_state_word(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Detecting => "detecting",
            Phase::Recording => "recording",
            Phase::Transcribing => "transcribing",
            Phase::RewritingText => "rewriting",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_state_word())
    }
}

/// How the recognized speech will be used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Recognized speech is the final output, copied verbatim
    #[default]
    Dictation,
    /// Recognized speech is an editing instruction for previously selected text
    CommandOnSelection,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Dictation => write!(f, "dictation"),
            Mode::CommandOnSelection => write!(f, "command-on-selection"),
        }
    }
}

/// The most recent text this system wrote to the clipboard on the user's
/// behalf, with its write timestamp. Consumed only by the echo guard.
#[derive(Debug, Clone)]
pub struct LastOutput {
    pub text: String,
    pub written_at: Instant,
}

/// Mutable session state, owned exclusively by the orchestrator.
///
/// Created once per orchestrator in `Idle` with all optional fields empty.
/// Never persisted.
#[derive(Debug, Default)]
pub struct SessionState {
    pub phase: PhaseState,
    pub mode: Mode,
    /// Optimistic recording indicator: flipped synchronously on toggle,
    /// before detection and permission checks resolve, and rolled back if
    /// the session fails to start
    pub recording: bool,
    /// Selected text captured for the current command-on-selection session;
    /// non-empty only while `mode == CommandOnSelection`
    pub selection_snapshot: Option<String>,
    pub last_output: Option<LastOutput>,
    pub last_error: Option<String>,
    /// Monotonic per-session identifier; completions carrying a stale
    /// sequence number are discarded
    pub session_seq: u64,
    /// Set while recording, for the safety timeout and status display
    pub recording_started_at: Option<Instant>,
}

/// Phase wrapper so `SessionState` can derive `Default`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseState(pub Phase);

impl Default for PhaseState {
    fn default() -> Self {
        PhaseState(Phase::Idle)
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase.0
    }

    pub fn set_phase(&mut self, phase: Phase) {
        self.phase = PhaseState(phase);
    }

    pub fn is_idle(&self) -> bool {
        self.phase() == Phase::Idle
    }

    pub fn is_recording(&self) -> bool {
        self.phase() == Phase::Recording
    }

    /// Duration of the in-progress recording, if any
    pub fn recording_duration(&self) -> Option<std::time::Duration> {
        match self.phase() {
            Phase::Recording => self.recording_started_at.map(|t| t.elapsed()),
            _ => None,
        }
    }

    /// Reset per-session fields on return to Idle. `last_output` and
    /// `last_error` survive the session; mode falls back to its default.
    pub fn finish_session(&mut self) {
        self.set_phase(Phase::Idle);
        self.mode = Mode::Dictation;
        self.recording = false;
        self.selection_snapshot = None;
        self.recording_started_at = None;
    }
}

/// Read-only view of the session state handed to the presentation layer
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub phase: Phase,
    pub mode: Mode,
    pub recording: bool,
    pub last_error: Option<String>,
    pub last_result_preview: Option<String>,
}

impl StatusSnapshot {
    /// Truncated preview so status surfaces never render walls of text.
    /// Uses chars() to handle multi-byte UTF-8.
    pub fn preview_of(text: &str) -> String {
        if text.chars().count() > 60 {
            format!("{}...", text.chars().take(60).collect::<String>())
        } else {
            text.to_string()
        }
    }
}
