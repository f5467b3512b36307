//! Recording orchestrator
//!
//! The top-level state machine owning the session lifecycle. One session
//! runs Idle → (Detecting) → Recording → Transcribing → (RewritingText) →
//! Idle; phases never overlap, and every path, including every failure
//! path, returns to Idle so the next hotkey press always works.
//!
//! All collaborators sit behind traits and are injected, so the whole
//! machine runs against stubs in tests.

use crate::audio::AudioCapture;
use crate::clipboard::ClipboardBridge;
use crate::clock::Clock;
use crate::command::{CommandDispatcher, Resolution};
use crate::config::Config;
use crate::detect::{EchoGuard, ModeDetector};
use crate::error::Result;
use crate::rewrite::{RewriteRequest, Rewriter};
use crate::state::{Mode, Phase, SessionState, StatusSnapshot};
use crate::transcribe::retry::{RetryEngine, TranscriptOutcome};
use crate::transcribe::{TranscribeOptions, Transcriber};
use std::sync::Arc;

/// Coordinates mode detection, capture, transcription, and text processing
/// for one recording at a time
pub struct Orchestrator {
    state: SessionState,
    detector: ModeDetector,
    echo_guard: EchoGuard,
    dispatcher: CommandDispatcher,
    retry: RetryEngine,
    clipboard: Box<dyn ClipboardBridge>,
    capture: Box<dyn AudioCapture>,
    transcriber: Box<dyn Transcriber>,
    rewriter: Box<dyn Rewriter>,
    clock: Arc<dyn Clock>,
    language: String,
    command_temperature: f32,
    dictation_temperature: f32,
}

impl Orchestrator {
    pub fn new(
        config: &Config,
        clipboard: Box<dyn ClipboardBridge>,
        capture: Box<dyn AudioCapture>,
        transcriber: Box<dyn Transcriber>,
        rewriter: Box<dyn Rewriter>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let detector = ModeDetector::new(&config.detection, clock.clone())?;
        let echo_guard = EchoGuard::new(config.detection.echo_window(), clock.clone());
        let dispatcher = CommandDispatcher::new(config.rewrite.cache_ttl(), clock.clone());
        let retry = RetryEngine::new(&config.audio, &config.transcription.retry);

        Ok(Self {
            state: SessionState::new(),
            detector,
            echo_guard,
            dispatcher,
            retry,
            clipboard,
            capture,
            transcriber,
            rewriter,
            clock,
            language: config.transcription.language.clone(),
            command_temperature: config.transcription.command_temperature,
            dictation_temperature: config.transcription.dictation_temperature,
        })
    }

    /// Read-only view for the presentation layer
    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            phase: self.state.phase(),
            mode: self.state.mode,
            recording: self.state.recording,
            last_error: self.state.last_error.clone(),
            last_result_preview: self
                .state
                .last_output
                .as_ref()
                .map(|o| StatusSnapshot::preview_of(&o.text)),
        }
    }

    /// Duration of the in-progress recording, for the safety timeout
    pub fn recording_duration(&self) -> Option<std::time::Duration> {
        self.state.recording_duration()
    }

    /// Toggle signal: start a session from Idle, finish one from Recording.
    /// While a transcription or rewrite is in flight this is a no-op, which
    /// is what prevents double-started sessions.
    pub async fn toggle(&mut self) {
        match self.state.phase() {
            Phase::Idle => self.start_session().await,
            Phase::Recording => self.finish_session().await,
            phase => {
                tracing::debug!("toggle ignored while {}", phase);
            }
        }
    }

    /// Stop signal: only meaningful while recording
    pub async fn stop(&mut self) {
        if self.state.is_recording() {
            self.finish_session().await;
        } else {
            tracing::debug!("stop ignored while {}", self.state.phase());
        }
    }

    /// Re-copy the most recent result to the clipboard
    pub async fn copy_last_result_again(&mut self) {
        let text = match self.state.last_output.as_ref() {
            Some(output) => output.text.clone(),
            None => {
                tracing::debug!("No last result to copy");
                return;
            }
        };

        match self.clipboard.write(&text).await {
            Ok(()) => {
                // Refresh the echo timestamp: this write is ours too
                self.state.last_output = Some(self.echo_guard.stamp(text));
                tracing::info!("Last result copied to clipboard again");
            }
            Err(e) => {
                tracing::error!("Re-copy failed: {}", e);
                self.state.last_error = Some(e.to_string());
            }
        }
    }

    async fn start_session(&mut self) {
        self.state.session_seq += 1;
        let session = self.state.session_seq;
        self.state.last_error = None;

        // Optimistic UI: the recording indicator flips before any of the
        // async detection or permission work resolves
        self.state.recording = true;
        self.state.set_phase(Phase::Detecting);

        tracing::info!("Session {} starting", session);

        // Mode detection and the capture-permission probe run concurrently;
        // destructured so the futures borrow disjoint fields
        let Self {
            detector,
            echo_guard,
            clipboard,
            capture,
            state,
            ..
        } = &mut *self;

        let (detection, permitted) = tokio::join!(
            detector.detect(clipboard.as_ref(), echo_guard, state.last_output.as_ref()),
            capture.request_permission(),
        );

        if self.state.session_seq != session {
            tracing::debug!("Session {} superseded during detection, discarding", session);
            return;
        }

        if !permitted {
            tracing::error!("Microphone permission denied, rolling back");
            self.state.last_error =
                Some("Mikrofonzugriff verweigert. Bitte Audioberechtigungen prüfen.".to_string());
            self.state.finish_session();
            return;
        }

        match detection.mode {
            Mode::CommandOnSelection => match detection.selection {
                Some(selection) if !selection.is_empty() => {
                    self.state.mode = Mode::CommandOnSelection;
                    self.state.selection_snapshot = Some(selection);
                }
                _ => {
                    self.state.mode = Mode::Dictation;
                }
            },
            Mode::Dictation => {
                self.state.mode = Mode::Dictation;
            }
        }

        if let Err(e) = self.capture.start().await {
            tracing::error!("Failed to start capture, rolling back: {}", e);
            self.state.last_error = Some(e.to_string());
            self.state.finish_session();
            return;
        }

        if self.state.session_seq != session {
            tracing::debug!("Session {} superseded during capture start", session);
            return;
        }

        self.state.set_phase(Phase::Recording);
        self.state.recording_started_at = Some(self.clock.now());
        tracing::info!("Recording started (mode: {})", self.state.mode);
    }

    async fn finish_session(&mut self) {
        let duration = self.state.recording_duration().unwrap_or_default();
        tracing::info!("Recording stopped ({:.1}s)", duration.as_secs_f32());

        self.state.recording = false;
        self.state.set_phase(Phase::Transcribing);

        self.process_recording().await;

        // Finally-equivalent cleanup: whatever happened above, the machine
        // is Idle and ready for the next hotkey press
        self.state.finish_session();
    }

    async fn process_recording(&mut self) {
        let session = self.state.session_seq;

        let payload = match self.capture.stop().await {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!("Capture stop failed: {}", e);
                self.state.last_error = Some(e.to_string());
                return;
            }
        };

        let options = self.options_for_mode(self.state.mode);
        tracing::info!(
            "Transcribing {:.1}s of audio (mode: {})",
            payload.duration().as_secs_f32(),
            self.state.mode
        );

        let outcome = self
            .retry
            .transcribe(self.transcriber.as_ref(), &payload, &options)
            .await;

        if self.state.session_seq != session {
            tracing::debug!("Session {} superseded during transcription, discarding", session);
            return;
        }

        let transcript = match outcome {
            Ok(TranscriptOutcome::Text(t)) => t.text,
            Ok(rejected) => {
                // Local validation rejections carry user guidance instead
                // of a transcript
                if let Some(message) = rejected.user_message() {
                    tracing::info!("Recording rejected locally: {}", message);
                    self.state.last_error = Some(message.to_string());
                }
                return;
            }
            Err(e) => {
                tracing::error!("Transcription failed after retries: {}", e);
                self.state.last_error = Some(e.to_string());
                return;
            }
        };

        tracing::info!("Transcribed: {:?}", transcript);

        // Mode re-validation: the selection snapshot must still be present,
        // otherwise the session downgrades to plain dictation
        let selection = match self.state.mode {
            Mode::CommandOnSelection => match self.state.selection_snapshot.clone() {
                Some(s) if !s.is_empty() => Some(s),
                _ => {
                    tracing::warn!("Selection snapshot gone, downgrading to dictation");
                    None
                }
            },
            Mode::Dictation => None,
        };

        match selection {
            Some(selection) => self.run_command(session, &transcript, &selection).await,
            None => self.write_output(&transcript).await,
        }
    }

    async fn run_command(&mut self, session: u64, command: &str, selection: &str) {
        self.state.set_phase(Phase::RewritingText);

        match self.dispatcher.resolve(command, selection) {
            Resolution::Ready(result) => {
                tracing::info!("Command answered offline");
                self.write_output(&result).await;
            }
            Resolution::Remote(instruction) => {
                let request = RewriteRequest {
                    instruction: instruction.clone(),
                    source_text: selection.to_string(),
                };

                match self.rewriter.rewrite(&request).await {
                    Ok(result) => {
                        if self.state.session_seq != session {
                            tracing::debug!("Session {} superseded during rewrite", session);
                            return;
                        }
                        self.dispatcher.store(&instruction, selection, &result);
                        self.write_output(&result).await;
                    }
                    Err(e) => {
                        // The user's speech is never silently lost: the
                        // recognized command plus an explanation goes to the
                        // clipboard instead of the edit
                        tracing::error!("Rewrite failed: {}", e);
                        let fallback = format!(
                            "Befehl erkannt: \"{}\". Die KI-Bearbeitung ist fehlgeschlagen: {}",
                            command, e
                        );
                        self.state.last_error = Some(e.to_string());
                        self.write_output(&fallback).await;
                    }
                }
            }
        }
    }

    async fn write_output(&mut self, text: &str) {
        if text.is_empty() {
            tracing::debug!("Empty output, nothing to write");
            return;
        }

        match self.clipboard.write(text).await {
            Ok(()) => {
                // Record our own write so the next detection does not
                // mistake it for a fresh selection
                self.state.last_output = Some(self.echo_guard.stamp(text.to_string()));
                tracing::info!("Result copied to clipboard ({} chars)", text.len());
            }
            Err(e) => {
                tracing::error!("Clipboard write failed: {}", e);
                self.state.last_error = Some(e.to_string());
            }
        }
    }

    fn options_for_mode(&self, mode: Mode) -> TranscribeOptions {
        // Fixed policy keyed on mode: commands are short and precise,
        // dictation needs sensitivity for quiet or unclear speech
        let temperature = match mode {
            Mode::CommandOnSelection => self.command_temperature,
            Mode::Dictation => self.dictation_temperature,
        };

        TranscribeOptions {
            language: self.language.clone(),
            temperature,
            prompt_hint: None,
        }
    }
}
