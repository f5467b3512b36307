//! End-to-end orchestrator tests with stub collaborators
//!
//! Drives full sessions (toggle → record → transcribe → output) against
//! scripted clipboard, capture, transcription, and rewrite stubs plus a
//! manual clock, so mode decisions, echo suppression, retries, and
//! rollback behavior are all deterministic.

use diktat::audio::{AudioCapture, AudioPayload};
use diktat::clipboard::ClipboardBridge;
use diktat::clock::Clock;
use diktat::config::Config;
use diktat::error::{CaptureError, ClipboardError, RewriteError, TranscribeError};
use diktat::orchestrator::Orchestrator;
use diktat::rewrite::{RewriteRequest, Rewriter};
use diktat::state::{Mode, Phase};
use diktat::transcribe::{TranscribeOptions, Transcriber, Transcription};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

// ============================================================================
// Stub collaborators
// ============================================================================

/// Manual clock driven by the tests
struct ManualClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        })
    }

    fn advance(&self, by: Duration) {
        *self.offset.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + *self.offset.lock().unwrap()
    }
}

/// Fake clipboard modeling a real one: `trigger_copy` replaces the content
/// with whatever the user currently has selected, if anything
#[derive(Default)]
struct FakeClipboard {
    content: Mutex<String>,
    /// Text the user has highlighted somewhere; copied on trigger_copy
    selection: Mutex<Option<String>>,
    writes: Mutex<Vec<String>>,
}

impl FakeClipboard {
    fn set_content(&self, text: &str) {
        *self.content.lock().unwrap() = text.to_string();
    }

    fn set_selection(&self, text: Option<&str>) {
        *self.selection.lock().unwrap() = text.map(|t| t.to_string());
    }

    fn writes(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }

    fn last_write(&self) -> Option<String> {
        self.writes.lock().unwrap().last().cloned()
    }
}

#[derive(Clone)]
struct ClipboardHandle(Arc<FakeClipboard>);

#[async_trait::async_trait]
impl ClipboardBridge for ClipboardHandle {
    async fn read(&self) -> Result<String, ClipboardError> {
        Ok(self.0.content.lock().unwrap().clone())
    }

    async fn write(&self, text: &str) -> Result<(), ClipboardError> {
        *self.0.content.lock().unwrap() = text.to_string();
        self.0.writes.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn trigger_copy(&self) -> Result<(), ClipboardError> {
        if let Some(selection) = self.0.selection.lock().unwrap().clone() {
            *self.0.content.lock().unwrap() = selection;
        }
        Ok(())
    }

    async fn clear_selections(&self) -> Result<(), ClipboardError> {
        Ok(())
    }
}

/// Capture stub handing out a configurable payload
struct FakeCapture {
    permission: AtomicBool,
    payload: Mutex<AudioPayload>,
    started: AtomicBool,
    starts: AtomicUsize,
}

impl FakeCapture {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            permission: AtomicBool::new(true),
            payload: Mutex::new(speech_payload(1000)),
            started: AtomicBool::new(false),
            starts: AtomicUsize::new(0),
        })
    }

    fn deny_permission(&self) {
        self.permission.store(false, Ordering::SeqCst);
    }

    fn set_payload(&self, payload: AudioPayload) {
        *self.payload.lock().unwrap() = payload;
    }
}

#[derive(Clone)]
struct CaptureHandle(Arc<FakeCapture>);

#[async_trait::async_trait]
impl AudioCapture for CaptureHandle {
    async fn request_permission(&self) -> bool {
        self.0.permission.load(Ordering::SeqCst)
    }

    async fn start(&mut self) -> Result<(), CaptureError> {
        self.0.started.store(true, Ordering::SeqCst);
        self.0.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&mut self) -> Result<AudioPayload, CaptureError> {
        self.0.started.store(false, Ordering::SeqCst);
        Ok(self.0.payload.lock().unwrap().clone())
    }
}

/// Transcriber stub: scripted failures followed by a fixed transcript
struct FakeTranscriber {
    transcript: Mutex<String>,
    fail_first: AtomicUsize,
    calls: AtomicUsize,
}

impl FakeTranscriber {
    fn new(transcript: &str) -> Arc<Self> {
        Arc::new(Self {
            transcript: Mutex::new(transcript.to_string()),
            fail_first: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        })
    }

    fn set_transcript(&self, text: &str) {
        *self.transcript.lock().unwrap() = text.to_string();
    }

    fn fail_first_attempts(&self, n: usize) {
        self.fail_first.store(n, Ordering::SeqCst);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
struct TranscriberHandle(Arc<FakeTranscriber>);

#[async_trait::async_trait]
impl Transcriber for TranscriberHandle {
    async fn transcribe(
        &self,
        _audio: &AudioPayload,
        _options: &TranscribeOptions,
    ) -> Result<Transcription, TranscribeError> {
        let call = self.0.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.0.fail_first.load(Ordering::SeqCst) {
            return Err(TranscribeError::Network("connection reset".to_string()));
        }
        Ok(Transcription {
            text: self.0.transcript.lock().unwrap().clone(),
            language: Some("de".to_string()),
            confidence: None,
        })
    }
}

/// Rewriter stub recording requests and answering with a fixed result
struct FakeRewriter {
    result: Mutex<Result<String, String>>,
    requests: Mutex<Vec<RewriteRequest>>,
}

impl FakeRewriter {
    fn new(result: &str) -> Arc<Self> {
        Arc::new(Self {
            result: Mutex::new(Ok(result.to_string())),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn fail_with(&self, message: &str) {
        *self.result.lock().unwrap() = Err(message.to_string());
    }

    fn requests(&self) -> Vec<RewriteRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[derive(Clone)]
struct RewriterHandle(Arc<FakeRewriter>);

#[async_trait::async_trait]
impl Rewriter for RewriterHandle {
    async fn rewrite(&self, request: &RewriteRequest) -> Result<String, RewriteError> {
        self.0.requests.lock().unwrap().push(request.clone());
        match &*self.0.result.lock().unwrap() {
            Ok(text) => Ok(text.clone()),
            Err(message) => Err(RewriteError::Server(message.clone())),
        }
    }
}

// ============================================================================
// Harness
// ============================================================================

/// 16 kHz mono sine, loud enough to pass the silence pre-flight
fn speech_payload(duration_ms: usize) -> AudioPayload {
    let samples: Vec<f32> = (0..16 * duration_ms)
        .map(|i| (i as f32 * 440.0 * 2.0 * std::f32::consts::PI / 16000.0).sin() * 0.5)
        .collect();
    AudioPayload::new(samples, 16000)
}

fn silent_payload(duration_ms: usize) -> AudioPayload {
    AudioPayload::new(vec![0.0; 16 * duration_ms], 16000)
}

struct Harness {
    orchestrator: Orchestrator,
    clipboard: Arc<FakeClipboard>,
    capture: Arc<FakeCapture>,
    transcriber: Arc<FakeTranscriber>,
    rewriter: Arc<FakeRewriter>,
    clock: Arc<ManualClock>,
}

impl Harness {
    fn new() -> Self {
        let mut config = Config::default();
        // Instant timings so tests never sleep
        config.detection.settle_delay_ms = 0;
        config.detection.debounce_ms = 0;
        config.transcription.retry.backoff_step_ms = 0;

        let clipboard = Arc::new(FakeClipboard::default());
        let capture = FakeCapture::new();
        let transcriber = FakeTranscriber::new("Hallo Welt");
        let rewriter = FakeRewriter::new("Bearbeiteter Text");
        let clock = ManualClock::new();

        let orchestrator = Orchestrator::new(
            &config,
            Box::new(ClipboardHandle(clipboard.clone())),
            Box::new(CaptureHandle(capture.clone())),
            Box::new(TranscriberHandle(transcriber.clone())),
            Box::new(RewriterHandle(rewriter.clone())),
            clock.clone(),
        )
        .unwrap();

        Self {
            orchestrator,
            clipboard,
            capture,
            transcriber,
            rewriter,
            clock,
        }
    }

    /// Run one full toggle-start / toggle-finish session
    async fn run_session(&mut self) {
        self.orchestrator.toggle().await;
        self.orchestrator.toggle().await;
    }
}

// ============================================================================
// Mode determinism
// ============================================================================

#[tokio::test]
async fn dictation_when_clipboard_unchanged() {
    let mut h = Harness::new();
    h.clipboard.set_content("A");
    h.clipboard.set_selection(None);

    h.run_session().await;

    assert_eq!(h.clipboard.writes(), vec!["Hallo Welt"]);
    assert!(h.rewriter.requests().is_empty());
    assert_eq!(h.orchestrator.status().phase, Phase::Idle);
}

#[tokio::test]
async fn command_mode_when_fresh_selection_copied() {
    let mut h = Harness::new();
    h.clipboard.set_content("A");
    h.clipboard.set_selection(Some("ein alter Entwurf"));
    h.transcriber.set_transcript("fasse zusammen");

    h.run_session().await;

    // The canonical instruction and the verbatim selection reached the
    // rewrite endpoint, and the edit landed on the clipboard
    let requests = h.rewriter.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].instruction, "Fasse den Text prägnant zusammen.");
    assert_eq!(requests[0].source_text, "ein alter Entwurf");
    assert_eq!(h.clipboard.last_write().as_deref(), Some("Bearbeiteter Text"));
}

#[tokio::test]
async fn empty_selection_copy_means_dictation() {
    let mut h = Harness::new();
    h.clipboard.set_content("");
    h.clipboard.set_selection(None);

    h.run_session().await;

    assert_eq!(h.clipboard.writes(), vec!["Hallo Welt"]);
    assert!(h.rewriter.requests().is_empty());
}

// ============================================================================
// Echo suppression
// ============================================================================

#[tokio::test]
async fn own_output_is_not_a_fresh_selection_inside_window() {
    let mut h = Harness::new();

    // Session 1: edit a selection; the result lands on the clipboard
    h.clipboard.set_content("A");
    h.clipboard.set_selection(Some("alter Text"));
    h.transcriber.set_transcript("fasse zusammen");
    h.run_session().await;
    assert_eq!(h.clipboard.last_write().as_deref(), Some("Bearbeiteter Text"));

    // Session 2, one second later: the writeback is still highlighted, the
    // triggered copy re-copies it, but it must be recognized as our echo
    h.clock.advance(Duration::from_secs(1));
    h.clipboard.set_content("B");
    h.clipboard.set_selection(Some("Bearbeiteter Text"));
    h.transcriber.set_transcript("diktierter Satz");
    h.run_session().await;

    // Dictation, not a second rewrite
    assert_eq!(h.rewriter.requests().len(), 1);
    assert_eq!(h.clipboard.last_write().as_deref(), Some("diktierter Satz"));
}

#[tokio::test]
async fn own_output_becomes_fresh_again_after_window() {
    let mut h = Harness::new();

    h.clipboard.set_content("A");
    h.clipboard.set_selection(Some("alter Text"));
    h.transcriber.set_transcript("fasse zusammen");
    h.run_session().await;

    // Past the echo window the same text is genuine user content again
    h.clock.advance(Duration::from_secs(31));
    h.clipboard.set_content("B");
    h.clipboard.set_selection(Some("Bearbeiteter Text"));
    h.transcriber.set_transcript("fasse zusammen");
    h.run_session().await;

    assert_eq!(h.rewriter.requests().len(), 2);
    assert_eq!(h.rewriter.requests()[1].source_text, "Bearbeiteter Text");
}

// ============================================================================
// Retry and pre-flight
// ============================================================================

#[tokio::test]
async fn transcription_retries_until_success() {
    let mut h = Harness::new();
    h.clipboard.set_content("A");
    h.transcriber.fail_first_attempts(2);

    h.run_session().await;

    assert_eq!(h.transcriber.calls(), 3);
    assert_eq!(h.clipboard.writes(), vec!["Hallo Welt"]);
    assert!(h.orchestrator.status().last_error.is_none());
}

#[tokio::test]
async fn transcription_failure_surfaces_after_exhaustion() {
    let mut h = Harness::new();
    h.clipboard.set_content("A");
    h.transcriber.fail_first_attempts(99);

    h.run_session().await;

    assert_eq!(h.transcriber.calls(), 3);
    assert!(h.clipboard.writes().is_empty());
    let status = h.orchestrator.status();
    assert_eq!(status.phase, Phase::Idle);
    assert!(status.last_error.is_some());
}

#[tokio::test]
async fn short_recording_never_reaches_the_endpoint() {
    let mut h = Harness::new();
    h.clipboard.set_content("A");
    h.capture.set_payload(speech_payload(200));

    h.run_session().await;

    assert_eq!(h.transcriber.calls(), 0);
    assert!(h.clipboard.writes().is_empty());
    let error = h.orchestrator.status().last_error.unwrap();
    assert!(error.contains("zu kurz"), "unexpected message: {}", error);
}

#[tokio::test]
async fn silent_recording_never_reaches_the_endpoint() {
    let mut h = Harness::new();
    h.clipboard.set_content("A");
    h.capture.set_payload(silent_payload(2000));

    h.run_session().await;

    assert_eq!(h.transcriber.calls(), 0);
    assert!(h.clipboard.writes().is_empty());
    let error = h.orchestrator.status().last_error.unwrap();
    assert!(error.contains("Keine Sprache"), "unexpected message: {}", error);
}

// ============================================================================
// Fast-track dispatch
// ============================================================================

#[tokio::test]
async fn deterministic_command_is_answered_offline() {
    let mut h = Harness::new();
    h.clipboard.set_content("A");
    h.clipboard.set_selection(Some("one two three"));
    h.transcriber.set_transcript("wie viele wörter");

    h.run_session().await;

    assert!(h.rewriter.requests().is_empty(), "fast-track must stay offline");
    assert_eq!(h.clipboard.last_write().as_deref(), Some("3 Wörter"));
}

#[tokio::test]
async fn repeated_command_is_served_from_cache() {
    let mut h = Harness::new();
    h.clipboard.set_content("A");
    h.clipboard.set_selection(Some("derselbe Text"));
    h.transcriber.set_transcript("fasse zusammen");
    h.run_session().await;
    assert_eq!(h.rewriter.requests().len(), 1);

    // Same command on the same selection again, inside the cache TTL.
    // Advance past the echo window so the second session is not suppressed
    // as an echo of the first result.
    h.clock.advance(Duration::from_secs(31));
    h.clipboard.set_content("B");
    h.clipboard.set_selection(Some("derselbe Text"));
    h.run_session().await;

    assert_eq!(h.rewriter.requests().len(), 1, "cache hit must skip the endpoint");
    assert_eq!(h.clipboard.last_write().as_deref(), Some("Bearbeiteter Text"));
}

// ============================================================================
// Error handling
// ============================================================================

#[tokio::test]
async fn permission_denial_rolls_back_optimistic_state() {
    let mut h = Harness::new();
    h.clipboard.set_content("A");
    h.capture.deny_permission();

    h.orchestrator.toggle().await;

    let status = h.orchestrator.status();
    assert_eq!(status.phase, Phase::Idle);
    assert!(!status.recording, "optimistic recording flag must be rolled back");
    assert!(status.last_error.unwrap().contains("Mikrofon"));
    assert_eq!(h.capture.starts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn rewrite_failure_falls_back_to_recognized_command() {
    let mut h = Harness::new();
    h.clipboard.set_content("A");
    h.clipboard.set_selection(Some("wichtiger Text"));
    h.transcriber.set_transcript("mach das formeller");
    h.rewriter.fail_with("rate limit");

    h.run_session().await;

    // The user's speech is not lost: the fallback names the command
    let written = h.clipboard.last_write().unwrap();
    assert!(written.contains("Befehl erkannt"));
    assert!(written.contains("mach das formeller"));
    assert!(h.orchestrator.status().last_error.is_some());
    assert_eq!(h.orchestrator.status().phase, Phase::Idle);
}

// ============================================================================
// Session serialization and guards
// ============================================================================

#[tokio::test]
async fn stop_while_idle_is_a_no_op() {
    let mut h = Harness::new();

    h.orchestrator.stop().await;

    let status = h.orchestrator.status();
    assert_eq!(status.phase, Phase::Idle);
    assert!(status.last_error.is_none());
    assert_eq!(h.transcriber.calls(), 0);
}

#[tokio::test]
async fn toggle_starts_then_finishes_exactly_one_session() {
    let mut h = Harness::new();
    h.clipboard.set_content("A");

    h.orchestrator.toggle().await;
    let mid = h.orchestrator.status();
    assert_eq!(mid.phase, Phase::Recording);
    assert!(mid.recording);
    assert_eq!(mid.mode, Mode::Dictation);

    h.orchestrator.toggle().await;
    let done = h.orchestrator.status();
    assert_eq!(done.phase, Phase::Idle);
    assert!(!done.recording);
    assert_eq!(h.capture.starts.load(Ordering::SeqCst), 1);
    assert_eq!(h.clipboard.writes().len(), 1);
}

#[tokio::test]
async fn stop_signal_finishes_a_recording_session() {
    let mut h = Harness::new();
    h.clipboard.set_content("A");

    h.orchestrator.toggle().await;
    assert_eq!(h.orchestrator.status().phase, Phase::Recording);

    h.orchestrator.stop().await;
    assert_eq!(h.orchestrator.status().phase, Phase::Idle);
    assert_eq!(h.clipboard.writes(), vec!["Hallo Welt"]);
}

#[tokio::test]
async fn sessions_never_overlap_across_rapid_toggles() {
    let mut h = Harness::new();
    h.clipboard.set_content("A");

    // Alternating toggles: every odd one starts, every even one finishes;
    // each transition leaves exactly one well-defined phase
    for _ in 0..3 {
        h.orchestrator.toggle().await;
        assert_eq!(h.orchestrator.status().phase, Phase::Recording);
        h.orchestrator.toggle().await;
        assert_eq!(h.orchestrator.status().phase, Phase::Idle);
    }

    assert_eq!(h.capture.starts.load(Ordering::SeqCst), 3);
    assert_eq!(h.clipboard.writes().len(), 3);
}

// ============================================================================
// Presentation surface
// ============================================================================

#[tokio::test]
async fn status_exposes_last_result_preview() {
    let mut h = Harness::new();
    h.clipboard.set_content("A");

    h.run_session().await;

    let status = h.orchestrator.status();
    assert_eq!(status.last_result_preview.as_deref(), Some("Hallo Welt"));
}

#[tokio::test]
async fn copy_last_result_again_rewrites_clipboard() {
    let mut h = Harness::new();
    h.clipboard.set_content("A");
    h.run_session().await;
    assert_eq!(h.clipboard.writes().len(), 1);

    // Something else lands on the clipboard, then the user asks for the
    // last result again
    h.clipboard.set_content("anderes");
    h.orchestrator.copy_last_result_again().await;

    assert_eq!(h.clipboard.writes().len(), 2);
    assert_eq!(h.clipboard.last_write().as_deref(), Some("Hallo Welt"));
}

#[tokio::test]
async fn copy_last_result_without_history_is_a_no_op() {
    let mut h = Harness::new();

    h.orchestrator.copy_last_result_again().await;

    assert!(h.clipboard.writes().is_empty());
}
