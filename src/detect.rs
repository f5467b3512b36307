//! Mode detection and self-echo suppression
//!
//! Before each recording the system must decide whether the user wants
//! plain dictation or an editing command applied to text they just
//! selected elsewhere. Passive clipboard reads cannot distinguish a fresh
//! selection from stale clipboard history; the only reliable,
//! platform-agnostic signal is that the clipboard content changes as a
//! direct result of a copy action we trigger ourselves immediately before
//! reading it back.
//!
//! The echo guard closes the resulting feedback loop: our own rewritten
//! output lands on the clipboard too, and without suppression the next
//! hotkey press would misread it as a brand-new selection.

use crate::clipboard::ClipboardBridge;
use crate::clock::Clock;
use crate::config::DetectionConfig;
use crate::error::DiktatError;
use crate::state::{LastOutput, Mode};
use regex::Regex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Result of one mode probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub mode: Mode,
    /// The freshly selected text, present iff mode is CommandOnSelection
    pub selection: Option<String>,
}

impl Detection {
    fn dictation() -> Self {
        Self {
            mode: Mode::Dictation,
            selection: None,
        }
    }
}

/// Policy deciding whether a clipboard candidate is our own recent output.
///
/// Stateless over the orchestrator's `last_output`: a candidate is an echo
/// iff it matches the recorded text exactly and the record is younger than
/// the suppression window. Older records are ignored without ever being
/// cleared explicitly.
pub struct EchoGuard {
    window: Duration,
    clock: Arc<dyn Clock>,
}

impl EchoGuard {
    pub fn new(window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self { window, clock }
    }

    /// Stamp a freshly written output for later echo comparison
    pub fn stamp(&self, text: String) -> LastOutput {
        LastOutput {
            text,
            written_at: self.clock.now(),
        }
    }

    /// True iff the candidate is our own output, still inside the window
    pub fn is_own_echo(&self, last_output: Option<&LastOutput>, candidate: &str) -> bool {
        match last_output {
            Some(last) => {
                last.text == candidate
                    && self.clock.now().duration_since(last.written_at) < self.window
            }
            None => false,
        }
    }
}

/// Clipboard-diff mode detector
pub struct ModeDetector {
    settle_delay: Duration,
    debounce: Duration,
    artifact_patterns: Vec<Regex>,
    clock: Arc<dyn Clock>,
    /// Re-entry guard; one probe per recording session
    busy: bool,
    /// Most recent result, reused inside the debounce window
    last: Option<(Instant, Detection)>,
}

impl ModeDetector {
    pub fn new(config: &DetectionConfig, clock: Arc<dyn Clock>) -> Result<Self, DiktatError> {
        let artifact_patterns = config
            .artifact_patterns
            .iter()
            .map(|p| {
                Regex::new(p)
                    .map_err(|e| DiktatError::Config(format!("Invalid artifact pattern {:?}: {}", p, e)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            settle_delay: config.settle_delay(),
            debounce: config.debounce(),
            artifact_patterns,
            clock,
            busy: false,
            last: None,
        })
    }

    fn is_artifact(&self, text: &str) -> bool {
        self.artifact_patterns.iter().any(|re| re.is_match(text))
    }

    /// Run one detection. Rapid repeated triggers inside the debounce
    /// window coalesce onto the previous result; a re-entrant call while a
    /// probe is in flight returns the last known result without starting a
    /// second probe.
    pub async fn detect(
        &mut self,
        clipboard: &dyn ClipboardBridge,
        guard: &EchoGuard,
        last_output: Option<&LastOutput>,
    ) -> Detection {
        if self.busy {
            tracing::debug!("Detection already in flight, reusing last result");
            return self
                .last
                .as_ref()
                .map(|(_, d)| d.clone())
                .unwrap_or_else(Detection::dictation);
        }

        if let Some((at, detection)) = &self.last {
            if self.clock.now().duration_since(*at) < self.debounce {
                tracing::debug!("Detection trigger debounced, reusing last result");
                return detection.clone();
            }
        }

        self.busy = true;
        let detection = self.probe(clipboard, guard, last_output).await;
        self.busy = false;

        self.last = Some((self.clock.now(), detection.clone()));
        detection
    }

    async fn probe(
        &self,
        clipboard: &dyn ClipboardBridge,
        guard: &EchoGuard,
        last_output: Option<&LastOutput>,
    ) -> Detection {
        let before = match clipboard.read().await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Clipboard read failed before copy: {}", e);
                String::new()
            }
        };

        if let Err(e) = clipboard.trigger_copy().await {
            tracing::warn!("Copy trigger failed, falling back to dictation: {}", e);
            return Detection::dictation();
        }

        // Let the focused application service the copy request
        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }

        let after = match clipboard.read().await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Clipboard read failed after copy: {}", e);
                String::new()
            }
        };

        if after.is_empty() || after == before {
            tracing::debug!("Clipboard unchanged, mode: dictation");
            return Detection::dictation();
        }

        if self.is_artifact(&after) {
            tracing::debug!("Clipboard holds a transient artifact, mode: dictation");
            return Detection::dictation();
        }

        if guard.is_own_echo(last_output, &after) {
            tracing::info!("Clipboard holds our own recent output, mode: dictation");
            return Detection::dictation();
        }

        tracing::info!(
            "Fresh selection detected ({} chars), mode: command-on-selection",
            after.len()
        );

        // Drop the highlight so the same selection is not re-copied next
        // session; purely cosmetic, failure is non-fatal
        if let Err(e) = clipboard.clear_selections().await {
            tracing::warn!("Selection cleanup failed (ignored): {}", e);
        }

        Detection {
            mode: Mode::CommandOnSelection,
            selection: Some(after),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClipboardError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Manual clock driven by the tests
    struct ManualClock {
        base: Instant,
        offset: Mutex<Duration>,
    }

    impl ManualClock {
        fn new() -> Self {
            Self {
                base: Instant::now(),
                offset: Mutex::new(Duration::ZERO),
            }
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

    /// Scripted clipboard: `before` is returned on the first read, `after`
    /// once a copy was triggered
    struct ScriptedClipboard {
        before: String,
        after: String,
        copy_triggers: AtomicUsize,
        clears: AtomicUsize,
    }

    impl ScriptedClipboard {
        fn new(before: &str, after: &str) -> Self {
            Self {
                before: before.to_string(),
                after: after.to_string(),
                copy_triggers: AtomicUsize::new(0),
                clears: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl ClipboardBridge for ScriptedClipboard {
        async fn read(&self) -> Result<String, ClipboardError> {
            if self.copy_triggers.load(Ordering::SeqCst) > 0 {
                Ok(self.after.clone())
            } else {
                Ok(self.before.clone())
            }
        }

        async fn write(&self, _text: &str) -> Result<(), ClipboardError> {
            Ok(())
        }

        async fn trigger_copy(&self) -> Result<(), ClipboardError> {
            self.copy_triggers.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn clear_selections(&self) -> Result<(), ClipboardError> {
            self.clears.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn test_config() -> DetectionConfig {
        DetectionConfig {
            settle_delay_ms: 0,
            debounce_ms: 80,
            echo_window_secs: 30,
            artifact_patterns: vec!["(?i)bildschirmfoto".to_string()],
        }
    }

    fn setup() -> (ModeDetector, EchoGuard, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let detector = ModeDetector::new(&test_config(), clock.clone()).unwrap();
        let guard = EchoGuard::new(Duration::from_secs(30), clock.clone());
        (detector, guard, clock)
    }

    #[tokio::test]
    async fn changed_clipboard_means_command_on_selection() {
        let (mut detector, guard, _clock) = setup();
        let clipboard = ScriptedClipboard::new("A", "B");

        let detection = detector.detect(&clipboard, &guard, None).await;

        assert_eq!(detection.mode, Mode::CommandOnSelection);
        assert_eq!(detection.selection.as_deref(), Some("B"));
        assert_eq!(clipboard.clears.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unchanged_clipboard_means_dictation() {
        let (mut detector, guard, _clock) = setup();
        let clipboard = ScriptedClipboard::new("A", "A");

        let detection = detector.detect(&clipboard, &guard, None).await;

        assert_eq!(detection.mode, Mode::Dictation);
        assert!(detection.selection.is_none());
    }

    #[tokio::test]
    async fn empty_clipboard_means_dictation() {
        let (mut detector, guard, _clock) = setup();
        let clipboard = ScriptedClipboard::new("", "");

        let detection = detector.detect(&clipboard, &guard, None).await;
        assert_eq!(detection.mode, Mode::Dictation);
    }

    #[tokio::test]
    async fn artifact_is_not_a_selection() {
        let (mut detector, guard, _clock) = setup();
        let clipboard = ScriptedClipboard::new("A", "Bildschirmfoto 2024-11-02.png");

        let detection = detector.detect(&clipboard, &guard, None).await;
        assert_eq!(detection.mode, Mode::Dictation);
    }

    #[tokio::test]
    async fn own_echo_inside_window_is_suppressed() {
        let (mut detector, guard, _clock) = setup();
        let clipboard = ScriptedClipboard::new("A", "X");

        let last = guard.stamp("X".to_string());
        let detection = detector.detect(&clipboard, &guard, Some(&last)).await;

        assert_eq!(detection.mode, Mode::Dictation);
    }

    #[tokio::test]
    async fn own_echo_after_window_counts_as_fresh() {
        let (mut detector, guard, clock) = setup();
        let clipboard = ScriptedClipboard::new("A", "X");

        let last = guard.stamp("X".to_string());
        clock.advance(Duration::from_secs(31));

        let detection = detector.detect(&clipboard, &guard, Some(&last)).await;
        assert_eq!(detection.mode, Mode::CommandOnSelection);
    }

    #[tokio::test]
    async fn rapid_triggers_coalesce_into_one_probe() {
        let (mut detector, guard, clock) = setup();
        let clipboard = ScriptedClipboard::new("A", "B");

        let first = detector.detect(&clipboard, &guard, None).await;
        // Inside the debounce window: no second copy trigger
        clock.advance(Duration::from_millis(10));
        let second = detector.detect(&clipboard, &guard, None).await;

        assert_eq!(first, second);
        assert_eq!(clipboard.copy_triggers.load(Ordering::SeqCst), 1);

        // Past the window a new probe runs
        clock.advance(Duration::from_millis(200));
        let _third = detector.detect(&clipboard, &guard, None).await;
        assert_eq!(clipboard.copy_triggers.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn echo_guard_window_arithmetic() {
        let clock = Arc::new(ManualClock::new());
        let guard = EchoGuard::new(Duration::from_secs(30), clock.clone());

        let last = guard.stamp("output".to_string());

        clock.advance(Duration::from_secs(1));
        assert!(guard.is_own_echo(Some(&last), "output"));
        assert!(!guard.is_own_echo(Some(&last), "different"));

        clock.advance(Duration::from_secs(30));
        assert!(!guard.is_own_echo(Some(&last), "output"));

        assert!(!guard.is_own_echo(None, "output"));
    }

    #[test]
    fn invalid_artifact_pattern_is_a_config_error() {
        let clock = Arc::new(ManualClock::new());
        let config = DetectionConfig {
            artifact_patterns: vec!["(unclosed".to_string()],
            ..DetectionConfig::default()
        };
        assert!(ModeDetector::new(&config, clock).is_err());
    }
}
