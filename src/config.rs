//! Configuration loading and types for diktat
//!
//! Configuration is loaded in layers:
//! 1. Built-in defaults
//! 2. Config file (~/.config/diktat/config.toml)
//! 3. CLI arguments (highest priority)

use crate::error::DiktatError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file content
pub const DEFAULT_CONFIG: &str = r#"# Diktat Configuration
#
# Location: ~/.config/diktat/config.toml
# All settings can be overridden via CLI flags

# State file for external integrations (Waybar, polybar, etc.)
# Use "auto" for the default location ($XDG_RUNTIME_DIR/diktat/state),
# a custom path, or "disabled" to turn off. The daemon writes the current
# phase ("idle", "detecting", "recording", "transcribing", "rewriting")
# to this file whenever it changes.
state_file = "auto"

[hotkey]
# Key that toggles recording on/off
# Common choices: SCROLLLOCK, PAUSE, RIGHTALT, F13-F24
# Use `evtest` to find key names for your keyboard
toggle_key = "SCROLLLOCK"

# Key that force-stops an in-progress recording
stop_key = "PAUSE"

# Enable built-in hotkey detection (default: true)
# Set to false when using compositor keybindings instead; the daemon then
# listens on SIGUSR1 (toggle) and SIGUSR2 (stop).
enabled = true

[audio]
# Audio input device ("default" uses the system default)
# List devices with: pactl list sources short
device = "default"

# Sample rate in Hz (transcription endpoints expect 16000)
sample_rate = 16000

# Maximum recording duration in seconds (safety limit)
max_duration_secs = 60

# Recordings shorter than this never reach the transcription endpoint
min_duration_ms = 500

[audio.silence]
# Frame-wise RMS below this counts the frame as silent.
# Empirical value; not guaranteed to suit every microphone.
rms_threshold = 0.01

# Frame length for the RMS analysis
frame_ms = 100

# Reject the recording without a remote call when at least this share
# of frames is silent
silent_frame_ratio = 0.8

[detection]
# Wait after triggering the copy action before re-reading the clipboard
settle_delay_ms = 50

# Repeated detection triggers inside this window reuse the previous result
debounce_ms = 80

# Our own clipboard write is not treated as a fresh selection for this long
echo_window_secs = 30

# Clipboard contents matching any of these patterns are ignored as
# transient artifacts (screenshot paths etc.)
artifact_patterns = ["(?i)bildschirmfoto", "(?i)screenshot.*\\.png$"]

[transcription]
# OpenAI-compatible transcription endpoint
endpoint = "https://api.openai.com"
model = "whisper-1"

# Spoken language sent to the endpoint
language = "de"

# API key; can also be set via DIKTAT_API_KEY
# api_key = "sk-..."

timeout_secs = 30

# Acoustic temperature per mode: commands want precision, dictation wants
# sensitivity for quiet or unclear speech
command_temperature = 0.0
dictation_temperature = 0.4

[transcription.retry]
max_attempts = 3
backoff_step_ms = 400
temperature_step = 0.2
max_temperature = 1.0
degraded_prompt = "Die Aufnahmequalität ist schlecht, bitte trotzdem transkribieren."

[rewrite]
# OpenAI-compatible chat completions endpoint for text editing
endpoint = "https://api.openai.com"
model = "gpt-4o-mini"

# api_key = "sk-..."

timeout_secs = 30

# Identical (command, text) requests inside this window are answered
# from the local cache
cache_ttl_secs = 300
"#;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub hotkey: HotkeyConfig,

    #[serde(default)]
    pub audio: AudioConfig,

    #[serde(default)]
    pub detection: DetectionConfig,

    #[serde(default)]
    pub transcription: TranscriptionConfig,

    #[serde(default)]
    pub rewrite: RewriteConfig,

    /// Optional path to the state file for external integrations.
    /// "auto" resolves to $XDG_RUNTIME_DIR/diktat/state.
    #[serde(default = "default_state_file", skip_serializing_if = "Option::is_none")]
    pub state_file: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hotkey: HotkeyConfig::default(),
            audio: AudioConfig::default(),
            detection: DetectionConfig::default(),
            transcription: TranscriptionConfig::default(),
            rewrite: RewriteConfig::default(),
            state_file: default_state_file(),
        }
    }
}

/// Hotkey detection configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HotkeyConfig {
    /// Key that toggles recording (evdev KEY_* name without the prefix)
    #[serde(default = "default_toggle_key")]
    pub toggle_key: String,

    /// Key that force-stops an in-progress recording
    #[serde(default = "default_stop_key")]
    pub stop_key: String,

    /// Enable built-in hotkey detection; when false, control the daemon
    /// via SIGUSR1/SIGUSR2 from compositor keybindings
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            toggle_key: default_toggle_key(),
            stop_key: default_stop_key(),
            enabled: true,
        }
    }
}

/// Audio capture configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AudioConfig {
    /// PipeWire/PulseAudio device name, or "default"
    #[serde(default = "default_device")]
    pub device: String,

    /// Sample rate in Hz (transcription endpoints expect 16000)
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Maximum recording duration in seconds (safety limit)
    #[serde(default = "default_max_duration")]
    pub max_duration_secs: u32,

    /// Recordings shorter than this are rejected locally
    #[serde(default = "default_min_duration_ms")]
    pub min_duration_ms: u64,

    /// Silence pre-flight analysis parameters
    #[serde(default)]
    pub silence: SilenceConfig,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            sample_rate: default_sample_rate(),
            max_duration_secs: default_max_duration(),
            min_duration_ms: default_min_duration_ms(),
            silence: SilenceConfig::default(),
        }
    }
}

/// Silence analysis configuration.
///
/// The defaults (RMS 0.01, 100 ms frames, 80 % cutoff) are empirical and
/// deliberately configurable rather than baked in.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SilenceConfig {
    #[serde(default = "default_rms_threshold")]
    pub rms_threshold: f32,

    #[serde(default = "default_frame_ms")]
    pub frame_ms: u32,

    #[serde(default = "default_silent_frame_ratio")]
    pub silent_frame_ratio: f32,
}

impl Default for SilenceConfig {
    fn default() -> Self {
        Self {
            rms_threshold: default_rms_threshold(),
            frame_ms: default_frame_ms(),
            silent_frame_ratio: default_silent_frame_ratio(),
        }
    }
}

/// Mode detection and echo suppression configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DetectionConfig {
    /// Wait after the triggered copy before re-reading the clipboard
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Detection triggers inside this window reuse the previous result
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Our own output is suppressed as a selection candidate for this long
    #[serde(default = "default_echo_window_secs")]
    pub echo_window_secs: u64,

    /// Clipboard contents matching any of these regexes are ignored
    #[serde(default = "default_artifact_patterns")]
    pub artifact_patterns: Vec<String>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: default_settle_delay_ms(),
            debounce_ms: default_debounce_ms(),
            echo_window_secs: default_echo_window_secs(),
            artifact_patterns: default_artifact_patterns(),
        }
    }
}

impl DetectionConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn echo_window(&self) -> Duration {
        Duration::from_secs(self.echo_window_secs)
    }
}

/// Remote transcription endpoint configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TranscriptionConfig {
    /// OpenAI-compatible endpoint base URL
    #[serde(default = "default_transcription_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_transcription_model")]
    pub model: String,

    /// Spoken language code sent to the endpoint
    #[serde(default = "default_language")]
    pub language: String,

    /// API key; falls back to the DIKTAT_API_KEY environment variable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Temperature for command-on-selection sessions (precise, short commands)
    #[serde(default)]
    pub command_temperature: f32,

    /// Temperature for dictation sessions (sensitive to quiet speech)
    #[serde(default = "default_dictation_temperature")]
    pub dictation_temperature: f32,

    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            endpoint: default_transcription_endpoint(),
            model: default_transcription_model(),
            language: default_language(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
            command_temperature: 0.0,
            dictation_temperature: default_dictation_temperature(),
            retry: RetryConfig::default(),
        }
    }
}

/// Declared retry policy for the transcription endpoint.
/// Escalation and backoff are configuration, not inline constants.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Linear backoff: attempt n waits (n-1) × this step
    #[serde(default = "default_backoff_step_ms")]
    pub backoff_step_ms: u64,

    /// Temperature added per attempt, clamped to max_temperature
    #[serde(default = "default_temperature_step")]
    pub temperature_step: f32,

    #[serde(default = "default_max_temperature")]
    pub max_temperature: f32,

    /// Prompt hint substituted on the final attempt
    #[serde(default = "default_degraded_prompt")]
    pub degraded_prompt: String,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_step_ms: default_backoff_step_ms(),
            temperature_step: default_temperature_step(),
            max_temperature: default_max_temperature(),
            degraded_prompt: default_degraded_prompt(),
        }
    }
}

impl RetryConfig {
    pub fn backoff_step(&self) -> Duration {
        Duration::from_millis(self.backoff_step_ms)
    }
}

/// Remote rewrite endpoint configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RewriteConfig {
    /// OpenAI-compatible chat completions base URL
    #[serde(default = "default_rewrite_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_rewrite_model")]
    pub model: String,

    /// API key; falls back to the DIKTAT_API_KEY environment variable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// TTL of the local (command, text) result cache
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            endpoint: default_rewrite_endpoint(),
            model: default_rewrite_model(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl RewriteConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

fn default_toggle_key() -> String {
    "SCROLLLOCK".to_string()
}

fn default_stop_key() -> String {
    "PAUSE".to_string()
}

fn default_device() -> String {
    "default".to_string()
}

fn default_sample_rate() -> u32 {
    16000
}

fn default_max_duration() -> u32 {
    60
}

fn default_min_duration_ms() -> u64 {
    500
}

fn default_rms_threshold() -> f32 {
    0.01
}

fn default_frame_ms() -> u32 {
    100
}

fn default_silent_frame_ratio() -> f32 {
    0.8
}

fn default_settle_delay_ms() -> u64 {
    50
}

fn default_debounce_ms() -> u64 {
    80
}

fn default_echo_window_secs() -> u64 {
    30
}

fn default_artifact_patterns() -> Vec<String> {
    vec![
        "(?i)bildschirmfoto".to_string(),
        r"(?i)screenshot.*\.png$".to_string(),
    ]
}

fn default_transcription_endpoint() -> String {
    "https://api.openai.com".to_string()
}

fn default_transcription_model() -> String {
    "whisper-1".to_string()
}

fn default_language() -> String {
    "de".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_dictation_temperature() -> f32 {
    0.4
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_step_ms() -> u64 {
    400
}

fn default_temperature_step() -> f32 {
    0.2
}

fn default_max_temperature() -> f32 {
    1.0
}

fn default_degraded_prompt() -> String {
    "Die Aufnahmequalität ist schlecht, bitte trotzdem transkribieren.".to_string()
}

fn default_rewrite_endpoint() -> String {
    "https://api.openai.com".to_string()
}

fn default_rewrite_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_state_file() -> Option<String> {
    Some("auto".to_string())
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("diktat").join("config.toml"))
    }

    /// Get the runtime directory for ephemeral files (state file)
    pub fn runtime_dir() -> PathBuf {
        std::env::var("XDG_RUNTIME_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
            .join("diktat")
    }

    /// Resolve the state file path from config.
    /// Returns None when disabled, the default location for "auto",
    /// or the explicit path otherwise.
    pub fn resolve_state_file(&self) -> Option<PathBuf> {
        self.state_file
            .as_ref()
            .and_then(|path| match path.to_lowercase().as_str() {
                "disabled" | "none" | "off" | "false" => None,
                "auto" => Some(Self::runtime_dir().join("state")),
                _ => Some(PathBuf::from(path)),
            })
    }

    /// API key resolution: config value first, then DIKTAT_API_KEY
    pub fn resolve_api_key(configured: &Option<String>) -> Option<String> {
        configured
            .clone()
            .or_else(|| std::env::var("DIKTAT_API_KEY").ok())
    }
}

/// Load configuration from file, with defaults for missing values
pub fn load_config(path: Option<&Path>) -> Result<Config, DiktatError> {
    let config_path = path.map(PathBuf::from).or_else(Config::default_path);

    let mut config = Config::default();

    if let Some(ref path) = config_path {
        if path.exists() {
            tracing::debug!("Loading config from {:?}", path);
            let contents = std::fs::read_to_string(path)
                .map_err(|e| DiktatError::Config(format!("Failed to read config: {}", e)))?;

            config = toml::from_str(&contents)
                .map_err(|e| DiktatError::Config(format!("Invalid config: {}", e)))?;
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = Config::default();
        assert_eq!(config.hotkey.toggle_key, "SCROLLLOCK");
        assert_eq!(config.audio.sample_rate, 16000);
        assert_eq!(config.audio.min_duration_ms, 500);
        assert_eq!(config.audio.silence.rms_threshold, 0.01);
        assert_eq!(config.audio.silence.silent_frame_ratio, 0.8);
        assert_eq!(config.detection.echo_window_secs, 30);
        assert_eq!(config.transcription.retry.max_attempts, 3);
        assert_eq!(config.transcription.command_temperature, 0.0);
        assert!(config.transcription.dictation_temperature > 0.0);
    }

    #[test]
    fn default_config_template_parses() {
        let config: Config = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.hotkey.toggle_key, "SCROLLLOCK");
        assert_eq!(config.detection.settle_delay_ms, 50);
        assert_eq!(config.rewrite.cache_ttl_secs, 300);
    }

    #[test]
    fn parse_partial_config() {
        let toml_str = r#"
            [detection]
            echo_window_secs = 10

            [transcription]
            language = "en"

            [transcription.retry]
            max_attempts = 5
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.detection.echo_window_secs, 10);
        // untouched sections keep their defaults
        assert_eq!(config.detection.settle_delay_ms, 50);
        assert_eq!(config.transcription.language, "en");
        assert_eq!(config.transcription.retry.max_attempts, 5);
        assert_eq!(config.transcription.retry.backoff_step_ms, 400);
    }

    #[test]
    fn state_file_resolution() {
        let mut config = Config::default();
        assert!(config.resolve_state_file().is_some());

        config.state_file = Some("disabled".to_string());
        assert!(config.resolve_state_file().is_none());

        config.state_file = Some("/tmp/custom-state".to_string());
        assert_eq!(
            config.resolve_state_file(),
            Some(PathBuf::from("/tmp/custom-state"))
        );
    }
}
