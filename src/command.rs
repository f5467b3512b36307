//! Command normalization and fast-track dispatch
//!
//! Recognized speech in command-on-selection mode is free-form German.
//! Two tiers keep latency and cost down before the rewrite endpoint is
//! involved:
//!
//! 1. A phrasing table collapses common phrasings onto a fixed canonical
//!    instruction vocabulary ("fasse das mal zusammen" and "kurzfassung"
//!    both become the one canonical summarize instruction).
//! 2. Fully deterministic requests (counting words/characters/sentences,
//!    whitespace and punctuation cleanup) are answered locally, entirely
//!    offline.
//!
//! Results are cached under (canonical command, source prefix) for a
//! bounded window so repeating the same request is instant.

use crate::clock::Clock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How a raw spoken command gets answered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Locally computed or cached result; no remote call needed
    Ready(String),
    /// Must go to the rewrite endpoint, with the canonical instruction
    Remote(String),
}

/// Phrasings mapped onto the canonical instruction vocabulary.
/// Matching is containment on the normalized command, longest entry first.
const PHRASING_TABLE: &[(&[&str], &str)] = &[
    (
        &[
            "fasse zusammen",
            "fasse das zusammen",
            "fasse den text zusammen",
            "zusammenfassen",
            "kurzfassung",
            "mach eine zusammenfassung",
        ],
        "Fasse den Text prägnant zusammen.",
    ),
    (
        &[
            "übersetze ins englische",
            "übersetze auf englisch",
            "auf englisch",
            "ins englische",
        ],
        "Übersetze den Text ins Englische.",
    ),
    (
        &[
            "übersetze ins deutsche",
            "übersetze auf deutsch",
            "auf deutsch",
        ],
        "Übersetze den Text ins Deutsche.",
    ),
    (
        &["formeller", "förmlicher", "mach das formeller"],
        "Formuliere den Text formeller.",
    ),
    (
        &["lockerer", "informeller", "mach das lockerer"],
        "Formuliere den Text lockerer.",
    ),
    (
        &["kürze", "kürzer", "mach das kürzer", "kürze den text"],
        "Kürze den Text deutlich.",
    ),
    (
        &[
            "korrigiere",
            "korrigiere die rechtschreibung",
            "rechtschreibung korrigieren",
            "verbessere die grammatik",
        ],
        "Korrigiere Rechtschreibung und Grammatik.",
    ),
    (
        &["stichpunkte", "als stichpunkte", "in stichpunkte"],
        "Wandle den Text in Stichpunkte um.",
    ),
];

/// Deterministic intents answered without any endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FastTrack {
    CountWords,
    CountChars,
    CountSentences,
    NormalizeWhitespace,
    TidyPunctuation,
}

const FAST_TRACK_TABLE: &[(&[&str], FastTrack)] = &[
    (
        &["wie viele wörter", "wieviele wörter", "anzahl wörter", "wortanzahl", "zähle die wörter"],
        FastTrack::CountWords,
    ),
    (
        &["wie viele zeichen", "wieviele zeichen", "anzahl zeichen", "zeichenanzahl"],
        FastTrack::CountChars,
    ),
    (
        &["wie viele sätze", "wieviele sätze", "anzahl sätze", "satzanzahl"],
        FastTrack::CountSentences,
    ),
    (
        &[
            "entferne doppelte leerzeichen",
            "normalisiere leerzeichen",
            "bereinige leerzeichen",
        ],
        FastTrack::NormalizeWhitespace,
    ),
    (
        &["bereinige satzzeichen", "räume den text auf"],
        FastTrack::TidyPunctuation,
    ),
];

struct CacheEntry {
    text: String,
    stored_at: Instant,
}

/// Two-tier command resolver with a bounded-TTL result cache
pub struct CommandDispatcher {
    cache: HashMap<String, CacheEntry>,
    cache_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl CommandDispatcher {
    pub fn new(cache_ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            cache: HashMap::new(),
            cache_ttl,
            clock,
        }
    }

    /// Resolve a raw spoken command against the source text
    pub fn resolve(&mut self, raw_command: &str, source_text: &str) -> Resolution {
        let normalized = normalize(raw_command);
        let canonical = canonicalize(&normalized);

        let key = cache_key(&canonical, source_text);
        let cached = self
            .cache
            .get(&key)
            .map(|entry| (entry.text.clone(), entry.stored_at));
        if let Some((text, stored_at)) = cached {
            if self.clock.now().duration_since(stored_at) < self.cache_ttl {
                tracing::debug!("Command cache hit: {:?}", canonical);
                return Resolution::Ready(text);
            }
            self.cache.remove(&key);
        }

        if let Some(intent) = match_fast_track(&normalized) {
            let result = run_fast_track(intent, source_text);
            tracing::debug!("Fast-track handled command offline: {:?}", intent);
            self.cache.insert(
                key,
                CacheEntry {
                    text: result.clone(),
                    stored_at: self.clock.now(),
                },
            );
            return Resolution::Ready(result);
        }

        Resolution::Remote(canonical)
    }

    /// Store a successful remote result so an identical request inside the
    /// TTL is answered instantly
    pub fn store(&mut self, canonical_command: &str, source_text: &str, result: &str) {
        self.cache.insert(
            cache_key(canonical_command, source_text),
            CacheEntry {
                text: result.to_string(),
                stored_at: self.clock.now(),
            },
        );
    }
}

fn normalize(raw: &str) -> String {
    raw.to_lowercase()
        .chars()
        .filter(|c| !matches!(c, '.' | ',' | '!' | '?'))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Map the normalized command onto the canonical vocabulary; unmatched
/// commands pass through verbatim as their own instruction
fn canonicalize(normalized: &str) -> String {
    for (phrasings, canonical) in PHRASING_TABLE {
        for phrase in *phrasings {
            if normalized.contains(phrase) {
                return (*canonical).to_string();
            }
        }
    }
    normalized.to_string()
}

fn match_fast_track(normalized: &str) -> Option<FastTrack> {
    for (phrasings, intent) in FAST_TRACK_TABLE {
        for phrase in *phrasings {
            if normalized.contains(phrase) {
                return Some(*intent);
            }
        }
    }
    None
}

fn run_fast_track(intent: FastTrack, source_text: &str) -> String {
    match intent {
        FastTrack::CountWords => {
            let n = source_text.split_whitespace().count();
            if n == 1 {
                "1 Wort".to_string()
            } else {
                format!("{} Wörter", n)
            }
        }
        FastTrack::CountChars => {
            let n = source_text.chars().count();
            format!("{} Zeichen", n)
        }
        FastTrack::CountSentences => {
            let n = count_sentences(source_text);
            if n == 1 {
                "1 Satz".to_string()
            } else {
                format!("{} Sätze", n)
            }
        }
        FastTrack::NormalizeWhitespace => normalize_whitespace(source_text),
        FastTrack::TidyPunctuation => tidy_punctuation(&normalize_whitespace(source_text)),
    }
}

fn count_sentences(text: &str) -> usize {
    text.split(['.', '!', '?'])
        .filter(|s| !s.trim().is_empty())
        .count()
}

/// Collapse runs of whitespace to single spaces, preserving paragraph breaks
fn normalize_whitespace(text: &str) -> String {
    text.split("\n\n")
        .map(|para| para.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|para| !para.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Remove stray spaces before closing punctuation
fn tidy_punctuation(text: &str) -> String {
    let mut result = text.to_string();
    for punct in ['.', ',', '?', '!', ':', ';', ')', ']'] {
        result = result.replace(&format!(" {}", punct), &punct.to_string());
    }
    result
}

/// Composite key: canonical command plus a bounded source prefix, so huge
/// selections don't bloat the cache while near-identical requests still hit
fn cache_key(canonical: &str, source_text: &str) -> String {
    let prefix: String = source_text.chars().take(64).collect();
    format!("{}\u{1}{}", canonical, prefix)
}
