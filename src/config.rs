use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::DeidError;

/// Words that must never be fuzzy-matched to a lexicon term. They are common
/// English words one or two edits away from a color, month or state.
pub const DEFAULT_FUZZY_EXCLUSIONS: &[&str] = &[
    "like", "back", "lack", "lick", "lock", "luck", "read", "lead", "bead", "dead", "head",
    "plan", "clan", "scan", "lime", "time", "dime", "mime", "goal", "coal", "foal", "pin", "tin",
    "bin", "fin", "win", "sin", "pint", "pine", "ping", "tank", "sank", "rank", "bank", "beat",
    "heat", "meat", "neat", "seat", "tale", "tall", "remember", "november", "september",
    "december", "member", "ember", "around", "round", "sound", "found", "bound", "texture",
    "mixture", "fixture", "salon", "gallon", "talon",
];

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Longest phrase, in words, tried by the exact layer.
    pub max_phrase_len: usize,
    pub fuzzy_max_distance: usize,
    /// Minimum length of both the word and the term for fuzzy matching.
    pub fuzzy_min_len: usize,
    /// Minimum word length at which an edit distance of two is tolerated.
    pub fuzzy_distance_two_min_len: usize,
    pub fuzzy_max_relative_distance: f64,
    pub fuzzy_min_confidence: f32,
    /// Characters of raw text inspected on each side of an ambiguous "may".
    pub may_context_window: usize,
    /// Accept a title-case "May" in the middle of a sentence as the month.
    pub may_proper_noun_rule: bool,
    pub fuzzy_exclusions: BTreeSet<String>,
}

impl MatcherConfig {
    pub const DEFAULT_MAX_PHRASE_LEN: usize = 4;
    pub const DEFAULT_FUZZY_MAX_DISTANCE: usize = 2;
    pub const DEFAULT_FUZZY_MIN_LEN: usize = 5;
    pub const DEFAULT_FUZZY_DISTANCE_TWO_MIN_LEN: usize = 7;
    pub const DEFAULT_FUZZY_MAX_RELATIVE_DISTANCE: f64 = 0.25;
    pub const DEFAULT_FUZZY_MIN_CONFIDENCE: f32 = 0.7;
    pub const DEFAULT_MAY_CONTEXT_WINDOW: usize = 20;

    pub fn with_exclusions<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fuzzy_exclusions
            .extend(words.into_iter().map(|w| w.into().to_lowercase()));
        self
    }
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            max_phrase_len: Self::DEFAULT_MAX_PHRASE_LEN,
            fuzzy_max_distance: Self::DEFAULT_FUZZY_MAX_DISTANCE,
            fuzzy_min_len: Self::DEFAULT_FUZZY_MIN_LEN,
            fuzzy_distance_two_min_len: Self::DEFAULT_FUZZY_DISTANCE_TWO_MIN_LEN,
            fuzzy_max_relative_distance: Self::DEFAULT_FUZZY_MAX_RELATIVE_DISTANCE,
            fuzzy_min_confidence: Self::DEFAULT_FUZZY_MIN_CONFIDENCE,
            may_context_window: Self::DEFAULT_MAY_CONTEXT_WINDOW,
            may_proper_noun_rule: true,
            fuzzy_exclusions: DEFAULT_FUZZY_EXCLUSIONS
                .iter()
                .map(|w| w.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BleepConfig {
    pub min_bleep_secs: f64,
    pub padding_before_secs: f64,
    pub padding_after_secs: f64,
    /// Regions closer than this are folded into one continuous bleep.
    pub merge_gap_secs: f64,
    pub tone_frequency_hz: f32,
    pub tone_amplitude: f32,
    pub fade_secs: f64,
}

impl BleepConfig {
    pub const DEFAULT_MIN_BLEEP_SECS: f64 = 0.4;
    pub const DEFAULT_PADDING_SECS: f64 = 0.15;
    pub const DEFAULT_MERGE_GAP_SECS: f64 = 0.1;
    pub const DEFAULT_TONE_FREQUENCY_HZ: f32 = 1000.0;
    pub const DEFAULT_TONE_AMPLITUDE: f32 = 0.5;
    pub const DEFAULT_FADE_SECS: f64 = 0.01;
}

impl Default for BleepConfig {
    fn default() -> Self {
        Self {
            min_bleep_secs: Self::DEFAULT_MIN_BLEEP_SECS,
            padding_before_secs: Self::DEFAULT_PADDING_SECS,
            padding_after_secs: Self::DEFAULT_PADDING_SECS,
            merge_gap_secs: Self::DEFAULT_MERGE_GAP_SECS,
            tone_frequency_hz: Self::DEFAULT_TONE_FREQUENCY_HZ,
            tone_amplitude: Self::DEFAULT_TONE_AMPLITUDE,
            fade_secs: Self::DEFAULT_FADE_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    /// Up to this many residual findings are reviewable; more is a failure.
    pub review_threshold: usize,
    /// Findings at or above this confidence are treated as real leaks.
    pub high_confidence_threshold: f32,
}

impl VerifierConfig {
    pub const DEFAULT_REVIEW_THRESHOLD: usize = 2;
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            review_threshold: Self::DEFAULT_REVIEW_THRESHOLD,
            high_confidence_threshold: MatcherConfig::DEFAULT_FUZZY_MIN_CONFIDENCE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DeidConfig {
    pub matcher: MatcherConfig,
    pub bleep: BleepConfig,
    pub verifier: VerifierConfig,
    pub output_dir: PathBuf,
    pub verify_audio: bool,
    pub save_outputs: bool,
    /// Upper bound on a single external transcription call, in seconds.
    pub transcription_timeout_secs: Option<f64>,
    /// Recordings processed concurrently. `0` lets the pool pick from available cores.
    pub workers: usize,
}

impl DeidConfig {
    pub const DEFAULT_OUTPUT_DIR: &'static str = "output";

    pub fn load(path: &Path) -> Result<Self, DeidError> {
        let data =
            std::fs::read_to_string(path).map_err(|e| DeidError::io("read config file", e))?;
        serde_json::from_str(&data).map_err(|e| DeidError::json("parse config file", e))
    }

    pub fn transcription_timeout(&self) -> Option<Duration> {
        self.transcription_timeout_secs
            .filter(|secs| secs.is_finite() && *secs > 0.0)
            .map(Duration::from_secs_f64)
    }
}

impl Default for DeidConfig {
    fn default() -> Self {
        Self {
            matcher: MatcherConfig::default(),
            bleep: BleepConfig::default(),
            verifier: VerifierConfig::default(),
            output_dir: PathBuf::from(Self::DEFAULT_OUTPUT_DIR),
            verify_audio: true,
            save_outputs: true,
            transcription_timeout_secs: None,
            workers: 0,
        }
    }
}
