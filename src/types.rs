use std::fmt;

use serde::{Deserialize, Serialize};

/// A single recognized word. Times are in seconds from the start of the recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordTimestamp {
    pub word: String,
    pub start: f64,
    pub end: f64,
    /// Recognizer probability in [0, 1].
    #[serde(default = "default_confidence")]
    pub confidence: f32,
}

fn default_confidence() -> f32 {
    1.0
}

impl WordTimestamp {
    pub fn new(word: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            word: word.into(),
            start,
            end,
            confidence: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub text: String,
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub words: Vec<WordTimestamp>,
}

/// Output of the external speech-to-text engine for one recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionResult {
    #[serde(default)]
    pub conversation_id: String,
    #[serde(default)]
    pub audio_path: String,
    #[serde(alias = "duration")]
    pub audio_duration: f64,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_language_probability")]
    pub language_probability: f32,
    pub segments: Vec<TranscriptSegment>,
}

fn default_language() -> String {
    "en".to_string()
}

fn default_language_probability() -> f32 {
    1.0
}

impl TranscriptionResult {
    /// Build a single-segment transcript from loose words. Mostly useful for tests
    /// and for callers that only have a flat word list.
    pub fn from_words(conversation_id: impl Into<String>, words: Vec<WordTimestamp>) -> Self {
        let start = words.first().map(|w| w.start).unwrap_or(0.0);
        let end = words.last().map(|w| w.end).unwrap_or(0.0);
        let text = words
            .iter()
            .map(|w| w.word.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        Self {
            conversation_id: conversation_id.into(),
            audio_path: String::new(),
            audio_duration: end,
            language: default_language(),
            language_probability: 1.0,
            segments: vec![TranscriptSegment {
                text,
                start,
                end,
                words,
            }],
        }
    }

    /// Words of every segment, in global order. Indices into this list are the
    /// `word_indices` carried by [`PiiMatch`].
    pub fn all_words(&self) -> Vec<WordTimestamp> {
        self.segments
            .iter()
            .flat_map(|segment| segment.words.iter().cloned())
            .collect()
    }

    pub fn word_count(&self) -> usize {
        self.segments.iter().map(|segment| segment.words.len()).sum()
    }

    pub fn full_text(&self) -> String {
        self.segments
            .iter()
            .map(|segment| segment.text.trim())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PiiCategory {
    Day,
    Month,
    Color,
    State,
    City,
}

impl PiiCategory {
    pub const ALL: [PiiCategory; 5] = [
        PiiCategory::Day,
        PiiCategory::Month,
        PiiCategory::Color,
        PiiCategory::State,
        PiiCategory::City,
    ];

    /// Token substituted for a redacted span.
    pub fn label(self) -> &'static str {
        match self {
            Self::Day => "[DAY]",
            Self::Month => "[MONTH]",
            Self::Color => "[COLOR]",
            Self::State => "[STATE]",
            Self::City => "[CITY]",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Month => "month",
            Self::Color => "color",
            Self::State => "state",
            Self::City => "city",
        }
    }

    /// Lower ranks win when the same surface form belongs to several categories.
    /// Cities come first so color-embedding city names are never claimed as colors.
    pub(crate) fn priority(self) -> u8 {
        match self {
            Self::City => 0,
            Self::State => 1,
            Self::Day => 2,
            Self::Month => 3,
            Self::Color => 4,
        }
    }
}

impl fmt::Display for PiiCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A contiguous run of transcript words identified as PII.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PiiMatch {
    pub text: String,
    pub category: PiiCategory,
    pub start_time: f64,
    pub end_time: f64,
    /// 1.0 for exact matches, below 1.0 for fuzzy ones.
    pub confidence: f32,
    pub word_indices: Vec<usize>,
    pub is_fuzzy: bool,
}

impl PiiMatch {
    pub fn first_word_index(&self) -> Option<usize> {
        self.word_indices.first().copied()
    }
}

/// A PII occurrence found in plain text. Offsets are byte positions in the scanned text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextFinding {
    pub text: String,
    pub category: PiiCategory,
    pub start: usize,
    pub end: usize,
    pub confidence: f32,
}
