use std::collections::HashMap;

use serde::Serialize;

use crate::types::{PiiCategory, PiiMatch, TranscriptSegment, TranscriptionResult, WordTimestamp};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RedactionLogEntry {
    pub original: String,
    #[serde(rename = "replacement")]
    pub replacement_label: &'static str,
    pub category: PiiCategory,
    pub start_time: f64,
    pub end_time: f64,
    pub confidence: f32,
    pub is_fuzzy: bool,
}

/// Transcript with every PII span replaced by its category label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RedactedTranscript {
    pub conversation_id: String,
    pub original_text: String,
    pub redacted_text: String,
    pub segments: Vec<TranscriptSegment>,
    /// One entry per redacted span.
    #[serde(rename = "redactions")]
    pub redaction_log: Vec<RedactionLogEntry>,
    pub pii_count: usize,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TextRedactor;

impl TextRedactor {
    /// Substitutes labels for matched words, segment by segment.
    ///
    /// The label is emitted at the first word of a match; the remaining words
    /// of a multi-word match are dropped. The label keeps the match's time
    /// range and confidence so the redacted words still line up with audio.
    pub fn redact(
        &self,
        transcript: &TranscriptionResult,
        matches: &[PiiMatch],
    ) -> RedactedTranscript {
        let owner: HashMap<usize, &PiiMatch> = matches
            .iter()
            .flat_map(|m| m.word_indices.iter().map(move |&i| (i, m)))
            .collect();

        let mut redaction_log = Vec::with_capacity(matches.len());
        let mut global_index = 0usize;
        let segments: Vec<TranscriptSegment> = transcript
            .segments
            .iter()
            .map(|segment| {
                let mut words = Vec::with_capacity(segment.words.len());
                for word in &segment.words {
                    match owner.get(&global_index) {
                        Some(m) if m.first_word_index() == Some(global_index) => {
                            let label = m.category.label();
                            words.push(WordTimestamp {
                                word: label.to_string(),
                                start: m.start_time,
                                end: m.end_time,
                                confidence: m.confidence,
                            });
                            redaction_log.push(RedactionLogEntry {
                                original: m.text.clone(),
                                replacement_label: label,
                                category: m.category,
                                start_time: m.start_time,
                                end_time: m.end_time,
                                confidence: m.confidence,
                                is_fuzzy: m.is_fuzzy,
                            });
                        }
                        Some(_) => {}
                        None => words.push(word.clone()),
                    }
                    global_index += 1;
                }
                TranscriptSegment {
                    text: words
                        .iter()
                        .map(|w| w.word.trim())
                        .collect::<Vec<_>>()
                        .join(" "),
                    start: segment.start,
                    end: segment.end,
                    words,
                }
            })
            .collect();

        let redacted_text = segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        tracing::info!(
            conversation_id = %transcript.conversation_id,
            redactions = redaction_log.len(),
            "transcript redacted"
        );

        RedactedTranscript {
            conversation_id: transcript.conversation_id.clone(),
            original_text: transcript.full_text(),
            redacted_text,
            segments,
            pii_count: redaction_log.len(),
            redaction_log,
        }
    }
}
