use std::collections::HashMap;

use crate::config::MatcherConfig;
use crate::detection::distance::levenshtein;
use crate::detection::may_context::MayContextRule;
use crate::detection::normalize::normalize;
use crate::lexicon::{LexiconIndex, LexiconTerm};
use crate::types::{PiiMatch, WordTimestamp};

const AMBIGUOUS_MONTH: &str = "may";

/// Two-layer span matcher over a timestamped word sequence.
///
/// Layer one scans exact phrases longest-first; layer two fuzzy-matches the
/// single words the first layer left unclaimed. Each word belongs to at most
/// one match.
pub struct SpanMatcher<'a> {
    index: &'a LexiconIndex,
    config: &'a MatcherConfig,
    /// First term in scan order for each surface form.
    exact: HashMap<&'static str, &'a LexiconTerm>,
    fuzzy_candidates: Vec<&'a LexiconTerm>,
}

/// Trimmed raw words joined with single spaces, with the byte range of each word.
struct RawText {
    text: String,
    spans: Vec<(usize, usize)>,
}

impl RawText {
    fn new(words: &[WordTimestamp]) -> Self {
        let mut text = String::new();
        let mut spans = Vec::with_capacity(words.len());
        for (i, w) in words.iter().enumerate() {
            if i > 0 {
                text.push(' ');
            }
            let start = text.len();
            text.push_str(w.word.trim());
            spans.push((start, text.len()));
        }
        Self { text, spans }
    }
}

struct FuzzyCandidate<'t> {
    term: &'t LexiconTerm,
    distance: usize,
    confidence: f32,
}

impl<'a> SpanMatcher<'a> {
    pub fn new(index: &'a LexiconIndex, config: &'a MatcherConfig) -> Self {
        let mut exact = HashMap::new();
        for term in index.sorted_terms() {
            exact.entry(term.term).or_insert(term);
        }
        let fuzzy_candidates = index
            .sorted_terms()
            .iter()
            .filter(|t| t.is_single_word() && t.char_len() >= config.fuzzy_min_len)
            .collect();
        Self {
            index,
            config,
            exact,
            fuzzy_candidates,
        }
    }

    pub fn may_rule(&self) -> MayContextRule {
        MayContextRule {
            window: self.config.may_context_window,
            proper_noun: self.config.may_proper_noun_rule,
        }
    }

    /// Detects PII spans, sorted by start time.
    pub fn detect(&self, words: &[WordTimestamp]) -> Vec<PiiMatch> {
        if words.is_empty() {
            return Vec::new();
        }

        let raw = RawText::new(words);
        let normalized: Vec<String> = words
            .iter()
            .map(|w| normalize(&w.word, self.index))
            .collect();
        let mut consumed = vec![false; words.len()];

        let mut matches = self.exact_layer(words, &normalized, &raw, &mut consumed);
        let exact_count = matches.len();
        matches.extend(self.fuzzy_layer(words, &normalized, &raw, &mut consumed));

        matches.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));

        tracing::debug!(
            words = words.len(),
            exact = exact_count,
            fuzzy = matches.len() - exact_count,
            "span detection complete"
        );
        matches
    }

    fn exact_layer(
        &self,
        words: &[WordTimestamp],
        normalized: &[String],
        raw: &RawText,
        consumed: &mut [bool],
    ) -> Vec<PiiMatch> {
        let mut matches = Vec::new();
        let mut i = 0;
        while i < words.len() {
            if consumed[i] {
                i += 1;
                continue;
            }

            let longest = self.config.max_phrase_len.min(words.len() - i);
            let found = (1..=longest).rev().find_map(|len| {
                let range = i..i + len;
                if consumed[range.clone()].iter().any(|&c| c) {
                    return None;
                }
                let phrase = normalized[range.clone()].join(" ");
                let term = self.exact.get(phrase.as_str())?;
                if term.word_count != len {
                    return None;
                }
                if term.term == AMBIGUOUS_MONTH && !self.accepts_may(raw, i) {
                    tracing::debug!(index = i, "\"may\" read as modal verb");
                    return None;
                }
                Some((*term, len))
            });

            match found {
                Some((term, len)) => {
                    consumed[i..i + len].iter_mut().for_each(|c| *c = true);
                    matches.push(build_match(words, i, len, term, 1.0, false));
                    i += len;
                }
                None => i += 1,
            }
        }
        matches
    }

    fn fuzzy_layer(
        &self,
        words: &[WordTimestamp],
        normalized: &[String],
        raw: &RawText,
        consumed: &mut [bool],
    ) -> Vec<PiiMatch> {
        let mut matches = Vec::new();
        for i in 0..words.len() {
            if consumed[i] {
                continue;
            }
            let word = normalized[i].as_str();
            if self.config.fuzzy_exclusions.contains(word) {
                continue;
            }
            let Some(candidate) = self.best_fuzzy_candidate(word) else {
                continue;
            };
            if candidate.term.term == AMBIGUOUS_MONTH && !self.accepts_may(raw, i) {
                continue;
            }

            tracing::debug!(
                word,
                term = candidate.term.term,
                distance = candidate.distance,
                confidence = candidate.confidence,
                "fuzzy match"
            );
            consumed[i] = true;
            matches.push(build_match(
                words,
                i,
                1,
                candidate.term,
                candidate.confidence,
                true,
            ));
        }
        matches
    }

    fn best_fuzzy_candidate(&self, word: &str) -> Option<FuzzyCandidate<'a>> {
        let word_len = word.chars().count();
        if word_len < self.config.fuzzy_min_len {
            return None;
        }

        let mut best: Option<(&LexiconTerm, usize, usize)> = None;
        for &term in &self.fuzzy_candidates {
            let distance = levenshtein(word, term.term);
            if distance > self.config.fuzzy_max_distance {
                continue;
            }
            if distance >= 2 && word_len < self.config.fuzzy_distance_two_min_len {
                continue;
            }
            let longest = word_len.max(term.char_len());
            if distance as f64 / longest as f64 > self.config.fuzzy_max_relative_distance {
                continue;
            }
            // Strict comparison keeps the first term in scan order on ties.
            if best.map_or(true, |(_, d, _)| distance < d) {
                best = Some((term, distance, longest));
            }
        }

        let (term, distance, longest) = best?;
        let confidence = (1.0 - distance as f64 / longest as f64) as f32;
        (confidence >= self.config.fuzzy_min_confidence).then_some(FuzzyCandidate {
            term,
            distance,
            confidence,
        })
    }

    fn accepts_may(&self, raw: &RawText, word_index: usize) -> bool {
        let (start, end) = raw.spans[word_index];
        self.may_rule().is_month(&raw.text, start, end)
    }
}

fn build_match(
    words: &[WordTimestamp],
    first: usize,
    len: usize,
    term: &LexiconTerm,
    confidence: f32,
    is_fuzzy: bool,
) -> PiiMatch {
    let covered = &words[first..first + len];
    PiiMatch {
        text: covered
            .iter()
            .map(|w| w.word.trim())
            .collect::<Vec<_>>()
            .join(" "),
        category: term.category,
        start_time: covered[0].start,
        end_time: covered[len - 1].end,
        confidence,
        word_indices: (first..first + len).collect(),
        is_fuzzy,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PiiCategory;

    fn words(text: &str) -> Vec<WordTimestamp> {
        text.split_whitespace()
            .enumerate()
            .map(|(i, w)| WordTimestamp::new(w, i as f64 * 0.5, i as f64 * 0.5 + 0.4))
            .collect()
    }

    fn detect_with(text: &str, config: &MatcherConfig) -> Vec<PiiMatch> {
        SpanMatcher::new(LexiconIndex::shared(), config).detect(&words(text))
    }

    fn detect(text: &str) -> Vec<PiiMatch> {
        detect_with(text, &MatcherConfig::default())
    }

    fn assert_disjoint_contiguous(matches: &[PiiMatch]) {
        let mut seen = std::collections::HashSet::new();
        for m in matches {
            for pair in m.word_indices.windows(2) {
                assert_eq!(pair[1], pair[0] + 1);
            }
            for &i in &m.word_indices {
                assert!(seen.insert(i), "word {i} claimed twice");
            }
        }
    }

    #[test]
    fn whitespace_padded_words_match_exactly() {
        let padded: Vec<WordTimestamp> = [" the", " red", " car", " in", " Utah", " on", " Monday"]
            .iter()
            .enumerate()
            .map(|(i, w)| WordTimestamp::new(*w, i as f64 * 0.5, i as f64 * 0.5 + 0.4))
            .collect();
        let config = MatcherConfig::default();
        let matches = SpanMatcher::new(LexiconIndex::shared(), &config).detect(&padded);
        let found: Vec<(&str, bool)> = matches
            .iter()
            .map(|m| (m.text.as_str(), m.is_fuzzy))
            .collect();
        assert_eq!(found, vec![("red", false), ("Utah", false), ("Monday", false)]);
        assert!(matches.iter().all(|m| m.confidence == 1.0));
    }

    #[test]
    fn city_state_and_day() {
        let matches = detect("I visited Houston Texas on Monday");
        let found: Vec<(PiiCategory, &str)> = matches
            .iter()
            .map(|m| (m.category, m.text.as_str()))
            .collect();
        assert_eq!(
            found,
            vec![
                (PiiCategory::City, "Houston"),
                (PiiCategory::State, "Texas"),
                (PiiCategory::Day, "Monday"),
            ]
        );
        assert!(matches.iter().all(|m| !m.is_fuzzy && m.confidence == 1.0));
        assert_eq!(matches[0].word_indices, vec![2]);
        assert!((matches[0].start_time - 1.0).abs() < 1e-9);
        assert!((matches[0].end_time - 1.4).abs() < 1e-9);
    }

    #[test]
    fn longest_phrase_wins() {
        let matches = detect("New York City is great");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].category, PiiCategory::City);
        assert_eq!(matches[0].word_indices, vec![0, 1, 2]);
        assert_eq!(matches[0].text, "New York City");
        assert!((matches[0].end_time - 1.4).abs() < 1e-9);

        let matches = detect("we drove to West Virginia");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].word_indices, vec![3, 4]);
        assert_eq!(matches[0].category, PiiCategory::State);
    }

    #[test]
    fn punctuation_and_possessives_do_not_block_phrases() {
        let matches = detect("Houston's best, in New York.");
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[1].word_indices, vec![3, 4]);
    }

    #[test]
    fn color_embedding_city_is_city() {
        let matches = detect("we moved to Brownsville last year");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].category, PiiCategory::City);
    }

    #[test]
    fn modal_may_is_ignored() {
        assert!(detect("You may proceed").is_empty());
        let matches = detect("In May we travel");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].category, PiiCategory::Month);
        let matches = detect("May 15th is the date");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].word_indices, vec![0]);
    }

    #[test]
    fn may_distinguished_within_one_utterance() {
        let matches = detect("You may go, but May the weather is fine");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].category, PiiCategory::Month);
        assert_eq!(matches[0].word_indices, vec![4]);
    }

    #[test]
    fn fuzzy_match_on_transcription_error() {
        let matches = detect("see you on munday then");
        assert_eq!(matches.len(), 1);
        let m = &matches[0];
        assert!(m.is_fuzzy);
        assert_eq!(m.category, PiiCategory::Day);
        assert!(m.confidence >= 0.7 && m.confidence < 1.0);
        assert_eq!(m.text, "munday");
    }

    #[test]
    fn excluded_words_never_fuzzy_match() {
        assert!(detect("I went back to the salon").is_empty());

        let mut permissive = MatcherConfig::default();
        permissive.fuzzy_exclusions.clear();
        let matches = detect_with("I went back to the salon", &permissive);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].category, PiiCategory::Color);
    }

    #[test]
    fn distance_two_needs_long_word() {
        // "purpel" is two edits from "purple" but only six characters long.
        assert!(detect("a purpel hat").is_empty());
        let matches = detect("in wednesdya morning");
        assert_eq!(matches.len(), 1);
        assert!(matches[0].is_fuzzy);
    }

    #[test]
    fn matches_never_overlap() {
        let matches =
            detect("Kansas City Kansas on Friday in new york city or salt lake city utah red");
        assert_disjoint_contiguous(&matches);
        assert_eq!(matches.len(), 7);
        for pair in matches.windows(2) {
            assert!(pair[0].start_time <= pair[1].start_time);
        }
    }

    #[test]
    fn empty_input() {
        assert!(detect("").is_empty());
    }
}
