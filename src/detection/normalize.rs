use crate::lexicon::LexiconIndex;

const TRAILING_PUNCTUATION: &[char] = &['.', ',', '!', '?', ';', ':', '"', '\'', '\u{2019}', '\u{201d}'];
const LEADING_PUNCTUATION: &[char] = &['"', '\'', '\u{2018}', '\u{201c}'];

/// Canonical matching form of a transcribed word.
///
/// Trims whitespace, lowercases, drops a possessive `'s`, trims surrounding punctuation and
/// singularizes a plural only when the singular is itself a known term, so
/// "Mondays" becomes "monday" while "dress" and "bus" are left alone.
pub fn normalize(word: &str, index: &LexiconIndex) -> String {
    let mut word = word.trim().to_lowercase();

    for suffix in ["'s", "\u{2019}s"] {
        if let Some(stripped) = word.strip_suffix(suffix) {
            word = stripped.to_string();
            break;
        }
    }

    let word = word
        .trim_end_matches(TRAILING_PUNCTUATION)
        .trim_start_matches(LEADING_PUNCTUATION);

    if word.ends_with('s') && !word.ends_with("ss") && word.chars().count() > 3 {
        let singular = &word[..word.len() - 1];
        if index.is_single_word_term(singular) {
            return singular.to_string();
        }
    }

    word.to_string()
}

/// Normalizes each whitespace-separated token and rejoins them with single spaces.
pub fn normalize_phrase(phrase: &str, index: &LexiconIndex) -> String {
    phrase
        .split_whitespace()
        .map(|w| normalize(w, index))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(word: &str) -> String {
        normalize(word, LexiconIndex::shared())
    }

    #[test]
    fn lowercases() {
        assert_eq!(norm("MONDAY"), "monday");
        assert_eq!(norm("Houston"), "houston");
    }

    #[test]
    fn trims_engine_whitespace() {
        assert_eq!(norm(" red"), "red");
        assert_eq!(norm(" Utah "), "utah");
        assert_eq!(norm("\tHouston's"), "houston");
    }

    #[test]
    fn strips_possessives() {
        assert_eq!(norm("Monday's"), "monday");
        assert_eq!(norm("Houston\u{2019}s"), "houston");
    }

    #[test]
    fn strips_surrounding_punctuation() {
        assert_eq!(norm("Houston,"), "houston");
        assert_eq!(norm("Monday."), "monday");
        assert_eq!(norm("Texas?"), "texas");
        assert_eq!(norm("\"Houston\""), "houston");
    }

    #[test]
    fn singularizes_only_known_terms() {
        assert_eq!(norm("Mondays"), "monday");
        assert_eq!(norm("Tuesdays"), "tuesday");
        assert_eq!(norm("dress"), "dress");
        assert_eq!(norm("bus"), "bus");
        assert_eq!(norm("atlas"), "atlas");
    }

    #[test]
    fn empty_word_stays_empty() {
        assert_eq!(norm(""), "");
        assert_eq!(norm("..."), "");
    }

    #[test]
    fn phrase_rejoins_with_single_spaces() {
        assert_eq!(
            normalize_phrase("New   York's  City.", LexiconIndex::shared()),
            "new york city"
        );
    }
}
