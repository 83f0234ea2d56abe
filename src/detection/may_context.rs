//! Disambiguation of "may" between the month and the modal verb.

const TEMPORAL_PREPOSITIONS: &[&str] = &[
    "in", "during", "last", "next", "this", "of", "since", "before", "after", "until", "by",
];
const ORDINAL_SUFFIXES: &[&str] = &["st", "nd", "rd", "th"];

#[derive(Debug, Clone, Copy)]
pub struct MayContextRule {
    /// Characters inspected on each side of the token.
    pub window: usize,
    pub proper_noun: bool,
}

impl MayContextRule {
    /// Whether the "may" occupying `text[start..end]` (byte offsets) reads as the month.
    pub fn is_month(&self, text: &str, start: usize, end: usize) -> bool {
        let before = window_before(text, start, self.window).to_ascii_lowercase();
        let after = window_after(text, end, self.window).to_ascii_lowercase();

        preceded_by_temporal_preposition(&before)
            || followed_by_day_of_month(&after)
            || followed_by_of_year(&after)
            || (text[..start].trim().is_empty() && followed_by_digit(&after))
            || (self.proper_noun && is_mid_sentence_title_case(text, start, end))
    }
}

fn window_before(text: &str, start: usize, window: usize) -> &str {
    let from = text[..start]
        .char_indices()
        .rev()
        .take(window)
        .last()
        .map(|(i, _)| i)
        .unwrap_or(start);
    &text[from..start]
}

fn window_after(text: &str, end: usize, window: usize) -> &str {
    let to = text[end..]
        .char_indices()
        .nth(window)
        .map(|(i, _)| end + i)
        .unwrap_or(text.len());
    &text[end..to]
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn at_boundary(rest: &str) -> bool {
    rest.chars().next().map_or(true, |c| !is_word_char(c))
}

/// Leading whitespace is mandatory: "may15" is not a date.
fn after_whitespace(after: &str) -> Option<&str> {
    let trimmed = after.trim_start();
    (trimmed.len() < after.len()).then_some(trimmed)
}

fn preceded_by_temporal_preposition(before: &str) -> bool {
    if !before.ends_with(char::is_whitespace) {
        return false;
    }
    let trimmed = before.trim_end();
    let word_start = trimmed
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_alphabetic())
        .last()
        .map(|(i, _)| i)
        .unwrap_or(trimmed.len());
    TEMPORAL_PREPOSITIONS.contains(&&trimmed[word_start..])
}

fn split_leading_digits(s: &str) -> (&str, &str) {
    let n = s.bytes().take_while(u8::is_ascii_digit).count();
    s.split_at(n)
}

fn followed_by_day_of_month(after: &str) -> bool {
    let Some(rest) = after_whitespace(after) else {
        return false;
    };
    let (digits, rest) = split_leading_digits(rest);
    if digits.is_empty() || digits.len() > 2 {
        return false;
    }
    let ordinal = ORDINAL_SUFFIXES
        .iter()
        .find_map(|suffix| rest.strip_prefix(suffix))
        .filter(|tail| at_boundary(tail));
    ordinal.is_some() || at_boundary(rest)
}

fn followed_by_of_year(after: &str) -> bool {
    let Some(rest) = after_whitespace(after) else {
        return false;
    };
    let Some(rest) = rest.strip_prefix("of") else {
        return false;
    };
    let Some(rest) = after_whitespace(rest) else {
        return false;
    };
    let (digits, rest) = split_leading_digits(rest);
    digits.len() == 4 && at_boundary(rest)
}

fn followed_by_digit(after: &str) -> bool {
    after_whitespace(after)
        .and_then(|rest| rest.chars().next())
        .is_some_and(|c| c.is_ascii_digit())
}

/// "May" written in title case after the start of a sentence. Recognizers
/// capitalize the month but leave the modal verb lowercase mid-sentence.
fn is_mid_sentence_title_case(text: &str, start: usize, end: usize) -> bool {
    let token = text[start..end].trim_matches(|c: char| !c.is_alphabetic());
    let mut chars = token.chars();
    let title_case = chars.next().is_some_and(char::is_uppercase) && chars.all(char::is_lowercase);
    if !title_case {
        return false;
    }
    match text[..start].trim_end().chars().next_back() {
        None => false,
        Some(c) => !matches!(c, '.' | '!' | '?'),
    }
}
