use crate::detection::may_context::MayContextRule;
use crate::lexicon::LexiconIndex;
use crate::types::TextFinding;

fn is_word_char_before(text: &str, pos: usize) -> bool {
    text[..pos]
        .chars()
        .next_back()
        .is_some_and(|c| c.is_alphanumeric() || c == '_')
}

fn is_word_char_after(text: &str, pos: usize) -> bool {
    text[pos..]
        .chars()
        .next()
        .is_some_and(|c| c.is_alphanumeric() || c == '_')
}

/// Longest-first scan of plain text on word boundaries. No fuzzy layer.
///
/// Terms are tried in index order; a hit overlapping bytes already claimed by
/// a longer term is skipped. Offsets in the returned findings are byte
/// positions in `text`, sorted ascending.
pub fn detect_in_text(
    text: &str,
    index: &LexiconIndex,
    may_rule: MayContextRule,
) -> Vec<TextFinding> {
    // ASCII lowercasing keeps byte offsets aligned with `text`.
    let lower = text.to_ascii_lowercase();
    let mut claimed = vec![false; text.len()];
    let mut findings = Vec::new();

    for term in index.sorted_terms() {
        let mut pos = 0;
        while let Some(found) = lower[pos..].find(term.term) {
            let start = pos + found;
            let end = start + term.term.len();

            if is_word_char_before(&lower, start) || is_word_char_after(&lower, end) {
                pos = start + 1;
                continue;
            }
            if claimed[start..end].iter().any(|&c| c) {
                pos = start + 1;
                continue;
            }
            if term.term == "may" && !may_rule.is_month(text, start, end) {
                pos = end;
                continue;
            }

            claimed[start..end].iter_mut().for_each(|c| *c = true);
            findings.push(TextFinding {
                text: text[start..end].to_string(),
                category: term.category,
                start,
                end,
                confidence: 1.0,
            });
            pos = end;
        }
    }

    findings.sort_by_key(|f| f.start);
    tracing::debug!(findings = findings.len(), "text scan complete");
    findings
}
