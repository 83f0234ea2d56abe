/// Levenshtein edit distance over Unicode scalar values, with unit cost for
/// insertion, deletion and substitution.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (long, short) = if a.len() >= b.len() { (a, b) } else { (b, a) };

    if short.is_empty() {
        return long.len();
    }

    let mut prev: Vec<usize> = (0..=short.len()).collect();
    let mut cur = vec![0usize; short.len() + 1];
    for (i, &c1) in long.iter().enumerate() {
        cur[0] = i + 1;
        for (j, &c2) in short.iter().enumerate() {
            let insertion = prev[j + 1] + 1;
            let deletion = cur[j] + 1;
            let substitution = prev[j] + usize::from(c1 != c2);
            cur[j + 1] = insertion.min(deletion).min(substitution);
        }
        std::mem::swap(&mut prev, &mut cur);
    }

    prev[short.len()]
}
