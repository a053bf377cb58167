//! Similarity helpers for OCR-tolerant keyword matching.

/// Normalized Levenshtein similarity in `0.0..=1.0`.
pub fn similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(a, b)
}

/// Splits an uppercase line into words of letters and digits.
pub fn words(line: &str) -> impl Iterator<Item = &str> {
    line.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
}

/// True when `keyword` appears in `line` as a whole word.
pub fn contains_word(line: &str, keyword: &str) -> bool {
    words(line).any(|w| w == keyword)
}

/// Best similarity between `keyword` and any single word of `line` whose
/// length is within `tolerance` characters of the keyword.
pub fn best_word_similarity(line: &str, keyword: &str, tolerance: usize) -> f64 {
    best_word_match(line, keyword, tolerance).map_or(0.0, |(_, score)| score)
}

/// Like [`best_word_similarity`], also returning the byte offset just past
/// the best word. `None` when no word is within the length tolerance.
pub fn best_word_match(line: &str, keyword: &str, tolerance: usize) -> Option<(usize, f64)> {
    words(line)
        .filter(|w| w.len().abs_diff(keyword.len()) <= tolerance)
        .map(|w| {
            let start = w.as_ptr() as usize - line.as_ptr() as usize;
            (start + w.len(), similarity(w, keyword))
        })
        .fold(None, |best: Option<(usize, f64)>, candidate| match best {
            Some(b) if b.1 >= candidate.1 => Some(b),
            _ => Some(candidate),
        })
}

/// Similarity of a multi-word `phrase` against `line`.
///
/// Exact containment scores 1.0. Otherwise every window of as many words as
/// the phrase has is compared, both space-joined and glued together (OCR
/// often drops the space), and the best score wins.
pub fn phrase_similarity(line: &str, phrase: &str) -> f64 {
    if line.contains(phrase) {
        return 1.0;
    }

    let line_words: Vec<&str> = words(line).collect();
    let phrase_len = phrase.split_whitespace().count().max(1);
    let glued_phrase: String = phrase.split_whitespace().collect();

    let mut best = 0.0f64;
    for width in 1..=phrase_len.min(line_words.len()) {
        for window in line_words.windows(width) {
            let spaced = window.join(" ");
            let glued: String = window.concat();
            best = best
                .max(similarity(&spaced, phrase))
                .max(similarity(&glued, &glued_phrase));
        }
    }
    best
}
