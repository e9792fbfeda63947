// src/matching/similarity.rs - Lexical and edit-distance stages of the cascade
use std::collections::HashSet;
use strsim::levenshtein;

/// First `max_chars` characters of `text`. Every stage works on truncated
/// bodies so the per-pair cost stays bounded regardless of record size.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Lowercase, collapse whitespace runs to a single space, trim.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

fn token_set(text: &str) -> HashSet<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

/// Jaccard ratio of the lowercase whitespace-token sets of `a` and `b`.
/// Returns 0.0 when both texts have no tokens.
pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let set_a = token_set(a);
    let set_b = token_set(b);
    let union = set_a.union(&set_b).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    intersection as f64 / union as f64
}

/// `1 - distance / max_len` over normalized texts, in [0, 1].
/// Identical normalized texts (including two empty ones) score 1.0.
pub fn levenshtein_similarity(a: &str, b: &str) -> f64 {
    let a = normalize_text(a);
    let b = normalize_text(b);
    if a == b {
        return 1.0;
    }
    let max_len = a.chars().count().max(b.chars().count());
    let distance = levenshtein(&a, &b);
    1.0 - distance as f64 / max_len as f64
}
