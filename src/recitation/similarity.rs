//! # Quick Similarity Scoring
//!
//! Character-level Levenshtein ratio between a transcription and the
//! reference text. This is the low-latency path: no word alignment and no
//! provider calls, so it suits instant feedback while the student is still
//! practicing.
//!
//! The ratio here is deliberately a different measure from the word-level
//! accuracy of the full engine. One misspelled letter costs one character
//! here but a whole word there.

use super::normalize::normalize;
use serde::Serialize;

/// Result of a quick check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickScore {
    /// Rounded similarity percentage (0-100)
    pub accuracy: u8,
    /// Whether the accuracy meets the pass threshold
    pub is_correct: bool,
}

/// Levenshtein distance over Unicode scalar values with unit costs.
///
/// Keeps two rows sized to the shorter input, so memory is O(min(n, m)).
pub fn levenshtein<T: PartialEq>(a: &[T], b: &[T]) -> usize {
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    if short.is_empty() {
        return long.len();
    }

    let mut prev: Vec<usize> = (0..=short.len()).collect();
    let mut curr = vec![0usize; short.len() + 1];

    for i in 1..=long.len() {
        curr[0] = i;
        for j in 1..=short.len() {
            let cost = if long[i - 1] == short[j - 1] { 0 } else { 1 };
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[short.len()]
}

/// Character edit distance between two strings.
pub fn char_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    levenshtein(&a, &b)
}

/// `(maxLen - distance) / maxLen`, with two empty strings counting as identical.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let max_len = a.len().max(b.len());
    if max_len == 0 {
        return 1.0;
    }
    let distance = levenshtein(&a, &b);
    (max_len - distance) as f64 / max_len as f64
}

/// Score a transcription against the reference without word alignment.
pub fn quick_verify(transcription: &str, reference: &str, pass_threshold: u8) -> QuickScore {
    let ratio = similarity_ratio(&normalize(transcription), &normalize(reference));
    let accuracy = (ratio * 100.0).round().clamp(0.0, 100.0) as u8;

    QuickScore {
        accuracy,
        is_correct: accuracy >= pass_threshold,
    }
}
