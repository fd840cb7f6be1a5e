//! # Arabic Text Normalization
//!
//! Makes transcriptions and canonical verse text comparable by removing the
//! marks that vary between sources without changing what was recited.
//!
//! ## What gets removed:
//! - **Tashkeel**: short vowels, tanween, shadda and sukun (U+064B..U+0652)
//! - **Extended combining marks**: maddah above, hamza above/below, etc. (U+0653..U+065F)
//! - **Superscript alef** (U+0670), common in the Uthmani script
//! - **Tatweel** (U+0640), the elongation stroke
//! - **Quranic annotation signs**: small high letters and pause marks
//!
//! ## What is kept:
//! Every base letter, in its original order. Word boundaries are preserved,
//! only the whitespace between them is collapsed to a single space.

/// Verse-end marker used when several ayat are joined into one text.
pub const AYAH_SEPARATOR: char = '\u{06DD}';

/// Returns true for the combining and annotation marks stripped by [`normalize`].
pub fn is_removable_mark(c: char) -> bool {
    matches!(
        c,
        '\u{0610}'..='\u{061A}'
            | '\u{064B}'..='\u{065F}'
            | '\u{0640}'
            | '\u{0670}'
            | '\u{06D6}'..='\u{06DC}'
            | '\u{06DF}'..='\u{06E4}'
            | '\u{06E7}'..='\u{06E8}'
            | '\u{06EA}'..='\u{06ED}'
    )
}

/// Strip diacritics and collapse whitespace.
///
/// Idempotent: `normalize(&normalize(s)) == normalize(s)` for every `s`.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;

    for c in text.chars() {
        if c.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }
        if is_removable_mark(c) {
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        out.push(c);
    }

    out
}

/// Split text into comparable words.
///
/// Normalizes first, then trims punctuation from both ends of every token, so
/// `"احد."` and `"الله،"` compare as the bare words. Tokens left empty (ayah
/// separators, stray punctuation, verse numbers) do not count as recited words.
pub fn tokenize(text: &str) -> Vec<String> {
    normalize(text)
        .split(' ')
        .map(comparison_key)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .collect()
}

/// A word as written in the source text together with its comparison key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Word exactly as it appeared, diacritics included
    pub display: String,
    /// Normalized form used for alignment
    pub key: String,
}

/// Like [`tokenize`] but keeps the original spelling of every kept word.
///
/// The keys are exactly the output of [`tokenize`] for the same text. The
/// display form is left untouched, punctuation included.
pub fn tokenize_with_display(text: &str) -> Vec<Token> {
    text.split_whitespace()
        .filter_map(|raw| {
            let normalized = normalize(raw);
            let key = comparison_key(&normalized);
            if key.is_empty() {
                None
            } else {
                Some(Token {
                    display: raw.to_string(),
                    key: key.to_string(),
                })
            }
        })
        .collect()
}

/// A normalized token without the separator characters around it.
fn comparison_key(token: &str) -> &str {
    token.trim_matches(is_separator_char)
}

fn is_separator_char(c: char) -> bool {
    c == AYAH_SEPARATOR
        || c.is_ascii_punctuation()
        // Arabic comma, semicolon, question mark, full stop and Quranic signs
        || matches!(c, '\u{060C}' | '\u{061B}' | '\u{061F}' | '\u{06D4}' | '\u{06DE}' | '\u{06E9}')
        // ornate parentheses and guillemets
        || matches!(c, '\u{FD3E}' | '\u{FD3F}' | '\u{00AB}' | '\u{00BB}')
        || c.is_ascii_digit()
        || ('\u{0660}'..='\u{0669}').contains(&c)
}

/// Fold orthographic letter variants that speech-to-text output uses
/// interchangeably.
///
/// Only used to decide whether two words are the same word; displayed text
/// always keeps the original letters.
pub fn fold_letters(word: &str) -> String {
    word.chars()
        .map(|c| match c {
            '\u{0622}' | '\u{0623}' | '\u{0625}' | '\u{0671}' => '\u{0627}', // آ أ إ ٱ -> ا
            '\u{0649}' => '\u{064A}',                                       // ى -> ي
            '\u{0629}' => '\u{0647}',                                       // ة -> ه
            other => other,
        })
        .collect()
}

/// Two words are the same recitation when they agree after normalization and folding.
pub fn words_equivalent(a: &str, b: &str) -> bool {
    a == b || fold_letters(&normalize(a)) == fold_letters(&normalize(b))
}
