//! Phrase text normalisation and similarity
//!
//! Both the expected phrase and the transcription are normalised the same
//! way before comparison, so punctuation and casing differences introduced
//! by the transcriber do not cost similarity.

use strsim::normalized_levenshtein;

/// Lowercase, keep only alphanumerics and spaces, collapse whitespace.
#[must_use]
pub fn normalize_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_was_space = true;

    for c in text.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
            last_was_space = false;
        } else if c.is_whitespace() && !last_was_space {
            out.push(' ');
            last_was_space = true;
        }
    }

    if out.ends_with(' ') {
        out.pop();
    }
    out
}

/// Levenshtein similarity `1 − d / max(|a|, |b|)` over normalised text.
///
/// Two empty strings are identical (similarity 1).
#[must_use]
pub fn phrase_similarity(expected: &str, transcribed: &str) -> f64 {
    let a = normalize_text(expected);
    let b = normalize_text(transcribed);
    normalized_levenshtein(&a, &b)
}
