//! Cache-key hashing for questions and tenants.
//!
//! Answer cache keys are derived from a *normalized* question so that two
//! differently-punctuated but semantically identical questions share one
//! cache entry. Normalization is deliberately lossy: the same evidence set
//! answers both phrasings.

/// Normalizes a question for cache keying: lower-case, punctuation stripped,
/// whitespace collapsed to single spaces, trimmed.
pub fn normalize_question(question: &str) -> String {
    let lowered = question.to_lowercase();
    let stripped: String = lowered
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();

    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Hex-encoded BLAKE3 hash of the normalized question.
#[inline]
pub fn question_hash(question: &str) -> String {
    blake3::hash(normalize_question(question).as_bytes()).to_string()
}
