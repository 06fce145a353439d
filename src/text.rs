//! Label normalization.
//!
//! POI names arrive from different engines with different casing,
//! accents and punctuation ("Café Bateel", "cafe-bateel"). Everything is
//! reduced to lowercase ASCII alphanumerics separated by single spaces
//! before any comparison.

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Reduce `s` to its canonical comparable form.
///
/// Lowercases, decomposes (NFKD) and drops combining marks, replaces every
/// character outside `[a-z0-9]` with a space, then collapses and trims
/// whitespace. Never fails; empty input gives an empty string.
pub fn normalize(s: &str) -> String {
    let folded: String = s
        .to_lowercase()
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() {
                c
            } else {
                ' '
            }
        })
        .collect();

    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split the normalized form of `s` into tokens.
pub fn tokenize(s: &str) -> Vec<String> {
    normalize(s).split(' ').filter(|t| !t.is_empty()).map(str::to_string).collect()
}
