//! Fuzzy similarity between POI labels.
//!
//! Scores combine token-set Jaccard overlap with a bonus when one label
//! is contained in the other, so "Al Mirqab" vs "Al Mirqab Mall" is not
//! under-scored by pure token overlap.

use crate::text::normalize;
use std::collections::HashSet;

/// Smallest containment bonus awarded.
pub const MIN_CONTAINMENT_BONUS: f64 = 0.2;

/// Largest containment bonus awarded.
pub const MAX_CONTAINMENT_BONUS: f64 = 0.6;

/// A label reduced to the pieces the scorer needs.
#[derive(Debug, Clone)]
struct PreparedLabel {
    text: String,
    tokens: HashSet<String>,
}

impl PreparedLabel {
    fn new(raw: &str) -> Self {
        let text = normalize(raw);
        let tokens = text
            .split(' ')
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        Self { text, tokens }
    }
}

/// Jaccard overlap of two token sets. Two empty sets score 0, not 1.
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    intersection as f64 / union as f64
}

/// Bonus for one normalized label containing the other.
///
/// Scaled by `len(shorter) / len(longer)` and clamped to
/// [`MIN_CONTAINMENT_BONUS`, `MAX_CONTAINMENT_BONUS`] so tiny substrings
/// are not over-rewarded.
pub fn containment_bonus(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if !a.contains(b) && !b.contains(a) {
        return 0.0;
    }
    let (shorter, longer) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let ratio = shorter.chars().count() as f64 / longer.chars().count() as f64;
    ratio.clamp(MIN_CONTAINMENT_BONUS, MAX_CONTAINMENT_BONUS)
}

fn pair_score(a: &PreparedLabel, b: &PreparedLabel) -> f64 {
    let score = jaccard(&a.tokens, &b.tokens) + containment_bonus(&a.text, &b.text);
    score.min(1.0)
}

/// Best pairwise similarity between two label sets, in [0, 1].
///
/// Either set being empty gives 0.
pub fn similarity<A, B>(labels_a: &[A], labels_b: &[B]) -> f64
where
    A: AsRef<str>,
    B: AsRef<str>,
{
    let prepared_a: Vec<PreparedLabel> = labels_a
        .iter()
        .map(|l| PreparedLabel::new(l.as_ref()))
        .collect();
    let prepared_b: Vec<PreparedLabel> = labels_b
        .iter()
        .map(|l| PreparedLabel::new(l.as_ref()))
        .collect();

    let mut best = 0.0_f64;
    for a in &prepared_a {
        for b in &prepared_b {
            best = best.max(pair_score(a, b));
        }
    }
    best
}
