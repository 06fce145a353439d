//! Alignment of a candidate result list against a reference list.
//!
//! Every reference item is paired with the candidate that resembles it
//! most, and every candidate is flagged as relevant when it resembles
//! at least one reference item closely enough.

use crate::config::DEFAULT_SIMILARITY_THRESHOLD;
use crate::poi::{CandidateItem, ReferenceItem};
use crate::similarity::similarity;

/// Rank recorded for a reference item when there were no candidates at all.
pub const NO_CANDIDATES_RANK: i64 = -1;

/// Coverage label used when a reference item has no primary label.
pub const UNKNOWN_REFERENCE_LABEL: &str = "Unknown Reference POI";

/// Tunables for [`align`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignOptions {
    /// Minimum similarity for two items to be "the same place".
    pub threshold: f64,
}

impl Default for AlignOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

impl AlignOptions {
    pub fn with_threshold(threshold: f64) -> Self {
        Self { threshold }
    }
}

/// Best match found in the candidate list for one reference item.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentEntry {
    pub reference_label: String,
    /// Highest similarity against any candidate, in [0, 1].
    pub best_score: f64,
    /// 1-based rank of that candidate, or [`NO_CANDIDATES_RANK`].
    pub best_rank: i64,
}

impl AlignmentEntry {
    /// Whether this reference was found at or above `threshold`.
    pub fn is_match(&self, threshold: f64) -> bool {
        self.best_rank > 0 && self.best_score >= threshold
    }
}

/// Result of aligning one candidate list against one reference list.
#[derive(Debug, Clone, PartialEq)]
pub struct Alignment {
    /// One entry per reference item, in reference order.
    pub entries: Vec<AlignmentEntry>,
    /// One flag per candidate item, in candidate order.
    pub relevant: Vec<bool>,
    pub threshold: f64,
}

impl Alignment {
    pub fn relevant_count(&self) -> usize {
        self.relevant.iter().filter(|r| **r).count()
    }

    /// Entries whose best candidate clears the threshold.
    pub fn matched(&self) -> impl Iterator<Item = &AlignmentEntry> {
        self.entries.iter().filter(|e| e.is_match(self.threshold))
    }
}

fn coverage_label(item: &ReferenceItem) -> String {
    let label = item.primary_label.trim();
    if label.is_empty() {
        UNKNOWN_REFERENCE_LABEL.to_string()
    } else {
        label.to_string()
    }
}

/// Align `candidates` against `references`.
///
/// Ties on score go to the earliest (best-ranked) candidate. With no
/// candidates every reference gets score 0 and rank
/// [`NO_CANDIDATES_RANK`]; otherwise each reference always points at a
/// real candidate position, even when its score is below the threshold.
pub fn align(
    candidates: &[CandidateItem],
    references: &[ReferenceItem],
    options: AlignOptions,
) -> Alignment {
    let candidate_forms: Vec<Vec<String>> =
        candidates.iter().map(CandidateItem::label_forms).collect();
    let reference_forms: Vec<Vec<String>> =
        references.iter().map(ReferenceItem::label_forms).collect();

    // scores[r][c]: similarity of reference r to candidate c
    let scores: Vec<Vec<f64>> = reference_forms
        .iter()
        .map(|r| {
            candidate_forms
                .iter()
                .map(|c| similarity(c.as_slice(), r.as_slice()))
                .collect()
        })
        .collect();

    let entries = references
        .iter()
        .zip(&scores)
        .map(|(reference, row)| {
            let mut best_score = 0.0;
            let mut best_rank = NO_CANDIDATES_RANK;
            for (idx, &score) in row.iter().enumerate() {
                if best_rank == NO_CANDIDATES_RANK || score > best_score {
                    best_score = score;
                    best_rank = idx as i64 + 1;
                }
            }
            AlignmentEntry {
                reference_label: coverage_label(reference),
                best_score,
                best_rank,
            }
        })
        .collect();

    let relevant = (0..candidates.len())
        .map(|c| scores.iter().any(|row| row[c] >= options.threshold))
        .collect();

    Alignment {
        entries,
        relevant,
        threshold: options.threshold,
    }
}
