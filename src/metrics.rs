//! Ranking-quality metrics derived from an [`Alignment`].

use crate::align::{AlignOptions, Alignment, AlignmentEntry, align};
use crate::poi::{CandidateItem, ReferenceItem};

/// Reference label → best match, in reference order.
///
/// Two reference items sharing a label collapse into one entry that keeps
/// the first item's position and the last item's match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Coverage {
    entries: Vec<AlignmentEntry>,
}

impl Coverage {
    fn from_entries(entries: impl IntoIterator<Item = AlignmentEntry>) -> Self {
        let mut coverage = Coverage::default();
        for entry in entries {
            match coverage
                .entries
                .iter_mut()
                .find(|e| e.reference_label == entry.reference_label)
            {
                Some(existing) => *existing = entry,
                None => coverage.entries.push(entry),
            }
        }
        coverage
    }

    pub fn get(&self, label: &str) -> Option<&AlignmentEntry> {
        self.entries.iter().find(|e| e.reference_label == label)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AlignmentEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a Coverage {
    type Item = &'a AlignmentEntry;
    type IntoIter = std::slice::Iter<'a, AlignmentEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Headline numbers for one query.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsResult {
    precision_ratio: f64,
    mean_reciprocal_rank: f64,
    coverage: Coverage,
}

impl MetricsResult {
    /// Share of candidates that match some reference item.
    pub fn precision_ratio(&self) -> f64 {
        self.precision_ratio
    }

    /// Sum of `1 / rank` over matched references, divided by the total
    /// number of references. Unmatched references therefore pull the
    /// value down.
    pub fn mean_reciprocal_rank(&self) -> f64 {
        self.mean_reciprocal_rank
    }

    pub fn coverage(&self) -> &Coverage {
        &self.coverage
    }

    /// Reduce an alignment to metrics.
    pub fn from_alignment(alignment: &Alignment) -> Self {
        let precision_ratio = if alignment.relevant.is_empty() {
            0.0
        } else {
            alignment.relevant_count() as f64 / alignment.relevant.len() as f64
        };

        let reciprocal_sum: f64 = alignment
            .matched()
            .map(|e| 1.0 / e.best_rank as f64)
            .sum();
        let mean_reciprocal_rank = if alignment.entries.is_empty() {
            0.0
        } else {
            reciprocal_sum / alignment.entries.len() as f64
        };

        Self {
            precision_ratio,
            mean_reciprocal_rank,
            coverage: Coverage::from_entries(alignment.entries.iter().cloned()),
        }
    }
}

/// Align both lists and compute [`MetricsResult`].
pub fn aggregate(
    candidates: &[CandidateItem],
    references: &[ReferenceItem],
    options: AlignOptions,
) -> MetricsResult {
    MetricsResult::from_alignment(&align(candidates, references, options))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::NO_CANDIDATES_RANK;
    use crate::poi::PoiItem;

    fn items(names: &[&str]) -> Vec<PoiItem> {
        names.iter().map(|n| PoiItem::new(*n)).collect()
    }

    #[test]
    fn test_al_mirqab_scenario() {
        let candidates = vec![PoiItem::new("Al Mirqab Mall").with_secondary("Doha")];
        let references = items(&["Al Mirqab Mall, Doha"]);
        let metrics = aggregate(&candidates, &references, AlignOptions::with_threshold(0.5));

        let entry = metrics.coverage().get("Al Mirqab Mall, Doha").unwrap();
        assert!(entry.best_score >= 0.5);
        assert_eq!(entry.best_rank, 1);
        assert_eq!(metrics.precision_ratio(), 1.0);
        assert_eq!(metrics.mean_reciprocal_rank(), 1.0);
    }

    #[test]
    fn test_empty_candidates() {
        let references = items(&["Souq Waqif", "Katara"]);
        let metrics = aggregate(&[], &references, AlignOptions::with_threshold(0.5));

        assert_eq!(metrics.precision_ratio(), 0.0);
        assert_eq!(metrics.mean_reciprocal_rank(), 0.0);
        assert_eq!(metrics.coverage().len(), 2);
        assert!(
            metrics
                .coverage()
                .iter()
                .all(|e| e.best_rank == NO_CANDIDATES_RANK)
        );
    }

    #[test]
    fn test_empty_references() {
        let metrics = aggregate(&items(&["Souq Waqif"]), &[], AlignOptions::default());
        assert_eq!(metrics.precision_ratio(), 0.0);
        assert_eq!(metrics.mean_reciprocal_rank(), 0.0);
        assert!(metrics.coverage().is_empty());
    }

    #[test]
    fn test_both_empty() {
        let metrics = aggregate(&[], &[], AlignOptions::default());
        assert_eq!(metrics.precision_ratio(), 0.0);
        assert_eq!(metrics.mean_reciprocal_rank(), 0.0);
        assert!(metrics.coverage().is_empty());
    }

    #[test]
    fn test_mrr_is_normalized_by_reference_count() {
        // One of two references is found at rank 2: (1/2) / 2.
        let candidates = items(&["Aspire Park", "Souq Waqif"]);
        let references = items(&["Souq Waqif", "Museum of Islamic Art"]);
        let metrics = aggregate(&candidates, &references, AlignOptions::default());

        assert_eq!(metrics.mean_reciprocal_rank(), 0.25);
        assert_eq!(metrics.precision_ratio(), 0.5);
    }

    #[test]
    fn test_no_candidate_clears_threshold() {
        let metrics = aggregate(
            &items(&["Aspire Park"]),
            &items(&["Museum of Islamic Art"]),
            AlignOptions::default(),
        );
        assert_eq!(metrics.mean_reciprocal_rank(), 0.0);
        assert_eq!(metrics.precision_ratio(), 0.0);
        assert_eq!(metrics.coverage().len(), 1);
    }

    #[test]
    fn test_all_candidates_relevant() {
        let candidates = items(&["Katara Beach", "Katara Cultural Village"]);
        let references = items(&["Katara Cultural Village", "Katara Beach"]);
        let metrics = aggregate(&candidates, &references, AlignOptions::default());
        assert_eq!(metrics.precision_ratio(), 1.0);
        assert_eq!(metrics.mean_reciprocal_rank(), (1.0 / 2.0 + 1.0) / 2.0);
    }

    #[test]
    fn test_duplicate_reference_labels_collapse() {
        let candidates = items(&["Lulu", "Carrefour"]);
        let references = vec![
            PoiItem::new("Hypermarket").with_secondary("Lulu"),
            PoiItem::new("Souq"),
            PoiItem::new("Hypermarket").with_secondary("Carrefour"),
        ];
        let metrics = aggregate(&candidates, &references, AlignOptions::default());

        let labels: Vec<&str> = metrics
            .coverage()
            .iter()
            .map(|e| e.reference_label.as_str())
            .collect();
        assert_eq!(labels, vec!["Hypermarket", "Souq"]);
        assert_eq!(metrics.coverage().get("Hypermarket").unwrap().best_rank, 2);
    }
}
