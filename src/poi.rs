//! POI records compared by the evaluator.

use serde::{Deserialize, Serialize};

/// Placeholder used when an input record carries no query.
pub const UNKNOWN_QUERY: &str = "Unknown Query";

/// One ranked search result, reduced to its display labels.
///
/// Which field holds the place name varies by engine, so both labels and
/// their concatenation are treated as alternate spellings of the item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoiItem {
    /// Main name of the place.
    pub primary_label: String,
    /// Container, area or address line, when the engine provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_label: Option<String>,
}

/// A result from the engine under test.
pub type CandidateItem = PoiItem;

/// A result from the trusted reference engine.
pub type ReferenceItem = PoiItem;

impl PoiItem {
    pub fn new(primary: impl Into<String>) -> Self {
        Self {
            primary_label: primary.into(),
            secondary_label: None,
        }
    }

    pub fn with_secondary(mut self, secondary: impl Into<String>) -> Self {
        let secondary = secondary.into();
        self.secondary_label = if secondary.trim().is_empty() {
            None
        } else {
            Some(secondary)
        };
        self
    }

    /// Labels tried when matching: primary, secondary and "primary secondary".
    ///
    /// Blank and repeated forms are dropped, so an item with no text yields
    /// an empty list and never matches anything.
    pub fn label_forms(&self) -> Vec<String> {
        let primary = self.primary_label.trim();
        let secondary = self.secondary_label.as_deref().map(str::trim).unwrap_or("");

        let mut forms: Vec<String> = Vec::with_capacity(3);
        for form in [
            primary.to_string(),
            secondary.to_string(),
            format!("{} {}", primary, secondary).trim().to_string(),
        ] {
            if !form.is_empty() && !forms.contains(&form) {
                forms.push(form);
            }
        }
        forms
    }
}

/// One evaluation unit: a query and the two ranked result lists.
///
/// Rank is implicit in list order (rank = index + 1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRecord {
    pub query: String,
    pub candidates: Vec<CandidateItem>,
    pub references: Vec<ReferenceItem>,
}

impl QueryRecord {
    pub fn new(
        query: impl Into<String>,
        candidates: Vec<CandidateItem>,
        references: Vec<ReferenceItem>,
    ) -> Self {
        let query = query.into();
        let query = if query.trim().is_empty() {
            UNKNOWN_QUERY.to_string()
        } else {
            query
        };
        Self {
            query,
            candidates,
            references,
        }
    }

    /// Keep only the first `limit` items of each list.
    pub fn truncate(&mut self, limit: usize) {
        self.candidates.truncate(limit);
        self.references.truncate(limit);
    }
}
