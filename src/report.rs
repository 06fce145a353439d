//! Per-query evaluation report and run-level summaries.
//!
//! The serialized field names (`solr_count`, `coverage_per_google_poi`)
//! are kept stable so reports from earlier runs stay comparable.

use crate::judge::JudgeVerdict;
use crate::metrics::MetricsResult;
use crate::poi::QueryRecord;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Decimal places kept for scores in the written report.
const REPORT_PRECISION: f64 = 10_000.0;

fn round4(value: f64) -> f64 {
    (value * REPORT_PRECISION).round() / REPORT_PRECISION
}

/// Best match for one reference item, as written to the report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoverageEntry {
    pub score: f64,
    pub rank: i64,
}

/// Reference label → [`CoverageEntry`], serialized as a JSON object that
/// keeps reference order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoverageReport(pub Vec<(String, CoverageEntry)>);

impl CoverageReport {
    pub fn get(&self, label: &str) -> Option<&CoverageEntry> {
        self.0.iter().find(|(l, _)| l == label).map(|(_, e)| e)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for CoverageReport {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (label, entry) in &self.0 {
            map.serialize_entry(label, entry)?;
        }
        map.end()
    }
}

struct CoverageVisitor;

impl<'de> Visitor<'de> for CoverageVisitor {
    type Value = CoverageReport;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of reference label to coverage entry")
    }

    fn visit_map<A>(self, mut access: A) -> std::result::Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((label, entry)) = access.next_entry::<String, CoverageEntry>()? {
            entries.push((label, entry));
        }
        Ok(CoverageReport(entries))
    }
}

impl<'de> Deserialize<'de> for CoverageReport {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(CoverageVisitor)
    }
}

/// Deterministic metrics section of a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantitativeMetrics {
    pub precision_ratio: f64,
    pub mean_reciprocal_rank: f64,
    pub coverage_per_google_poi: CoverageReport,
}

impl From<&MetricsResult> for QuantitativeMetrics {
    fn from(metrics: &MetricsResult) -> Self {
        let coverage = metrics
            .coverage()
            .iter()
            .map(|e| {
                (
                    e.reference_label.clone(),
                    CoverageEntry {
                        score: round4(e.best_score),
                        rank: e.best_rank,
                    },
                )
            })
            .collect();
        Self {
            precision_ratio: round4(metrics.precision_ratio()),
            mean_reciprocal_rank: round4(metrics.mean_reciprocal_rank()),
            coverage_per_google_poi: CoverageReport(coverage),
        }
    }
}

/// Sizes of the two lists that were compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultCounts {
    pub solr_count: usize,
    pub google_count: usize,
}

/// Everything recorded for one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub query: String,
    pub holistic_ai_score: Option<f64>,
    pub holistic_ai_reasoning: Option<String>,
    /// Present only when the judge failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub holistic_ai_error: Option<String>,
    pub quantitative_metrics: QuantitativeMetrics,
    pub raw_results: ResultCounts,
}

impl EvaluationReport {
    pub fn new(record: &QueryRecord, metrics: &MetricsResult, verdict: &JudgeVerdict) -> Self {
        Self {
            query: record.query.clone(),
            holistic_ai_score: verdict.score(),
            holistic_ai_reasoning: verdict.reasoning().map(str::to_string),
            holistic_ai_error: verdict.raw_error().map(str::to_string),
            quantitative_metrics: QuantitativeMetrics::from(metrics),
            raw_results: ResultCounts {
                solr_count: record.candidates.len(),
                google_count: record.references.len(),
            },
        }
    }

    pub fn judge_failed(&self) -> bool {
        self.holistic_ai_error.is_some()
    }
}

/// Aggregate figures over a set of reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSummary {
    pub total: usize,
    /// Reports carrying an AI score.
    pub scored: usize,
    pub judge_errors: usize,
    pub mean_score: Option<f64>,
    pub min_score: Option<f64>,
    pub max_score: Option<f64>,
    pub mean_precision_ratio: f64,
    pub mean_reciprocal_rank: f64,
}

impl ReportSummary {
    pub fn from_reports(reports: &[EvaluationReport]) -> Self {
        let scores: Vec<f64> = reports.iter().filter_map(|r| r.holistic_ai_score).collect();
        let mean = |values: &mut dyn Iterator<Item = f64>, n: usize| {
            if n == 0 {
                0.0
            } else {
                values.sum::<f64>() / n as f64
            }
        };

        Self {
            total: reports.len(),
            scored: scores.len(),
            judge_errors: reports.iter().filter(|r| r.judge_failed()).count(),
            mean_score: (!scores.is_empty())
                .then(|| scores.iter().sum::<f64>() / scores.len() as f64),
            min_score: scores.iter().copied().reduce(f64::min),
            max_score: scores.iter().copied().reduce(f64::max),
            mean_precision_ratio: mean(
                &mut reports.iter().map(|r| r.quantitative_metrics.precision_ratio),
                reports.len(),
            ),
            mean_reciprocal_rank: mean(
                &mut reports
                    .iter()
                    .map(|r| r.quantitative_metrics.mean_reciprocal_rank),
                reports.len(),
            ),
        }
    }

    /// Print summary to stdout.
    pub fn print(&self) {
        let fmt_score = |s: Option<f64>| {
            s.map(|v| format!("{:.2}", v))
                .unwrap_or_else(|| "-".to_string())
        };

        println!("\n========== Evaluation Summary ==========");
        println!("Queries:            {}", self.total);
        println!("Scored by judge:    {}", self.scored);
        println!("Judge errors:       {}", self.judge_errors);
        println!("----------------------------------------");
        println!("Mean AI score:      {}/10", fmt_score(self.mean_score));
        println!(
            "AI score range:     {} - {}",
            fmt_score(self.min_score),
            fmt_score(self.max_score)
        );
        println!("----------------------------------------");
        println!("Mean precision:     {:.4}", self.mean_precision_ratio);
        println!("Mean MRR:           {:.4}", self.mean_reciprocal_rank);
        println!("========================================\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::AlignOptions;
    use crate::metrics::aggregate;
    use crate::poi::PoiItem;

    fn sample_report(verdict: JudgeVerdict) -> EvaluationReport {
        let record = QueryRecord::new(
            "al mirqab m",
            vec![
                PoiItem::new("Mirqab Tower"),
                PoiItem::new("Al Mirqab Mall").with_secondary("Doha"),
            ],
            vec![
                PoiItem::new("Al Mirqab Mall").with_secondary("Doha, Qatar"),
                PoiItem::new("Al Mirqab Boutique Hotel"),
            ],
        );
        let metrics = aggregate(&record.candidates, &record.references, AlignOptions::default());
        EvaluationReport::new(&record, &metrics, &verdict)
    }

    #[test]
    fn test_report_wire_shape() {
        let report = sample_report(JudgeVerdict::scored(8.0, Some("Top hit at #2".to_string())));
        let json: serde_json::Value = serde_json::to_value(&report).unwrap();

        assert_eq!(json["query"], "al mirqab m");
        assert_eq!(json["holistic_ai_score"], 8.0);
        assert_eq!(json["holistic_ai_reasoning"], "Top hit at #2");
        assert!(json.get("holistic_ai_error").is_none());
        assert_eq!(json["raw_results"]["solr_count"], 2);
        assert_eq!(json["raw_results"]["google_count"], 2);

        let coverage = &json["quantitative_metrics"]["coverage_per_google_poi"];
        assert_eq!(coverage["Al Mirqab Mall"]["rank"], 2);
        assert_eq!(coverage["Al Mirqab Mall"]["score"], 1.0);
    }

    #[test]
    fn test_failed_verdict_serializes_nulls() {
        let report = sample_report(JudgeVerdict::failed("<html>502</html>"));
        let json: serde_json::Value = serde_json::to_value(&report).unwrap();

        assert!(json["holistic_ai_score"].is_null());
        assert!(json["holistic_ai_reasoning"].is_null());
        assert_eq!(json["holistic_ai_error"], "<html>502</html>");
        assert!(report.judge_failed());
    }

    #[test]
    fn test_coverage_keeps_reference_order() {
        let report = sample_report(JudgeVerdict::scored(5.0, None));
        let line = serde_json::to_string(&report).unwrap();

        let first = line.find("\"Al Mirqab Mall\"").unwrap();
        let second = line.find("\"Al Mirqab Boutique Hotel\"").unwrap();
        assert!(first < second);

        let parsed: EvaluationReport = serde_json::from_str(&line).unwrap();
        let labels: Vec<&str> = parsed
            .quantitative_metrics
            .coverage_per_google_poi
            .0
            .iter()
            .map(|(l, _)| l.as_str())
            .collect();
        assert_eq!(labels, vec!["Al Mirqab Mall", "Al Mirqab Boutique Hotel"]);
    }

    #[test]
    fn test_scores_are_rounded() {
        assert_eq!(round4(1.0 / 3.0), 0.3333);
        assert_eq!(round4(2.0 / 3.0), 0.6667);
        assert_eq!(round4(0.0), 0.0);
    }

    #[test]
    fn test_summary() {
        let reports = vec![
            sample_report(JudgeVerdict::scored(8.0, None)),
            sample_report(JudgeVerdict::scored(6.0, None)),
            sample_report(JudgeVerdict::failed("timeout")),
        ];
        let summary = ReportSummary::from_reports(&reports);

        assert_eq!(summary.total, 3);
        assert_eq!(summary.scored, 2);
        assert_eq!(summary.judge_errors, 1);
        assert_eq!(summary.mean_score, Some(7.0));
        assert_eq!(summary.min_score, Some(6.0));
        assert_eq!(summary.max_score, Some(8.0));
        assert_eq!(
            summary.mean_precision_ratio,
            reports[0].quantitative_metrics.precision_ratio
        );
    }

    #[test]
    fn test_summary_of_nothing() {
        let summary = ReportSummary::from_reports(&[]);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.mean_score, None);
        assert_eq!(summary.mean_precision_ratio, 0.0);
    }
}
