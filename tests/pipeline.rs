//! End-to-end runs of the evaluator over files on disk.

use async_trait::async_trait;
use poi_eval::dataset::LoadOptions;
use poi_eval::evaluator::{Evaluator, EvaluatorOptions, RunSummary};
use poi_eval::judge::{Judge, JudgeVerdict, parse_verdict};
use poi_eval::persistence::load_reports;
use poi_eval::poi::{CandidateItem, ReferenceItem};
use std::collections::VecDeque;
use std::fs;
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;

/// Replays canned model answers through the real response parser.
struct ScriptedJudge {
    responses: Mutex<VecDeque<&'static str>>,
    seen_queries: Mutex<Vec<String>>,
}

impl ScriptedJudge {
    fn new(responses: &[&'static str]) -> Self {
        Self {
            responses: Mutex::new(responses.iter().copied().collect()),
            seen_queries: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Judge for ScriptedJudge {
    async fn judge(
        &self,
        query: &str,
        _candidates: &[CandidateItem],
        _references: &[ReferenceItem],
    ) -> JudgeVerdict {
        self.seen_queries.lock().unwrap().push(query.to_string());
        match self.responses.lock().unwrap().pop_front() {
            Some(response) => parse_verdict(response),
            None => JudgeVerdict::failed("no scripted response left"),
        }
    }
}

fn options(threshold: f64) -> EvaluatorOptions {
    EvaluatorOptions {
        threshold,
        judge_delay: Duration::ZERO,
        judge_timeout: Duration::from_secs(5),
    }
}

const MIXED_INPUT: &str = r#"{"query": "Al Mirqab m", "solr_results": [{"solr_poiName": "Al Mirqab Mall", "solr_containerName": "Doha"}], "google_autocomplete_results": [{"google_main_text": "Al Mirqab Mall, Doha"}]}
{"query": "broken", "solr_results": [
{"query": "Katara", "solr_results": [], "google_autocomplete_results": [{"google_main_text": "Katara Cultural Village", "google_secondary_text": "Doha"}, {"google_main_text": "Katara Beach"}]}
"#;

#[tokio::test]
async fn test_unparseable_line_is_skipped_and_rest_written() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("merged.jsonl");
    let output = dir.path().join("results").join("report.jsonl");
    fs::write(&input, MIXED_INPUT).unwrap();

    let judge = ScriptedJudge::new(&[
        r#"Sure! {"score": 9, "judgment": "Excellent", "reasoning": "Exact top hit"}"#,
        "The candidate list is empty, I cannot rate it.",
    ]);
    let mut evaluator = Evaluator::new(Box::new(judge), options(0.5));

    let summary = evaluator
        .run_file(&input, &output, LoadOptions::default())
        .await
        .unwrap();

    assert_eq!(
        summary,
        RunSummary {
            processed: 2,
            skipped: 1,
            judge_errors: 1
        }
    );

    let content = fs::read_to_string(&output).unwrap();
    assert_eq!(content.lines().count(), 2);
    for line in content.lines() {
        serde_json::from_str::<serde_json::Value>(line).unwrap();
    }

    let reports = load_reports(&output).unwrap();
    assert_eq!(reports[0].query, "Al Mirqab m");
    assert_eq!(reports[1].query, "Katara");
}

#[tokio::test]
async fn test_al_mirqab_end_to_end() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("merged.jsonl");
    let output = dir.path().join("report.jsonl");
    fs::write(&input, MIXED_INPUT).unwrap();

    let judge = ScriptedJudge::new(&[r#"{"score": 9, "reasoning": "Exact top hit"}"#]);
    let mut evaluator = Evaluator::new(Box::new(judge), options(0.5));
    evaluator
        .run_file(&input, &output, LoadOptions::default())
        .await
        .unwrap();

    let reports = load_reports(&output).unwrap();
    let report = &reports[0];
    let metrics = &report.quantitative_metrics;

    assert_eq!(report.holistic_ai_score, Some(9.0));
    assert_eq!(report.holistic_ai_reasoning.as_deref(), Some("Exact top hit"));
    assert_eq!(report.holistic_ai_error, None);
    assert_eq!(metrics.precision_ratio, 1.0);
    assert_eq!(metrics.mean_reciprocal_rank, 1.0);

    let entry = metrics
        .coverage_per_google_poi
        .get("Al Mirqab Mall, Doha")
        .unwrap();
    assert_eq!(entry.rank, 1);
    assert!(entry.score >= 0.5);
    assert_eq!(report.raw_results.solr_count, 1);
    assert_eq!(report.raw_results.google_count, 1);
}

#[tokio::test]
async fn test_empty_candidates_end_to_end() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("merged.jsonl");
    let output = dir.path().join("report.jsonl");
    fs::write(&input, MIXED_INPUT).unwrap();

    let judge = ScriptedJudge::new(&[
        r#"{"score": 9}"#,
        r#"{"score": 0, "judgment": "Useless", "reasoning": "No candidates"}"#,
    ]);
    let mut evaluator = Evaluator::new(Box::new(judge), options(0.5));
    evaluator
        .run_file(&input, &output, LoadOptions::default())
        .await
        .unwrap();

    let reports = load_reports(&output).unwrap();
    let katara = &reports[1];
    let metrics = &katara.quantitative_metrics;

    assert_eq!(katara.holistic_ai_score, Some(0.0));
    assert_eq!(metrics.precision_ratio, 0.0);
    assert_eq!(metrics.mean_reciprocal_rank, 0.0);
    assert_eq!(metrics.coverage_per_google_poi.len(), 2);
    for (_, entry) in &metrics.coverage_per_google_poi.0 {
        assert_eq!(entry.rank, -1);
        assert_eq!(entry.score, 0.0);
    }
    assert_eq!(katara.raw_results.solr_count, 0);
    assert_eq!(katara.raw_results.google_count, 2);
}

#[tokio::test]
async fn test_json_array_input_with_max_results() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("merged.json");
    let output = dir.path().join("report.jsonl");
    fs::write(
        &input,
        r#"[{"query": "pearl",
  "solr_results": [{"poi_name": "The Pearl"}, {"poi_name": "Pearl Tower"}, {"poi_name": "Porto Arabia"}],
  "google_autocomplete_results": [{"main_text": "The Pearl-Qatar", "secondary_text": "Doha"}]},
 "not a record"]"#,
    )
    .unwrap();

    let judge = ScriptedJudge::new(&[r#"{"score": "7", "reason": "fine"}"#]);
    let mut evaluator = Evaluator::new(Box::new(judge), options(0.6));
    let load_options = LoadOptions {
        max_results: Some(2),
        ..Default::default()
    };
    let summary = evaluator.run_file(&input, &output, load_options).await.unwrap();

    assert_eq!(summary.processed, 1);
    assert_eq!(summary.skipped, 1);

    let reports = load_reports(&output).unwrap();
    assert_eq!(reports[0].raw_results.solr_count, 2);
    assert_eq!(reports[0].holistic_ai_score, Some(7.0));
}
