//! LLM-as-judge for holistic search-quality scoring.
//!
//! The judge sees both ranked lists side by side and returns one score
//! for the candidate list as a whole. Failures never propagate: a
//! transport error or an unreadable answer becomes an error verdict so
//! the batch keeps going.

use crate::config::LlmConfig;
use crate::llm::{LlmClient, Prompts};
use crate::poi::{CandidateItem, PoiItem, ReferenceItem};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// Highest score on the rubric.
pub const MAX_SCORE: f64 = 10.0;

/// Text shown to the judge for an empty list.
pub const EMPTY_LIST_TEXT: &str = "No results provided.";

/// Outcome of one judge call.
///
/// Either a score (with optional reasoning) or an error carrying the raw
/// response or failure description; never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeVerdict {
    score: Option<f64>,
    reasoning: Option<String>,
    raw_error: Option<String>,
}

impl JudgeVerdict {
    /// A successful verdict. The score is clamped to the rubric range.
    pub fn scored(score: f64, reasoning: Option<String>) -> Self {
        Self {
            score: Some(score.clamp(0.0, MAX_SCORE)),
            reasoning,
            raw_error: None,
        }
    }

    /// A failed verdict.
    pub fn failed(raw_error: impl Into<String>) -> Self {
        Self {
            score: None,
            reasoning: None,
            raw_error: Some(raw_error.into()),
        }
    }

    pub fn score(&self) -> Option<f64> {
        self.score
    }

    pub fn reasoning(&self) -> Option<&str> {
        self.reasoning.as_deref()
    }

    pub fn raw_error(&self) -> Option<&str> {
        self.raw_error.as_deref()
    }

    pub fn is_error(&self) -> bool {
        self.raw_error.is_some()
    }
}

/// A scoring oracle for one query's result lists.
#[async_trait]
pub trait Judge: Send + Sync {
    /// Rate `candidates` against `references` for `query`.
    async fn judge(
        &self,
        query: &str,
        candidates: &[CandidateItem],
        references: &[ReferenceItem],
    ) -> JudgeVerdict;
}

/// Render a ranked list as numbered lines: `1. Name (Secondary)`.
pub fn format_poi_list(items: &[PoiItem]) -> String {
    if items.is_empty() {
        return EMPTY_LIST_TEXT.to_string();
    }
    items
        .iter()
        .enumerate()
        .map(|(idx, item)| {
            let primary = if item.primary_label.trim().is_empty() {
                "N/A"
            } else {
                item.primary_label.as_str()
            };
            let secondary = item.secondary_label.as_deref().unwrap_or("N/A");
            format!("{}. {} ({})", idx + 1, primary, secondary)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Substring from the first `{` to the last `}`, if there is one.
pub fn extract_json(response: &str) -> Option<&str> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    if end > start {
        Some(&response[start..=end])
    } else {
        None
    }
}

fn score_from(value: &Value) -> Option<f64> {
    let score = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    score.is_finite().then_some(score)
}

fn reasoning_from(object: &serde_json::Map<String, Value>) -> Option<String> {
    ["reasoning", "reason", "explanation", "judgment"]
        .iter()
        .find_map(|key| object.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

/// Parse a free-text judge answer that should contain one JSON object.
///
/// Accepts surrounding noise and code fences. Anything that does not
/// yield a numeric `score` becomes [`JudgeVerdict::failed`] carrying the
/// original response.
pub fn parse_verdict(response: &str) -> JudgeVerdict {
    let Some(json_str) = extract_json(response) else {
        return JudgeVerdict::failed(response);
    };

    let object = match serde_json::from_str::<Value>(json_str) {
        Ok(Value::Object(object)) => object,
        Ok(_) => return JudgeVerdict::failed(response),
        Err(e) => {
            debug!(error = %e, "judge response is not valid JSON");
            return JudgeVerdict::failed(response);
        }
    };

    match object.get("score").and_then(score_from) {
        Some(score) => JudgeVerdict::scored(score, reasoning_from(&object)),
        None => JudgeVerdict::failed(response),
    }
}

/// Judge backed by a chat-completions model.
#[derive(Clone)]
pub struct LlmJudge {
    client: LlmClient,
    top_k: usize,
}

impl LlmJudge {
    /// Create a new judge with the given LLM client.
    pub fn new(client: LlmClient) -> Self {
        Self { client, top_k: 0 }
    }

    /// Create from LLM config.
    pub fn from_config(config: LlmConfig) -> Self {
        Self::new(LlmClient::new(config))
    }

    /// Show the judge only the first `top_k` items of each list (0 = all).
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    fn head<'a>(&self, items: &'a [PoiItem]) -> &'a [PoiItem] {
        if self.top_k == 0 {
            items
        } else {
            &items[..items.len().min(self.top_k)]
        }
    }

    /// Build the prompt sent for one query.
    pub fn build_prompt(
        &self,
        query: &str,
        candidates: &[CandidateItem],
        references: &[ReferenceItem],
    ) -> String {
        Prompts::render_holistic_judge(
            query,
            &format_poi_list(self.head(references)),
            &format_poi_list(self.head(candidates)),
        )
    }
}

#[async_trait]
impl Judge for LlmJudge {
    async fn judge(
        &self,
        query: &str,
        candidates: &[CandidateItem],
        references: &[ReferenceItem],
    ) -> JudgeVerdict {
        let prompt = self.build_prompt(query, candidates, references);

        match self.client.complete(None, &prompt).await {
            Ok(response) => {
                let verdict = parse_verdict(&response);
                if verdict.is_error() {
                    warn!(query, "could not parse judge response");
                }
                verdict
            }
            Err(e) => {
                warn!(query, error = %e, "judge request failed");
                JudgeVerdict::failed(format!("judge request failed: {}", e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedJudge(JudgeVerdict);

    #[async_trait]
    impl Judge for FixedJudge {
        async fn judge(&self, _: &str, _: &[CandidateItem], _: &[ReferenceItem]) -> JudgeVerdict {
            self.0.clone()
        }
    }

    #[test]
    fn test_parse_noisy_response() {
        let response =
            r#"noise {"score": 7, "judgment":"Good","reason":"ok"} trailing"#;
        let verdict = parse_verdict(response);

        assert_eq!(verdict.score(), Some(7.0));
        assert_eq!(verdict.reasoning(), Some("ok"));
        assert!(!verdict.is_error());
    }

    #[test]
    fn test_parse_fenced_response() {
        let response = "```json\n{\"score\": 9, \"reasoning\": \"Top hit matches\"}\n```";
        let verdict = parse_verdict(response);
        assert_eq!(verdict.score(), Some(9.0));
        assert_eq!(verdict.reasoning(), Some("Top hit matches"));
    }

    #[test]
    fn test_parse_string_score() {
        let verdict = parse_verdict(r#"{"score": "6", "explanation": "noisy"}"#);
        assert_eq!(verdict.score(), Some(6.0));
        assert_eq!(verdict.reasoning(), Some("noisy"));
    }

    #[test]
    fn test_parse_without_braces_is_error() {
        let verdict = parse_verdict("I would rate this a 7 out of 10.");
        assert!(verdict.is_error());
        assert_eq!(verdict.score(), None);
        assert_eq!(verdict.reasoning(), None);
        assert_eq!(verdict.raw_error(), Some("I would rate this a 7 out of 10."));
    }

    #[test]
    fn test_parse_broken_json_is_error() {
        let verdict = parse_verdict(r#"{"score": 7, "reason": "unterminated}"#);
        assert!(verdict.is_error());
        assert_eq!(verdict.score(), None);
    }

    #[test]
    fn test_parse_missing_score_is_error() {
        let verdict = parse_verdict(r#"{"judgment": "Good"}"#);
        assert!(verdict.is_error());
    }

    #[test]
    fn test_parse_reversed_braces_is_error() {
        assert!(parse_verdict("} nothing {").is_error());
    }

    #[test]
    fn test_score_is_clamped() {
        assert_eq!(parse_verdict(r#"{"score": 42}"#).score(), Some(MAX_SCORE));
        assert_eq!(JudgeVerdict::scored(-1.0, None).score(), Some(0.0));
    }

    #[test]
    fn test_format_poi_list() {
        let items = vec![
            PoiItem::new("Al Mirqab Mall").with_secondary("Doha"),
            PoiItem::new("Mirqab Tower"),
        ];
        assert_eq!(
            format_poi_list(&items),
            "1. Al Mirqab Mall (Doha)\n2. Mirqab Tower (N/A)"
        );
        assert_eq!(format_poi_list(&[]), EMPTY_LIST_TEXT);
    }

    #[test]
    fn test_prompt_respects_top_k() {
        let judge = LlmJudge::from_config(LlmConfig::default()).with_top_k(2);
        let items: Vec<PoiItem> = ["One", "Two", "Three"].iter().map(|n| PoiItem::new(*n)).collect();
        let prompt = judge.build_prompt("q", &items, &[]);

        assert!(prompt.contains("2. Two"));
        assert!(!prompt.contains("3. Three"));
        assert!(prompt.contains(EMPTY_LIST_TEXT));
    }

    #[test]
    fn test_judge_trait_object() {
        let judge: Box<dyn Judge> = Box::new(FixedJudge(JudgeVerdict::scored(8.0, None)));
        let verdict = tokio_test::block_on(judge.judge("q", &[], &[]));
        assert_eq!(verdict.score(), Some(8.0));
    }

    #[tokio::test]
    async fn test_unreachable_judge_returns_error_verdict() {
        let judge = LlmJudge::from_config(LlmConfig {
            api_base: "http://127.0.0.1:9".to_string(),
            api_key: "test".to_string(),
            ..Default::default()
        });
        let verdict = judge.judge("Katara", &[], &[PoiItem::new("Katara")]).await;
        assert!(verdict.is_error());
        assert!(verdict.raw_error().unwrap().starts_with("judge request failed"));
    }
}
