//! POI Eval - compares a POI search engine against a reference engine.
//!
//! For each query, the candidate engine's ranked results are aligned with
//! the reference engine's results by fuzzy label similarity. That alignment
//! yields deterministic metrics (precision, reciprocal-rank, per-reference
//! coverage), and an LLM judge adds a single holistic 0-10 score.
//!
//! # Quick Start
//!
//! ```no_run
//! use poi_eval::{
//!     config::Config,
//!     dataset::LoadOptions,
//!     evaluator::{Evaluator, EvaluatorOptions},
//!     judge::LlmJudge,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     config.validate()?;
//!
//!     let judge = LlmJudge::from_config(config.llm.clone()).with_top_k(config.eval.judge_top_k);
//!     let mut evaluator =
//!         Evaluator::new(Box::new(judge), EvaluatorOptions::from_config(&config.eval));
//!
//!     let summary = evaluator
//!         .run_file(
//!             &config.eval.input_path,
//!             &config.eval.output_path,
//!             LoadOptions::default(),
//!         )
//!         .await?;
//!     println!("{} records written", summary.processed);
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **text / similarity**: label normalization and fuzzy scoring
//! - **align / metrics**: best-match alignment and metric aggregation
//! - **judge**: LLM-as-judge behind the [`Judge`] trait
//! - **dataset**: tolerant JSONL / JSON-array ingestion
//! - **evaluator**: sequential per-record pipeline
//! - **report / persistence**: JSONL report model and atomic writes

pub mod align;
pub mod config;
pub mod dataset;
pub mod error;
pub mod evaluator;
pub mod judge;
pub mod llm;
pub mod metrics;
pub mod persistence;
pub mod poi;
pub mod report;
pub mod similarity;
pub mod text;

// Re-export commonly used types
pub use align::{AlignOptions, Alignment, AlignmentEntry, align};
pub use config::Config;
pub use error::{PoiEvalError, Result};
pub use evaluator::{Evaluator, EvaluatorOptions, RunSummary};
pub use judge::{Judge, JudgeVerdict, LlmJudge};
pub use llm::LlmClient;
pub use metrics::{Coverage, MetricsResult, aggregate};
pub use persistence::{ReportStore, load_reports};
pub use poi::{CandidateItem, PoiItem, QueryRecord, ReferenceItem};
pub use report::{EvaluationReport, ReportSummary};
pub use similarity::similarity;
pub use text::normalize;
