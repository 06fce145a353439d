//! Evaluation orchestrator.
//!
//! Records are processed one at a time: metrics first, then a single
//! judge call, then the report is written out before the next record
//! starts. Judge calls are the only suspension point.

use crate::align::AlignOptions;
use crate::config::{DEFAULT_SIMILARITY_THRESHOLD, EvalConfig};
use crate::dataset::{LoadOptions, LoadedRecords, load_records};
use crate::error::Result;
use crate::judge::{Judge, JudgeVerdict};
use crate::metrics::{MetricsResult, aggregate};
use crate::persistence::ReportStore;
use crate::poi::{PoiItem, QueryRecord};
use crate::report::EvaluationReport;
use std::path::Path;
use std::time::Duration;
use tokio::time::{Instant, sleep_until, timeout};
use tracing::{Instrument, debug, info, info_span, warn};

/// Where a record is in its pass through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStage {
    Pending,
    MetricsComputed,
    Judged,
    Written,
}

impl RecordStage {
    /// The stage that follows this one. `Written` is terminal.
    pub fn next(self) -> Self {
        match self {
            RecordStage::Pending => RecordStage::MetricsComputed,
            RecordStage::MetricsComputed => RecordStage::Judged,
            RecordStage::Judged | RecordStage::Written => RecordStage::Written,
        }
    }
}

/// Enforces a minimum interval between consecutive call starts.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last: Option<Instant>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: None,
        }
    }

    /// Wait until the next call may start, then mark it as started.
    pub async fn wait(&mut self) {
        if let Some(last) = self.last {
            let ready_at = last + self.min_interval;
            if ready_at > Instant::now() {
                debug!(delay_ms = self.min_interval.as_millis() as u64, "rate limiting judge call");
                sleep_until(ready_at).await;
            }
        }
        self.last = Some(Instant::now());
    }
}

/// Tunables for an [`Evaluator`].
#[derive(Debug, Clone, Copy)]
pub struct EvaluatorOptions {
    pub threshold: f64,
    /// Minimum spacing between judge call starts.
    pub judge_delay: Duration,
    /// Upper bound on one judge call.
    pub judge_timeout: Duration,
}

impl Default for EvaluatorOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_SIMILARITY_THRESHOLD,
            judge_delay: Duration::from_secs(4),
            judge_timeout: Duration::from_secs(60),
        }
    }
}

impl EvaluatorOptions {
    pub fn from_config(config: &EvalConfig) -> Self {
        Self {
            threshold: config.similarity_threshold,
            judge_delay: config.judge_delay(),
            judge_timeout: config.judge_timeout(),
        }
    }
}

/// Counts for a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Records written to the report.
    pub processed: usize,
    /// Input entries that could not be used.
    pub skipped: usize,
    /// Written records whose judge call failed.
    pub judge_errors: usize,
}

fn preview(items: &[PoiItem]) -> String {
    items
        .iter()
        .take(5)
        .map(|i| match &i.secondary_label {
            Some(s) => format!("{} ({})", i.primary_label, s),
            None => i.primary_label.clone(),
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Runs query records through metrics and the judge.
pub struct Evaluator {
    judge: Box<dyn Judge>,
    options: EvaluatorOptions,
    limiter: RateLimiter,
}

impl Evaluator {
    pub fn new(judge: Box<dyn Judge>, options: EvaluatorOptions) -> Self {
        Self {
            judge,
            limiter: RateLimiter::new(options.judge_delay),
            options,
        }
    }

    async fn judge_record(&mut self, record: &QueryRecord) -> JudgeVerdict {
        self.limiter.wait().await;

        let call = self
            .judge
            .judge(&record.query, &record.candidates, &record.references);
        match timeout(self.options.judge_timeout, call).await {
            Ok(verdict) => verdict,
            Err(_) => {
                warn!(
                    timeout_secs = self.options.judge_timeout.as_secs_f64(),
                    "judge call timed out"
                );
                JudgeVerdict::failed(format!(
                    "judge timed out after {:.1}s",
                    self.options.judge_timeout.as_secs_f64()
                ))
            }
        }
    }

    /// Compute metrics and the judge verdict for one record.
    pub async fn evaluate_record(&mut self, record: &QueryRecord) -> EvaluationReport {
        let mut stage = RecordStage::Pending;
        debug!(candidates = %preview(&record.candidates), "candidate list");
        debug!(references = %preview(&record.references), "reference list");

        let metrics: MetricsResult = aggregate(
            &record.candidates,
            &record.references,
            AlignOptions::with_threshold(self.options.threshold),
        );
        stage = stage.next();
        info!(
            precision = metrics.precision_ratio(),
            mrr = metrics.mean_reciprocal_rank(),
            ?stage,
            "metrics computed"
        );
        for entry in metrics.coverage() {
            debug!(
                reference = %entry.reference_label,
                score = entry.best_score,
                rank = entry.best_rank,
                "coverage"
            );
        }

        let verdict = self.judge_record(record).await;
        stage = stage.next();
        match verdict.score() {
            Some(score) => info!(score, ?stage, "judge verdict"),
            None => warn!(?stage, "judge returned no score"),
        }

        EvaluationReport::new(record, &metrics, &verdict)
    }

    /// Evaluate every record, appending each report to `store` as soon
    /// as it is complete. A storage failure aborts the run.
    pub async fn run(&mut self, loaded: LoadedRecords, store: &mut ReportStore) -> Result<RunSummary> {
        let total = loaded.records.len();
        let mut summary = RunSummary {
            skipped: loaded.skipped,
            ..Default::default()
        };

        info!(records = total, output = %store.path().display(), "starting evaluation");

        for (idx, record) in loaded.records.iter().enumerate() {
            let span = info_span!("record", index = idx + 1, query = %record.query);
            info!(parent: &span, "[{}/{}] evaluating '{}'", idx + 1, total, record.query);

            let report = self.evaluate_record(record).instrument(span.clone()).await;
            if report.judge_failed() {
                summary.judge_errors += 1;
            }

            store.append(report)?;
            debug!(parent: &span, stage = ?RecordStage::Written, "record written");
            summary.processed += 1;
        }

        info!(
            processed = summary.processed,
            skipped = summary.skipped,
            judge_errors = summary.judge_errors,
            "evaluation finished"
        );
        Ok(summary)
    }

    /// Load `input`, evaluate it and write the report to `output`.
    pub async fn run_file(
        &mut self,
        input: &Path,
        output: &Path,
        load_options: LoadOptions,
    ) -> Result<RunSummary> {
        let loaded = load_records(input, load_options)?;
        info!(
            input = %input.display(),
            records = loaded.records.len(),
            skipped = loaded.skipped,
            strategy = ?loaded.strategy,
            "input loaded"
        );
        let mut store = ReportStore::create(output)?;
        self.run(loaded, &mut store).await
    }
}
