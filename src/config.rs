//! Configuration for the evaluator.
//!
//! Supports both environment variables and YAML config file.
//! Environment variables take precedence over config file values.

use crate::error::{PoiEvalError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Similarity at or above which two labels are treated as the same place.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.6;

/// Longest accepted spacing between judge calls, in seconds.
pub const MAX_JUDGE_DELAY_SECS: f64 = 3600.0;

/// LLM configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL for the LLM API (e.g., "https://api.cerebras.ai")
    pub api_base: String,

    /// API key for authentication
    pub api_key: String,

    /// Model name (e.g., "llama3.3-70b")
    pub model: String,

    /// Maximum tokens for response (optional)
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Temperature for generation (optional)
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_temperature() -> f32 {
    0.0
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: String::new(),
            api_key: String::new(),
            model: "llama3.3-70b".to_string(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

/// Evaluation run settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalConfig {
    /// Minimum similarity for a candidate to count as matching a reference.
    pub similarity_threshold: f64,

    /// Merged per-query results (JSONL or JSON array).
    pub input_path: PathBuf,

    /// Where the JSONL report is written.
    pub output_path: PathBuf,

    /// Emit debug-level previews of lists and coverage.
    pub verbose: bool,

    /// Minimum spacing between consecutive judge calls, in seconds.
    pub judge_delay_secs: f64,

    /// Upper bound on a single judge call, in seconds.
    pub judge_timeout_secs: u64,

    /// Items per list shown to the judge (0 = no limit).
    pub judge_top_k: usize,

    /// Malformed input lines tolerated before the whole-file fallback.
    pub malformed_tolerance: usize,

    /// Truncate both result lists at ingestion.
    pub max_results: Option<usize>,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            input_path: PathBuf::from("data/results/merged_filtered_results.jsonl"),
            output_path: PathBuf::from("data/results/advanced_evaluation_report.jsonl"),
            verbose: false,
            judge_delay_secs: 4.0,
            judge_timeout_secs: 60,
            judge_top_k: 5,
            malformed_tolerance: 5,
            max_results: None,
        }
    }
}

impl EvalConfig {
    /// Judge spacing, clamped to `[0, MAX_JUDGE_DELAY_SECS]`. NaN gives zero.
    pub fn judge_delay(&self) -> Duration {
        let secs = if self.judge_delay_secs.is_nan() {
            0.0
        } else {
            self.judge_delay_secs.clamp(0.0, MAX_JUDGE_DELAY_SECS)
        };
        Duration::from_secs_f64(secs)
    }

    /// Default log level for this run.
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }

    pub fn judge_timeout(&self) -> Duration {
        Duration::from_secs(self.judge_timeout_secs)
    }
}

/// Full application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// LLM settings
    pub llm: LlmConfig,

    /// Evaluation settings
    pub eval: EvalConfig,
}

/// Configuration file structure (YAML format).
#[derive(Debug, Deserialize)]
struct ConfigFile {
    llm: Option<LlmFileSection>,
    eval: Option<EvalFileSection>,
}

#[derive(Debug, Deserialize)]
struct LlmFileSection {
    api_base: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct EvalFileSection {
    similarity_threshold: Option<f64>,
    input_path: Option<PathBuf>,
    output_path: Option<PathBuf>,
    verbose: Option<bool>,
    judge_delay_secs: Option<f64>,
    judge_timeout_secs: Option<u64>,
    judge_top_k: Option<usize>,
    malformed_tolerance: Option<usize>,
    max_results: Option<usize>,
}

/// Parse an env value, warning and falling back when it is garbage.
fn parse_var<T: std::str::FromStr>(name: &str, raw: &str) -> Option<T> {
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(var = name, value = raw, "ignoring unparseable environment value");
            None
        }
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.trim(), "1" | "true" | "True")
}

impl Config {
    /// Load configuration from environment variables and optional config file.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (LLM_*, EVAL_*)
    /// 2. Config file (~/.config/poi-eval/config.yaml)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        let mut config = Config::default();

        if let Some(config_path) = Self::config_file_path() {
            if config_path.exists() {
                config = Self::load_from_file(&config_path)?;
            }
        }

        config.apply_env(|name| env::var(name).ok());

        Ok(config)
    }

    /// Override fields from an environment-like lookup.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(api_base) = lookup("LLM_API_BASE") {
            self.llm.api_base = api_base;
        }
        if let Some(api_key) = lookup("LLM_API_KEY") {
            self.llm.api_key = api_key;
        }
        if let Some(model) = lookup("LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(tokens) = lookup("LLM_MAX_TOKENS").and_then(|v| parse_var("LLM_MAX_TOKENS", &v))
        {
            self.llm.max_tokens = tokens;
        }
        if let Some(temp) =
            lookup("LLM_TEMPERATURE").and_then(|v| parse_var("LLM_TEMPERATURE", &v))
        {
            self.llm.temperature = temp;
        }

        if let Some(threshold) =
            lookup("EVAL_SIM_THRESHOLD").and_then(|v| parse_var("EVAL_SIM_THRESHOLD", &v))
        {
            self.eval.similarity_threshold = threshold;
        }
        if let Some(input) = lookup("EVAL_INPUT_PATH") {
            self.eval.input_path = PathBuf::from(input);
        }
        // EVAL_OUTPUT_JSONL is the older name for the same setting.
        if let Some(output) = lookup("EVAL_OUTPUT_PATH").or_else(|| lookup("EVAL_OUTPUT_JSONL")) {
            self.eval.output_path = PathBuf::from(output);
        }
        if let Some(verbose) = lookup("EVAL_VERBOSE") {
            self.eval.verbose = parse_flag(&verbose);
        }
        if let Some(delay) =
            lookup("EVAL_JUDGE_DELAY_SECS").and_then(|v| parse_var("EVAL_JUDGE_DELAY_SECS", &v))
        {
            self.eval.judge_delay_secs = delay;
        }
        if let Some(timeout) = lookup("EVAL_JUDGE_TIMEOUT_SECS")
            .and_then(|v| parse_var("EVAL_JUDGE_TIMEOUT_SECS", &v))
        {
            self.eval.judge_timeout_secs = timeout;
        }
        if let Some(top_k) =
            lookup("EVAL_JUDGE_TOP_K").and_then(|v| parse_var("EVAL_JUDGE_TOP_K", &v))
        {
            self.eval.judge_top_k = top_k;
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| PoiEvalError::io(path, e))?;
        Self::from_yaml(&content)
    }

    fn from_yaml(content: &str) -> Result<Self> {
        let file_config: ConfigFile = serde_yaml::from_str(content)
            .map_err(|e| PoiEvalError::Config(format!("Failed to parse config file: {}", e)))?;

        let mut config = Config::default();

        if let Some(llm) = file_config.llm {
            if let Some(api_base) = llm.api_base {
                config.llm.api_base = api_base;
            }
            if let Some(api_key) = llm.api_key {
                config.llm.api_key = api_key;
            }
            if let Some(model) = llm.model {
                config.llm.model = model;
            }
            if let Some(max_tokens) = llm.max_tokens {
                config.llm.max_tokens = max_tokens;
            }
            if let Some(temperature) = llm.temperature {
                config.llm.temperature = temperature;
            }
        }

        if let Some(eval) = file_config.eval {
            let target = &mut config.eval;
            if let Some(threshold) = eval.similarity_threshold {
                target.similarity_threshold = threshold;
            }
            if let Some(input) = eval.input_path {
                target.input_path = input;
            }
            if let Some(output) = eval.output_path {
                target.output_path = output;
            }
            if let Some(verbose) = eval.verbose {
                target.verbose = verbose;
            }
            if let Some(delay) = eval.judge_delay_secs {
                target.judge_delay_secs = delay;
            }
            if let Some(timeout) = eval.judge_timeout_secs {
                target.judge_timeout_secs = timeout;
            }
            if let Some(top_k) = eval.judge_top_k {
                target.judge_top_k = top_k;
            }
            if let Some(tolerance) = eval.malformed_tolerance {
                target.malformed_tolerance = tolerance;
            }
            if eval.max_results.is_some() {
                target.max_results = eval.max_results;
            }
        }

        Ok(config)
    }

    /// Get the default config file path.
    pub fn config_file_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "poi-eval")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Validate the evaluation settings.
    pub fn validate_eval(&self) -> Result<()> {
        let threshold = self.eval.similarity_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(PoiEvalError::InvalidConfig(format!(
                "similarity threshold must be within [0, 1], got {}",
                threshold
            )));
        }
        let delay = self.eval.judge_delay_secs;
        if !(0.0..=MAX_JUDGE_DELAY_SECS).contains(&delay) {
            return Err(PoiEvalError::InvalidConfig(format!(
                "judge delay must be between 0 and {} seconds, got {}",
                MAX_JUDGE_DELAY_SECS, delay
            )));
        }
        if self.eval.judge_timeout_secs == 0 {
            return Err(PoiEvalError::InvalidConfig(
                "judge timeout must be at least one second".to_string(),
            ));
        }
        Ok(())
    }

    /// Validate that required configuration is present.
    pub fn validate(&self) -> Result<()> {
        self.validate_eval()?;

        if self.llm.api_base.is_empty() {
            return Err(PoiEvalError::Config(
                "LLM API base URL is required. Set LLM_API_BASE environment variable or add to config file.".to_string()
            ));
        }

        if self.llm.api_key.is_empty() {
            return Err(PoiEvalError::Config(
                "LLM API key is required. Set LLM_API_KEY environment variable or add to config file.".to_string()
            ));
        }

        if self.llm.model.is_empty() {
            return Err(PoiEvalError::Config(
                "LLM model is required. Set LLM_MODEL environment variable or add to config file."
                    .to_string(),
            ));
        }

        Ok(())
    }

    /// Create a config from explicit values (useful for testing).
    pub fn with_llm(
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            llm: LlmConfig {
                api_base: api_base.into(),
                api_key: api_key.into(),
                model: model.into(),
                ..Default::default()
            },
            eval: EvalConfig::default(),
        }
    }
}
