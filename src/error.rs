//! Error types for the evaluator.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our custom error.
pub type Result<T> = std::result::Result<T, PoiEvalError>;

/// Errors that can occur while evaluating search results.
#[derive(Error, Debug)]
pub enum PoiEvalError {
    /// Error reading or writing files.
    #[error("I/O error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error during serialization/deserialization.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The input file does not exist.
    #[error("Input file not found at '{0}'")]
    InputNotFound(PathBuf),

    /// The report file does not exist.
    #[error("Report file not found at '{0}'")]
    ReportNotFound(PathBuf),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// LLM API error.
    #[error("LLM API error: {0}")]
    LlmApi(String),

    /// LLM response parsing error.
    #[error("Failed to parse LLM response: {0}")]
    LlmParse(String),

    /// HTTP request error.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Configuration file error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PoiEvalError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<reqwest::Error> for PoiEvalError {
    fn from(err: reqwest::Error) -> Self {
        PoiEvalError::Http(err.to_string())
    }
}

impl From<serde_json::Error> for PoiEvalError {
    fn from(err: serde_json::Error) -> Self {
        PoiEvalError::LlmParse(err.to_string())
    }
}
