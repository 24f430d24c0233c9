//! Error types of the benchmark harness.
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BenchError {
    #[error("data file not found: {0}")]
    DataFileNotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("task parsing error: {0}")]
    TaskParse(String),

    #[error("missing field '{key}' in section '{section}' of the task")]
    MissingTaskField { section: String, key: String },

    #[error("invalid value '{value}' for '{key}' in section '{section}'")]
    InvalidTaskValue {
        section: String,
        key: String,
        value: String,
    },

    #[error("noise magnitude must be finite and non-negative, got {0}")]
    NegativeNoiseMagnitude(f64),

    #[error("key of term {code} is missing (term '{term}')")]
    UnknownFactorCode { code: String, term: String },

    #[error("correspondence table does not cover factor codes {0:?}")]
    IncompleteCorrespondence(Vec<String>),

    #[error("malformed equation: {0}")]
    MalformedEquation(String),

    #[error("token '{0}' is not present in the token pool")]
    UnknownToken(String),

    #[error("term cannot be simulated explicitly: {0}")]
    UnsupportedTerm(String),

    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("integration failed: {0}")]
    IntegrationFailed(String),

    #[error("no equation could be obtained from the search results")]
    NoEquationFound,

    #[error("not implemented: {0}")]
    NotImplemented(String),

    #[error("plotting error: {0}")]
    Plot(String),

    #[error("discovery engine error: {0}")]
    Engine(String),
}

pub type Result<T> = std::result::Result<T, BenchError>;
