//! Crate-wide error type.

use thiserror::Error;

/// Errors that abort the benchmark run.
///
/// Diagnostic conditions (malformed completion JSON, empty-text choices,
/// zero-event requests, unparsed framer tails) are intentionally not part
/// of this enum -- they are recorded through [`crate::metrics::Diagnostics`]
/// and never surface as a `Result::Err`.
#[derive(Debug, Error)]
pub enum BenchError {
    #[error("ring buffer configuration invalid: {message}")]
    InvalidConfig { message: String },

    #[error("failed to open output file {path}: {source}")]
    OutputFileOpen {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse benchmark config {path}: {message}")]
    ConfigParse { path: String, message: String },

    #[error("dataset unavailable: {message}")]
    DatasetUnavailable { message: String },

    #[error("missing API key: expected {var} in the environment")]
    MissingApiKey { var: String },

    #[error("invalid command line arguments: {message}")]
    InvalidCliArgs { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BenchError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfig { message: message.into() }
    }

    pub fn config_parse(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigParse { path: path.into(), message: message.into() }
    }

    pub fn dataset_unavailable(message: impl Into<String>) -> Self {
        Self::DatasetUnavailable { message: message.into() }
    }

    pub fn invalid_cli_args(message: impl Into<String>) -> Self {
        Self::InvalidCliArgs { message: message.into() }
    }
}

pub type Result<T> = std::result::Result<T, BenchError>;
