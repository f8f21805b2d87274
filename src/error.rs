//! Error taxonomy for the translation pipeline.
//!
//! Configuration problems are reported before any network call is made.
//! Translation and write-back failures abort the run. Review failures never
//! leave the `review` module as a run failure; the orchestrator downgrades
//! them to warnings.

use std::path::PathBuf;
use thiserror::Error;

/// Invalid or incomplete run configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("target language is required (set TARGET_LANGUAGE or pass --lang)")]
    MissingTargetLanguage,

    #[error("batch size must be at least 1, got {0}")]
    InvalidBatchSize(usize),

    #[error("concurrency must be at least 1, got {0}")]
    InvalidConcurrency(usize),

    #[error("max attempts must be at least 1, got {0}")]
    InvalidMaxAttempts(u32),

    #[error("invalid field selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("{0} not set")]
    MissingApiKey(&'static str),

    #[error("unknown review provider '{0}' (expected 'gemini' or 'openai')")]
    UnknownReviewProvider(String),

    #[error("unknown file format '{0}' (expected 'json' or 'jsonl')")]
    UnknownFileFormat(String),

    #[error("review is enabled but no review client was configured")]
    MissingReviewer,
}

/// Failure of a single call to a language model.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("failed to reach model API: {0}")]
    Transport(String),

    #[error("model response contained no content")]
    EmptyResponse,

    #[error("malformed model output: {0}")]
    Malformed(String),

    #[error("translation count mismatch: sent {expected}, received {actual}")]
    CountMismatch { expected: usize, actual: usize },
}

impl ModelError {
    /// Whether another attempt with the same request could succeed.
    ///
    /// Rate limits (429) and server errors (5xx) are transient; every other
    /// 4xx means the request itself is wrong and will fail again.
    pub fn is_retryable(&self) -> bool {
        match self {
            ModelError::Api { status, .. } => *status == 429 || *status >= 500,
            ModelError::Transport(_)
            | ModelError::EmptyResponse
            | ModelError::Malformed(_)
            | ModelError::CountMismatch { .. } => true,
        }
    }
}

impl From<reqwest::Error> for ModelError {
    fn from(err: reqwest::Error) -> Self {
        ModelError::Transport(err.to_string())
    }
}

/// A resolved location could not be written back into its document.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("no string at '{location}': {reason}")]
pub struct WriteBackError {
    pub location: String,
    pub reason: String,
}

/// Review of one translated string failed; the translation is kept as-is.
#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("judge call failed: {0}")]
    Judge(#[source] ModelError),

    #[error("re-translation after review failed: {0}")]
    Correction(#[source] ModelError),

    #[error("judge returned an unusable verdict: {0}")]
    Verdict(String),
}

/// Run-level failures that end the pipeline in the failed state.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot read input directory {path}: {source}")]
    Input {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "translation failed for batch {batch_index} ({documents}) after {attempts} attempt(s): {source}"
    )]
    TranslationFailed {
        batch_index: usize,
        documents: String,
        attempts: u32,
        #[source]
        source: ModelError,
    },

    #[error("write-back failed for {document}: {source}")]
    WriteBack {
        document: String,
        #[source]
        source: WriteBackError,
    },

    #[error("failed to write {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
