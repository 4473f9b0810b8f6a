//! Error types for failure handling across the pipeline
//!
//! This module provides the error hierarchy for pipeline execution. The design
//! separates the library-level taxonomy, where most failures are absorbed into
//! per-item outcome lists and only structural failures propagate, from the
//! process runner's own error type, which needs to express spawn failures and
//! timeout enforcement independently of the pipeline's reporting model.

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum PipelineError {
    #[error("LLM interaction failed: {0}")]
    LLMError(String),
    #[error("Unsafe input rejected: {0}")]
    UnsafeInput(String),
    #[error("Code execution failed: {0}")]
    ExecutionError(String),
    #[error("Resource fetch failed: {0}")]
    FetchError(String),
    #[error("Artifact publish failed: {0}")]
    PublishError(String),
    #[error("Workspace error: {0}")]
    WorkspaceError(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Parsing error: {0}")]
    ParsingError(String),
    #[error("I/O error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::IoError(err.to_string())
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(err: reqwest::Error) -> Self {
        PipelineError::FetchError(err.to_string())
    }
}

// Specific error for the process runner
#[derive(Error, Debug)]
pub enum ExecError {
    #[error("Failed to spawn '{program}': {message}")]
    SpawnFailed { program: String, message: String },
    #[error("Execution timed out after {timeout_secs}s")]
    Timeout {
        timeout_secs: u64,
        /// Output collected before the deadline expired.
        output: String,
    },
    #[error("I/O error during execution: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Could not create temporary file/directory: {0}")]
    TempFileError(String),
}
