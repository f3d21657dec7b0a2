use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LeadflowError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("Secret error: {0}")]
    Secret(#[from] crate::secrets::SecretError),

    #[error("Runner error: {0}")]
    Runner(#[from] crate::runner::RunnerError),

    #[error("Server error: {0}")]
    Server(#[from] std::io::Error),
}

/// Failure kinds surfaced by the job endpoints.
///
/// Each variant maps to one HTTP status class; see `http::error`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    /// Missing or malformed required fields. User-fixable.
    #[error("{0}")]
    InvalidRequest(String),

    /// Unknown job id: expired, never existed, or the store was reset.
    #[error("{0}")]
    NotFound(String),

    /// The workflow runner rejected the trigger or could not be reached.
    /// No job record exists for the submission.
    #[error("Workflow trigger failed: {0}")]
    UpstreamTriggerFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl JobError {
    pub fn invalid(message: impl Into<String>) -> Self {
        JobError::InvalidRequest(message.into())
    }

    pub fn job_not_found() -> Self {
        JobError::NotFound("Job not found".to_string())
    }

    pub fn job_id_required() -> Self {
        JobError::InvalidRequest("Job ID required".to_string())
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Invalid value '{value}' for environment variable {name}")]
    InvalidEnv { name: String, value: String },
}
