//! The backend contract shared by every assistant adapter

use async_trait::async_trait;

/// Why a single `run` call failed.
///
/// These never abort a batch: the orchestrator folds them into a failure
/// marker for the affected backend and carries on.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Authentication rejected: {0}")]
    Auth(String),

    #[error("Rate limited: retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("Timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("`{program}` exited with {code}: {stderr}")]
    Command {
        program: String,
        code: String,
        stderr: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BackendError {
    /// Whether another attempt could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        !matches!(self, BackendError::Auth(_) | BackendError::Command { .. })
    }
}

/// A backend could not be built, so it takes no part in the run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("{backend}: environment variable {variable} is not set")]
    MissingCredential { backend: String, variable: String },

    #[error("{backend}: program `{program}` was not found on PATH")]
    MissingTool { backend: String, program: String },

    #[error("unknown backend `{name}`")]
    UnknownBackend { name: String },

    #[error("{backend}: {message}")]
    InvalidSetting { backend: String, message: String },

    #[error("no backends are available for this run")]
    NoBackends,
}

/// One AI assistant behind a uniform text-in, text-out contract
#[async_trait]
pub trait Backend: Send + Sync {
    /// Stable display name, fixed at construction
    fn name(&self) -> &str;

    /// Ask the assistant to perform `task` and return its raw answer
    async fn run(&self, task: &str) -> Result<String, BackendError>;
}
