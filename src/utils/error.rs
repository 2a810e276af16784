use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Fetch error for {task}: {source}")]
    Fetch { task: String, source: FetchError },

    #[error("Dispatch error: {target}: {message}")]
    Dispatch { target: String, message: String },

    #[error("Store error: {0}")]
    Store(String),

    #[error("No successful fetches ({failed} of {total} tasks failed)")]
    NothingFetched { failed: usize, total: usize },

    #[error("Classifier error: {0}")]
    Classifier(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

// Implement conversion from validation errors
impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(format!("{}", err))
    }
}

/// Failure of a single fetch attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FetchError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("rate limited by upstream")]
    RateLimited,

    #[error("upstream server error (status {0})")]
    Server(u16),

    #[error("request rejected (status {0})")]
    Client(u16),

    #[error("malformed source unit: {0}")]
    Malformed(String),

    #[error("cancelled before the task started")]
    Cancelled,
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FetchError::Timeout(_)
                | FetchError::Network(_)
                | FetchError::RateLimited
                | FetchError::Server(_)
        )
    }

    pub fn kind(&self) -> ErrorKind {
        if self.is_transient() {
            ErrorKind::TransientFetch
        } else {
            ErrorKind::PermanentFetch
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout(err.to_string())
        } else if let Some(status) = err.status() {
            FetchError::from_status(status.as_u16())
        } else if err.is_builder() {
            FetchError::Malformed(err.to_string())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

impl FetchError {
    pub fn label(&self) -> &'static str {
        match self {
            FetchError::Timeout(_) => "timeout",
            FetchError::Network(_) => "network",
            FetchError::RateLimited => "rate_limited",
            FetchError::Server(_) => "server",
            FetchError::Client(_) => "client",
            FetchError::Malformed(_) => "malformed",
            FetchError::Cancelled => "cancelled",
        }
    }

    /// Map a non-success HTTP status onto the retry taxonomy.
    pub fn from_status(status: u16) -> Self {
        match status {
            429 => FetchError::RateLimited,
            500..=599 => FetchError::Server(status),
            _ => FetchError::Client(status),
        }
    }
}

/// Error taxonomy used for propagation decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    TransientFetch,
    PermanentFetch,
    Dispatch,
    Store,
    Other,
}

/// What the pipeline does when an error of a given kind surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPolicy {
    Retry,
    SkipItem,
    AbortRun,
}

impl ErrorKind {
    pub fn policy(self) -> ErrorPolicy {
        match self {
            ErrorKind::TransientFetch => ErrorPolicy::Retry,
            ErrorKind::PermanentFetch | ErrorKind::Dispatch => ErrorPolicy::SkipItem,
            ErrorKind::Store | ErrorKind::Other => ErrorPolicy::AbortRun,
        }
    }
}

impl AppError {
    pub fn store(message: impl Into<String>) -> Self {
        AppError::Store(message.into())
    }

    pub fn dispatch(target: impl Into<String>, message: impl std::fmt::Display) -> Self {
        AppError::Dispatch {
            target: target.into(),
            message: message.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Fetch { source, .. } => source.kind(),
            AppError::Dispatch { .. } => ErrorKind::Dispatch,
            AppError::Database(_) | AppError::Migration(_) | AppError::Store(_) => ErrorKind::Store,
            _ => ErrorKind::Other,
        }
    }

    pub fn policy(&self) -> ErrorPolicy {
        self.kind().policy()
    }
}

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;
