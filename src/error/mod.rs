//! Error types for colloquy.

use thiserror::Error;

/// Primary error type for all colloquy operations.
#[derive(Error, Debug)]
pub enum ColloquyError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Missing credential: set {}", variables.join(", "))]
    MissingCredential { variables: Vec<String> },

    #[error("Reply from {speaker} failed at turn {turn_index}: {source}")]
    Reply {
        speaker: String,
        turn_index: u64,
        #[source]
        source: Box<ColloquyError>,
    },

    #[error("Termination check failed: {0}")]
    Termination(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Rate limited: retry after {retry_after_ms:?}ms")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Human input error: {0}")]
    HumanInput(String),

    #[error("Code execution error: {0}")]
    CodeExecution(String),

    #[error("Memory store error: {0}")]
    Memory(String),
}

/// Broad error category for routing recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authentication,
    RateLimit,
    Network,
    Timeout,
    Server,
    Api,
    Configuration,
    Serialization,
    Reply,
    Termination,
    Unknown,
}

impl ColloquyError {
    /// Create an API error.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Missing-credential error naming the environment variables to set.
    pub fn missing<I, S>(variables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::MissingCredential {
            variables: variables.into_iter().map(Into::into).collect(),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Authentication(_) => ErrorCategory::Authentication,
            Self::RateLimited { .. } => ErrorCategory::RateLimit,
            Self::Network(_) => ErrorCategory::Network,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Configuration(_) | Self::MissingCredential { .. } => {
                ErrorCategory::Configuration
            }
            Self::Serialization(_) | Self::Toml(_) => ErrorCategory::Serialization,
            Self::Api { status, .. } => match status {
                401 | 403 => ErrorCategory::Authentication,
                429 => ErrorCategory::RateLimit,
                500..=599 => ErrorCategory::Server,
                _ => ErrorCategory::Api,
            },
            Self::Reply { .. } => ErrorCategory::Reply,
            Self::Termination(_) => ErrorCategory::Termination,
            _ => ErrorCategory::Unknown,
        }
    }

    /// Whether this error is potentially retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::RateLimit
                | ErrorCategory::Network
                | ErrorCategory::Timeout
                | ErrorCategory::Server
        )
    }

    /// The innermost error, unwrapping `Reply` layers.
    pub fn root_cause(&self) -> &ColloquyError {
        match self {
            Self::Reply { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, ColloquyError>;
