//! Error types for the intake service.

use std::time::Duration;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Session store errors.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session backend unavailable: {0}")]
    Unavailable(String),
}

/// Errors surfaced by the intake dialog engine to its caller.
#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("Missing session id")]
    MissingSession,

    #[error("Message is empty")]
    EmptyInput,

    /// The completed record could not be saved. The session is kept at its
    /// terminal step, so the next message retries the save.
    #[error("Failed to persist intake record for session {session_id}: {source}")]
    PersistenceFailed {
        session_id: String,
        #[source]
        source: DatabaseError,
    },

    #[error("Session store error: {0}")]
    SessionStore(#[from] SessionError),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} timed out after {timeout:?}")]
    Timeout { provider: String, timeout: Duration },

    #[error("Provider {provider} is not configured")]
    NotConfigured { provider: String },
}
