use thiserror::Error;

/// Errors that can occur during State Store operations (spec.md §4.1).
#[derive(Debug, Error)]
pub enum StateError {
    /// The requested record does not exist (or has expired past its TTL).
    #[error("not found: {0}")]
    NotFound(String),

    /// A Redis operation failed. Treated as a transient, retryable
    /// infrastructure error by the Orchestrator (spec.md §4.1 "Failure
    /// semantics").
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// A stored record's JSON did not deserialize to the expected type.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StateError>;
