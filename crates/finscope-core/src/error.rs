use thiserror::Error;

#[derive(Debug, Error)]
pub enum FinscopeError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("redis error: {0}")]
    Redis(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("upstream provider error: {0}")]
    Upstream(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl FinscopeError {
    /// Short error code surfaced on the wire via the `error` event's
    /// `error_code` field (spec.md §6 event catalog).
    pub fn code(&self) -> &'static str {
        match self {
            FinscopeError::Config(_) => "CONFIG_ERROR",
            FinscopeError::Redis(_) => "REDIS_ERROR",
            FinscopeError::NotFound(_) => "NOT_FOUND",
            FinscopeError::Upstream(_) => "UPSTREAM_ERROR",
            FinscopeError::Serialization(_) => "SERIALIZATION_ERROR",
            FinscopeError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether a client may usefully retry after this error (spec.md §7,
    /// infrastructure errors are retryable; most others are not).
    pub fn retry_able(&self) -> bool {
        matches!(self, FinscopeError::Redis(_) | FinscopeError::Upstream(_))
    }
}

pub type Result<T> = std::result::Result<T, FinscopeError>;
