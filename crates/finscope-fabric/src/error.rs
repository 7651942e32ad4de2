use thiserror::Error;

/// Errors surfaced by the Event Fabric (spec.md §4.2).
#[derive(Debug, Error)]
pub enum FabricError {
    /// A Redis publish, append, or subscribe operation failed.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// An event payload or log entry failed to (de)serialize.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FabricError>;
