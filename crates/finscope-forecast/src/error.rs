use thiserror::Error;

#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("backend '{backend}' failed: {reason}")]
    BackendFailed { backend: String, reason: String },

    #[error("unknown forecast backend: {0}")]
    UnknownBackend(String),

    #[error("insufficient history: need at least {needed} points, have {have}")]
    InsufficientHistory { needed: usize, have: usize },
}

pub type Result<T> = std::result::Result<T, ForecastError>;
