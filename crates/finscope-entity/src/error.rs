use thiserror::Error;

#[derive(Debug, Error)]
pub enum EntityError {
    #[error("entity index request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("entity index returned malformed response: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, EntityError>;
