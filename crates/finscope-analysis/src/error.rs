#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("llm provider error: {0}")]
    Provider(#[from] finscope_agent::provider::ProviderError),

    #[error("malformed llm response: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
