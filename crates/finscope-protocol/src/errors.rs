use serde::{Deserialize, Serialize};

/// Structured failure from the price-series fetcher (spec.md §4.5).
/// Persisted with an explicit `kind` discriminator (spec.md §9 Design
/// Notes, "Persisted discriminated states").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataFetchError {
    InvalidCode { context: String },
    Network { context: String },
    Permission { context: String },
    Unknown { context: String },
}

impl DataFetchError {
    pub fn context(&self) -> &str {
        match self {
            DataFetchError::InvalidCode { context }
            | DataFetchError::Network { context }
            | DataFetchError::Permission { context }
            | DataFetchError::Unknown { context } => context,
        }
    }

    /// Deterministic fallback explanation when the LLM-backed explainer
    /// is unavailable (spec.md §7).
    pub fn friendly_markdown(&self) -> String {
        match self {
            DataFetchError::InvalidCode { .. } => {
                "I couldn't find a matching instrument for that code. Double-check the ticker and try again.".to_string()
            }
            DataFetchError::Network { .. } => {
                "The price-data provider is temporarily unreachable. Please try again in a moment.".to_string()
            }
            DataFetchError::Permission { .. } => {
                "Access to this instrument's data is restricted.".to_string()
            }
            DataFetchError::Unknown { context } => {
                format!("Something went wrong while fetching price data: {}", context)
            }
        }
    }
}
