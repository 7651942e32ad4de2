pub mod error;
pub mod features;
pub mod params;
pub mod sentiment;

pub use error::AnalysisError;
pub use features::{extract_features, Features, Trend, VolatilityBucket};
pub use params::{ParameterRecommender, SeasonalParams};
pub use sentiment::{SentimentResult, SentimentScorer};
