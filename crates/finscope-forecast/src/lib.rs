pub mod backend;
pub mod error;
pub mod external;
pub mod runner;
pub mod seasonal_naive;
pub mod selector;

pub use backend::{ForecastOutput, Forecaster};
pub use error::ForecastError;
pub use external::HttpForecastBackend;
pub use runner::{ForecastRunner, BASELINE_BACKEND, CANDIDATE_BACKENDS};
pub use seasonal_naive::SeasonalNaiveForecaster;
pub use selector::{
    choose_production_model, ModelSelector, ModelScore, ProductionChoice, SelectionResult,
    DEFAULT_MIN_TRAIN_SIZE, DEFAULT_N_WINDOWS,
};
