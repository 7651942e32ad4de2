use std::collections::HashMap;
use std::sync::Arc;

use finscope_core::TradingCalendar;
use finscope_protocol::TimePoint;
use serde_json::Value;

use crate::backend::{ForecastOutput, Forecaster};
use crate::error::{ForecastError, Result};
use crate::external::HttpForecastBackend;
use crate::seasonal_naive::SeasonalNaiveForecaster;

pub const CANDIDATE_BACKENDS: &[&str] = &["prophet", "xgboost", "randomforest", "dlinear"];
pub const BASELINE_BACKEND: &str = "seasonal_naive";

/// Dispatches a forecast request to the named backend (spec.md §4.6:
/// "the runner is a dispatcher; the backends are collaborators").
pub struct ForecastRunner {
    backends: HashMap<String, Arc<dyn Forecaster>>,
}

impl ForecastRunner {
    /// Wires the mandatory baseline plus an HTTP-backed collaborator
    /// for each of the four model backends at `model_service_url`.
    pub fn new(model_service_url: &str) -> Self {
        let mut backends: HashMap<String, Arc<dyn Forecaster>> = HashMap::new();
        backends.insert(
            BASELINE_BACKEND.to_string(),
            Arc::new(SeasonalNaiveForecaster),
        );
        for name in CANDIDATE_BACKENDS {
            backends.insert(
                name.to_string(),
                Arc::new(HttpForecastBackend::new(model_service_url, *name)),
            );
        }
        Self { backends }
    }

    pub fn backend(&self, name: &str) -> Option<Arc<dyn Forecaster>> {
        self.backends.get(name).cloned()
    }

    pub async fn run(
        &self,
        model_name: &str,
        history: &[TimePoint],
        horizon: usize,
        calendar: &dyn TradingCalendar,
        params: Option<&Value>,
    ) -> Result<ForecastOutput> {
        let backend = self
            .backend(model_name)
            .ok_or_else(|| ForecastError::UnknownBackend(model_name.to_string()))?;
        backend.forecast(history, horizon, calendar, params).await
    }
}
