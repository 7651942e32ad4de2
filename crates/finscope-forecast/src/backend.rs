use async_trait::async_trait;
use finscope_core::TradingCalendar;
use finscope_protocol::TimePoint;
use serde_json::Value;

use crate::error::Result;

/// Mandatory seasonal-naive period: one trading week (spec.md §4.6).
pub const TRADING_WEEK_PERIOD: usize = 5;

/// Result of a single `Forecast(df, horizon)` call (spec.md §4.6).
#[derive(Debug, Clone)]
pub struct ForecastOutput {
    pub points: Vec<TimePoint>,
    pub mae: Option<f64>,
    pub rmse: Option<f64>,
    pub model_name: String,
}

/// Uniform contract every forecasting backend implements. Concrete
/// algorithms (Prophet, tree ensembles, linear decomposition) are
/// out-of-scope collaborators (spec.md §1 Non-goals); this crate only
/// owns the contract, the dispatcher, and the mandatory baseline.
#[async_trait]
pub trait Forecaster: Send + Sync {
    fn name(&self) -> &str;

    /// `params` carries the sentinent-aware tuning bundle for backends
    /// that accept one (Prophet only, spec.md §4.6); other backends
    /// ignore it.
    async fn forecast(
        &self,
        history: &[TimePoint],
        horizon: usize,
        calendar: &dyn TradingCalendar,
        params: Option<&Value>,
    ) -> Result<ForecastOutput>;
}
