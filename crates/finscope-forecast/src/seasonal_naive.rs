use async_trait::async_trait;
use serde_json::Value;

use finscope_core::TradingCalendar;
use finscope_protocol::TimePoint;

use crate::backend::{ForecastOutput, Forecaster, TRADING_WEEK_PERIOD};
use crate::error::{ForecastError, Result};

/// Mandatory baseline: `y[t] = y[t - 5]`, the trading-week period
/// (spec.md §4.6, GLOSSARY "Baseline"). Always included as a candidate
/// and never accepts tuning parameters.
pub struct SeasonalNaiveForecaster;

#[async_trait]
impl Forecaster for SeasonalNaiveForecaster {
    fn name(&self) -> &str {
        "seasonal_naive"
    }

    async fn forecast(
        &self,
        history: &[TimePoint],
        horizon: usize,
        calendar: &dyn TradingCalendar,
        _params: Option<&Value>,
    ) -> Result<ForecastOutput> {
        if history.len() < TRADING_WEEK_PERIOD {
            return Err(ForecastError::InsufficientHistory {
                needed: TRADING_WEEK_PERIOD,
                have: history.len(),
            });
        }

        let tail: Vec<f64> = history[history.len() - TRADING_WEEK_PERIOD..]
            .iter()
            .map(|p| p.value)
            .collect();
        let last_date = history.last().expect("checked non-empty above").date;
        let dates = calendar.next_n_trading_days(last_date, horizon);

        let points = dates
            .into_iter()
            .enumerate()
            .map(|(i, date)| TimePoint::predicted(date, tail[i % TRADING_WEEK_PERIOD]))
            .collect();

        Ok(ForecastOutput {
            points,
            mae: None,
            rmse: None,
            model_name: self.name().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use finscope_core::SimpleTradingCalendar;

    fn d(y: i32, m: u32, day: u32) -> chrono::NaiveDate {
        chrono::NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[tokio::test]
    async fn repeats_last_trading_week_cyclically() {
        let calendar = SimpleTradingCalendar;
        let history: Vec<TimePoint> = (1..=10)
            .map(|i| TimePoint::historical(d(2024, 1, i), i as f64))
            .collect();
        let out = SeasonalNaiveForecaster
            .forecast(&history, 5, &calendar, None)
            .await
            .unwrap();
        assert_eq!(out.points.len(), 5);
        // last 5 historical values are 6..10; they should tile forward.
        let values: Vec<f64> = out.points.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![6.0, 7.0, 8.0, 9.0, 10.0]);
    }

    #[tokio::test]
    async fn too_short_history_errors() {
        let calendar = SimpleTradingCalendar;
        let history = vec![TimePoint::historical(d(2024, 1, 1), 1.0)];
        let result = SeasonalNaiveForecaster
            .forecast(&history, 5, &calendar, None)
            .await;
        assert!(result.is_err());
    }
}
