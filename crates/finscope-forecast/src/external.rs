use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use finscope_core::TradingCalendar;
use finscope_protocol::TimePoint;

use crate::backend::{ForecastOutput, Forecaster};
use crate::error::{ForecastError, Result};

#[derive(Serialize)]
struct ForecastRequest<'a> {
    history: &'a [HistoryPoint],
    horizon: usize,
    target_dates: &'a [NaiveDate],
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<&'a Value>,
}

#[derive(Serialize)]
struct HistoryPoint {
    date: NaiveDate,
    value: f64,
}

#[derive(Deserialize)]
struct ForecastResponse {
    values: Vec<f64>,
    #[serde(default)]
    mae: Option<f64>,
    #[serde(default)]
    rmse: Option<f64>,
}

/// Thin client for an out-of-process forecasting model (Prophet /
/// XGBoost / Random Forest / DLinear — each reduced to this single
/// `Forecaster` contract, spec.md §1 Non-goals, §4.6).
///
/// The concrete model math is the collaborator's responsibility; this
/// crate only owns the contract and the request/response shape.
pub struct HttpForecastBackend {
    http: reqwest::Client,
    base_url: String,
    name: String,
}

impl HttpForecastBackend {
    pub fn new(base_url: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            name: name.into(),
        }
    }
}

#[async_trait]
impl Forecaster for HttpForecastBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn forecast(
        &self,
        history: &[TimePoint],
        horizon: usize,
        calendar: &dyn TradingCalendar,
        params: Option<&Value>,
    ) -> Result<ForecastOutput> {
        let last_date = history
            .last()
            .ok_or_else(|| ForecastError::InsufficientHistory {
                needed: 1,
                have: 0,
            })?
            .date;
        let target_dates = calendar.next_n_trading_days(last_date, horizon);

        let history_points: Vec<HistoryPoint> = history
            .iter()
            .map(|p| HistoryPoint {
                date: p.date,
                value: p.value,
            })
            .collect();

        let request = ForecastRequest {
            history: &history_points,
            horizon,
            target_dates: &target_dates,
            params,
        };

        let response = self
            .http
            .post(format!("{}/forecast/{}", self.base_url, self.name))
            .json(&request)
            .send()
            .await
            .map_err(|e| ForecastError::BackendFailed {
                backend: self.name.clone(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(ForecastError::BackendFailed {
                backend: self.name.clone(),
                reason: format!("status {}", response.status()),
            });
        }

        let parsed: ForecastResponse =
            response
                .json()
                .await
                .map_err(|e| ForecastError::BackendFailed {
                    backend: self.name.clone(),
                    reason: e.to_string(),
                })?;

        if parsed.values.len() != target_dates.len() {
            return Err(ForecastError::BackendFailed {
                backend: self.name.clone(),
                reason: format!(
                    "expected {} predicted values, got {}",
                    target_dates.len(),
                    parsed.values.len()
                ),
            });
        }

        let points = target_dates
            .into_iter()
            .zip(parsed.values)
            .map(|(date, value)| TimePoint::predicted(date, value))
            .collect();

        Ok(ForecastOutput {
            points,
            mae: parsed.mae,
            rmse: parsed.rmse,
            model_name: self.name.clone(),
        })
    }
}
