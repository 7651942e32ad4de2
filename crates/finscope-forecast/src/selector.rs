use std::collections::HashMap;

use chrono::NaiveDate;
use finscope_core::TradingCalendar;
use finscope_protocol::TimePoint;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ForecastError, Result};
use crate::runner::{ForecastRunner, BASELINE_BACKEND};

pub const DEFAULT_N_WINDOWS: usize = 3;
pub const DEFAULT_MIN_TRAIN_SIZE: usize = 60;

/// Per-backend average MAE across completed rolling windows. `+inf`
/// marks a backend that failed every window (spec.md §4.7 step 3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelScore {
    pub model_name: String,
    pub average_mae: f64,
    pub windows_completed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionResult {
    pub model_comparison: Vec<ModelScore>,
    pub best_model: String,
    pub baseline: String,
    pub is_better_than_baseline: bool,
}

struct Window {
    train_end: usize,
    test_dates: Vec<NaiveDate>,
    test_values: HashMap<NaiveDate, f64>,
}

/// Rolling-window back-test that ranks candidate backends against the
/// seasonal-naive baseline (spec.md §4.7 Model Selector).
pub struct ModelSelector<'a> {
    runner: &'a ForecastRunner,
}

impl<'a> ModelSelector<'a> {
    pub fn new(runner: &'a ForecastRunner) -> Self {
        Self { runner }
    }

    fn build_windows(
        history: &[TimePoint],
        horizon: usize,
        n_windows: usize,
        min_train_size: usize,
    ) -> Vec<Window> {
        let l = history.len();
        let mut windows = Vec::new();
        for i in 0..n_windows {
            let test_end = l.saturating_sub(i * horizon);
            let test_start = l.saturating_sub((i + 1) * horizon);
            if test_start >= test_end || test_start < min_train_size {
                continue;
            }
            let test_slice = &history[test_start..test_end];
            let test_dates = test_slice.iter().map(|p| p.date).collect();
            let test_values = test_slice.iter().map(|p| (p.date, p.value)).collect();
            windows.push(Window {
                train_end: test_start,
                test_dates,
                test_values,
            });
        }
        windows
    }

    /// Runs the full procedure (spec.md §4.7 "Procedure", steps 1-4).
    /// `candidates` need not include the baseline — it is always added.
    pub async fn select(
        &self,
        history: &[TimePoint],
        candidates: &[String],
        horizon: usize,
        calendar: &dyn TradingCalendar,
        n_windows: usize,
        min_train_size: usize,
    ) -> Result<SelectionResult> {
        let windows = Self::build_windows(history, horizon, n_windows, min_train_size);
        if windows.is_empty() {
            return Err(ForecastError::InsufficientHistory {
                needed: min_train_size + horizon,
                have: history.len(),
            });
        }

        let mut all_candidates: Vec<String> = candidates.to_vec();
        if !all_candidates.iter().any(|c| c == BASELINE_BACKEND) {
            all_candidates.push(BASELINE_BACKEND.to_string());
        }

        let mut scores = Vec::with_capacity(all_candidates.len());
        for name in &all_candidates {
            scores.push(self.score_candidate(name, history, &windows, calendar).await);
        }

        let baseline_score = scores
            .iter()
            .find(|s| s.model_name == BASELINE_BACKEND)
            .map(|s| s.average_mae)
            .unwrap_or(f64::INFINITY);

        let best = scores
            .iter()
            .filter(|s| s.model_name != BASELINE_BACKEND)
            .min_by(|a, b| a.average_mae.total_cmp(&b.average_mae));

        let best_model = best
            .map(|s| s.model_name.clone())
            .unwrap_or_else(|| BASELINE_BACKEND.to_string());
        let best_mae = best.map(|s| s.average_mae).unwrap_or(f64::INFINITY);

        let is_better_than_baseline =
            best_mae.is_finite() && baseline_score.is_finite() && best_mae < baseline_score;

        Ok(SelectionResult {
            model_comparison: scores,
            best_model,
            baseline: BASELINE_BACKEND.to_string(),
            is_better_than_baseline,
        })
    }

    async fn score_candidate(
        &self,
        name: &str,
        history: &[TimePoint],
        windows: &[Window],
        calendar: &dyn TradingCalendar,
    ) -> ModelScore {
        let Some(backend) = self.runner.backend(name) else {
            return ModelScore {
                model_name: name.to_string(),
                average_mae: f64::INFINITY,
                windows_completed: 0,
            };
        };

        let mut total = 0.0;
        let mut completed = 0usize;

        for window in windows {
            let train = &history[..window.train_end];
            let horizon = window.test_dates.len();
            let params: Option<&Value> = None;
            let outcome = backend.forecast(train, horizon, calendar, params).await;
            let Ok(forecast) = outcome else { continue };

            let mut abs_errors = Vec::new();
            for point in &forecast.points {
                if let Some(actual) = window.test_values.get(&point.date) {
                    abs_errors.push((point.value - actual).abs());
                }
            }
            if abs_errors.is_empty() {
                continue;
            }
            let mae = abs_errors.iter().sum::<f64>() / abs_errors.len() as f64;
            total += mae;
            completed += 1;
        }

        let average_mae = if completed == 0 {
            f64::INFINITY
        } else {
            total / completed as f64
        };

        ModelScore {
            model_name: name.to_string(),
            average_mae,
            windows_completed: completed,
        }
    }
}

/// Production-model choice policy (spec.md §4.7).
pub struct ProductionChoice {
    pub model_name: String,
    pub reason: String,
}

/// Applies the user-specified-vs-auto-select policy with baseline-
/// penalty gating (spec.md §4.7 "Production-model choice policy",
/// §9 Open Question (a): `None` is the auto-select trigger).
pub fn choose_production_model(
    result: &SelectionResult,
    user_specified_model: Option<&str>,
    baseline_penalty_enabled: bool,
) -> ProductionChoice {
    let baseline_mae = result
        .model_comparison
        .iter()
        .find(|s| s.model_name == result.baseline)
        .map(|s| s.average_mae)
        .unwrap_or(f64::INFINITY);

    match user_specified_model {
        None => {
            let best_mae = result
                .model_comparison
                .iter()
                .find(|s| s.model_name == result.best_model)
                .map(|s| s.average_mae)
                .unwrap_or(f64::INFINITY);

            if baseline_penalty_enabled && best_mae >= baseline_mae {
                ProductionChoice {
                    model_name: result.baseline.clone(),
                    reason: format!(
                        "{} MAE {:.4} did not beat {} MAE {:.4}; falling back to baseline",
                        result.best_model, best_mae, result.baseline, baseline_mae
                    ),
                }
            } else {
                ProductionChoice {
                    model_name: result.best_model.clone(),
                    reason: format!(
                        "{} MAE {:.4} below {} MAE {:.4}",
                        result.best_model, best_mae, result.baseline, baseline_mae
                    ),
                }
            }
        }
        Some(chosen) => {
            let chosen_mae = result
                .model_comparison
                .iter()
                .find(|s| s.model_name == chosen)
                .map(|s| s.average_mae)
                .unwrap_or(f64::INFINITY);

            if baseline_penalty_enabled && chosen_mae >= baseline_mae {
                ProductionChoice {
                    model_name: result.baseline.clone(),
                    reason: format!(
                        "user-specified {} MAE {:.4} did not beat {} MAE {:.4}; falling back to baseline",
                        chosen, chosen_mae, result.baseline, baseline_mae
                    ),
                }
            } else {
                ProductionChoice {
                    model_name: chosen.to_string(),
                    reason: "user-specified model".to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(name: &str, mae: f64) -> ModelScore {
        ModelScore {
            model_name: name.to_string(),
            average_mae: mae,
            windows_completed: 3,
        }
    }

    #[test]
    fn auto_select_downgrades_to_baseline_when_penalty_enabled_and_worse() {
        let result = SelectionResult {
            model_comparison: vec![score("xgboost", 5.0), score("seasonal_naive", 3.0)],
            best_model: "xgboost".to_string(),
            baseline: "seasonal_naive".to_string(),
            is_better_than_baseline: false,
        };
        let choice = choose_production_model(&result, None, true);
        assert_eq!(choice.model_name, "seasonal_naive");
    }

    #[test]
    fn auto_select_keeps_best_when_it_beats_baseline() {
        let result = SelectionResult {
            model_comparison: vec![score("xgboost", 2.0), score("seasonal_naive", 3.0)],
            best_model: "xgboost".to_string(),
            baseline: "seasonal_naive".to_string(),
            is_better_than_baseline: true,
        };
        let choice = choose_production_model(&result, None, true);
        assert_eq!(choice.model_name, "xgboost");
    }

    #[test]
    fn user_choice_respected_when_penalty_disabled() {
        let result = SelectionResult {
            model_comparison: vec![score("xgboost", 5.0), score("seasonal_naive", 3.0)],
            best_model: "seasonal_naive".to_string(),
            baseline: "seasonal_naive".to_string(),
            is_better_than_baseline: false,
        };
        let choice = choose_production_model(&result, Some("xgboost"), false);
        assert_eq!(choice.model_name, "xgboost");
    }
}
