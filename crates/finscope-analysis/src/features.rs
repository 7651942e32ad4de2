use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use finscope_protocol::TimePoint;

const TREND_UP_RATIO: f64 = 1.05;
const TREND_DOWN_RATIO: f64 = 0.95;
const VOLATILITY_LOW: f64 = 0.1;
const VOLATILITY_HIGH: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Flat,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolatilityBucket {
    Low,
    Mid,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Features {
    pub trend: Trend,
    pub volatility: VolatilityBucket,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub latest: f64,
    pub point_count: usize,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl Features {
    fn empty() -> Self {
        Self {
            trend: Trend::Flat,
            volatility: VolatilityBucket::Low,
            mean: 0.0,
            std: 0.0,
            min: 0.0,
            max: 0.0,
            latest: 0.0,
            point_count: 0,
            start_date: None,
            end_date: None,
        }
    }
}

/// Pure statistical feature extraction over a price series (spec.md §4.8),
/// ported from `TimeSeriesAnalyzer.analyze_features`: trend compares the
/// mean of the first half against the second half (±5%), volatility
/// buckets the coefficient of variation at 0.1 / 0.3.
pub fn extract_features(points: &[TimePoint]) -> Features {
    if points.is_empty() {
        return Features::empty();
    }

    let values: Vec<f64> = points.iter().map(|p| p.value).collect();
    let n = values.len();
    let mid = n / 2;
    let first_mean = mean(&values[..mid.max(1).min(n)]);
    let second_mean = mean(&values[mid..]);

    let trend = if second_mean > first_mean * TREND_UP_RATIO {
        Trend::Up
    } else if second_mean < first_mean * TREND_DOWN_RATIO {
        Trend::Down
    } else {
        Trend::Flat
    };

    let overall_mean = mean(&values);
    let std = std_dev(&values, overall_mean);
    let cv = if overall_mean != 0.0 {
        std / overall_mean
    } else {
        0.0
    };
    let volatility = if cv > VOLATILITY_HIGH {
        VolatilityBucket::High
    } else if cv > VOLATILITY_LOW {
        VolatilityBucket::Mid
    } else {
        VolatilityBucket::Low
    };

    Features {
        trend,
        volatility,
        mean: overall_mean,
        std,
        min: values.iter().cloned().fold(f64::INFINITY, f64::min),
        max: values.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
        latest: values[n - 1],
        point_count: n,
        start_date: points.first().map(|p| p.date),
        end_date: points.last().map(|p| p.date),
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn std_dev(values: &[f64], mean: f64) -> f64 {
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn empty_series_returns_zeroed_features() {
        let f = extract_features(&[]);
        assert_eq!(f.point_count, 0);
        assert_eq!(f.trend, Trend::Flat);
    }

    #[test]
    fn rising_series_is_trend_up() {
        let points: Vec<TimePoint> = (1..=20)
            .map(|i| TimePoint::historical(d(2024, 1, i), i as f64 * 2.0))
            .collect();
        let f = extract_features(&points);
        assert_eq!(f.trend, Trend::Up);
    }

    #[test]
    fn flat_series_is_trend_flat_and_low_volatility() {
        let points: Vec<TimePoint> = (1..=10)
            .map(|i| TimePoint::historical(d(2024, 1, i), 100.0))
            .collect();
        let f = extract_features(&points);
        assert_eq!(f.trend, Trend::Flat);
        assert_eq!(f.volatility, VolatilityBucket::Low);
    }

    #[test]
    fn highly_dispersed_series_is_high_volatility() {
        let values = [10.0, 90.0, 15.0, 95.0, 5.0, 100.0];
        let points: Vec<TimePoint> = values
            .iter()
            .enumerate()
            .map(|(i, v)| TimePoint::historical(d(2024, 1, i as u32 + 1), *v))
            .collect();
        let f = extract_features(&points);
        assert_eq!(f.volatility, VolatilityBucket::High);
    }
}
