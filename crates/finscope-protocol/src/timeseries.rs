use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single (date, value) observation, historical or predicted
/// (spec.md §3 TimePoint).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TimePoint {
    pub date: NaiveDate,
    pub value: f64,
    pub is_predicted: bool,
}

impl TimePoint {
    pub fn historical(date: NaiveDate, value: f64) -> Self {
        Self {
            date,
            value,
            is_predicted: false,
        }
    }

    pub fn predicted(date: NaiveDate, value: f64) -> Self {
        Self {
            date,
            value,
            is_predicted: true,
        }
    }
}

/// Normalize a raw series: collapse duplicate dates (last write wins)
/// and sort ascending (spec.md §4.5 price series fetcher).
pub fn normalize(mut points: Vec<TimePoint>) -> Vec<TimePoint> {
    points.sort_by_key(|p| p.date);
    let mut out: Vec<TimePoint> = Vec::with_capacity(points.len());
    for p in points {
        match out.last_mut() {
            Some(last) if last.date == p.date => *last = p,
            _ => out.push(p),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn normalize_sorts_and_dedups() {
        let points = vec![
            TimePoint::historical(d(2024, 1, 3), 10.0),
            TimePoint::historical(d(2024, 1, 1), 8.0),
            TimePoint::historical(d(2024, 1, 1), 9.0),
        ];
        let out = normalize(points);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].date, d(2024, 1, 1));
        assert_eq!(out[1].date, d(2024, 1, 3));
    }
}
