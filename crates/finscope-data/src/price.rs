use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;

use finscope_protocol::{normalize, DataFetchError, TimePoint};

/// Fetches a normalized historical price series for an entity code
/// (spec.md §4.5 "Price series").
#[async_trait]
pub trait PriceCollector: Send + Sync {
    async fn fetch(
        &self,
        entity_code: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<TimePoint>, DataFetchError>;
}

#[derive(Debug, Deserialize)]
struct PricePoint {
    date: NaiveDate,
    value: f64,
}

#[derive(Debug, Deserialize)]
struct PriceResponse {
    #[serde(default)]
    points: Vec<PricePoint>,
}

pub struct HttpPriceCollector {
    http: reqwest::Client,
    base_url: String,
}

impl HttpPriceCollector {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl PriceCollector for HttpPriceCollector {
    async fn fetch(
        &self,
        entity_code: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<TimePoint>, DataFetchError> {
        let response = self
            .http
            .get(format!("{}/prices/{}", self.base_url, entity_code))
            .query(&[("start", start.to_string()), ("end", end.to_string())])
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(DataFetchError::InvalidCode {
                context: format!("no price series for {}", entity_code),
            });
        }
        if response.status() == reqwest::StatusCode::FORBIDDEN {
            return Err(DataFetchError::Permission {
                context: format!("access denied for {}", entity_code),
            });
        }
        if !response.status().is_success() {
            return Err(DataFetchError::Unknown {
                context: format!("unexpected status {}", response.status()),
            });
        }

        let parsed: PriceResponse = response
            .json()
            .await
            .map_err(|e| DataFetchError::Unknown {
                context: e.to_string(),
            })?;

        let points = parsed
            .points
            .into_iter()
            .map(|p| TimePoint::historical(p.date, p.value))
            .collect();

        Ok(normalize(points))
    }
}

fn classify_reqwest_error(error: &reqwest::Error) -> DataFetchError {
    if error.is_timeout() || error.is_connect() {
        DataFetchError::Network {
            context: error.to_string(),
        }
    } else {
        DataFetchError::Unknown {
            context: error.to_string(),
        }
    }
}
