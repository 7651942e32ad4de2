use async_trait::async_trait;
use serde::Deserialize;

use finscope_protocol::{
    infer_market, Entity, EntityMatch, Market, HIGH_CONFIDENCE_THRESHOLD, LOW_CONFIDENCE_THRESHOLD,
};

use crate::error::Result;

/// Queries an external semantic index for a ticker/name mention and
/// classifies the top result into a success, ambiguous, or failed
/// match (spec.md §4.4).
#[async_trait]
pub trait EntityResolver: Send + Sync {
    async fn resolve(&self, mention: &str) -> Result<EntityMatch>;
}

#[derive(Debug, Deserialize)]
struct SemanticIndexResponse {
    #[serde(default)]
    results: Vec<SemanticIndexCandidate>,
}

#[derive(Debug, Deserialize)]
struct SemanticIndexCandidate {
    code: String,
    name: String,
    confidence: f64,
    #[serde(default)]
    market: Option<String>,
    #[serde(default)]
    delisted: bool,
}

/// HTTP client for an external semantic entity index (spec.md §4.4).
pub struct SemanticIndexResolver {
    http: reqwest::Client,
    base_url: String,
}

impl SemanticIndexResolver {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn candidate_market(candidate: &SemanticIndexCandidate) -> Market {
        match candidate.market.as_deref() {
            Some("SH") | Some("Shanghai") => Market::Shanghai,
            Some("SZ") | Some("Shenzhen") => Market::Shenzhen,
            Some(_) => Market::Unknown,
            None => infer_market(&candidate.code),
        }
    }

    fn suggestion(candidate: &SemanticIndexCandidate) -> String {
        format!("{}({})", candidate.name, candidate.code)
    }
}

#[async_trait]
impl EntityResolver for SemanticIndexResolver {
    async fn resolve(&self, mention: &str) -> Result<EntityMatch> {
        let response: SemanticIndexResponse = self
            .http
            .get(format!("{}/resolve", self.base_url))
            .query(&[("q", mention)])
            .send()
            .await?
            .json()
            .await?;

        let Some(top) = response.results.first() else {
            return Ok(EntityMatch::unknown(0.0));
        };

        if top.delisted {
            return Ok(EntityMatch::delisted(&top.name));
        }

        if top.confidence >= HIGH_CONFIDENCE_THRESHOLD {
            return Ok(EntityMatch::success(
                Entity {
                    code: top.code.clone(),
                    canonical_name: top.name.clone(),
                    market: Self::candidate_market(top),
                },
                top.confidence,
            ));
        }

        if top.confidence >= LOW_CONFIDENCE_THRESHOLD {
            let suggestions = response
                .results
                .iter()
                .take(3)
                .map(Self::suggestion)
                .collect();
            return Ok(EntityMatch::ambiguous(top.confidence, suggestions));
        }

        Ok(EntityMatch::unknown(top.confidence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_market_falls_back_to_code_inference() {
        let candidate = SemanticIndexCandidate {
            code: "600519".to_string(),
            name: "Kweichow Moutai".to_string(),
            confidence: 0.9,
            market: None,
            delisted: false,
        };
        assert_eq!(
            SemanticIndexResolver::candidate_market(&candidate),
            Market::Shanghai
        );
    }

    #[test]
    fn suggestion_formats_as_name_paren_code() {
        let candidate = SemanticIndexCandidate {
            code: "600519".to_string(),
            name: "Kweichow Moutai".to_string(),
            confidence: 0.6,
            market: None,
            delisted: false,
        };
        assert_eq!(
            SemanticIndexResolver::suggestion(&candidate),
            "Kweichow Moutai(600519)"
        );
    }
}
