use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use finscope_agent::provider::{ChatRequest, Message, Role};
use finscope_agent::runtime::AgentRuntime;

use crate::features::Features;
use crate::sentiment::SentimentResult;

const SYSTEM_PROMPT: &str = "You are a time-series forecasting expert. Given a stock's \
statistical features and a sentiment read, recommend seasonal-model tuning parameters.\n\n\
Parameters:\n\
- changepoint_prior_scale: trend-change sensitivity (0.001-0.5), default 0.05\n\
- seasonality_prior_scale: seasonality strength (1-25), default 10\n\
- changepoint_range: fraction of history scanned for changepoints (0.8-0.95), default 0.8\n\n\
Return JSON only, matching exactly:\n\
{\"changepoint_prior_scale\": float, \"seasonality_prior_scale\": float, \
\"changepoint_range\": float, \"reasoning\": \"under 30 words\"}";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeasonalParams {
    pub changepoint_prior_scale: f64,
    pub seasonality_prior_scale: f64,
    pub changepoint_range: f64,
    pub reasoning: String,
}

impl SeasonalParams {
    fn conservative_default() -> Self {
        Self {
            changepoint_prior_scale: 0.05,
            seasonality_prior_scale: 10.0,
            changepoint_range: 0.8,
            reasoning: "default parameters".to_string(),
        }
    }
}

/// Recommends seasonal-backend tuning parameters from sentiment + feature
/// context; falls back to a fixed conservative default on any LLM failure
/// (spec.md §4.8, grounded on `recommend_params`/`_default_params`).
pub struct ParameterRecommender {
    runtime: Arc<AgentRuntime>,
    model: String,
}

impl ParameterRecommender {
    pub fn new(runtime: Arc<AgentRuntime>, model: String) -> Self {
        Self { runtime, model }
    }

    pub async fn recommend(
        &self,
        sentiment: &SentimentResult,
        features: &Features,
    ) -> SeasonalParams {
        let user_content = format!(
            "Stock features:\n\
             - trend: {:?}\n\
             - volatility: {:?}\n\
             - data points: {}\n\n\
             Sentiment analysis:\n\
             - score: {:.2}\n\
             - narrative: {}",
            features.trend, features.volatility, features.point_count,
            sentiment.score, sentiment.narrative,
        );

        let req = ChatRequest {
            model: self.model.clone(),
            system: SYSTEM_PROMPT.to_string(),
            system_prompt: None,
            messages: vec![Message {
                role: Role::User,
                content: user_content,
            }],
            max_tokens: 256,
            stream: false,
            thinking: None,
            tools: Vec::new(),
            raw_messages: None,
        };

        match self.runtime.provider().send(&req).await {
            Ok(resp) => parse_params(&resp.content).unwrap_or_else(|e| {
                warn!(error = %e, "parameter recommender returned malformed json, using default");
                SeasonalParams::conservative_default()
            }),
            Err(e) => {
                warn!(error = %e, "parameter recommender llm call failed, using default");
                SeasonalParams::conservative_default()
            }
        }
    }
}

fn parse_params(content: &str) -> Result<SeasonalParams, serde_json::Error> {
    let trimmed = content.trim();
    let json_str = if let Some(start) = trimmed.find('{') {
        if let Some(end) = trimmed.rfind('}') {
            &trimmed[start..=end]
        } else {
            trimmed
        }
    } else {
        trimmed
    };
    serde_json::from_str(json_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_json() {
        let raw = r#"{"changepoint_prior_scale": 0.1, "seasonality_prior_scale": 12.0, "changepoint_range": 0.85, "reasoning": "volatile trend"}"#;
        let parsed = parse_params(raw).unwrap();
        assert_eq!(parsed.changepoint_prior_scale, 0.1);
    }

    #[test]
    fn parses_json_wrapped_in_prose() {
        let raw = "Here you go:\n{\"changepoint_prior_scale\": 0.2, \"seasonality_prior_scale\": 8.0, \"changepoint_range\": 0.9, \"reasoning\": \"x\"}\nthanks";
        let parsed = parse_params(raw).unwrap();
        assert_eq!(parsed.seasonality_prior_scale, 8.0);
    }

    #[test]
    fn malformed_json_errors() {
        assert!(parse_params("not json").is_err());
    }
}
