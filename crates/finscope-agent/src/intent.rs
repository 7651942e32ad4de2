use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::warn;

use finscope_protocol::Intent;

use crate::provider::{ChatRequest, Message, Role};
use crate::runtime::AgentRuntime;
use crate::stream::StreamEvent;

const JSON_FENCE_OPEN: &str = "```json";
const JSON_FENCE_CLOSE: &str = "```";

const SYSTEM_PROMPT: &str = "You are the intent-classification stage of a financial \
time-series analysis assistant. Given a user question, decide all intent fields at once.\n\n\
## Analysis steps (narrate these in detail before the JSON)\n\
1. Understand the question: does it touch finance, stocks, or investing?\n\
2. Decide scope: is it something this assistant should handle?\n\
3. Decide intent: does it need a forecast, or just a lookup/chat?\n\
4. Extract entities: which stock(s) are mentioned, and which tools are needed?\n\
5. Set forecast parameters if a forecast is needed.\n\n\
## Scope (is_in_scope) — lean permissive\n\
- true: stock analysis/forecasts, finance/economics/investing questions, research or news \
lookups, small talk, questions about the assistant itself, anything answerable with \
financial or general knowledge.\n\
- false: only for requests plainly outside finance (write code, translate text, write a \
poem). Set out_of_scope_reply to a short friendly refusal explaining what the assistant \
can do instead.\n\n\
## Forecast intent (is_forecast)\n\
- true: explicit request to analyze or forecast a stock's trajectory, change the model, or \
change the time window.\n\
- false: pure news/research lookups, follow-up chat about a prior result, anything that \
doesn't need a new forecast.\n\n\
## Tool switches (any combination)\n\
- enable_rag: user references research reports, analyst ratings, or sector studies.\n\
- enable_search: user explicitly wants a web/news search, or needs current information.\n\
- enable_domain_info: user wants stock-specific news/quotes; usually on for forecasts.\n\n\
## Stock extraction (stock_mention + stock_full_name)\n\
- stock_mention: the stock name/code as the user typed it verbatim; comma-separate \
multiple mentions; empty if none.\n\
- stock_full_name: the mention normalized to its official listed name (translate common \
abbreviations and nicknames); keep the code if the name can't be resolved; empty if none.\n\n\
## Keyword extraction (raw_*_keywords)\n\
Draft initial search/rag/domain-info keyword lists; these get refined once the stock is \
resolved.\n\n\
## Forecast parameters (only when is_forecast is true)\n\
- forecast_model: the backend name (prophet/xgboost/randomforest/dlinear) only if the user \
named one explicitly; otherwise null so the system auto-selects.\n\
- history_days: lookback window, default 365.\n\
- forecast_horizon: days to forecast, default 30.\n\n\
Narrate your reasoning through steps 1-5 first, then emit the result as a fenced ```json \
code block with exactly these keys:\n\
{\"is_in_scope\": bool, \"is_forecast\": bool, \"enable_rag\": bool, \"enable_search\": bool, \
\"enable_domain_info\": bool, \"stock_mention\": string, \"stock_full_name\": string, \
\"raw_search_keywords\": [string], \"raw_rag_keywords\": [string], \
\"raw_domain_keywords\": [string], \"forecast_model\": string|null, \"history_days\": int, \
\"forecast_horizon\": int, \"reason\": string, \"out_of_scope_reply\": string|null}";

#[derive(Debug, Deserialize)]
struct RawIntent {
    #[serde(default = "default_true")]
    is_in_scope: bool,
    #[serde(default)]
    is_forecast: bool,
    #[serde(default)]
    enable_rag: bool,
    #[serde(default)]
    enable_search: bool,
    #[serde(default)]
    enable_domain_info: bool,
    #[serde(default)]
    stock_mention: Option<String>,
    #[serde(default)]
    stock_full_name: Option<String>,
    #[serde(default)]
    raw_search_keywords: Vec<String>,
    #[serde(default)]
    raw_rag_keywords: Vec<String>,
    #[serde(default)]
    raw_domain_keywords: Vec<String>,
    #[serde(default)]
    forecast_model: Option<String>,
    #[serde(default = "default_history_days")]
    history_days: u32,
    #[serde(default = "default_horizon")]
    forecast_horizon: u32,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    out_of_scope_reply: Option<String>,
}

fn default_true() -> bool {
    true
}
fn default_history_days() -> u32 {
    365
}
fn default_horizon() -> u32 {
    30
}

impl From<RawIntent> for Intent {
    fn from(r: RawIntent) -> Self {
        Intent {
            is_in_scope: r.is_in_scope,
            is_forecast: r.is_forecast,
            enable_rag: r.enable_rag,
            enable_search: r.enable_search,
            enable_domain_info: r.enable_domain_info,
            stock_mention: non_empty(r.stock_mention),
            stock_full_name: non_empty(r.stock_full_name),
            raw_search_keywords: r.raw_search_keywords,
            raw_rag_keywords: r.raw_rag_keywords,
            raw_domain_keywords: r.raw_domain_keywords,
            forecast_model: r.forecast_model,
            history_days: r.history_days,
            forecast_horizon: r.forecast_horizon,
            reason: r.reason,
            out_of_scope_reply: r.out_of_scope_reply,
        }
    }
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|v| !v.is_empty())
}

/// Narrate-then-fenced-JSON intent classification: the LLM is asked to
/// think out loud and then emit a ```json block. Narration is forwarded
/// to `thinking_tx` chunk by chunk as it streams in; once the fence opens,
/// everything after it is buffered and parsed instead (spec.md §4.3,
/// grounded on `recognize_intent_streaming`'s state-machine split on
/// the first `"```json"` occurrence).
pub struct IntentClassifier {
    runtime: Arc<AgentRuntime>,
    model: String,
}

impl IntentClassifier {
    pub fn new(runtime: Arc<AgentRuntime>, model: String) -> Self {
        Self { runtime, model }
    }

    pub async fn classify(
        &self,
        user_query: &str,
        history: &[Message],
        thinking_tx: mpsc::Sender<String>,
    ) -> (Intent, String) {
        let mut messages: Vec<Message> = history.to_vec();
        messages.push(Message {
            role: Role::User,
            content: format!("User question: {}\n\nAnalyze the intent.", user_query),
        });

        let req = ChatRequest {
            model: self.model.clone(),
            system: SYSTEM_PROMPT.to_string(),
            system_prompt: None,
            messages,
            max_tokens: 2048,
            stream: true,
            thinking: None,
            tools: Vec::new(),
            raw_messages: None,
        };

        let (tx, mut rx) = mpsc::channel(32);
        let runtime = self.runtime.clone();
        let handle = tokio::spawn(async move { runtime.provider().send_stream(&req, tx).await });

        let mut full_content = String::new();
        let mut in_json_block = false;
        let mut thinking_content = String::new();

        while let Some(event) = rx.recv().await {
            match event {
                StreamEvent::TextDelta { text } => {
                    full_content.push_str(&text);

                    if !in_json_block && full_content.contains(JSON_FENCE_OPEN) {
                        in_json_block = true;
                        thinking_content = full_content
                            .split(JSON_FENCE_OPEN)
                            .next()
                            .unwrap_or("")
                            .trim()
                            .to_string();
                    }

                    if !in_json_block {
                        let _ = thinking_tx.send(text).await;
                    }
                }
                StreamEvent::Done { .. } => break,
                StreamEvent::Error { message } => {
                    warn!(error = %message, "intent classifier stream failed");
                    break;
                }
                StreamEvent::Thinking { .. } | StreamEvent::ToolUse { .. } => {}
            }
        }

        if let Err(e) = handle.await {
            warn!(error = %e, "intent classifier provider task panicked");
        }

        let intent = parse_intent(&full_content).unwrap_or_else(|e| {
            warn!(error = %e, raw = %full_content, "intent classifier json parse failed");
            Intent::conservative_default("parse failure, using default")
        });

        let thinking_content = if thinking_content.is_empty() {
            intent.reason.clone()
        } else {
            thinking_content
        };

        (intent, thinking_content)
    }
}

fn parse_intent(full_content: &str) -> Result<Intent, serde_json::Error> {
    let json_str = if let Some(after_open) = full_content.split_once(JSON_FENCE_OPEN) {
        let tail = after_open.1;
        tail.split(JSON_FENCE_CLOSE).next().unwrap_or(tail)
    } else {
        full_content
    };
    let raw: RawIntent = serde_json::from_str(json_str.trim())?;
    Ok(raw.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fenced_json_and_keeps_thinking_prefix() {
        let content = "I should check if this is finance-related... yes it is.\n\n```json\n{\
            \"is_in_scope\": true, \"is_forecast\": true, \"enable_rag\": false, \
            \"enable_search\": true, \"enable_domain_info\": true, \"stock_mention\": \"moutai\", \
            \"stock_full_name\": \"Kweichow Moutai\", \"raw_search_keywords\": [\"moutai\"], \
            \"raw_rag_keywords\": [], \"raw_domain_keywords\": [\"moutai\"], \
            \"forecast_model\": null, \"history_days\": 365, \"forecast_horizon\": 30, \
            \"reason\": \"forecast request\", \"out_of_scope_reply\": null}\n```";
        let intent = parse_intent(content).unwrap();
        assert!(intent.is_forecast);
        assert_eq!(intent.stock_mention.as_deref(), Some("moutai"));
    }

    #[test]
    fn malformed_json_errors() {
        assert!(parse_intent("no json here at all").is_err());
    }
}
