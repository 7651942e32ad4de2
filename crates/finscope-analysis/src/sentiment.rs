use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::warn;

use finscope_agent::provider::{ChatRequest, Message, Role};
use finscope_agent::runtime::AgentRuntime;
use finscope_agent::stream::StreamEvent;
use finscope_protocol::NewsItem;

const MAX_NEWS_ITEMS: usize = 20;
const NEUTRAL_NARRATIVE: &str = "No news available; defaulting to neutral sentiment.";

const SYSTEM_PROMPT: &str = "You are a financial sentiment analyst. Read the numbered news \
items and produce a sentiment judgement.\n\n\
Focus on the balance and materiality of positive vs negative items, weighing policy, \
earnings, and broad market mood. Pick out the 3-5 most important items.\n\n\
Output format: the first line must be the sentiment score in [-1, 1] (negative is bearish, \
positive is bullish), formatted exactly as `SCORE:0.35`. Leave the second line blank. \
Everything after that is a short narrative (50-100 words) covering the overall read, the \
main drivers, and a summary of the key events.";

#[derive(Debug, Clone)]
pub struct SentimentResult {
    pub score: f64,
    pub narrative: String,
}

/// Streams a sentiment judgement over up to 20 news items through the LLM
/// provider, forwarding narrative text through `chunk_tx` as it arrives
/// (spec.md §4.8, grounded on the `SCORE:<n>` first-line convention).
pub struct SentimentScorer {
    runtime: Arc<AgentRuntime>,
    model: String,
}

impl SentimentScorer {
    pub fn new(runtime: Arc<AgentRuntime>, model: String) -> Self {
        Self { runtime, model }
    }

    pub async fn score(
        &self,
        news_items: &[NewsItem],
        chunk_tx: mpsc::Sender<String>,
    ) -> SentimentResult {
        if news_items.is_empty() {
            let _ = chunk_tx.send(NEUTRAL_NARRATIVE.to_string()).await;
            return SentimentResult {
                score: 0.0,
                narrative: NEUTRAL_NARRATIVE.to_string(),
            };
        }

        let user_content = format_news_items(news_items);
        let req = ChatRequest {
            model: self.model.clone(),
            system: SYSTEM_PROMPT.to_string(),
            system_prompt: None,
            messages: vec![Message {
                role: Role::User,
                content: user_content,
            }],
            max_tokens: 1024,
            stream: true,
            thinking: None,
            tools: Vec::new(),
            raw_messages: None,
        };

        let (tx, mut rx) = mpsc::channel(32);
        let provider_runtime = self.runtime.clone();
        let handle = tokio::spawn(async move {
            provider_runtime.provider().send_stream(&req, tx).await
        });

        let mut full_content = String::new();
        let mut score = 0.0_f64;
        let mut description_started = false;
        let mut narrative = String::new();

        while let Some(event) = rx.recv().await {
            match event {
                StreamEvent::TextDelta { text } => {
                    full_content.push_str(&text);
                    if !description_started {
                        if let Some(idx) = full_content.find("\n\n") {
                            let (first_line, rest) = full_content.split_at(idx);
                            let rest = &rest[2..];
                            score = parse_score_line(first_line);
                            description_started = true;
                            if !rest.is_empty() {
                                narrative.push_str(rest);
                                let _ = chunk_tx.send(rest.to_string()).await;
                            }
                        }
                    } else {
                        narrative.push_str(&text);
                        let _ = chunk_tx.send(text).await;
                    }
                }
                StreamEvent::Done { .. } => break,
                StreamEvent::Error { message } => {
                    warn!(error = %message, "sentiment scorer stream failed");
                    break;
                }
                StreamEvent::Thinking { .. } | StreamEvent::ToolUse { .. } => {}
            }
        }

        if let Err(e) = handle.await {
            warn!(error = %e, "sentiment scorer provider task panicked");
        }

        let narrative = narrative.trim();
        if narrative.is_empty() && !description_started {
            let _ = chunk_tx.send(NEUTRAL_NARRATIVE.to_string()).await;
            return SentimentResult {
                score: 0.0,
                narrative: NEUTRAL_NARRATIVE.to_string(),
            };
        }

        SentimentResult {
            score,
            narrative: if narrative.is_empty() {
                "neutral sentiment".to_string()
            } else {
                narrative.to_string()
            },
        }
    }
}

fn parse_score_line(first_line: &str) -> f64 {
    let upper = first_line.trim().to_uppercase();
    upper
        .split("SCORE:")
        .nth(1)
        .and_then(|s| s.trim().parse::<f64>().ok())
        .unwrap_or(0.0)
}

fn format_news_items(items: &[NewsItem]) -> String {
    let mut out = String::from("News items:\n");
    for (i, item) in items.iter().take(MAX_NEWS_ITEMS).enumerate() {
        let snippet: String = item.snippet.chars().take(100).collect();
        out.push_str(&format!(
            "{}. [{}] {}... ({})\n",
            i + 1,
            item.title,
            snippet,
            item.source_name
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_score_case_insensitively_with_sign() {
        assert_eq!(parse_score_line("score:-0.42"), -0.42);
        assert_eq!(parse_score_line("SCORE:0.9"), 0.9);
    }

    #[test]
    fn malformed_score_line_defaults_to_zero() {
        assert_eq!(parse_score_line("no score here"), 0.0);
    }
}
