use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::warn;

use crate::provider::{ChatRequest, Message, Role};
use crate::runtime::AgentRuntime;
use crate::stream::StreamEvent;

const CHAT_SYSTEM_PROMPT: &str = "You are a professional financial analysis assistant. Answer \
using the conversation history and any supplied context.\n\n\
Requirements:\n\
1. Be concise and professional.\n\
2. When citing a source, use markdown link format [title](url).\n\
3. When citing a research report, use the format [report name](rag://filename.pdf#page=N).\n\
4. If the context doesn't contain relevant information, say so honestly.";

const REPORT_SYSTEM_PROMPT: &str = "You are a professional financial analysis assistant. \
Given the user's question and the data analysis results, write a concise, professional, \
objective report.\n\n\
If the question references a prior turn (e.g. \"how confident is this forecast\", \"about \
that last analysis\"), use the conversation history to answer in context.\n\n\
Structure (under 150 words total):\n\
1. Historical trend read (2 sentences)\n\
2. Forecast interpretation (2 sentences)\n\
3. Investment takeaway and risk note (2 sentences)";

const NEWS_SUMMARY_SYSTEM_PROMPT: &str = "Summarize each news item into a short title and a \
2-3 sentence body, preserving the original meaning. Respond with a JSON array, one object per \
input item in the same order, each shaped {\"summarized_title\": string, \
\"summarized_content\": string}.";

/// Streams text through an LLM call, forwarding each delta to `chunk_tx`
/// and returning the accumulated text — the shared shape behind the
/// report generator, chat responder, and sentiment scorer (spec.md §4.9
/// F5/C2, grounded on `ReportAgent.generate`/`IntentAgent._stream_response`).
async fn stream_text(
    runtime: &Arc<AgentRuntime>,
    model: &str,
    system: &str,
    messages: Vec<Message>,
    chunk_tx: mpsc::Sender<String>,
) -> String {
    let req = ChatRequest {
        model: model.to_string(),
        system: system.to_string(),
        system_prompt: None,
        messages,
        max_tokens: 2048,
        stream: true,
        thinking: None,
        tools: Vec::new(),
        raw_messages: None,
    };

    let (tx, mut rx) = mpsc::channel(32);
    let runtime = runtime.clone();
    let handle = tokio::spawn(async move { runtime.provider().send_stream(&req, tx).await });

    let mut accumulated = String::new();
    while let Some(event) = rx.recv().await {
        match event {
            StreamEvent::TextDelta { text } => {
                accumulated.push_str(&text);
                let _ = chunk_tx.send(text).await;
            }
            StreamEvent::Done { .. } => break,
            StreamEvent::Error { message } => {
                warn!(error = %message, "narration stream failed");
                break;
            }
            StreamEvent::Thinking { .. } | StreamEvent::ToolUse { .. } => {}
        }
    }

    if let Err(e) = handle.await {
        warn!(error = %e, "narration provider task panicked");
    }

    accumulated
}

/// Final forecast-report narrator (spec.md §4.9 F5).
pub struct ReportNarrator {
    runtime: Arc<AgentRuntime>,
    model: String,
}

impl ReportNarrator {
    pub fn new(runtime: Arc<AgentRuntime>, model: String) -> Self {
        Self { runtime, model }
    }

    pub async fn narrate(
        &self,
        user_question: &str,
        data_summary: &str,
        history: &[Message],
        chunk_tx: mpsc::Sender<String>,
    ) -> String {
        let mut messages = history.to_vec();
        messages.push(Message {
            role: Role::User,
            content: format!("User question: {}\n\n{}", user_question, data_summary),
        });
        stream_text(&self.runtime, &self.model, REPORT_SYSTEM_PROMPT, messages, chunk_tx).await
    }
}

/// Plain chat responder for the non-forecast branch (spec.md §4.9 C2).
pub struct ChatResponder {
    runtime: Arc<AgentRuntime>,
    model: String,
}

impl ChatResponder {
    pub fn new(runtime: Arc<AgentRuntime>, model: String) -> Self {
        Self { runtime, model }
    }

    pub async fn respond(
        &self,
        user_question: &str,
        context_block: Option<&str>,
        history: &[Message],
        chunk_tx: mpsc::Sender<String>,
    ) -> String {
        let mut messages = history.to_vec();
        let content = match context_block {
            Some(ctx) => format!("Context:\n{}\n\nUser question: {}", ctx, user_question),
            None => user_question.to_string(),
        };
        messages.push(Message {
            role: Role::User,
            content,
        });
        stream_text(&self.runtime, &self.model, CHAT_SYSTEM_PROMPT, messages, chunk_tx).await
    }
}

/// Batch news summarizer — a single non-streaming call producing a bounded
/// title/body per item (spec.md §4.9 F1 "summarize it").
pub struct NewsSummarizer {
    runtime: Arc<AgentRuntime>,
    model: String,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct NewsSummary {
    pub summarized_title: String,
    pub summarized_content: String,
}

impl NewsSummarizer {
    pub fn new(runtime: Arc<AgentRuntime>, model: String) -> Self {
        Self { runtime, model }
    }

    pub async fn summarize(&self, titles_and_snippets: &[(String, String)]) -> Vec<NewsSummary> {
        if titles_and_snippets.is_empty() {
            return Vec::new();
        }

        let mut body = String::new();
        for (i, (title, snippet)) in titles_and_snippets.iter().enumerate() {
            body.push_str(&format!("{}. {}: {}\n", i + 1, title, snippet));
        }

        let req = ChatRequest {
            model: self.model.clone(),
            system: NEWS_SUMMARY_SYSTEM_PROMPT.to_string(),
            system_prompt: None,
            messages: vec![Message {
                role: Role::User,
                content: body,
            }],
            max_tokens: 1024,
            stream: false,
            thinking: None,
            tools: Vec::new(),
            raw_messages: None,
        };

        let fallback: Vec<NewsSummary> = titles_and_snippets
            .iter()
            .map(|(title, snippet)| NewsSummary {
                summarized_title: title.clone(),
                summarized_content: snippet.clone(),
            })
            .collect();

        match self.runtime.provider().send(&req).await {
            Ok(resp) => serde_json::from_str(resp.content.trim()).unwrap_or_else(|e| {
                warn!(error = %e, "news summary json parse failed, passing through raw items");
                fallback
            }),
            Err(e) => {
                warn!(error = %e, "news summary llm call failed, passing through raw items");
                fallback
            }
        }
    }
}
