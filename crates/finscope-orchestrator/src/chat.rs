use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use finscope_agent::provider::Message as AgentMessage;
use finscope_protocol::{EventType, Intent, Message, NewsItem, ResearchExcerpt, Role, StepStatus};

use crate::context::OrchestratorContext;
use crate::orchestrator::{conclude, join_chunks, mark_step, publish, spawn_chunk_forwarder};
use crate::steps;

struct GatheredContext {
    research: Vec<ResearchExcerpt>,
    news: Vec<NewsItem>,
}

/// Runs C1 Gather → C2 Respond for the non-forecast branch (spec.md
/// §4.9 "Chat pipeline").
pub(crate) async fn run_chat_pipeline<C: OrchestratorContext + 'static>(
    ctx: &Arc<C>,
    message: &mut Message,
    intent: &Intent,
    history: &[AgentMessage],
) {
    let gathered = c1_gather(ctx, message, intent).await;
    c2_respond(ctx, message, history, &gathered).await;
}

async fn c1_gather<C: OrchestratorContext>(
    ctx: &Arc<C>,
    message: &mut Message,
    intent: &Intent,
) -> GatheredContext {
    mark_step(ctx, message, steps::STEP_INFO_RETRIEVAL, StepStatus::Running).await;

    let resolved = message.resolved_keywords.clone().unwrap_or_default();

    let research_fut = async {
        if intent.enable_rag {
            ctx.research_collector().fetch(&resolved.rag_keywords).await
        } else {
            None
        }
    };
    let search_fut = async {
        if intent.enable_search {
            ctx.news_collector().fetch_search(&resolved.search_keywords).await
        } else {
            Vec::new()
        }
    };
    let domain_fut = async {
        if intent.enable_domain_info {
            ctx.news_collector().fetch_market(&resolved.domain_keywords).await
        } else {
            Vec::new()
        }
    };

    let (research, search_news, domain_news) = tokio::join!(research_fut, search_fut, domain_fut);
    let research = research.unwrap_or_default();
    let mut news = search_news;
    news.extend(domain_news);

    message.artifacts.research_excerpts = research.clone();
    message.artifacts.news = news.clone();
    if let Err(e) = ctx.state().save_message(message).await {
        tracing::warn!(error = %e, "orchestrator: failed to persist gathered chat context");
    }

    if !research.is_empty() {
        publish(
            ctx,
            message.session_id.clone(),
            message.id.clone(),
            EventType::Data,
            json!({"data_type": "research_excerpts", "data": research}),
        )
        .await;
    }
    if !news.is_empty() {
        publish(
            ctx,
            message.session_id.clone(),
            message.id.clone(),
            EventType::Data,
            json!({"data_type": "news", "data": news}),
        )
        .await;
    }

    mark_step(ctx, message, steps::STEP_INFO_RETRIEVAL, StepStatus::Completed).await;
    GatheredContext { research, news }
}

/// Builds a citation-formatted context block for the responder, or
/// `None` when nothing was gathered — degraded context (spec.md §4.9
/// "C1 | C2 | C2(degraded context)").
fn build_context_block(gathered: &GatheredContext) -> Option<String> {
    if gathered.research.is_empty() && gathered.news.is_empty() {
        return None;
    }

    let mut out = String::new();
    for excerpt in &gathered.research {
        out.push_str(&format!(
            "[{}, p.{}] {}\n",
            excerpt.filename, excerpt.page, excerpt.content
        ));
    }
    for item in &gathered.news {
        out.push_str(&format!("[{}]({}): {}\n", item.title, item.url, item.snippet));
    }
    Some(out)
}

async fn c2_respond<C: OrchestratorContext + 'static>(
    ctx: &Arc<C>,
    message: &mut Message,
    history: &[AgentMessage],
    gathered: &GatheredContext,
) {
    mark_step(ctx, message, steps::STEP_GENERATE_ANSWER, StepStatus::Running).await;

    let context_block = build_context_block(gathered);

    let (tx, handle) = spawn_chunk_forwarder(
        ctx.clone(),
        message.session_id.clone(),
        message.id.clone(),
        EventType::ChatChunk,
        |chunk, _accumulated| json!({"content": chunk}),
    );
    let answer = ctx
        .chat_responder()
        .respond(&message.user_query, context_block.as_deref(), history, tx)
        .await;
    let _ = join_chunks(handle).await;

    mark_step(ctx, message, steps::STEP_GENERATE_ANSWER, StepStatus::Completed).await;

    if let Ok(mut session) = ctx.state().require_session(&message.session_id).await {
        session.push_turn(Role::Assistant, answer.clone());
        session.current_message_id = Some(message.id.clone());
        session.updated_at = Utc::now();
        if let Err(e) = ctx.state().save_session(&session).await {
            tracing::warn!(error = %e, "orchestrator: failed to persist session transcript");
        }
    }

    conclude(ctx, message, answer).await;
}
