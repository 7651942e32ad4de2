use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, instrument, warn};

use finscope_agent::provider::{Message as AgentMessage, Role as AgentRole};
use finscope_core::{MessageId, SessionId};
use finscope_protocol::{
    EventType, Intent, Message, MessageStatus, ResolvedKeywords, Role, Session, StepStatus,
};

use crate::context::OrchestratorContext;
use crate::{chat, error as error_codes, forecast, steps};

/// What a stage tells `run` to do next. Every branch that sets this to
/// `Terminate` has already published the terminal event itself — `run`
/// just stops driving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Proceed,
    Terminate,
}

/// Drives one Message from `pending` to a terminal state (spec.md §4.9).
#[instrument(skip(ctx), fields(%session_id, %message_id))]
pub async fn run<C: OrchestratorContext + 'static>(
    ctx: Arc<C>,
    session_id: SessionId,
    message_id: MessageId,
) {
    let mut message = match ctx.state().require_message(&message_id).await {
        Ok(m) => m,
        Err(e) => {
            error!(error = %e, "orchestrator: message not found, aborting run");
            return;
        }
    };

    message.status = MessageStatus::Processing;
    if let Err(e) = ctx.state().save_message(&message).await {
        error!(error = %e, "orchestrator: failed to persist processing status, aborting run");
        return;
    }

    let session = match ctx.state().require_session(&session_id).await {
        Ok(s) => s,
        Err(e) => {
            fail(
                &ctx,
                &mut message,
                error_codes::SESSION_NOT_FOUND,
                format!("session lookup failed: {e}"),
                false,
                "start a new conversation",
            )
            .await;
            return;
        }
    };
    let history = recent_history(&session);

    publish(
        &ctx,
        message.session_id.clone(),
        message.id.clone(),
        EventType::SessionCreated,
        json!({"session_id": message.session_id, "message_id": message.id}),
    )
    .await;

    if run_intent_stage(&ctx, &mut message, &history).await == Outcome::Terminate {
        return;
    }

    let intent = message
        .intent
        .clone()
        .expect("intent stage always sets Message.intent before proceeding");

    message.steps = steps::step_schedule(intent.is_in_scope, intent.is_forecast, intent.has_stock());
    if let Some(first) = message.steps.first_mut() {
        first.status = StepStatus::Completed;
    }
    if let Err(e) = ctx.state().save_message(&message).await {
        warn!(error = %e, "orchestrator: failed to persist step schedule");
    }

    if run_entity_stage(&ctx, &mut message, &intent).await == Outcome::Terminate {
        return;
    }

    if intent.is_forecast {
        forecast::run_forecast_pipeline(&ctx, &mut message, &intent, &history).await;
    } else {
        chat::run_chat_pipeline(&ctx, &mut message, &intent, &history).await;
    }
}

async fn run_intent_stage<C: OrchestratorContext + 'static>(
    ctx: &Arc<C>,
    message: &mut Message,
    history: &[AgentMessage],
) -> Outcome {
    publish(
        ctx,
        message.session_id.clone(),
        message.id.clone(),
        EventType::StepUpdate,
        json!({"step": 1, "status": "running", "message": steps::STEP_INTENT}),
    )
    .await;

    let (tx, handle) = spawn_chunk_forwarder(
        ctx.clone(),
        message.session_id.clone(),
        message.id.clone(),
        EventType::ThinkingChunk,
        |chunk, accumulated| json!({"chunk": chunk, "accumulated": accumulated}),
    );

    let (intent, _narration_prefix) = ctx
        .intent_classifier()
        .classify(&message.user_query, history, tx)
        .await;
    let thinking_content = join_chunks(handle).await;

    publish(
        ctx,
        message.session_id.clone(),
        message.id.clone(),
        EventType::ThinkingComplete,
        json!({
            "thinking_content": thinking_content,
            "total_length": thinking_content.chars().count(),
        }),
    )
    .await;

    message.intent = Some(intent.clone());
    message.updated_at = Utc::now();
    if let Err(e) = ctx.state().save_message(message).await {
        warn!(error = %e, "orchestrator: failed to persist intent");
    }

    publish(
        ctx,
        message.session_id.clone(),
        message.id.clone(),
        EventType::IntentDetermined,
        serde_json::to_value(&intent).unwrap_or(Value::Null),
    )
    .await;

    if !intent.is_in_scope {
        let reply = intent.out_of_scope_reply.clone().unwrap_or_else(|| {
            "I can only help with stock analysis, forecasting, and related finance questions."
                .to_string()
        });
        conclude(ctx, message, reply).await;
        return Outcome::Terminate;
    }

    publish(
        ctx,
        message.session_id.clone(),
        message.id.clone(),
        EventType::StepUpdate,
        json!({"step": 1, "status": "completed", "message": steps::STEP_INTENT}),
    )
    .await;

    Outcome::Proceed
}

async fn run_entity_stage<C: OrchestratorContext + 'static>(
    ctx: &Arc<C>,
    message: &mut Message,
    intent: &Intent,
) -> Outcome {
    if !intent.has_stock() {
        message.resolved_keywords = Some(ResolvedKeywords::from_raw(intent));
        return Outcome::Proceed;
    }

    mark_step(ctx, message, steps::STEP_STOCK_VALIDATION, StepStatus::Running).await;

    let mention = intent.stock_mention.clone().unwrap_or_default();
    let resolved = match ctx.entity_resolver().resolve(&mention).await {
        Ok(m) => m,
        Err(e) => {
            fail(
                ctx,
                message,
                error_codes::ENTITY_RESOLVER_UNAVAILABLE,
                format!("entity resolver error: {e}"),
                true,
                "retry in a moment",
            )
            .await;
            return Outcome::Terminate;
        }
    };

    if !resolved.success {
        let mut explanation = resolved
            .error
            .clone()
            .unwrap_or_else(|| "could not resolve the requested instrument".to_string());
        if !resolved.suggestions.is_empty() {
            explanation = format!("{}. Did you mean: {}?", explanation, resolved.suggestions.join(", "));
        }
        message.entity = Some(resolved);
        conclude(ctx, message, explanation).await;
        return Outcome::Terminate;
    }

    let entity = resolved
        .entity
        .clone()
        .expect("a successful EntityMatch always carries an Entity");
    message.resolved_keywords = Some(ResolvedKeywords::resolve(intent, &entity.canonical_name, &entity.code));
    message.entity = Some(resolved);
    if let Err(e) = ctx.state().save_message(message).await {
        warn!(error = %e, "orchestrator: failed to persist resolved entity");
    }

    mark_step(ctx, message, steps::STEP_STOCK_VALIDATION, StepStatus::Completed).await;
    Outcome::Proceed
}

/// The last ten turns of the Session transcript, translated into the
/// LLM provider's own message shape (spec.md §4.9 C2 "the last ten
/// conversation turns").
pub(crate) fn recent_history(session: &Session) -> Vec<AgentMessage> {
    let start = session.transcript.len().saturating_sub(10);
    session.transcript[start..]
        .iter()
        .map(|turn| AgentMessage {
            role: match turn.role {
                Role::User => AgentRole::User,
                Role::Assistant => AgentRole::Assistant,
            },
            content: turn.content.clone(),
        })
        .collect()
}

pub(crate) async fn publish<C: OrchestratorContext>(
    ctx: &Arc<C>,
    session_id: SessionId,
    message_id: MessageId,
    event_type: EventType,
    payload: impl serde::Serialize,
) {
    if let Err(e) = ctx
        .fabric()
        .publish(session_id, message_id, event_type, payload)
        .await
    {
        warn!(error = %e, ?event_type, "orchestrator: failed to publish event");
    }
}

/// Ends a Message with a user-facing explanation rather than an error:
/// out-of-scope refusals, entity-resolution failures, and data-fetch
/// explanations all funnel through here (spec.md §7).
pub(crate) async fn conclude<C: OrchestratorContext>(
    ctx: &Arc<C>,
    message: &mut Message,
    conclusion: String,
) {
    message.artifacts.conclusion = Some(conclusion);
    message.status = MessageStatus::Completed;
    message.streaming_status = finscope_protocol::StreamingStatus::Completed;
    message.updated_at = Utc::now();
    if let Err(e) = ctx.state().save_message(message).await {
        warn!(error = %e, "orchestrator: failed to persist conclusion");
    }
    publish(
        ctx,
        message.session_id.clone(),
        message.id.clone(),
        EventType::AnalysisComplete,
        json!({}),
    )
    .await;
}

/// Ends a Message with an infrastructure `error` event (spec.md §7
/// "Infrastructure errors").
pub(crate) async fn fail<C: OrchestratorContext>(
    ctx: &Arc<C>,
    message: &mut Message,
    error_code: &str,
    reason: String,
    retry_able: bool,
    suggested_action: &str,
) {
    message.mark_error(reason.clone(), None);
    if let Err(e) = ctx.state().save_message(message).await {
        warn!(error = %e, "orchestrator: failed to persist error state");
    }
    publish(
        ctx,
        message.session_id.clone(),
        message.id.clone(),
        EventType::Error,
        json!({
            "error": reason,
            "error_code": error_code,
            "retry_able": retry_able,
            "suggested_action": suggested_action,
        }),
    )
    .await;
}

/// Updates one named step in `message.steps` and publishes the change.
/// Looking the step up by name rather than a hardcoded number lets the
/// same call site work across forecast/chat schedules that number their
/// steps differently (spec.md §9 "Dynamic step list").
pub(crate) async fn mark_step<C: OrchestratorContext>(
    ctx: &Arc<C>,
    message: &mut Message,
    name: &str,
    status: StepStatus,
) {
    let Some(step) = message.steps.iter_mut().find(|s| s.name == name) else {
        warn!(step = name, "orchestrator: step not present in schedule");
        return;
    };
    step.status = status;
    let (step_no, step_name) = (step.step, step.name.clone());

    publish(
        ctx,
        message.session_id.clone(),
        message.id.clone(),
        EventType::StepUpdate,
        json!({"step": step_no, "status": status, "message": step_name}),
    )
    .await;
}

/// Bridges a synchronous-style callback (the LLM call forwards chunks
/// into `tx` as they stream in) to the Event Fabric: the consumer task
/// is the sole publisher for this channel, so publish order matches
/// arrival order (spec.md §5 "token-level contract", grounded on
/// `finscope_agent::runtime::AgentRuntime::chat_stream_with_context`'s
/// bounded mpsc bridge).
pub(crate) fn spawn_chunk_forwarder<C, F>(
    ctx: Arc<C>,
    session_id: SessionId,
    message_id: MessageId,
    event_type: EventType,
    payload_fn: F,
) -> (mpsc::Sender<String>, JoinHandle<String>)
where
    C: OrchestratorContext + 'static,
    F: Fn(&str, &str) -> Value + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<String>(32);
    let handle = tokio::spawn(async move {
        let mut accumulated = String::new();
        while let Some(chunk) = rx.recv().await {
            accumulated.push_str(&chunk);
            publish(
                &ctx,
                session_id.clone(),
                message_id.clone(),
                event_type,
                payload_fn(&chunk, &accumulated),
            )
            .await;
        }
        accumulated
    });
    (tx, handle)
}

pub(crate) async fn join_chunks(handle: JoinHandle<String>) -> String {
    match handle.await {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "orchestrator: chunk forwarder task panicked");
            String::new()
        }
    }
}
