use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};

use finscope_core::{SessionId, UserId};
use finscope_orchestrator::OrchestratorContext;
use finscope_protocol::Session;

use crate::app::AppState;

#[derive(Deserialize)]
pub struct StartAnalysisQuery {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
    /// Forecast-model override and conversational context/force-intent
    /// hints are accepted for protocol compatibility (spec.md §6
    /// `GET start-analysis`); threading them past the Intent Classifier
    /// is left to a future revision (DESIGN.md Open Questions).
    #[serde(default)]
    #[allow(dead_code)]
    pub model: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    pub context: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    pub force_intent: Option<String>,
}

/// GET /analysis/start — creates or reuses a Session and Message, then
/// spawns the background Orchestrator run (spec.md §6, §4.9 idempotency).
pub async fn start_analysis(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
    Query(query): Query<StartAnalysisQuery>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let mut session = match &query.session_id {
        Some(id) => state
            .state()
            .require_session(&SessionId::from(id.clone()))
            .await
            .map_err(|e| (StatusCode::NOT_FOUND, Json(json!({"error": e.to_string()}))))?,
        None => {
            let owner = headers
                .get("x-user-id")
                .and_then(|v| v.to_str().ok())
                .map(UserId::from)
                .unwrap_or_else(|| UserId::from("anonymous"));
            let session = Session::new(owner, query.message.chars().take(60).collect::<String>());
            state.state().save_session(&session).await.map_err(|e| {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"error": e.to_string()})),
                )
            })?;
            session
        }
    };

    session.push_turn(finscope_protocol::Role::User, query.message.clone());

    let message = finscope_orchestrator::start_or_reuse_message(state.state(), &mut session, &query.message)
        .await
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": e.to_string()})),
            )
        })?;

    tokio::spawn(finscope_orchestrator::run(
        state.clone(),
        session.id.clone(),
        message.id.clone(),
    ));

    Ok(Json(json!({
        "session_id": session.id.as_str(),
        "message_id": message.id.as_str(),
        "status": "processing",
    })))
}

#[derive(Deserialize)]
pub struct StreamQuery {
    pub session_id: String,
    pub message_id: String,
}

/// GET /analysis/stream — full replay then live tail of a Message's
/// event log (spec.md §4.2, §6). Closes on `analysis_complete`/`error`.
pub async fn stream_analysis(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StreamQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let session_id = SessionId::from(query.session_id);
    let message_id = finscope_core::MessageId::from(query.message_id);

    let records = state.fabric().subscribe(session_id, message_id);
    let events = records.filter_map(|result| async move {
        match result {
            Ok(record) => Some(Ok(Event::default()
                .event(record.event_type.as_str())
                .data(record.payload.to_string()))),
            Err(e) => {
                tracing::warn!(error = %e, "analysis stream: dropping malformed event");
                None
            }
        }
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}

#[derive(Deserialize)]
pub struct StatusQuery {
    pub session_id: String,
}

/// GET /analysis/status — last known typed Message snapshot (spec.md §6).
pub async fn analysis_status(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let session = state
        .state()
        .require_session(&SessionId::from(query.session_id))
        .await
        .map_err(|e| (StatusCode::NOT_FOUND, Json(json!({"error": e.to_string()}))))?;

    let Some(message_id) = session.current_message_id else {
        return Ok(Json(json!({"status": "no_analysis_started"})));
    };

    let message = state
        .state()
        .require_message(&message_id)
        .await
        .map_err(|e| (StatusCode::NOT_FOUND, Json(json!({"error": e.to_string()}))))?;

    Ok(Json(serde_json::to_value(&message).unwrap_or(Value::Null)))
}
