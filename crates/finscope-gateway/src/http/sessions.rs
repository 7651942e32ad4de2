use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use finscope_core::UserId;
use finscope_orchestrator::OrchestratorContext;
use finscope_protocol::Session;

use crate::app::AppState;

/// Owner resolution is upstream of this crate (spec.md §6 "Owner
/// identified by bearer token"); this header stands in for that
/// collaborator until a real auth layer is wired in front of the
/// gateway.
fn owner_id(headers: &HeaderMap) -> UserId {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .map(UserId::from)
        .unwrap_or_else(|| UserId::from("anonymous"))
}

#[derive(Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Serialize)]
struct SessionSummary {
    session_id: String,
    title: String,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
    message_count: usize,
}

impl From<&Session> for SessionSummary {
    fn from(s: &Session) -> Self {
        Self {
            session_id: s.id.as_str().to_string(),
            title: s.title.clone(),
            created_at: s.created_at,
            updated_at: s.updated_at,
            message_count: s.message_ids.len(),
        }
    }
}

/// POST /sessions
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateSessionRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let owner = owner_id(&headers);
    let session = Session::new(owner, req.title.unwrap_or_else(|| "New analysis".to_string()));

    state.state().save_session(&session).await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": e.to_string()})),
        )
    })?;

    Ok(Json(json!({
        "session_id": session.id.as_str(),
        "title": session.title,
        "created_at": session.created_at,
    })))
}

/// GET /sessions — filtered by the resolved owner.
pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<SessionSummary>>, (StatusCode, Json<Value>)> {
    let owner = owner_id(&headers);
    let sessions = state.state().list_sessions(&owner).await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": e.to_string()})),
        )
    })?;

    Ok(Json(sessions.iter().map(SessionSummary::from).collect()))
}

/// GET /sessions/{id}
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Session>, (StatusCode, Json<Value>)> {
    match state.state().get_session(&id.into()).await {
        Ok(Some(session)) => Ok(Json(session)),
        Ok(None) => Err((StatusCode::NOT_FOUND, Json(json!({"error": "session not found"})))),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": e.to_string()})),
        )),
    }
}

#[derive(Deserialize)]
pub struct UpdateSessionRequest {
    pub title: String,
}

/// PATCH /sessions/{id}
pub async fn update_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateSessionRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let mut session = match state.state().get_session(&id.into()).await {
        Ok(Some(s)) => s,
        Ok(None) => return Err((StatusCode::NOT_FOUND, Json(json!({"error": "session not found"})))),
        Err(e) => {
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": e.to_string()})),
            ))
        }
    };

    session.title = req.title;
    session.updated_at = chrono::Utc::now();
    state.state().save_session(&session).await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": e.to_string()})),
        )
    })?;

    Ok(Json(json!({"session_id": session.id.as_str(), "title": session.title})))
}

/// DELETE /sessions/{id} — cascading delete (spec.md §4.1).
pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, (StatusCode, Json<Value>)> {
    state.state().delete_session(&id.into()).await.map_err(|e| {
        (
            StatusCode::NOT_FOUND,
            Json(json!({"error": e.to_string()})),
        )
    })?;
    Ok(StatusCode::NO_CONTENT)
}
