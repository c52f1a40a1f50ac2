use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;
use std::sync::Arc;

use crate::desktop::ElementProperty;
use crate::error::Result;
use crate::models::{
    empty, ok, CreateSessionRequest, CreateSessionResponse, SessionSummary, ValueResponse, WdJson,
};
use crate::session::open_session;

use super::super::state::AppState;

/// Negotiate capabilities and start a new session
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    WdJson(request): WdJson<CreateSessionRequest>,
) -> Result<Json<ValueResponse<CreateSessionResponse>>> {
    let requested = request.capabilities;
    let session = open_session(
        state.platform.clone(),
        requested.always_match.as_ref(),
        requested.first_match.as_deref(),
        &state.config.automation_name,
    )
    .await?;

    let session = Arc::new(session);
    state.sessions.add(session.clone());
    let capabilities = Value::Object(session.capabilities().clone());
    tracing::info!(
        "Created session {} with capabilities {}",
        session.id,
        capabilities
    );

    Ok(ok(CreateSessionResponse {
        session_id: session.id.clone(),
        capabilities: session.capabilities().clone(),
    }))
}

pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
) -> Json<ValueResponse<Vec<SessionSummary>>> {
    let mut sessions = state.sessions.find_all();
    sessions.sort_by_key(|s| s.created_at);
    ok(sessions
        .into_iter()
        .map(|s| SessionSummary {
            id: s.id.clone(),
            capabilities: s.capabilities().clone(),
        })
        .collect())
}

pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<ValueResponse<Value>>> {
    state.get_session(&session_id)?;
    if let Some(session) = state.sessions.delete(&session_id) {
        session.dispose().await;
        tracing::info!("Deleted session {}", session_id);
    }
    Ok(empty())
}

/// Title of the current window
pub async fn get_title(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<ValueResponse<String>>> {
    let session = state.get_active_session(&session_id).await?;
    let window = session.current_window().await?;
    let title = session
        .automation()
        .property(&window, ElementProperty::Name)
        .await?
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();
    Ok(ok(title))
}
