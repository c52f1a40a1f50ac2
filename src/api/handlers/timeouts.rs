use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;
use std::sync::Arc;

use crate::error::Result;
use crate::models::{empty, ok, ValueResponse, WdJson};
use crate::session::Timeouts;

use super::super::state::AppState;

pub async fn get_timeouts(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<ValueResponse<Timeouts>>> {
    let session = state.get_session(&session_id)?;
    Ok(ok(session.timeouts().await))
}

/// Partial update; omitted timeouts keep their value
pub async fn set_timeouts(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    WdJson(update): WdJson<Value>,
) -> Result<Json<ValueResponse<Value>>> {
    let session = state.get_session(&session_id)?;
    let timeouts = session.update_timeouts(&update).await?;
    tracing::debug!("Session {} timeouts now {:?}", session_id, timeouts);
    Ok(empty())
}
