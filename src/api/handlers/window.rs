use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;
use std::sync::Arc;

use crate::error::Result;
use crate::models::{empty, ok, SwitchWindowRequest, ValueResponse, WdJson};

use super::super::state::AppState;

pub async fn get_window_handle(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<ValueResponse<String>>> {
    let session = state.get_active_session(&session_id).await?;
    Ok(ok(session.current_window_handle().await?))
}

pub async fn get_window_handles(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<ValueResponse<Vec<String>>>> {
    let session = state.get_active_session(&session_id).await?;
    Ok(ok(session.window_handles().await?))
}

pub async fn switch_to_window(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    WdJson(request): WdJson<SwitchWindowRequest>,
) -> Result<Json<ValueResponse<Value>>> {
    let session = state.get_active_session(&session_id).await?;
    session.switch_to_window(&request.handle).await?;
    Ok(empty())
}
