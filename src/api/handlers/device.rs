use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;
use std::sync::Arc;

use crate::device;
use crate::error::Result;
use crate::models::{empty, ok, PullFileRequest, PushFileRequest, ValueResponse, WdJson};

use super::super::state::AppState;

pub async fn push_file(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    WdJson(request): WdJson<PushFileRequest>,
) -> Result<Json<ValueResponse<Value>>> {
    state.get_session(&session_id)?;
    device::push_file(request.path.as_deref(), request.data.as_deref()).await?;
    Ok(empty())
}

pub async fn pull_file(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    WdJson(request): WdJson<PullFileRequest>,
) -> Result<Json<ValueResponse<String>>> {
    state.get_session(&session_id)?;
    Ok(ok(device::pull_file(request.path.as_deref()).await?))
}

/// Base64 zip of the folder's contents
pub async fn pull_folder(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    WdJson(request): WdJson<PullFileRequest>,
) -> Result<Json<ValueResponse<String>>> {
    state.get_session(&session_id)?;
    Ok(ok(device::pull_folder(request.path.as_deref()).await?))
}
