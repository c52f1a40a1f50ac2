use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;
use std::sync::Arc;

use crate::actions;
use crate::error::Result;
use crate::models::{empty, ActionsRequest, ValueResponse, WdJson};

use super::super::state::AppState;

pub async fn perform_actions(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    WdJson(request): WdJson<ActionsRequest>,
) -> Result<Json<ValueResponse<Value>>> {
    let session = state.get_active_session(&session_id).await?;
    actions::perform_actions(session, request.actions).await?;
    Ok(empty())
}

pub async fn release_actions(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<ValueResponse<Value>>> {
    let session = state.get_active_session(&session_id).await?;
    actions::release_actions(&session).await?;
    Ok(empty())
}
