use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;
use std::sync::Arc;

use crate::error::Result;
use crate::extensions;
use crate::models::{ok, ExecuteScriptRequest, ValueResponse, WdJson};

use super::super::state::AppState;

pub async fn execute_sync(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    WdJson(request): WdJson<ExecuteScriptRequest>,
) -> Result<Json<ValueResponse<Value>>> {
    let session = state.get_active_session(&session_id).await?;
    let value = extensions::execute_script(&session, &request.script, &request.args).await?;
    Ok(ok(value))
}
