use axum::{extract::State, Json};
use chrono::Utc;
use std::sync::Arc;

use crate::models::{ok, StatusResponse, ValueResponse};

use super::super::state::AppState;

pub async fn status(State(state): State<Arc<AppState>>) -> Json<ValueResponse<StatusResponse>> {
    ok(StatusResponse {
        ready: true,
        message: format!("{} {} ready", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
        sessions: state.sessions.len(),
        uptime_secs: (Utc::now() - state.started_at).num_seconds(),
    })
}
