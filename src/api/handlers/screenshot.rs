use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use crate::desktop::{image_to_base64, Rect};
use crate::error::{Result, WebDriverError};
use crate::models::{ok, ValueResponse};
use crate::session::Session;

use super::super::state::AppState;
use super::element::resolve;

/// Current window, or the whole desktop for sessions without an application
pub async fn take_screenshot(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<ValueResponse<String>>> {
    let session = state.get_active_session(&session_id).await?;
    let target = session.search_root().await?;
    let area = session.automation().bounding_rect(&target).await?;
    Ok(ok(capture(&session, area).await?))
}

pub async fn take_element_screenshot(
    State(state): State<Arc<AppState>>,
    Path((session_id, element_id)): Path<(String, String)>,
) -> Result<Json<ValueResponse<String>>> {
    let (session, element) = resolve(&state, &session_id, &element_id).await?;
    let area = session.automation().bounding_rect(&element).await?;
    Ok(ok(capture(&session, area).await?))
}

async fn capture(session: &Session, area: Rect) -> Result<String> {
    let platform = session.platform().clone();
    let encoded = tokio::task::spawn_blocking(move || {
        let image = platform.capture(area)?;
        tracing::debug!("Captured {}x{} screenshot", image.width(), image.height());
        image_to_base64(&image)
    })
    .await
    .map_err(|e| WebDriverError::UnknownError(format!("Screenshot task failed: {}", e)))??;
    Ok(encoded)
}
