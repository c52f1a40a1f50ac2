use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::actions::{dispatch_actions_for_string, dispatch_release_actions};
use crate::desktop::{ElementProperty, MouseButton, Rect, UiElement};
use crate::error::{Result, WebDriverError};
use crate::input::InputSource;
use crate::models::{empty, ok, ElementSendKeysRequest, ValueResponse, WdJson};
use crate::session::Session;
use crate::wait;

use super::super::state::AppState;

pub(super) async fn resolve(
    state: &AppState,
    session_id: &str,
    element_id: &str,
) -> Result<(Arc<Session>, UiElement)> {
    let session = state.get_active_session(session_id).await?;
    let element = session.element(element_id)?;
    Ok((session, element))
}

/// Scroll the element into view and wait for it to come on screen.
async fn ensure_interactable(session: &Session, element: &UiElement, element_id: &str) -> Result<()> {
    let automation = session.automation();
    if let Err(e) = automation.scroll_into_view(element).await {
        tracing::debug!("Scrolling element {} into view failed: {:#}", element_id, e);
    }

    let timeout = session.timeouts().await.implicit_wait();
    let offscreen = wait::until(timeout, || automation.is_offscreen(element), |off| !*off).await?;
    if offscreen {
        return Err(WebDriverError::ElementNotInteractable(format!(
            "Element with ID '{}' is off screen",
            element_id
        )));
    }
    Ok(())
}

fn as_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

pub async fn get_text(
    State(state): State<Arc<AppState>>,
    Path((session_id, element_id)): Path<(String, String)>,
) -> Result<Json<ValueResponse<String>>> {
    let (session, element) = resolve(&state, &session_id, &element_id).await?;
    Ok(ok(session.automation().text(&element).await?))
}

/// Tag name: the control type
pub async fn get_name(
    State(state): State<Arc<AppState>>,
    Path((session_id, element_id)): Path<(String, String)>,
) -> Result<Json<ValueResponse<Option<String>>>> {
    let (session, element) = resolve(&state, &session_id, &element_id).await?;
    let control_type = session
        .automation()
        .property(&element, ElementProperty::ControlType)
        .await?;
    Ok(ok(control_type.and_then(as_text)))
}

pub async fn get_rect(
    State(state): State<Arc<AppState>>,
    Path((session_id, element_id)): Path<(String, String)>,
) -> Result<Json<ValueResponse<Rect>>> {
    let (session, element) = resolve(&state, &session_id, &element_id).await?;
    Ok(ok(session.automation().bounding_rect(&element).await?))
}

pub async fn is_enabled(
    State(state): State<Arc<AppState>>,
    Path((session_id, element_id)): Path<(String, String)>,
) -> Result<Json<ValueResponse<bool>>> {
    let (session, element) = resolve(&state, &session_id, &element_id).await?;
    let enabled = session
        .automation()
        .property(&element, ElementProperty::IsEnabled)
        .await?
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    Ok(ok(enabled))
}

pub async fn is_displayed(
    State(state): State<Arc<AppState>>,
    Path((session_id, element_id)): Path<(String, String)>,
) -> Result<Json<ValueResponse<bool>>> {
    let (session, element) = resolve(&state, &session_id, &element_id).await?;
    Ok(ok(!session.automation().is_offscreen(&element).await?))
}

/// Selection items report their selection, toggles whether they are on.
pub async fn is_selected(
    State(state): State<Arc<AppState>>,
    Path((session_id, element_id)): Path<(String, String)>,
) -> Result<Json<ValueResponse<bool>>> {
    let (session, element) = resolve(&state, &session_id, &element_id).await?;
    let automation = session.automation();

    let selected = match automation
        .property(&element, ElementProperty::SelectionItemIsSelected)
        .await?
    {
        Some(value) => value.as_bool().unwrap_or(false),
        None => automation
            .property(&element, ElementProperty::ToggleState)
            .await?
            .map(|state| state == "On")
            .unwrap_or(false),
    };
    Ok(ok(selected))
}

/// Unknown attribute names read as `null`
pub async fn get_attribute(
    State(state): State<Arc<AppState>>,
    Path((session_id, element_id, name)): Path<(String, String, String)>,
) -> Result<Json<ValueResponse<Option<String>>>> {
    let (session, element) = resolve(&state, &session_id, &element_id).await?;
    let Some(property) = ElementProperty::parse(&name) else {
        tracing::debug!("Unknown attribute '{}' requested", name);
        return Ok(ok(None));
    };
    let value = session.automation().property(&element, property).await?;
    Ok(ok(value.and_then(as_text)))
}

pub async fn click(
    State(state): State<Arc<AppState>>,
    Path((session_id, element_id)): Path<(String, String)>,
) -> Result<Json<ValueResponse<Value>>> {
    let (session, element) = resolve(&state, &session_id, &element_id).await?;
    ensure_interactable(&session, &element, &element_id).await?;

    let center = session.automation().bounding_rect(&element).await?.center();
    let device = session.input_device();
    device.move_mouse(center)?;
    device.button_down(MouseButton::Left)?;
    device.button_up(MouseButton::Left)?;
    Ok(empty())
}

pub async fn clear(
    State(state): State<Arc<AppState>>,
    Path((session_id, element_id)): Path<(String, String)>,
) -> Result<Json<ValueResponse<Value>>> {
    let (session, element) = resolve(&state, &session_id, &element_id).await?;
    session.automation().clear(&element).await?;
    Ok(empty())
}

/// Element send keys, typed through a throwaway key input source.
pub async fn send_keys(
    State(state): State<Arc<AppState>>,
    Path((session_id, element_id)): Path<(String, String)>,
    WdJson(request): WdJson<ElementSendKeysRequest>,
) -> Result<Json<ValueResponse<Value>>> {
    tracing::debug!(
        "Element send keys for session {} and element {}",
        session_id,
        element_id
    );
    let (session, element) = resolve(&state, &session_id, &element_id).await?;
    ensure_interactable(&session, &element, &element_id).await?;
    session.automation().focus(&element).await?;

    let input_id = Uuid::new_v4().to_string();
    session
        .input
        .lock()
        .await
        .add_input_source(&input_id, InputSource::create("key")?);

    let typed = dispatch_actions_for_string(&session, &input_id, &request.text).await;
    let released = dispatch_release_actions(&session, &input_id).await;
    {
        let mut input = session.input.lock().await;
        while input.take_last_cancel_for(&input_id).is_some() {}
        input.remove_input_source(&input_id);
    }

    typed?;
    released?;
    Ok(empty())
}
