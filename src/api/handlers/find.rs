use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use crate::desktop::{Locator, LocatorStrategy, UiElement};
use crate::error::{Result, WebDriverError};
use crate::models::{ok, ElementReference, FindElementRequest, ValueResponse, WdJson};
use crate::session::Session;
use crate::wait;

use super::super::state::AppState;

/// Map a W3C `{using, value}` selector onto a backend locator
pub fn locator(request: &FindElementRequest) -> Result<Locator> {
    let strategy = match request.using.as_str() {
        "id" | "accessibility id" => LocatorStrategy::AutomationId,
        "name" | "link text" => LocatorStrategy::Name,
        "partial link text" => LocatorStrategy::NameContains,
        "class name" => LocatorStrategy::ClassName,
        "tag name" => LocatorStrategy::ControlType,
        "xpath" | "css selector" => {
            return Err(WebDriverError::UnsupportedOperation(format!(
                "Selector strategy '{}' is not supported",
                request.using
            )))
        }
        other => {
            return Err(WebDriverError::InvalidArgument(format!(
                "Unknown selector strategy '{}'",
                other
            )))
        }
    };
    Ok(Locator::new(strategy, request.value.clone()))
}

async fn find_first_from(
    session: &Session,
    root: UiElement,
    request: &FindElementRequest,
) -> Result<ElementReference> {
    let locator = locator(request)?;
    let automation = session.automation();
    evict_stale_elements(session).await;

    let timeout = session.timeouts().await.implicit_wait();
    let found = wait::until(timeout, || automation.find_first(&root, &locator), Option::is_some)
        .await?
        .ok_or_else(|| {
            WebDriverError::NoSuchElement(format!(
                "No element found with selector '{}' and value '{}'",
                request.using, request.value
            ))
        })?;

    Ok(ElementReference::new(session.get_or_add_element(found).await))
}

async fn find_all_from(
    session: &Session,
    root: UiElement,
    request: &FindElementRequest,
) -> Result<Vec<ElementReference>> {
    let locator = locator(request)?;
    let automation = session.automation();
    evict_stale_elements(session).await;

    let timeout = session.timeouts().await.implicit_wait();
    let found = wait::until(
        timeout,
        || automation.find_all(&root, &locator),
        |elements| !elements.is_empty(),
    )
    .await?;

    let mut references = Vec::with_capacity(found.len());
    for element in found {
        references.push(ElementReference::new(session.get_or_add_element(element).await));
    }
    Ok(references)
}

async fn evict_stale_elements(session: &Session) {
    session.elements.evict_unavailable(session.automation()).await;
}

pub async fn find_element(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    WdJson(request): WdJson<FindElementRequest>,
) -> Result<Json<ValueResponse<ElementReference>>> {
    let session = state.get_active_session(&session_id).await?;
    let root = session.search_root().await?;
    Ok(ok(find_first_from(&session, root, &request).await?))
}

pub async fn find_elements(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    WdJson(request): WdJson<FindElementRequest>,
) -> Result<Json<ValueResponse<Vec<ElementReference>>>> {
    let session = state.get_active_session(&session_id).await?;
    let root = session.search_root().await?;
    Ok(ok(find_all_from(&session, root, &request).await?))
}

pub async fn find_element_from_element(
    State(state): State<Arc<AppState>>,
    Path((session_id, element_id)): Path<(String, String)>,
    WdJson(request): WdJson<FindElementRequest>,
) -> Result<Json<ValueResponse<ElementReference>>> {
    let session = state.get_active_session(&session_id).await?;
    let root = session.element(&element_id)?;
    Ok(ok(find_first_from(&session, root, &request).await?))
}

pub async fn find_elements_from_element(
    State(state): State<Arc<AppState>>,
    Path((session_id, element_id)): Path<(String, String)>,
    WdJson(request): WdJson<FindElementRequest>,
) -> Result<Json<ValueResponse<Vec<ElementReference>>>> {
    let session = state.get_active_session(&session_id).await?;
    let root = session.element(&element_id)?;
    Ok(ok(find_all_from(&session, root, &request).await?))
}

/// The element that has keyboard focus
pub async fn get_active_element(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<ValueResponse<ElementReference>>> {
    let session = state.get_active_session(&session_id).await?;
    let focused = session.automation().focused_element().await?;
    Ok(ok(ElementReference::new(session.get_or_add_element(focused).await)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(using: &str) -> FindElementRequest {
        FindElementRequest {
            using: using.to_string(),
            value: "TextBox".to_string(),
        }
    }

    #[test]
    fn test_locator_mapping() {
        assert_eq!(
            locator(&request("accessibility id")).unwrap(),
            Locator::new(LocatorStrategy::AutomationId, "TextBox")
        );
        assert_eq!(
            locator(&request("partial link text")).unwrap().strategy,
            LocatorStrategy::NameContains
        );
        assert_eq!(
            locator(&request("tag name")).unwrap().strategy,
            LocatorStrategy::ControlType
        );
        assert_eq!(locator(&request("xpath")).unwrap_err().code(), "unsupported operation");
        assert_eq!(locator(&request("magic")).unwrap_err().code(), "invalid argument");
    }
}
