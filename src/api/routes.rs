use axum::{
    http::{Method, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    actions, device, element, execute, find, screenshot, session, status, timeouts, window,
};
use super::state::AppState;
use crate::error::{handle_panic, WebDriverError};

pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        // Server
        .route("/status", get(status::status))
        // Sessions
        .route("/session", post(session::create_session))
        .route("/sessions", get(session::list_sessions))
        .route("/session/:session_id", delete(session::delete_session))
        .route(
            "/session/:session_id/timeouts",
            get(timeouts::get_timeouts).post(timeouts::set_timeouts),
        )
        .route("/session/:session_id/title", get(session::get_title))
        // Windows
        .route(
            "/session/:session_id/window",
            get(window::get_window_handle).post(window::switch_to_window),
        )
        .route(
            "/session/:session_id/window/handles",
            get(window::get_window_handles),
        )
        // Element retrieval
        .route("/session/:session_id/element", post(find::find_element))
        .route("/session/:session_id/elements", post(find::find_elements))
        .route(
            "/session/:session_id/element/active",
            get(find::get_active_element),
        )
        .route(
            "/session/:session_id/element/:element_id/element",
            post(find::find_element_from_element),
        )
        .route(
            "/session/:session_id/element/:element_id/elements",
            post(find::find_elements_from_element),
        )
        // Element state
        .route(
            "/session/:session_id/element/:element_id/text",
            get(element::get_text),
        )
        .route(
            "/session/:session_id/element/:element_id/name",
            get(element::get_name),
        )
        .route(
            "/session/:session_id/element/:element_id/rect",
            get(element::get_rect),
        )
        .route(
            "/session/:session_id/element/:element_id/enabled",
            get(element::is_enabled),
        )
        .route(
            "/session/:session_id/element/:element_id/displayed",
            get(element::is_displayed),
        )
        .route(
            "/session/:session_id/element/:element_id/selected",
            get(element::is_selected),
        )
        .route(
            "/session/:session_id/element/:element_id/attribute/:name",
            get(element::get_attribute),
        )
        .route(
            "/session/:session_id/element/:element_id/screenshot",
            get(screenshot::take_element_screenshot),
        )
        // Element interaction
        .route(
            "/session/:session_id/element/:element_id/click",
            post(element::click),
        )
        .route(
            "/session/:session_id/element/:element_id/clear",
            post(element::clear),
        )
        .route(
            "/session/:session_id/element/:element_id/value",
            post(element::send_keys),
        )
        // Actions
        .route(
            "/session/:session_id/actions",
            post(actions::perform_actions).delete(actions::release_actions),
        )
        // Scripts
        .route(
            "/session/:session_id/execute/sync",
            post(execute::execute_sync),
        )
        // Screen capture
        .route(
            "/session/:session_id/screenshot",
            get(screenshot::take_screenshot),
        )
        // Device files
        .route(
            "/session/:session_id/appium/device/push_file",
            post(device::push_file),
        )
        .route(
            "/session/:session_id/appium/device/pull_file",
            post(device::pull_file),
        )
        .route(
            "/session/:session_id/appium/device/pull_folder",
            post(device::pull_folder),
        )
        .fallback(unknown_command)
        .layer(middleware::map_response(unknown_method))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn unknown_command() -> WebDriverError {
    WebDriverError::UnknownCommand("Unknown command".to_string())
}

/// Method routers answer a bare 405; give it a WebDriver error body.
async fn unknown_method(response: Response) -> Response {
    if response.status() == StatusCode::METHOD_NOT_ALLOWED {
        return WebDriverError::UnknownMethod("Unknown method for this endpoint".to_string())
            .into_response();
    }
    response
}
