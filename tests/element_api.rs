mod common;

use axum::http::StatusCode;
use serde_json::{json, Value};

use common::{error_of, TestServer};
use uia_webdriver::actions::ELEMENT_KEY;

async fn value(server: &TestServer, session_id: &str, element_id: &str, path: &str) -> Value {
    let (status, body) = server
        .get(&format!("/session/{}/element/{}/{}", session_id, element_id, path))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    body["value"].clone()
}

async fn post_element(
    server: &TestServer,
    session_id: &str,
    element_id: &str,
    path: &str,
    body: Value,
) -> (StatusCode, Value) {
    server
        .post(
            &format!("/session/{}/element/{}/{}", session_id, element_id, path),
            body,
        )
        .await
}

#[tokio::test]
async fn test_find_returns_stable_references() {
    let server = TestServer::new();
    let session_id = server.app_session().await;

    let first = server.find(&session_id, "TextBox").await;
    let second = server.find(&session_id, "TextBox").await;
    assert_eq!(first, second);
    assert_eq!(value(&server, &session_id, &first, "text").await, "Test TextBox");
    assert_eq!(value(&server, &session_id, &first, "name").await, "Edit");
}

#[tokio::test]
async fn test_find_elements_and_nested_find() {
    let server = TestServer::new();
    let session_id = server.app_session().await;

    let (status, body) = server
        .post(
            &format!("/session/{}/elements", session_id),
            json!({"using": "class name", "value": "ListBoxItem"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["value"].as_array().unwrap().len(), 2);

    let list = server.find(&session_id, "ListBox").await;
    let (status, body) = post_element(
        &server,
        &session_id,
        &list,
        "element",
        json!({"using": "name", "value": "ListBox Item #2"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let item = body["value"][ELEMENT_KEY].as_str().unwrap();
    assert_eq!(value(&server, &session_id, item, "selected").await, false);
}

#[tokio::test]
async fn test_no_such_element() {
    let server = TestServer::new();
    let session_id = server.app_session().await;

    let (status, body) = server
        .post(
            &format!("/session/{}/element", session_id),
            json!({"using": "accessibility id", "value": "Nope"}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        error_of(&body),
        (
            "no such element",
            "No element found with selector 'accessibility id' and value 'Nope'"
        )
    );

    let (status, body) = server
        .post(
            &format!("/session/{}/elements", session_id),
            json!({"using": "accessibility id", "value": "Nope"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["value"], json!([]));

    let (status, body) = server
        .get(&format!("/session/{}/element/unknown/text", session_id))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_of(&body).1, "No element found with ID 'unknown'");
}

#[tokio::test]
async fn test_element_state() {
    let server = TestServer::new();
    let session_id = server.app_session().await;
    let text_box = server.find(&session_id, "TextBox").await;
    let disabled = server.find(&session_id, "DisabledTextBox").await;
    let offscreen = server.find(&session_id, "OffscreenButton").await;

    assert_eq!(value(&server, &session_id, &text_box, "enabled").await, true);
    assert_eq!(value(&server, &session_id, &disabled, "enabled").await, false);
    assert_eq!(value(&server, &session_id, &text_box, "displayed").await, true);
    assert_eq!(value(&server, &session_id, &offscreen, "displayed").await, false);

    let rect = value(&server, &session_id, &text_box, "rect").await;
    assert_eq!(rect["width"], 200.0);
    assert_eq!(rect["height"], 24.0);

    assert_eq!(
        value(&server, &session_id, &text_box, "attribute/AutomationId").await,
        "TextBox"
    );
    assert!(value(&server, &session_id, &text_box, "attribute/NoSuchProperty")
        .await
        .is_null());
}

#[tokio::test]
async fn test_click_invokes_button() {
    let server = TestServer::new();
    let session_id = server.app_session().await;
    let button = server.find(&session_id, "InvokableButton").await;

    let (status, _) = post_element(&server, &session_id, &button, "click", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        value(&server, &session_id, &button, "attribute/Name").await,
        "Invoked!"
    );
}

#[tokio::test]
async fn test_click_toggles_checkbox() {
    let server = TestServer::new();
    let session_id = server.app_session().await;
    let checkbox = server.find(&session_id, "SimpleCheckBox").await;

    assert_eq!(value(&server, &session_id, &checkbox, "selected").await, false);
    post_element(&server, &session_id, &checkbox, "click", json!({})).await;
    assert_eq!(value(&server, &session_id, &checkbox, "selected").await, true);
}

#[tokio::test]
async fn test_offscreen_element_is_not_interactable() {
    let server = TestServer::new();
    let session_id = server.app_session().await;
    let button = server.find(&session_id, "OffscreenButton").await;

    let (status, body) = post_element(&server, &session_id, &button, "click", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        error_of(&body),
        (
            "element not interactable",
            format!("Element with ID '{}' is off screen", button).as_str()
        )
    );
}

#[tokio::test]
async fn test_send_keys_and_clear() {
    let server = TestServer::new();
    let session_id = server.app_session().await;
    let text_box = server.find(&session_id, "TextBox").await;

    let (status, body) =
        post_element(&server, &session_id, &text_box, "value", json!({"text": "!1"})).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(
        value(&server, &session_id, &text_box, "text").await,
        "Test TextBox!1"
    );
    assert!(server.desktop.pressed_keys().is_empty());

    let session = server.state.sessions.find_by_id(&session_id).unwrap();
    {
        let input = session.input.lock().await;
        assert!(input.cancel_list().is_empty());
        assert_eq!(input.source_count(), 0);
    }

    let (status, _) = post_element(&server, &session_id, &text_box, "clear", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value(&server, &session_id, &text_box, "text").await, "");
}

#[tokio::test]
async fn test_active_element_follows_focus() {
    let server = TestServer::new();
    let session_id = server.app_session().await;
    let text_box = server.find(&session_id, "TextBox").await;
    post_element(&server, &session_id, &text_box, "click", json!({})).await;

    let (status, body) = server
        .get(&format!("/session/{}/element/active", session_id))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["value"][ELEMENT_KEY], text_box.as_str());
}

#[tokio::test]
async fn test_window_handles_and_switching() {
    let server = TestServer::new();
    let session_id = server.app_session().await;

    let (_, current) = server.get(&format!("/session/{}/window", session_id)).await;
    let (_, handles) = server
        .get(&format!("/session/{}/window/handles", session_id))
        .await;
    assert_eq!(handles["value"], json!([current["value"].clone()]));

    let (status, body) = server
        .post(
            &format!("/session/{}/window", session_id),
            json!({"handle": "0xDEAD"}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        error_of(&body),
        ("no such window", "No window found with handle '0xDEAD'")
    );

    let (status, _) = server
        .post(
            &format!("/session/{}/window", session_id),
            json!({"handle": current["value"].clone()}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_exited_application_has_no_windows() {
    let server = TestServer::new();
    let session_id = server.app_session().await;
    let pid = server.desktop.running_processes()[0];
    server.desktop.exit_process(pid);

    let (status, body) = server.get(&format!("/session/{}/title", session_id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_of(&body).0, "no such window");
}
