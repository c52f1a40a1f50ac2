mod common;

use axum::http::StatusCode;
use serde_json::{json, Value};

use common::{error_of, TestServer};
use uia_webdriver::actions::ELEMENT_KEY;
use uia_webdriver::desktop::InputEvent;

fn keyboard(actions: Value) -> Value {
    json!({"actions": [{"type": "key", "id": "keyboard", "actions": actions}]})
}

async fn click(server: &TestServer, session_id: &str, element_id: &str) {
    let (status, _) = server
        .post(
            &format!("/session/{}/element/{}/click", session_id, element_id),
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

async fn text(server: &TestServer, session_id: &str, element_id: &str) -> Value {
    let (_, body) = server
        .get(&format!("/session/{}/element/{}/text", session_id, element_id))
        .await;
    body["value"].clone()
}

#[tokio::test]
async fn test_control_backspace_deletes_word() {
    let server = TestServer::new();
    let session_id = server.app_session().await;
    let text_box = server.find(&session_id, "TextBox").await;
    click(&server, &session_id, &text_box).await;

    let (status, body) = server
        .post(
            &format!("/session/{}/actions", session_id),
            keyboard(json!([
                {"type": "keyDown", "value": "\u{E009}"},
                {"type": "keyDown", "value": "\u{E003}"},
                {"type": "keyUp", "value": "\u{E003}"},
                {"type": "keyUp", "value": "\u{E009}"}
            ])),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(text(&server, &session_id, &text_box).await, "Test ");
    assert!(server.desktop.pressed_keys().is_empty());
}

#[tokio::test]
async fn test_release_actions_after_held_modifier() {
    let server = TestServer::new();
    let session_id = server.app_session().await;
    let text_box = server.find(&session_id, "TextBox").await;
    click(&server, &session_id, &text_box).await;
    let actions_uri = format!("/session/{}/actions", session_id);

    let (status, _) = server
        .post(
            &actions_uri,
            keyboard(json!([{"type": "keyDown", "value": "\u{E009}"}])),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = server.delete(&actions_uri).await;
    assert_eq!(status, StatusCode::OK);
    assert!(server.desktop.pressed_keys().is_empty());

    // Control is up again, so backspace only removes one character
    server
        .post(
            &actions_uri,
            keyboard(json!([
                {"type": "keyDown", "value": "\u{E003}"},
                {"type": "keyUp", "value": "\u{E003}"}
            ])),
        )
        .await;
    assert_eq!(text(&server, &session_id, &text_box).await, "Test TextBo");
}

#[tokio::test]
async fn test_pointer_actions_against_element_origin() {
    let server = TestServer::new();
    let session_id = server.app_session().await;
    let checkbox = server.find(&session_id, "SimpleCheckBox").await;

    let (status, body) = server
        .post(
            &format!("/session/{}/actions", session_id),
            json!({"actions": [{
                "type": "pointer",
                "id": "mouse",
                "parameters": {"pointerType": "mouse"},
                "actions": [
                    {"type": "pointerMove", "origin": {ELEMENT_KEY: checkbox}, "x": 0, "y": 0},
                    {"type": "pointerDown", "button": 0},
                    {"type": "pointerUp", "button": 0}
                ]
            }]}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let (_, selected) = server
        .get(&format!("/session/{}/element/{}/selected", session_id, checkbox))
        .await;
    assert_eq!(selected["value"], true);
    assert!(server.desktop.pressed_buttons().is_empty());
}

#[tokio::test]
async fn test_unknown_element_origin() {
    let server = TestServer::new();
    let session_id = server.app_session().await;

    let (status, body) = server
        .post(
            &format!("/session/{}/actions", session_id),
            json!({"actions": [{
                "type": "pointer",
                "id": "mouse",
                "actions": [{"type": "pointerMove", "origin": {ELEMENT_KEY: "gone"}, "x": 0, "y": 0}]
            }]}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_of(&body).0, "invalid argument");
}

#[tokio::test]
async fn test_malformed_actions_body() {
    let server = TestServer::new();
    let session_id = server.app_session().await;
    let (status, body) = server
        .post(
            &format!("/session/{}/actions", session_id),
            json!({"actions": "nope"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_of(&body).0, "invalid argument");
}

#[tokio::test]
async fn test_windows_keys_script() {
    let server = TestServer::new();
    let session_id = server.app_session().await;
    let text_box = server.find(&session_id, "TextBox").await;
    click(&server, &session_id, &text_box).await;
    server.desktop.clear_events();

    let (status, body) = server
        .post(
            &format!("/session/{}/execute/sync", session_id),
            json!({"script": "windows: keys", "args": [{"actions": [{"text": "abc"}]}]}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert!(body["value"].is_null());
    assert!(server
        .desktop
        .events()
        .contains(&InputEvent::Text("abc".to_string())));

    let (status, body) = server
        .post(
            &format!("/session/{}/execute/sync", session_id),
            json!({"script": "mobile: shell", "args": []}),
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(error_of(&body).0, "unsupported operation");
}
