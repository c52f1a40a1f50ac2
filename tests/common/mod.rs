#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use uia_webdriver::actions::ELEMENT_KEY;
use uia_webdriver::api::{routes::create_router, state::AppState};
use uia_webdriver::config::Config;
use uia_webdriver::desktop::SimulatedDesktop;

pub const TEST_APP: &str = "TestApplication.exe";
pub const TEST_APP_TITLE: &str = "WPF Test Application";

/// Router over a simulated desktop with `TestApplication.exe` launchable.
pub struct TestServer {
    pub desktop: SimulatedDesktop,
    pub state: Arc<AppState>,
    router: Router,
}

impl TestServer {
    pub fn new() -> Self {
        let desktop = SimulatedDesktop::new();
        desktop.register_app(TEST_APP, TEST_APP_TITLE);
        let state = Arc::new(AppState::new(Config::default(), Arc::new(desktop.clone())));
        let router = create_router(state.clone());
        Self {
            desktop,
            state,
            router,
        }
    }

    pub async fn call(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();
        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.call(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, uri, Some(body)).await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.call(Method::DELETE, uri, None).await
    }

    pub async fn create_session(&self, always_match: Value) -> (StatusCode, Value) {
        self.post("/session", json!({"capabilities": {"alwaysMatch": always_match}}))
            .await
    }

    /// Session on a freshly launched test application
    pub async fn app_session(&self) -> String {
        let (status, body) = self.create_session(app_capabilities()).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        body["value"]["sessionId"].as_str().unwrap().to_string()
    }

    pub async fn find(&self, session_id: &str, automation_id: &str) -> String {
        let (status, body) = self
            .post(
                &format!("/session/{}/element", session_id),
                json!({"using": "accessibility id", "value": automation_id}),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        body["value"][ELEMENT_KEY].as_str().unwrap().to_string()
    }
}

pub fn app_capabilities() -> Value {
    json!({
        "platformName": "Windows",
        "appium:automationName": "uia",
        "appium:app": TEST_APP
    })
}

pub fn error_of(body: &Value) -> (&str, &str) {
    (
        body["value"]["error"].as_str().unwrap_or_default(),
        body["value"]["message"].as_str().unwrap_or_default(),
    )
}
