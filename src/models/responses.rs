use axum::Json;
use serde::Serialize;
use serde_json::{Map, Value};

/// Success envelope: every WebDriver reply wraps its payload in `value`
#[derive(Debug, Serialize)]
pub struct ValueResponse<T> {
    pub value: T,
}

pub fn ok<T: Serialize>(value: T) -> Json<ValueResponse<T>> {
    Json(ValueResponse { value })
}

/// `{"value": null}`
pub fn empty() -> Json<ValueResponse<Value>> {
    ok(Value::Null)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub session_id: String,
    pub capabilities: Map<String, Value>,
}

#[derive(Debug, Serialize)]
pub struct SessionSummary {
    pub id: String,
    pub capabilities: Map<String, Value>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub ready: bool,
    pub message: String,
    pub sessions: usize,
    pub uptime_secs: i64,
}

/// Element reference as it travels over the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ElementReference {
    #[serde(rename = "element-6066-11e4-a52e-4f735466cecf")]
    pub element: String,
}

impl ElementReference {
    pub fn new(element: String) -> Self {
        Self { element }
    }
}
