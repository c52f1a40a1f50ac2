use axum::extract::FromRequest;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::actions::ActionSequence;
use crate::error::WebDriverError;

/// `Json` extractor whose rejections are WebDriver `invalid argument` errors
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(WebDriverError))]
pub struct WdJson<T>(pub T);

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub capabilities: CapabilitiesRequest,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilitiesRequest {
    pub always_match: Option<Map<String, Value>>,
    pub first_match: Option<Vec<Map<String, Value>>>,
}

#[derive(Debug, Deserialize)]
pub struct FindElementRequest {
    pub using: String,
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct SwitchWindowRequest {
    pub handle: String,
}

#[derive(Debug, Deserialize)]
pub struct ActionsRequest {
    pub actions: Vec<ActionSequence>,
}

#[derive(Debug, Deserialize)]
pub struct ElementSendKeysRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct ExecuteScriptRequest {
    pub script: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

/// Fields are optional so that missing ones get a device error, not a
/// deserialization error.
#[derive(Debug, Deserialize)]
pub struct PushFileRequest {
    pub path: Option<String>,
    pub data: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PullFileRequest {
    pub path: Option<String>,
}
