use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::any::Any;
use std::backtrace::Backtrace;
use thiserror::Error;

/// WebDriver error, one variant per protocol error code.
#[derive(Error, Debug)]
pub enum WebDriverError {
    #[error("{0}")]
    InvalidArgument(String),

    #[error("No active session with ID '{0}'")]
    SessionNotFound(String),

    #[error("{0}")]
    NoSuchElement(String),

    #[error("{0}")]
    NoSuchWindow(String),

    #[error("{0}")]
    ElementNotInteractable(String),

    #[error("{0}")]
    SessionNotCreated(String),

    #[error("{0}")]
    UnsupportedOperation(String),

    #[error("{0}")]
    ScriptError(String),

    #[error("{0}")]
    ScriptTimeout(String),

    #[error("{0}")]
    UnknownCommand(String),

    #[error("{0}")]
    UnknownMethod(String),

    #[error("Parameter {0} must be provided in the request.")]
    MissingParameter(String),

    #[error("File {0} does not exist.")]
    FileNotFound(String),

    #[error("{0}")]
    UnknownError(String),

    /// A handler panicked; carries the panic location and backtrace
    #[error("{message}")]
    Panic { message: String, stacktrace: String },

    #[error("{0}")]
    Internal(#[from] anyhow::Error),
}

impl WebDriverError {
    pub fn element_not_found(element_id: &str) -> Self {
        Self::NoSuchElement(format!("No element found with ID '{}'", element_id))
    }

    pub fn no_windows_open() -> Self {
        Self::NoSuchWindow("No windows are open for the current session".to_string())
    }

    /// Protocol error code sent in the `error` field.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "invalid argument",
            Self::SessionNotFound(_) => "invalid session id",
            Self::NoSuchElement(_) => "no such element",
            Self::NoSuchWindow(_) => "no such window",
            Self::ElementNotInteractable(_) => "element not interactable",
            Self::SessionNotCreated(_) => "session not created",
            Self::UnsupportedOperation(_) => "unsupported operation",
            Self::ScriptError(_) => "script error",
            Self::ScriptTimeout(_) => "script timeout",
            Self::UnknownCommand(_) => "unknown command",
            Self::UnknownMethod(_) => "unknown method",
            Self::MissingParameter(_) => "Missing JSON Parameter",
            Self::FileNotFound(_) => "File Not Found",
            Self::UnknownError(_) | Self::Panic { .. } | Self::Internal(_) => "unknown error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidArgument(_) | Self::ElementNotInteractable(_) | Self::ScriptError(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::SessionNotFound(_)
            | Self::NoSuchElement(_)
            | Self::NoSuchWindow(_)
            | Self::UnknownCommand(_)
            | Self::MissingParameter(_)
            | Self::FileNotFound(_) => StatusCode::NOT_FOUND,
            Self::UnknownMethod(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::SessionNotCreated(_)
            | Self::UnsupportedOperation(_)
            | Self::ScriptTimeout(_)
            | Self::UnknownError(_)
            | Self::Panic { .. }
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn stacktrace(&self) -> String {
        match self {
            Self::Internal(err) => format!("{:?}", err),
            Self::UnknownError(message) => message.clone(),
            Self::Panic { stacktrace, .. } => stacktrace.clone(),
            _ => String::new(),
        }
    }
}

impl From<JsonRejection> for WebDriverError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidArgument(rejection.body_text())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    stacktrace: String,
}

#[derive(Serialize)]
struct ErrorEnvelope {
    value: ErrorBody,
}

impl IntoResponse for WebDriverError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Returning WebDriver error '{}': {:#}", self.code(), self);
        } else {
            tracing::debug!("Returning WebDriver error '{}': {}", self.code(), self);
        }

        let body = Json(ErrorEnvelope {
            value: ErrorBody {
                error: self.code(),
                message: self.to_string(),
                stacktrace: self.stacktrace(),
            },
        });

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, WebDriverError>;

/// Turn a handler panic into an `unknown error` response
pub fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };

    WebDriverError::Panic {
        message: format!("Unhandled error in request: {}", detail),
        stacktrace: format!("{}\n{}", detail, Backtrace::capture()),
    }
    .into_response()
}
