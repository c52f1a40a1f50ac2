//! `execute/sync` extension scripts.
//!
//! Scripts are selected by name and take a single JSON object argument:
//! - `powerShell` - run a PowerShell command, bounded by the script timeout
//! - `windows: keys` - raw virtual key presses, typed text and pauses
//! - `windows: click` - click a point or an element
//! - `windows: hover` - move the pointer between two points
//! - `windows: scroll` - wheel scroll at a point or an element

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tokio::process::Command;

use crate::actions::KEY_SETTLE_DELAY;
use crate::desktop::{MouseButton, Point, VirtualKey};
use crate::error::{Result, WebDriverError};
use crate::session::Session;

const DEFAULT_HOVER_MS: u64 = 100;
const HOVER_STEP: Duration = Duration::from_millis(10);

#[cfg(target_os = "windows")]
const POWERSHELL: &str = "powershell.exe";
#[cfg(not(target_os = "windows"))]
const POWERSHELL: &str = "pwsh";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClickScript {
    element_id: Option<String>,
    x: Option<i32>,
    y: Option<i32>,
    button: Option<String>,
    duration_ms: Option<u64>,
    times: Option<u32>,
    modifier_keys: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HoverScript {
    start_element_id: Option<String>,
    start_x: Option<i32>,
    start_y: Option<i32>,
    end_element_id: Option<String>,
    end_x: Option<i32>,
    end_y: Option<i32>,
    duration_ms: Option<i64>,
    modifier_keys: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScrollScript {
    element_id: Option<String>,
    x: Option<i32>,
    y: Option<i32>,
    delta_x: Option<i32>,
    delta_y: Option<i32>,
    modifier_keys: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyScript {
    virtual_key_code: Option<u16>,
    down: Option<bool>,
    text: Option<String>,
    pause: Option<u64>,
}

pub async fn execute_script(session: &Session, script: &str, args: &[Value]) -> Result<Value> {
    match script {
        "powerShell" => powershell(session, single_argument("PowerShell", args)?).await,
        "windows: keys" => {
            keys(session, single_argument(script, args)?).await?;
            Ok(Value::Null)
        }
        "windows: click" => {
            click(session, parse(single_argument(script, args)?)?).await?;
            Ok(Value::Null)
        }
        "windows: hover" => {
            hover(session, parse(single_argument(script, args)?)?).await?;
            Ok(Value::Null)
        }
        "windows: scroll" => {
            scroll(session, parse(single_argument(script, args)?)?).await?;
            Ok(Value::Null)
        }
        _ => Err(WebDriverError::UnsupportedOperation(
            "Only 'powerShell', 'windows: keys', 'windows: click', 'windows: hover' and 'windows: scroll' scripts are supported"
                .to_string(),
        )),
    }
}

fn single_argument<'a>(script: &str, args: &'a [Value]) -> Result<&'a Value> {
    match args {
        [arg] => Ok(arg),
        _ => Err(WebDriverError::InvalidArgument(format!(
            "Expected an array of exactly 1 arguments for the {} script, but got {} arguments",
            script,
            args.len()
        ))),
    }
}

fn parse<T: DeserializeOwned>(value: &Value) -> Result<T> {
    if value.is_null() {
        return Err(WebDriverError::InvalidArgument(
            "Action cannot be null".to_string(),
        ));
    }
    serde_json::from_value(value.clone())
        .map_err(|e| WebDriverError::InvalidArgument(format!("Invalid script argument: {}", e)))
}

async fn powershell(session: &Session, arg: &Value) -> Result<Value> {
    let command = arg.get("command").ok_or_else(|| {
        WebDriverError::InvalidArgument(
            "Expected a \"command\" property of the first argument for the PowerShell script"
                .to_string(),
        )
    })?;
    let command = command.as_str().ok_or_else(|| {
        WebDriverError::InvalidArgument("Powershell \"command\" property must be a string".to_string())
    })?;
    if command.is_empty() {
        return Err(WebDriverError::InvalidArgument(
            "Powershell \"command\" property must be non-empty".to_string(),
        ));
    }

    tracing::info!(
        "Executing PowerShell command {} (session {})",
        command,
        session.id
    );

    let mut process = Command::new(POWERSHELL);
    process
        .args(["-NoProfile", "-NonInteractive", "-Command", command])
        .kill_on_drop(true);
    let run = process.output();

    let output = match session.timeouts().await.script_timeout() {
        Some(timeout) => tokio::time::timeout(timeout, run).await.map_err(|_| {
            WebDriverError::ScriptTimeout(format!(
                "Script did not complete within {} ms",
                timeout.as_millis()
            ))
        })?,
        None => run.await,
    }
    .map_err(|e| WebDriverError::UnknownError(format!("Could not start {}: {}", POWERSHELL, e)))?;

    if !output.status.success() {
        let code = output
            .status
            .code()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        return Err(WebDriverError::ScriptError(format!(
            "Script failed with exit code {}: {}",
            code,
            String::from_utf8_lossy(&output.stderr)
        )));
    }

    Ok(Value::String(
        String::from_utf8_lossy(&output.stdout).into_owned(),
    ))
}

async fn keys(session: &Session, arg: &Value) -> Result<()> {
    let actions = arg.get("actions").ok_or_else(|| {
        WebDriverError::InvalidArgument(
            "Expected a \"actions\" property of the first argument for the windows: keys script"
                .to_string(),
        )
    })?;
    let actions: Vec<KeyScript> = match actions {
        Value::Array(_) => parse(actions)?,
        single => vec![parse(single)?],
    };

    if session.app().is_some() {
        let window = session.current_window().await?;
        session.automation().focus(&window).await?;
    }

    for action in &actions {
        key(session, action).await?;
    }
    Ok(())
}

async fn key(session: &Session, action: &KeyScript) -> Result<()> {
    let device = session.input_device();
    if let Some(code) = action.virtual_key_code {
        let key = VirtualKey(code);
        match action.down {
            Some(true) => {
                tracing::debug!("Pressing key {}", code);
                device.key_down(key)?;
                tokio::time::sleep(KEY_SETTLE_DELAY).await;
            }
            Some(false) => {
                tracing::debug!("Releasing key {}", code);
                device.key_up(key)?;
                tokio::time::sleep(KEY_SETTLE_DELAY).await;
            }
            None => {
                tracing::debug!("Pressing and releasing key {}", code);
                device.key_down(key)?;
                tokio::time::sleep(KEY_SETTLE_DELAY).await;
                device.key_up(key)?;
                tokio::time::sleep(KEY_SETTLE_DELAY).await;
            }
        }
    } else if let Some(text) = &action.text {
        tracing::debug!("Typing {}", text);
        device.type_text(text)?;
    } else if let Some(pause) = action.pause {
        tracing::debug!("Pausing for {} milliseconds", pause);
        tokio::time::sleep(Duration::from_millis(pause)).await;
    } else {
        return Err(WebDriverError::InvalidArgument(
            "Action must have either \"text\", \"virtualKeyCode\" or \"pause\"".to_string(),
        ));
    }
    Ok(())
}

fn reject_modifiers(modifier_keys: &Option<Value>) -> Result<()> {
    if modifier_keys.is_some() {
        return Err(WebDriverError::UnsupportedOperation(
            "Modifier keys are not yet supported".to_string(),
        ));
    }
    Ok(())
}

fn script_button(button: Option<&str>) -> Result<MouseButton> {
    let Some(button) = button else {
        return Ok(MouseButton::Left);
    };
    match button.to_ascii_lowercase().as_str() {
        "left" => Ok(MouseButton::Left),
        "middle" => Ok(MouseButton::Middle),
        "right" => Ok(MouseButton::Right),
        "back" | "xbutton1" => Ok(MouseButton::X1),
        "forward" | "xbutton2" => Ok(MouseButton::X2),
        other => Err(WebDriverError::InvalidArgument(format!(
            "Unknown mouse button '{}'",
            other
        ))),
    }
}

/// An element's center, or `x`/`y` offsets from its top-left corner.
/// Without an element both coordinates are absolute and required.
async fn target_point(
    session: &Session,
    element_id: Option<&str>,
    x: Option<i32>,
    y: Option<i32>,
) -> Result<Point> {
    if let Some(element_id) = element_id {
        let element = session.element(element_id)?;
        let rect = session.automation().bounding_rect(&element).await?;
        return Ok(match (x, y) {
            (Some(x), Some(y)) => rect.top_left().offset(x, y),
            _ => rect.center(),
        });
    }
    match (x, y) {
        (Some(x), Some(y)) => Ok(Point::new(x, y)),
        _ => Err(WebDriverError::InvalidArgument(
            "Either element ID or x and y must be provided".to_string(),
        )),
    }
}

async fn click(session: &Session, script: ClickScript) -> Result<()> {
    if script.duration_ms.is_some() {
        return Err(WebDriverError::UnsupportedOperation(
            "Duration is not yet supported".to_string(),
        ));
    }
    if script.times.is_some() {
        return Err(WebDriverError::UnsupportedOperation(
            "Times is not yet supported".to_string(),
        ));
    }
    reject_modifiers(&script.modifier_keys)?;

    let point = target_point(session, script.element_id.as_deref(), script.x, script.y).await?;
    let button = script_button(script.button.as_deref())?;
    tracing::debug!("Clicking point ({}, {}) with mouse button {:?}", point.x, point.y, button);

    let device = session.input_device();
    device.move_mouse(point)?;
    device.button_down(button)?;
    device.button_up(button)?;
    Ok(())
}

async fn hover(session: &Session, script: HoverScript) -> Result<()> {
    reject_modifiers(&script.modifier_keys)?;
    let start = target_point(
        session,
        script.start_element_id.as_deref(),
        script.start_x,
        script.start_y,
    )
    .await?;
    let end = target_point(
        session,
        script.end_element_id.as_deref(),
        script.end_x,
        script.end_y,
    )
    .await?;

    let device = session.input_device();
    tracing::debug!("Moving mouse to starting point ({}, {})", start.x, start.y);
    device.move_mouse(start)?;

    if start == end {
        let hold = script
            .duration_ms
            .map(|ms| ms.max(0) as u64)
            .unwrap_or(DEFAULT_HOVER_MS);
        tokio::time::sleep(Duration::from_millis(hold)).await;
        return Ok(());
    }

    tracing::debug!("Moving mouse to end point ({}, {})", end.x, end.y);
    let Some(duration_ms) = script.duration_ms else {
        device.move_mouse(end)?;
        return Ok(());
    };
    if duration_ms <= 0 {
        return Err(WebDriverError::UnsupportedOperation(
            "Duration less than or equal to zero is not supported".to_string(),
        ));
    }

    let duration = Duration::from_millis(duration_ms as u64);
    let steps = (duration.as_millis() / HOVER_STEP.as_millis()).max(1) as i64;
    let (dx, dy) = ((end.x - start.x) as i64, (end.y - start.y) as i64);
    for step in 1..=steps {
        tokio::time::sleep(duration / steps as u32).await;
        let point = Point::new(
            start.x + (dx * step / steps) as i32,
            start.y + (dy * step / steps) as i32,
        );
        device.move_mouse(point)?;
    }
    Ok(())
}

async fn scroll(session: &Session, script: ScrollScript) -> Result<()> {
    reject_modifiers(&script.modifier_keys)?;
    let point = target_point(session, script.element_id.as_deref(), script.x, script.y).await?;
    tracing::debug!("Scrolling at point ({}, {})", point.x, point.y);

    let device = session.input_device();
    device.move_mouse(point)?;
    if let Some(delta_y) = script.delta_y.filter(|d| *d != 0) {
        device.scroll_vertical(delta_y)?;
    }
    if let Some(delta_x) = script.delta_x.filter(|d| *d != 0) {
        device.scroll_horizontal(delta_x)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desktop::{InputEvent, SimulatedDesktop};
    use crate::session::SessionOptions;
    use serde_json::json;
    use std::sync::Arc;

    async fn setup() -> (SimulatedDesktop, Session) {
        let desktop = SimulatedDesktop::new();
        desktop.start_process("Form");
        let session = Session::create(Arc::new(desktop.clone()), SessionOptions::default())
            .await
            .unwrap();
        (desktop, session)
    }

    #[tokio::test]
    async fn test_unknown_script_is_unsupported() {
        let (_desktop, session) = setup().await;
        let err = execute_script(&session, "mobile: shell", &[]).await.unwrap_err();
        assert_eq!(err.code(), "unsupported operation");
    }

    #[tokio::test]
    async fn test_argument_count_is_checked() {
        let (_desktop, session) = setup().await;
        let err = execute_script(&session, "windows: click", &[json!({}), json!({})])
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Expected an array of exactly 1 arguments for the windows: click script, but got 2 arguments"
        );
    }

    #[tokio::test]
    async fn test_powershell_argument_validation() {
        let (_desktop, session) = setup().await;
        let cases = [
            (
                json!({}),
                "Expected a \"command\" property of the first argument for the PowerShell script",
            ),
            (json!({"command": 1}), "Powershell \"command\" property must be a string"),
            (json!({"command": ""}), "Powershell \"command\" property must be non-empty"),
        ];
        for (arg, message) in cases {
            let err = execute_script(&session, "powerShell", &[arg]).await.unwrap_err();
            assert_eq!(err.code(), "invalid argument");
            assert_eq!(err.to_string(), message);
        }
    }

    #[tokio::test]
    async fn test_keys_presses_and_releases() {
        let (desktop, session) = setup().await;
        desktop.clear_events();
        execute_script(
            &session,
            "windows: keys",
            &[json!({"actions": [
                {"virtualKeyCode": 0x11, "down": true},
                {"virtualKeyCode": 0x41},
                {"virtualKeyCode": 0x11, "down": false},
                {"pause": 1},
                {"text": "hi"}
            ]})],
        )
        .await
        .unwrap();

        assert_eq!(
            desktop.events(),
            vec![
                InputEvent::KeyDown(VirtualKey::CONTROL),
                InputEvent::KeyDown(VirtualKey(0x41)),
                InputEvent::KeyUp(VirtualKey(0x41)),
                InputEvent::KeyUp(VirtualKey::CONTROL),
                InputEvent::Text("hi".to_string()),
            ]
        );
        assert!(desktop.pressed_keys().is_empty());
    }

    #[tokio::test]
    async fn test_keys_rejects_empty_action() {
        let (_desktop, session) = setup().await;
        let err = execute_script(&session, "windows: keys", &[json!({"actions": {}})])
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Action must have either \"text\", \"virtualKeyCode\" or \"pause\""
        );
    }

    #[tokio::test]
    async fn test_click_on_element_center() {
        let (desktop, session) = setup().await;
        let element = desktop.element("InvokableButton").unwrap();
        let id = session.get_or_add_element(element.clone()).await;
        let center = session
            .automation()
            .bounding_rect(&element)
            .await
            .unwrap()
            .center();

        execute_script(&session, "windows: click", &[json!({"elementId": id})])
            .await
            .unwrap();
        assert_eq!(desktop.pointer(), center);
        assert_eq!(desktop.name_of("InvokableButton").as_deref(), Some("Invoked!"));
    }

    #[tokio::test]
    async fn test_click_needs_a_target() {
        let (_desktop, session) = setup().await;
        let err = execute_script(&session, "windows: click", &[json!({"x": 10})])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Either element ID or x and y must be provided");

        let err = execute_script(&session, "windows: click", &[json!({"x": 1, "y": 1, "times": 2})])
            .await
            .unwrap_err();
        assert_eq!(err.code(), "unsupported operation");
    }

    #[tokio::test]
    async fn test_right_click_at_point() {
        let (desktop, session) = setup().await;
        desktop.clear_events();
        execute_script(
            &session,
            "windows: click",
            &[json!({"x": 5, "y": 6, "button": "right"})],
        )
        .await
        .unwrap();
        assert_eq!(
            desktop.events(),
            vec![
                InputEvent::MouseMove(Point::new(5, 6)),
                InputEvent::ButtonDown(MouseButton::Right),
                InputEvent::ButtonUp(MouseButton::Right),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_hover_interpolates_to_end() {
        let (desktop, session) = setup().await;
        desktop.clear_events();
        execute_script(
            &session,
            "windows: hover",
            &[json!({"startX": 0, "startY": 0, "endX": 100, "endY": 50, "durationMs": 50})],
        )
        .await
        .unwrap();

        let moves = desktop
            .events()
            .into_iter()
            .filter(|e| matches!(e, InputEvent::MouseMove(_)))
            .count();
        assert_eq!(moves, 6);
        assert_eq!(desktop.pointer(), Point::new(100, 50));
    }

    #[tokio::test]
    async fn test_hover_rejects_non_positive_duration() {
        let (_desktop, session) = setup().await;
        let err = execute_script(
            &session,
            "windows: hover",
            &[json!({"startX": 0, "startY": 0, "endX": 1, "endY": 1, "durationMs": 0})],
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), "unsupported operation");
    }

    #[tokio::test]
    async fn test_scroll_skips_zero_deltas() {
        let (desktop, session) = setup().await;
        desktop.clear_events();
        execute_script(
            &session,
            "windows: scroll",
            &[json!({"x": 3, "y": 4, "deltaX": 0, "deltaY": -2})],
        )
        .await
        .unwrap();
        assert_eq!(
            desktop.events(),
            vec![
                InputEvent::MouseMove(Point::new(3, 4)),
                InputEvent::ScrollVertical(-2),
            ]
        );
    }
}
