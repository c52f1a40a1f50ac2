use std::time::Duration;

use super::action::{Action, Origin};
use crate::desktop::{MouseButton, Point};
use crate::error::{Result, WebDriverError};
use crate::input::keys;
use crate::session::Session;

/// Pause after a synthesized key press so the OS has handled it before the
/// command completes.
pub const KEY_SETTLE_DELAY: Duration = Duration::from_millis(10);

/// JSON key under which element references travel
pub const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Perform one action against the session's input devices.
pub async fn dispatch_action(session: &Session, action: &Action) -> Result<()> {
    dispatch(session, action, false).await
}

/// Dispatch every pending inverse for `input_id`, most recent first.
pub async fn dispatch_release_actions(session: &Session, input_id: &str) -> Result<()> {
    loop {
        let pending = session.input.lock().await.take_last_cancel_for(input_id);
        match pending {
            Some(action) => dispatch(session, &action, true).await?,
            None => return Ok(()),
        }
    }
}

/// `releasing` is set when `action` was already taken off the cancel list.
pub(crate) async fn dispatch(session: &Session, action: &Action, releasing: bool) -> Result<()> {
    tracing::debug!(
        "Dispatching {} {} for input '{}'",
        action.source_type,
        action.subtype,
        action.id
    );
    match action.source_type.as_str() {
        "key" => dispatch_key_action(session, action, releasing).await,
        "pointer" => dispatch_pointer_action(session, action, releasing).await,
        "wheel" => dispatch_wheel_action(session, action).await,
        "none" => dispatch_null_action(action),
        other => Err(WebDriverError::UnsupportedOperation(format!(
            "Action type {} not supported",
            other
        ))),
    }
}

fn missing_source(input_id: &str) -> WebDriverError {
    WebDriverError::UnknownError(format!(
        "Input source for key action '{}' not found.",
        input_id
    ))
}

async fn dispatch_key_action(session: &Session, action: &Action, releasing: bool) -> Result<()> {
    let down = match action.subtype.as_str() {
        "keyDown" => true,
        "keyUp" => false,
        "pause" => return Ok(()),
        other => {
            return Err(WebDriverError::InvalidArgument(format!(
                "Key action subtype {} unknown",
                other
            )))
        }
    };
    let Some(raw) = action.value.as_deref() else {
        return Ok(());
    };

    let virtual_key = keys::virtual_key(keys::code(raw))?;
    let key = keys::normalized_key(raw);
    if session
        .input
        .lock()
        .await
        .key_source_mut(&action.id)?
        .is_none()
    {
        return Err(missing_source(&action.id));
    }

    let device = session.input_device();
    if down {
        device.key_down(virtual_key)?;
    } else {
        device.key_up(virtual_key)?;
    }

    // Only record state for keys the device actually changed.
    {
        let mut input = session.input.lock().await;
        if let Some(source) = input.key_source_mut(&action.id)? {
            source.set_modifier(key, down);
            if down {
                source.pressed.insert(key.to_string());
            } else {
                source.pressed.remove(key);
            }
        }
        if down {
            input.push_cancel(action.with_subtype("keyUp"));
        } else if !releasing {
            input.remove_matching_cancel(action);
        }
    }
    tokio::time::sleep(KEY_SETTLE_DELAY).await;
    Ok(())
}

async fn dispatch_pointer_action(
    session: &Session,
    action: &Action,
    releasing: bool,
) -> Result<()> {
    let device = session.input_device();
    match action.subtype.as_str() {
        "pointerMove" => {
            let target = pointer_target(session, action).await?;
            device.move_mouse(target)?;
        }
        "pointerDown" => {
            device.button_down(mouse_button(action.button)?)?;
            session
                .input
                .lock()
                .await
                .push_cancel(action.with_subtype("pointerUp"));
        }
        "pointerUp" => {
            device.button_up(mouse_button(action.button)?)?;
            if !releasing {
                session.input.lock().await.remove_matching_cancel(action);
            }
        }
        "pause" => {}
        other => {
            return Err(WebDriverError::UnsupportedOperation(format!(
                "Pointer action {} not supported",
                other
            )))
        }
    }
    Ok(())
}

fn coordinate(value: f64) -> i32 {
    value.round().clamp(i32::MIN as f64, i32::MAX as f64) as i32
}

async fn pointer_target(session: &Session, action: &Action) -> Result<Point> {
    let required = || match (action.x, action.y) {
        (Some(x), Some(y)) => Ok((coordinate(x), coordinate(y))),
        _ => Err(WebDriverError::InvalidArgument(
            "For pointer move, X and Y are required".to_string(),
        )),
    };

    match &action.origin {
        None => {
            let (x, y) = required()?;
            Ok(Point::new(x, y))
        }
        Some(Origin::Named(origin)) if origin == "viewport" => {
            let (x, y) = required()?;
            Ok(Point::new(x, y))
        }
        Some(Origin::Named(origin)) if origin == "pointer" => {
            let (x, y) = required()?;
            Ok(session.input_device().mouse_position()?.offset(x, y))
        }
        Some(Origin::Element(reference)) if reference.contains_key(ELEMENT_KEY) => {
            let element_id = &reference[ELEMENT_KEY];
            let element = session.elements.find(element_id).ok_or_else(|| {
                WebDriverError::InvalidArgument(format!(
                    "An unknown element ID '{}' provided for action item '{}'.",
                    element_id, action.subtype
                ))
            })?;
            let rect = session.automation().bounding_rect(&element).await?;
            Ok(rect.center().offset(
                action.x.map(coordinate).unwrap_or(0),
                action.y.map(coordinate).unwrap_or(0),
            ))
        }
        Some(origin) => Err(WebDriverError::InvalidArgument(format!(
            "Unknown origin type '{}' provided for action item '{}'.",
            describe_origin(origin),
            action.subtype
        ))),
    }
}

fn describe_origin(origin: &Origin) -> String {
    match origin {
        Origin::Named(name) => name.clone(),
        Origin::Element(map) => serde_json::to_string(map).unwrap_or_default(),
    }
}

/// W3C button numbering
pub fn mouse_button(button: Option<i64>) -> Result<MouseButton> {
    match button {
        None => Err(WebDriverError::InvalidArgument(
            "Pointer action button argument missing".to_string(),
        )),
        Some(0) => Ok(MouseButton::Left),
        Some(1) => Ok(MouseButton::Middle),
        Some(2) => Ok(MouseButton::Right),
        Some(3) => Ok(MouseButton::X1),
        Some(4) => Ok(MouseButton::X2),
        Some(other) => Err(WebDriverError::InvalidArgument(format!(
            "Pointer button {} not supported",
            other
        ))),
    }
}

async fn dispatch_wheel_action(session: &Session, action: &Action) -> Result<()> {
    match action.subtype.as_str() {
        "scroll" => {
            let device = session.input_device();
            let (Some(x), Some(y)) = (action.x, action.y) else {
                return Err(WebDriverError::InvalidArgument(
                    "For wheel scroll, X and Y are required".to_string(),
                ));
            };
            device.move_mouse(Point::new(coordinate(x), coordinate(y)))?;

            let (Some(delta_x), Some(delta_y)) = (action.delta_x, action.delta_y) else {
                return Err(WebDriverError::InvalidArgument(
                    "For wheel scroll, delta X and delta Y are required".to_string(),
                ));
            };
            if delta_y != 0 {
                device.scroll_vertical(clamp_delta(delta_y))?;
            }
            if delta_x != 0 {
                device.scroll_horizontal(clamp_delta(delta_x))?;
            }
            Ok(())
        }
        "pause" => Ok(()),
        other => Err(WebDriverError::InvalidArgument(format!(
            "Wheel action subtype {} unknown",
            other
        ))),
    }
}

fn clamp_delta(delta: i64) -> i32 {
    delta.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

fn dispatch_null_action(action: &Action) -> Result<()> {
    match action.subtype.as_str() {
        "pause" => Ok(()),
        other => Err(WebDriverError::InvalidArgument(format!(
            "Null action subtype {} unknown",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::action::Action;
    use crate::desktop::{InputEvent, Platform, SimulatedDesktop, VirtualKey};
    use crate::session::{Session, SessionOptions};
    use std::collections::HashMap;
    use std::sync::Arc;

    async fn setup() -> (SimulatedDesktop, Session) {
        let desktop = SimulatedDesktop::new();
        desktop.start_process("Form");
        let session = Session::create(Arc::new(desktop.clone()), SessionOptions::default())
            .await
            .unwrap();
        (desktop, session)
    }

    fn pointer(subtype: &str) -> Action {
        Action {
            source_type: "pointer".to_string(),
            value: None,
            ..Action::key("mouse", subtype, "")
        }
    }

    #[tokio::test]
    async fn test_failed_key_down_leaves_state_untouched() {
        let (desktop, session) = setup().await;
        session
            .input
            .lock()
            .await
            .get_or_create_input_source("key", "kb")
            .unwrap();
        desktop.block_input(true);

        let result = dispatch_action(&session, &Action::key("kb", "keyDown", "\u{E009}")).await;
        assert!(result.is_err());

        let mut input = session.input.lock().await;
        let source = input.key_source_mut("kb").unwrap().unwrap();
        assert!(!source.ctrl);
        assert!(source.pressed.is_empty());
        assert!(input.cancel_list().is_empty());
        assert!(desktop.pressed_keys().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_key_up_waits_for_settle_delay() {
        let (_, session) = setup().await;
        session
            .input
            .lock()
            .await
            .get_or_create_input_source("key", "kb")
            .unwrap();
        dispatch_action(&session, &Action::key("kb", "keyDown", "a"))
            .await
            .unwrap();

        let start = tokio::time::Instant::now();
        dispatch_action(&session, &Action::key("kb", "keyUp", "a"))
            .await
            .unwrap();
        assert!(start.elapsed() >= KEY_SETTLE_DELAY);
    }

    #[tokio::test]
    async fn test_key_down_tracks_state_and_cancel_list() {
        let (desktop, session) = setup().await;
        session
            .input
            .lock()
            .await
            .get_or_create_input_source("key", "kb")
            .unwrap();

        dispatch_action(&session, &Action::key("kb", "keyDown", "\u{E009}"))
            .await
            .unwrap();
        {
            let mut input = session.input.lock().await;
            let source = input.key_source_mut("kb").unwrap().unwrap();
            assert!(source.ctrl);
            assert!(source.pressed.contains("Control"));
            assert_eq!(input.cancel_list(), &[Action::key("kb", "keyUp", "\u{E009}")]);
        }

        dispatch_action(&session, &Action::key("kb", "keyUp", "\u{E009}"))
            .await
            .unwrap();
        let mut input = session.input.lock().await;
        assert!(!input.key_source_mut("kb").unwrap().unwrap().ctrl);
        assert!(input.cancel_list().is_empty());
        assert_eq!(
            desktop.events(),
            vec![
                InputEvent::KeyDown(VirtualKey::CONTROL),
                InputEvent::KeyUp(VirtualKey::CONTROL)
            ]
        );
    }

    #[tokio::test]
    async fn test_key_action_without_source_is_unknown_error() {
        let (_, session) = setup().await;
        let err = dispatch_action(&session, &Action::key("ghost", "keyDown", "a"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "unknown error");
        assert_eq!(err.to_string(), "Input source for key action 'ghost' not found.");

        let err = dispatch_action(&session, &Action::key("ghost", "keyTap", "a"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "invalid argument");
    }

    #[tokio::test]
    async fn test_pointer_down_up_and_origins() {
        let (desktop, session) = setup().await;
        let element = desktop.element("InvokableButton").unwrap();
        let reference = session.get_or_add_element(element.clone()).await;
        let center = session
            .automation()
            .bounding_rect(&element)
            .await
            .unwrap()
            .center();

        let mut move_to = pointer("pointerMove");
        move_to.origin = Some(Origin::Element(HashMap::from([(
            ELEMENT_KEY.to_string(),
            reference,
        )])));
        move_to.x = Some(2.0);
        dispatch_action(&session, &move_to).await.unwrap();
        assert_eq!(desktop.pointer(), center.offset(2, 0));

        let mut nudge = pointer("pointerMove");
        nudge.origin = Some(Origin::Named("pointer".to_string()));
        nudge.x = Some(-2.0);
        nudge.y = Some(0.0);
        dispatch_action(&session, &nudge).await.unwrap();
        assert_eq!(desktop.pointer(), center);

        let mut press = pointer("pointerDown");
        press.button = Some(0);
        dispatch_action(&session, &press).await.unwrap();
        assert_eq!(session.input.lock().await.cancel_list().len(), 1);

        let mut release = pointer("pointerUp");
        release.button = Some(0);
        dispatch_action(&session, &release).await.unwrap();
        assert!(session.input.lock().await.cancel_list().is_empty());
        assert_eq!(desktop.name_of("InvokableButton").as_deref(), Some("Invoked!"));
    }

    #[tokio::test]
    async fn test_pointer_errors() {
        let (_, session) = setup().await;

        let mut unknown = pointer("pointerMove");
        unknown.origin = Some(Origin::Element(HashMap::from([(
            ELEMENT_KEY.to_string(),
            "nope".to_string(),
        )])));
        let err = dispatch_action(&session, &unknown).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "An unknown element ID 'nope' provided for action item 'pointerMove'."
        );

        let mut bad_origin = pointer("pointerMove");
        bad_origin.origin = Some(Origin::Named("page".to_string()));
        let err = dispatch_action(&session, &bad_origin).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unknown origin type 'page' provided for action item 'pointerMove'."
        );

        let err = dispatch_action(&session, &pointer("pointerDown")).await.unwrap_err();
        assert_eq!(err.to_string(), "Pointer action button argument missing");

        let mut bad_button = pointer("pointerDown");
        bad_button.button = Some(7);
        let err = dispatch_action(&session, &bad_button).await.unwrap_err();
        assert_eq!(err.to_string(), "Pointer button 7 not supported");
    }

    #[tokio::test]
    async fn test_wheel_scroll() {
        let (desktop, session) = setup().await;
        let mut scroll = Action {
            source_type: "wheel".to_string(),
            ..Action::key("wheel", "scroll", "")
        };
        scroll.x = Some(10.0);
        scroll.y = Some(20.0);

        let err = dispatch_action(&session, &scroll).await.unwrap_err();
        assert_eq!(err.to_string(), "For wheel scroll, delta X and delta Y are required");

        scroll.delta_x = Some(0);
        scroll.delta_y = Some(3);
        desktop.clear_events();
        dispatch_action(&session, &scroll).await.unwrap();
        assert_eq!(
            desktop.events(),
            vec![
                InputEvent::MouseMove(Point::new(10, 20)),
                InputEvent::ScrollVertical(3)
            ]
        );
    }

    #[tokio::test]
    async fn test_null_and_unknown_types() {
        let (_, session) = setup().await;
        let pause = Action {
            source_type: "none".to_string(),
            ..Action::key("idle", "pause", "")
        };
        dispatch_action(&session, &pause).await.unwrap();

        let bad = pause.with_subtype("keyDown");
        assert_eq!(
            dispatch_action(&session, &bad).await.unwrap_err().to_string(),
            "Null action subtype keyDown unknown"
        );

        let pen = Action {
            source_type: "pen".to_string(),
            ..Action::key("pen", "pause", "")
        };
        assert_eq!(
            dispatch_action(&session, &pen).await.unwrap_err().code(),
            "unsupported operation"
        );
    }

    #[tokio::test]
    async fn test_release_actions_for_one_input() {
        let (desktop, session) = setup().await;
        {
            let mut input = session.input.lock().await;
            input.get_or_create_input_source("key", "a").unwrap();
            input.get_or_create_input_source("key", "b").unwrap();
        }
        dispatch_action(&session, &Action::key("a", "keyDown", "\u{E008}"))
            .await
            .unwrap();
        dispatch_action(&session, &Action::key("b", "keyDown", "x"))
            .await
            .unwrap();
        dispatch_action(&session, &Action::key("a", "keyDown", "y"))
            .await
            .unwrap();

        desktop.clear_events();
        dispatch_release_actions(&session, "a").await.unwrap();
        assert_eq!(
            desktop.events(),
            vec![
                InputEvent::KeyUp(VirtualKey::letter('y').unwrap()),
                InputEvent::KeyUp(VirtualKey::LSHIFT),
            ]
        );
        assert_eq!(session.input.lock().await.cancel_list().len(), 1);
    }
}
