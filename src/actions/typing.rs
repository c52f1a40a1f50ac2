//! Element send keys: turn a string into key actions.

use unicode_segmentation::UnicodeSegmentation;

use super::action::Action;
use super::dispatcher::dispatch_action;
use crate::error::{Result, WebDriverError};
use crate::input::keys;
use crate::session::Session;

/// Type `text` through the key input source `input_id`.
///
/// The string is walked by grapheme cluster. The NULL key releases the
/// modifiers pressed so far, modifier keys are held until then (or until
/// the end of the string) and runs of typeable characters are typed with
/// Shift toggled only when a character needs a different state.
pub async fn dispatch_actions_for_string(
    session: &Session,
    input_id: &str,
    text: &str,
) -> Result<()> {
    let mut typeable = String::new();
    let mut pending_releases: Vec<Action> = Vec::new();

    for cluster in text.graphemes(true) {
        if is_null_key(cluster) {
            flush(session, input_id, &mut typeable).await?;
            release_modifiers(session, &mut pending_releases).await?;
        } else if keys::is_modifier(keys::normalized_key(cluster)) {
            flush(session, input_id, &mut typeable).await?;
            let key_down = Action::key(input_id, "keyDown", cluster);
            dispatch_action(session, &key_down).await?;

            let key_up = key_down.with_subtype("keyUp");
            if !pending_releases.contains(&key_up) {
                pending_releases.push(key_up);
            }
        } else if keys::is_typeable(cluster) {
            typeable.push_str(cluster);
        } else {
            tracing::debug!("Skipping untypeable cluster {:?}", cluster);
            flush(session, input_id, &mut typeable).await?;
        }
    }

    flush(session, input_id, &mut typeable).await?;
    release_modifiers(session, &mut pending_releases).await
}

fn is_null_key(cluster: &str) -> bool {
    let mut chars = cluster.chars();
    chars.next() == Some(keys::NULL) && chars.next().is_none()
}

async fn flush(session: &Session, input_id: &str, typeable: &mut String) -> Result<()> {
    if typeable.is_empty() {
        return Ok(());
    }
    let run = std::mem::take(typeable);
    dispatch_typeable_string(session, input_id, &run).await
}

async fn release_modifiers(session: &Session, pending: &mut Vec<Action>) -> Result<()> {
    while let Some(key_up) = pending.pop() {
        dispatch_action(session, &key_up).await?;
    }
    Ok(())
}

async fn shift_held(session: &Session, input_id: &str) -> Result<bool> {
    let mut input = session.input.lock().await;
    input
        .key_source_mut(input_id)?
        .map(|source| source.shift)
        .ok_or_else(|| {
            WebDriverError::UnknownError(format!(
                "Input source for key action '{}' not found.",
                input_id
            ))
        })
}

/// Press and release each character, toggling Shift lazily.
pub async fn dispatch_typeable_string(session: &Session, input_id: &str, run: &str) -> Result<()> {
    let shift = keys::LEFT_SHIFT.to_string();
    for c in run.chars() {
        let needs_shift = keys::is_shifted_char(c);
        if needs_shift != shift_held(session, input_id).await? {
            let subtype = if needs_shift { "keyDown" } else { "keyUp" };
            dispatch_action(session, &Action::key(input_id, subtype, shift.as_str())).await?;
        }

        let key = c.to_string();
        dispatch_action(session, &Action::key(input_id, "keyDown", key.as_str())).await?;
        dispatch_action(session, &Action::key(input_id, "keyUp", key)).await?;
    }
    Ok(())
}
