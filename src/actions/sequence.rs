use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

use super::action::{Action, ActionSequence};
use super::dispatcher::{dispatch, dispatch_action, dispatch_release_actions};
use crate::error::{Result, WebDriverError};
use crate::session::Session;

/// Register key input sources and group the actions by tick: tick `i`
/// holds the `i`-th item of every sequence long enough to have one.
pub async fn extract_action_sequence(
    session: &Session,
    sequences: &[ActionSequence],
) -> Result<Vec<Vec<Action>>> {
    {
        let mut input = session.input.lock().await;
        for sequence in sequences {
            if sequence.source_type == "key" {
                input.get_or_create_input_source(&sequence.source_type, &sequence.id)?;
            }
        }
    }

    let tick_count = sequences
        .iter()
        .map(|sequence| sequence.actions.len())
        .max()
        .unwrap_or(0);

    Ok((0..tick_count)
        .map(|tick| {
            sequences
                .iter()
                .filter_map(|sequence| {
                    sequence
                        .actions
                        .get(tick)
                        .map(|item| Action::new(sequence, item))
                })
                .collect()
        })
        .collect())
}

fn tick_duration(tick: &[Action]) -> Duration {
    Duration::from_millis(tick.iter().filter_map(|a| a.duration).max().unwrap_or(0))
}

/// Run the actions of one `POST /actions` request. Ticks run one after the
/// other; actions inside a tick run concurrently alongside the tick's
/// duration. Afterwards every input used by the request is released and
/// its source removed.
///
/// The work runs on its own task so that a caller dropping the future (a
/// client hanging up mid-request) cannot leave keys or buttons held.
pub async fn perform_actions(session: Arc<Session>, sequences: Vec<ActionSequence>) -> Result<()> {
    tokio::spawn(run_actions(session, sequences))
        .await
        .map_err(|e| WebDriverError::UnknownError(format!("Action task failed: {}", e)))?
}

async fn run_actions(session: Arc<Session>, sequences: Vec<ActionSequence>) -> Result<()> {
    let ticks = extract_action_sequence(&session, &sequences).await?;
    let result = run_ticks(&session, ticks).await;

    let mut input_ids: Vec<&str> = Vec::new();
    for sequence in &sequences {
        if !input_ids.contains(&sequence.id.as_str()) {
            input_ids.push(&sequence.id);
        }
    }
    for input_id in input_ids {
        if let Err(e) = dispatch_release_actions(&session, input_id).await {
            tracing::warn!("Failed to release input '{}': {}", input_id, e);
        }
        let mut input = session.input.lock().await;
        while input.take_last_cancel_for(input_id).is_some() {}
        input.remove_input_source(input_id);
    }

    result
}

async fn run_ticks(session: &Arc<Session>, ticks: Vec<Vec<Action>>) -> Result<()> {
    for (index, tick) in ticks.into_iter().enumerate() {
        let duration = tick_duration(&tick);
        tracing::debug!(
            "Tick {}: {} action(s), duration {:?}",
            index,
            tick.len(),
            duration
        );

        let mut tasks = JoinSet::new();
        for action in tick {
            let session = session.clone();
            tasks.spawn(async move { dispatch_action(&session, &action).await });
        }
        if !duration.is_zero() {
            tasks.spawn(async move {
                tokio::time::sleep(duration).await;
                Ok(())
            });
        }

        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            let outcome = joined.map_err(|e| {
                WebDriverError::UnknownError(format!("Action dispatch task failed: {}", e))
            });
            if let Err(e) = outcome.and_then(|result| result) {
                first_error.get_or_insert(e);
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }
    }
    Ok(())
}

/// `DELETE /actions`: release everything still pressed, most recent first,
/// then forget all input sources.
pub async fn release_actions(session: &Session) -> Result<()> {
    loop {
        let pending = session.input.lock().await.pop_cancel();
        match pending {
            Some(action) => dispatch(session, &action, true).await?,
            None => break,
        }
    }
    session.input.lock().await.reset();
    Ok(())
}
