use std::sync::Arc;
use std::time::Duration;

use crate::engine::{EngineState, MediaEngine};
use crate::error::PlayerError;
use crate::events::{EventHub, Status};
use crate::player::PlayerConfig;
use crate::source::SourceKind;

use super::{Attempt, Outcome};

/// Poll the engine until it is playing, fails, or the budget runs out.
///
/// Polls every `poll_interval`; remote streams get `remote_poll_budget`
/// polls, local files `local_poll_budget`. An Error state is re-checked once
/// after `error_grace` before it counts. For remote streams a
/// [`Status::StillConnecting`] update goes out every `progress_every` polls.
///
/// Cancellation is checked before each poll and again before reporting, so
/// a replaced attempt never reports anything.
pub(crate) fn wait_for_connection<E: MediaEngine>(
    engine: &E,
    kind: SourceKind,
    attempt: &Attempt,
    config: &PlayerConfig,
    hub: &EventHub,
) -> Outcome {
    let generation = attempt.generation;
    let budget = config.poll_budget(kind);
    let mut polls: u32 = 0;
    let mut connected = None;

    while polls < budget {
        if attempt.token.is_cancelled() {
            return cancelled(generation, polls);
        }

        let state = engine.state();
        if state.is_active() {
            connected = Some(state);
            break;
        }

        if state == EngineState::Error {
            if !attempt.token.sleep(config.error_grace) {
                return cancelled(generation, polls);
            }
            if engine.state() == EngineState::Error {
                return fail(
                    hub,
                    generation,
                    PlayerError::Stream(
                        "could not connect to the stream; check the URL and that the server is running"
                            .to_string(),
                    ),
                );
            }
            tracing::debug!(generation, polls, "transient engine error cleared");
        }

        if !attempt.token.sleep(config.poll_interval) {
            return cancelled(generation, polls);
        }
        polls += 1;

        if kind == SourceKind::RemoteStream
            && config.progress_every > 0
            && polls % config.progress_every == 0
        {
            hub.status(
                generation,
                Status::StillConnecting {
                    elapsed: elapsed(config, polls),
                },
            );
        }
    }

    let state = match connected {
        Some(state) => state,
        None => engine.state(),
    };

    if attempt.token.is_cancelled() {
        return cancelled(generation, polls);
    }

    match state {
        EngineState::Playing => succeed(hub, generation, polls, Status::Playing),
        EngineState::Buffering => {
            succeed(hub, generation, polls, Status::Buffering { percent: None })
        }
        EngineState::Error => fail(
            hub,
            generation,
            PlayerError::Stream(
                "could not connect to the stream; try another URL or a local video file"
                    .to_string(),
            ),
        ),
        other => {
            tracing::debug!(generation, polls, state = %other, "poll budget exhausted");
            fail(
                hub,
                generation,
                PlayerError::ConnectTimeout {
                    waited: elapsed(config, polls),
                },
            )
        }
    }
}

fn elapsed(config: &PlayerConfig, polls: u32) -> Duration {
    config
        .poll_interval
        .checked_mul(polls)
        .unwrap_or(Duration::MAX)
}

fn succeed(hub: &EventHub, generation: u64, polls: u32, status: Status) -> Outcome {
    tracing::info!(generation, polls, %status, "connected");
    hub.status(generation, status.clone());
    Outcome::Connected(status)
}

fn fail(hub: &EventHub, generation: u64, error: PlayerError) -> Outcome {
    tracing::warn!(generation, %error, "connect failed");
    let error = Arc::new(error);
    hub.error(generation, error.clone());
    Outcome::Failed(error)
}

fn cancelled(generation: u64, polls: u32) -> Outcome {
    tracing::debug!(generation, polls, "connect attempt superseded");
    Outcome::Cancelled
}
