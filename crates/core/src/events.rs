//! Status and error notifications delivered over channels.
//!
//! Every [`Player::play`](crate::Player::play), [`stop`](crate::Player::stop)
//! and [`dispose`](crate::Player::dispose) opens a new *generation*. Each
//! notification is tagged with the generation that produced it, and the hub
//! silently drops anything emitted for a generation that is no longer
//! current. A poll loop that was replaced by a newer `play` therefore cannot
//! leak late updates into the new session's stream.
//!
//! Generation bookkeeping and delivery happen under one lock, so each
//! subscriber observes events in emission order. Events arrive on whatever
//! thread the subscriber reads from; the shell decides where to handle them.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use crate::error::PlayerError;
use crate::session::{Attempt, Canceller};

/// Status vocabulary shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Connecting,
    /// Periodic progress while the engine is still connecting.
    StillConnecting { elapsed: Duration },
    /// Engine is filling its buffer; `percent` is known when the engine reports it.
    Buffering { percent: Option<u8> },
    Playing,
    Stopped,
    /// End of stream reached.
    Ended,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "Connecting..."),
            Self::StillConnecting { elapsed } => {
                write!(f, "Connecting... ({}ms)", elapsed.as_millis())
            }
            Self::Buffering { percent: Some(p) } => write!(f, "Buffering... {p}%"),
            Self::Buffering { percent: None } => write!(f, "Buffering..."),
            Self::Playing => write!(f, "Playing"),
            Self::Stopped => write!(f, "Stopped"),
            Self::Ended => write!(f, "Stream ended"),
        }
    }
}

/// A notification from the player.
#[derive(Debug, Clone)]
pub enum PlayerEvent {
    StatusChanged { generation: u64, status: Status },
    ErrorOccurred { generation: u64, error: Arc<PlayerError> },
}

impl PlayerEvent {
    pub fn generation(&self) -> u64 {
        match self {
            Self::StatusChanged { generation, .. } | Self::ErrorOccurred { generation, .. } => {
                *generation
            }
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::ErrorOccurred { .. })
    }
}

/// Where the current generation stands, derived from its last notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Connecting,
    /// Playing or buffering.
    Active,
    Stopped,
    Failed,
}

impl Phase {
    /// Whether a shell should offer "play" (nothing in flight or running).
    pub fn can_play(self) -> bool {
        !matches!(self, Self::Connecting | Self::Active)
    }

    fn after(status: &Status) -> Self {
        match status {
            Status::Connecting | Status::StillConnecting { .. } => Self::Connecting,
            Status::Buffering { .. } | Status::Playing => Self::Active,
            Status::Stopped | Status::Ended => Self::Stopped,
        }
    }
}

struct HubState {
    generation: u64,
    canceller: Option<Canceller>,
    phase: Phase,
    /// Last status delivered for the current generation.
    last_status: Option<Status>,
    subscribers: Vec<Sender<PlayerEvent>>,
    closed: bool,
}

/// Generation tracking plus fan-out to subscribers.
pub(crate) struct EventHub {
    state: Mutex<HubState>,
}

impl EventHub {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(HubState {
                generation: 0,
                canceller: None,
                phase: Phase::Idle,
                last_status: None,
                subscribers: Vec::new(),
                closed: false,
            }),
        }
    }

    /// Register a new subscriber. Returns a disconnected receiver once closed.
    pub fn subscribe(&self) -> Receiver<PlayerEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut state = self.state.lock();
        if !state.closed {
            state.subscribers.push(tx);
        }
        rx
    }

    /// Open a new generation with its own cancellation token, cancelling the previous one.
    pub fn begin(&self) -> Attempt {
        let (canceller, token) = Canceller::new();
        let mut state = self.state.lock();
        state.generation += 1;
        state.canceller = Some(canceller);
        state.phase = Phase::Idle;
        state.last_status = None;
        Attempt {
            generation: state.generation,
            token,
        }
    }

    /// Open a new generation with nothing in flight, cancelling the previous one.
    pub fn retire(&self) -> u64 {
        let mut state = self.state.lock();
        state.generation += 1;
        state.canceller = None;
        state.last_status = None;
        state.generation
    }

    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    pub fn phase(&self) -> Phase {
        self.state.lock().phase
    }

    /// Emit a status for `generation`. Returns `false` if it was stale and dropped.
    pub fn status(&self, generation: u64, status: Status) -> bool {
        let mut state = self.state.lock();
        if state.generation != generation {
            tracing::trace!(
                generation,
                current = state.generation,
                %status,
                "stale status dropped"
            );
            return false;
        }
        tracing::debug!(generation, %status, "status");
        state.phase = Phase::after(&status);
        state.last_status = Some(status.clone());
        Self::deliver(&mut state, PlayerEvent::StatusChanged { generation, status });
        true
    }

    /// Emit an error for `generation`. Returns `false` if it was stale and dropped.
    pub fn error(&self, generation: u64, error: Arc<PlayerError>) -> bool {
        let mut state = self.state.lock();
        if state.generation != generation {
            tracing::trace!(generation, current = state.generation, %error, "stale error dropped");
            return false;
        }
        tracing::debug!(generation, %error, "error");
        state.phase = Phase::Failed;
        Self::deliver(&mut state, PlayerEvent::ErrorOccurred { generation, error });
        true
    }

    /// Emit a status from an engine callback for the current generation.
    ///
    /// Dropped while a connect attempt is still polling (it reports the
    /// outcome itself) and when it repeats the last delivered status.
    pub fn status_current(&self, status: Status) -> bool {
        let mut state = self.state.lock();
        if state.phase == Phase::Connecting || state.last_status.as_ref() == Some(&status) {
            tracing::trace!(generation = state.generation, %status, "engine status suppressed");
            return false;
        }
        let generation = state.generation;
        tracing::debug!(generation, %status, "status");
        state.phase = Phase::after(&status);
        state.last_status = Some(status.clone());
        Self::deliver(&mut state, PlayerEvent::StatusChanged { generation, status });
        true
    }

    /// Emit an error from an engine callback for the current generation.
    ///
    /// Dropped while a connect attempt is still polling and when the
    /// generation has already failed.
    pub fn error_current(&self, error: Arc<PlayerError>) -> bool {
        let mut state = self.state.lock();
        if matches!(state.phase, Phase::Connecting | Phase::Failed) {
            tracing::trace!(generation = state.generation, %error, "engine error suppressed");
            return false;
        }
        let generation = state.generation;
        tracing::debug!(generation, %error, "error");
        state.phase = Phase::Failed;
        Self::deliver(&mut state, PlayerEvent::ErrorOccurred { generation, error });
        true
    }

    /// Disconnect all subscribers and refuse new ones.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        state.canceller = None;
        state.subscribers.clear();
    }

    fn deliver(state: &mut HubState, event: PlayerEvent) {
        state
            .subscribers
            .retain(|tx| tx.send(event.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statuses(rx: &Receiver<PlayerEvent>) -> Vec<Status> {
        rx.try_iter()
            .filter_map(|e| match e {
                PlayerEvent::StatusChanged { status, .. } => Some(status),
                PlayerEvent::ErrorOccurred { .. } => None,
            })
            .collect()
    }

    #[test]
    fn stale_generation_is_dropped() {
        let hub = EventHub::new();
        let rx = hub.subscribe();

        let first = hub.begin();
        assert!(hub.status(first.generation, Status::Connecting));

        let second = hub.begin();
        assert!(!hub.status(first.generation, Status::Playing));
        assert!(hub.status(second.generation, Status::Connecting));

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].generation(), first.generation);
        assert_eq!(events[1].generation(), second.generation);
    }

    #[test]
    fn begin_cancels_previous_token() {
        let hub = EventHub::new();
        let first = hub.begin();
        assert!(!first.token.is_cancelled());

        let second = hub.begin();
        assert!(first.token.is_cancelled());
        assert!(!second.token.is_cancelled());

        hub.retire();
        assert!(second.token.is_cancelled());
    }

    #[test]
    fn phase_follows_last_notification() {
        let hub = EventHub::new();
        let attempt = hub.begin();
        assert_eq!(hub.phase(), Phase::Idle);

        hub.status(attempt.generation, Status::Connecting);
        assert_eq!(hub.phase(), Phase::Connecting);
        assert!(!hub.phase().can_play());

        hub.status(attempt.generation, Status::Buffering { percent: Some(30) });
        assert_eq!(hub.phase(), Phase::Active);

        hub.error(attempt.generation, Arc::new(PlayerError::Stream("gone".into())));
        assert_eq!(hub.phase(), Phase::Failed);
        assert!(hub.phase().can_play());
    }

    #[test]
    fn fan_out_prunes_dropped_subscribers() {
        let hub = EventHub::new();
        let kept = hub.subscribe();
        let dropped = hub.subscribe();
        drop(dropped);

        hub.status_current(Status::Stopped);
        hub.status_current(Status::Ended);

        assert_eq!(statuses(&kept), vec![Status::Stopped, Status::Ended]);
        assert_eq!(hub.state.lock().subscribers.len(), 1);
    }

    #[test]
    fn engine_notifications_defer_to_connect_attempt() {
        let hub = EventHub::new();
        let rx = hub.subscribe();
        let attempt = hub.begin();
        hub.status(attempt.generation, Status::Connecting);

        assert!(!hub.status_current(Status::Playing));
        assert!(!hub.error_current(Arc::new(PlayerError::Stream("early".into()))));

        hub.status(attempt.generation, Status::Playing);
        assert!(!hub.status_current(Status::Playing));
        assert!(hub.status_current(Status::Buffering { percent: Some(40) }));
        assert!(hub.status_current(Status::Playing));

        assert_eq!(
            statuses(&rx),
            vec![
                Status::Connecting,
                Status::Playing,
                Status::Buffering { percent: Some(40) },
                Status::Playing,
            ]
        );
    }

    #[test]
    fn engine_error_after_failure_is_not_repeated() {
        let hub = EventHub::new();
        let rx = hub.subscribe();
        let attempt = hub.begin();
        hub.status(attempt.generation, Status::Connecting);

        hub.error(attempt.generation, Arc::new(PlayerError::Stream("gone".into())));
        assert!(!hub.error_current(Arc::new(PlayerError::Stream("gone".into()))));

        assert_eq!(rx.try_iter().filter(PlayerEvent::is_error).count(), 1);
    }

    #[test]
    fn close_disconnects_receivers() {
        let hub = EventHub::new();
        let rx = hub.subscribe();
        hub.close();

        assert!(rx.recv().is_err());
        assert!(hub.subscribe().recv().is_err());
    }

    #[test]
    fn status_text() {
        assert_eq!(Status::Connecting.to_string(), "Connecting...");
        assert_eq!(
            Status::StillConnecting {
                elapsed: Duration::from_millis(1000)
            }
            .to_string(),
            "Connecting... (1000ms)"
        );
        assert_eq!(
            Status::Buffering { percent: Some(42) }.to_string(),
            "Buffering... 42%"
        );
        assert_eq!(Status::Ended.to_string(), "Stream ended");
    }
}
