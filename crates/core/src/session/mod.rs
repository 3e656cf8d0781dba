//! Playback session attempts and their cancellation.
//!
//! Each `play` opens an [`Attempt`]: a generation number plus a
//! [`CancelToken`]. The connect worker carries the token into the poll
//! loop, and the next `play`, `stop` or `dispose` cancels it.
//!
//! ## Attempt lifecycle
//!
//! ```text
//! play          -> Connecting (worker spawned, token live)
//! engine state  -> Playing | Buffering   => Outcome::Connected
//!               -> Error (after grace)   => Outcome::Failed(Stream)
//!               -> budget exhausted      => Outcome::Failed(ConnectTimeout)
//! play / stop   -> token cancelled       => Outcome::Cancelled
//! ```

pub mod poll;

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};

use crate::error::PlayerError;
use crate::events::Status;

/// Owning side of a cancellation pair. Dropping it cancels the token.
pub struct Canceller {
    _tx: Sender<()>,
}

impl Canceller {
    pub fn new() -> (Self, CancelToken) {
        let (tx, rx) = crossbeam_channel::bounded(0);
        (Self { _tx: tx }, CancelToken { rx })
    }

    pub fn cancel(self) {}
}

/// Observing side of a cancellation pair.
///
/// Backed by a channel whose sender never sends: the token is cancelled
/// once the [`Canceller`] is dropped and the channel disconnects, which
/// also wakes any thread sleeping in [`sleep`](Self::sleep).
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: Receiver<()>,
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Sleep for `duration`, waking early on cancellation.
    ///
    /// Returns `true` if the full duration elapsed, `false` if cancelled.
    pub fn sleep(&self, duration: Duration) -> bool {
        match self.rx.recv_timeout(duration) {
            Err(RecvTimeoutError::Disconnected) => false,
            Ok(()) | Err(RecvTimeoutError::Timeout) => true,
        }
    }
}

/// One `play` call's identity and cancellation token.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub generation: u64,
    pub token: CancelToken,
}

/// How a connect attempt ended.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// The engine is playing or buffering.
    Connected(Status),
    /// Failure already reported through `ErrorOccurred`.
    Failed(Arc<PlayerError>),
    /// Superseded by a newer `play`, `stop` or `dispose`.
    Cancelled,
}

impl Outcome {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected(_))
    }
}
