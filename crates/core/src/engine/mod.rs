//! The external media engine seam.
//!
//! Decoding, RTSP/RTP transport, buffering and rendering all live behind
//! [`MediaEngine`]. The controller only needs a handful of capabilities:
//!
//! | Capability | Method |
//! |------------|--------|
//! | Create a playable media object | [`MediaEngine::create_media`] |
//! | Attach options before play | [`Media::add_option`] |
//! | Begin playback | [`MediaEngine::play`] |
//! | Query state | [`MediaEngine::state`] |
//! | Stop | [`MediaEngine::stop`] |
//! | State-change notifications | [`MediaEngine::subscribe`] / [`MediaEngine::unsubscribe`] |
//!
//! Native resources are released by `Drop`: dropping a [`Media`] releases
//! the media handle, dropping the engine releases the engine instance.

#[cfg(any(test, feature = "test-util"))]
pub mod scripted;

use std::fmt;

use crate::error::Result;
use crate::options::MediaOption;

/// Playback state as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineState {
    #[default]
    Idle,
    /// Opening the media / connecting to the server.
    Connecting,
    Buffering,
    Playing,
    Stopped,
    /// End of stream reached.
    Ended,
    Error,
}

impl EngineState {
    /// Playing and Buffering both mean the engine is actively working.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Playing | Self::Buffering)
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Buffering => "buffering",
            Self::Playing => "playing",
            Self::Stopped => "stopped",
            Self::Ended => "ended",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// Asynchronous notifications raised by the engine, possibly on its own threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEvent {
    EncounteredError,
    EndReached,
    Stopped,
    Playing,
    /// Buffer fill level, 0–100.
    Buffering(u8),
}

/// Callback registered with [`MediaEngine::subscribe`].
///
/// Must only do thread-safe work: it can be invoked from any engine thread.
pub type EventListener = Box<dyn Fn(EngineEvent) + Send + Sync>;

/// Handle returned by [`MediaEngine::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// A loaded, playable source. Released when dropped.
pub trait Media: Send + 'static {
    /// Attach an option. Must be called before the media is played.
    fn add_option(&mut self, option: &MediaOption);
}

/// An engine instance with a single player.
pub trait MediaEngine: Send + Sync + 'static {
    type Media: Media;

    /// Create a media object from a location (path, file URI, or URL).
    fn create_media(&self, location: &str) -> Result<Self::Media>;

    /// Begin asynchronous playback. An `Err` means the engine rejected the media.
    fn play(&self, media: &Self::Media) -> Result<()>;

    /// Current playback state.
    fn state(&self) -> EngineState;

    /// Stop playback. Safe to call when nothing is playing.
    fn stop(&self);

    fn subscribe(&self, listener: EventListener) -> Result<SubscriptionId>;

    fn unsubscribe(&self, id: SubscriptionId);
}
