//! Error types for the playback session controller.

use std::fmt;
use std::time::Duration;

/// Errors that can occur while validating a source or driving a playback session.
///
/// Variants map to specific failure modes across the stack:
///
/// - **Engine setup**: [`Initialization`](Self::Initialization): fatal, returned
///   from constructors.
/// - **Connect**: [`StartRejected`](Self::StartRejected),
///   [`ConnectTimeout`](Self::ConnectTimeout), [`Stream`](Self::Stream):
///   reported through [`PlayerEvent::ErrorOccurred`](crate::PlayerEvent::ErrorOccurred).
/// - **Validation**: [`InvalidSource`](Self::InvalidSource): raised by
///   [`Source::parse`](crate::Source::parse) before the controller is involved.
/// - **Internal**: [`Engine`](Self::Engine), [`Io`](Self::Io),
///   [`WorkerLost`](Self::WorkerLost): reported and also returned to the caller.
#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    /// The engine instance or its player could not be created.
    #[error("failed to initialize media engine: {0}")]
    Initialization(String),

    /// The engine refused to start playing the media object.
    #[error("could not start playback: {0}")]
    StartRejected(String),

    /// The poll budget ran out before the engine reached Playing or Buffering.
    #[error(
        "connection timed out after {}ms; the stream is unavailable or too slow",
        waited.as_millis()
    )]
    ConnectTimeout { waited: Duration },

    /// The engine reported an error state.
    #[error("stream error: {0}")]
    Stream(String),

    /// The user-supplied source is neither a playable file nor an RTSP URL.
    #[error("invalid source {input:?}: {kind}")]
    InvalidSource { input: String, kind: SourceErrorKind },

    /// Any other engine call failure (media creation, event subscription).
    #[error("media engine error: {0}")]
    Engine(String),

    /// The connect worker thread could not be spawned.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connect worker exited without reporting an outcome.
    #[error("connect worker exited unexpectedly")]
    WorkerLost,

    /// [`Player::dispose`](crate::Player::dispose) has already run.
    #[error("player has been disposed")]
    Disposed,
}

impl PlayerError {
    /// Suggestions shown to the user alongside the error message.
    pub fn hints(&self) -> &'static [&'static str] {
        match self {
            Self::ConnectTimeout { .. } | Self::Stream(_) | Self::StartRejected(_) => &[
                "try a local video file",
                "check that the RTSP URL is correct",
                "make sure the network is reachable (for remote streams)",
                "try opening the URL in another player",
            ],
            Self::InvalidSource { .. } => &[
                "pick an existing video file (mp4, avi, mkv, mov, wmv, flv, webm, m4v)",
                "or enter a URL of the form rtsp://host[:port]/path",
            ],
            Self::Initialization(_) => &["check that the media engine libraries are installed"],
            _ => &[],
        }
    }

    /// An equivalent error value; I/O errors keep their kind and message.
    pub(crate) fn mirror(&self) -> Self {
        match self {
            Self::Initialization(msg) => Self::Initialization(msg.clone()),
            Self::StartRejected(msg) => Self::StartRejected(msg.clone()),
            Self::ConnectTimeout { waited } => Self::ConnectTimeout { waited: *waited },
            Self::Stream(msg) => Self::Stream(msg.clone()),
            Self::InvalidSource { input, kind } => Self::InvalidSource {
                input: input.clone(),
                kind: kind.clone(),
            },
            Self::Engine(msg) => Self::Engine(msg.clone()),
            Self::Io(e) => Self::Io(std::io::Error::new(e.kind(), e.to_string())),
            Self::WorkerLost => Self::WorkerLost,
            Self::Disposed => Self::Disposed,
        }
    }
}

/// Specific kind of source validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceErrorKind {
    /// Input was empty or whitespace only.
    Empty,
    /// A local file whose extension is not on the video allow-list.
    UnsupportedExtension(String),
    /// Looked like an RTSP URL but did not parse as one.
    MalformedUrl,
    /// Neither an existing file, a `file://` URI, nor an `rtsp://` URL.
    Unrecognized,
}

impl fmt::Display for SourceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty source"),
            Self::UnsupportedExtension(ext) if ext.is_empty() => {
                write!(f, "file has no video extension")
            }
            Self::UnsupportedExtension(ext) => write!(f, "unsupported file extension .{ext}"),
            Self::MalformedUrl => write!(f, "malformed RTSP URL"),
            Self::Unrecognized => write!(f, "not a video file or rtsp:// URL"),
        }
    }
}

/// Convenience alias for `Result<T, PlayerError>`.
pub type Result<T> = std::result::Result<T, PlayerError>;
