//! Playback sources: classification and validation.
//!
//! The controller only needs to know whether a location is a remote RTSP
//! stream or a local file, which [`Source::classify`] decides from the
//! scheme prefix. Validation is the shell's job and lives in
//! [`Source::parse`]:
//!
//! ```text
//! C:\videos\clip.mp4          -> LocalFile   (existing file, allowed extension)
//! file:///home/me/clip.mkv    -> LocalFile   (file URI, allowed extension)
//! rtsp://192.0.2.1/stream     -> RemoteStream
//! rtsp://                     -> MalformedUrl
//! not-a-url                   -> Unrecognized
//! ```

use std::fmt;
use std::path::Path;

use url::Url;

use crate::error::{PlayerError, Result, SourceErrorKind};

/// Video file extensions accepted for local playback (compared case-insensitively).
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mkv", "mov", "wmv", "flv", "webm", "m4v"];

const RTSP_PREFIX: &str = "rtsp://";
const FILE_PREFIX: &str = "file://";

/// Which transport profile a source gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// A file on local storage.
    LocalFile,
    /// An `rtsp://` network stream.
    RemoteStream,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LocalFile => write!(f, "local"),
            Self::RemoteStream => write!(f, "rtsp"),
        }
    }
}

/// A location string paired with its classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    location: String,
    kind: SourceKind,
}

impl Source {
    /// Classify a location without validating it.
    ///
    /// Anything starting with `rtsp://` (any case) is a remote stream,
    /// everything else is treated as a local file.
    pub fn classify(location: &str) -> Self {
        let kind = if has_prefix_ignore_case(location, RTSP_PREFIX) {
            SourceKind::RemoteStream
        } else {
            SourceKind::LocalFile
        };
        Self {
            location: location.to_string(),
            kind,
        }
    }

    /// Validate user input and classify it.
    ///
    /// Accepts an existing local path or `file://` URI with a video
    /// extension, or a well-formed `rtsp://` URL with a host.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let invalid = |kind| PlayerError::InvalidSource {
            input: input.to_string(),
            kind,
        };

        if trimmed.is_empty() {
            return Err(invalid(SourceErrorKind::Empty));
        }

        if has_prefix_ignore_case(trimmed, FILE_PREFIX) {
            let url = Url::parse(trimmed).map_err(|_| invalid(SourceErrorKind::Unrecognized))?;
            let ext = extension_of(Path::new(url.path()));
            return if is_video_extension(&ext) {
                Ok(Self::local(trimmed))
            } else {
                Err(invalid(SourceErrorKind::UnsupportedExtension(ext)))
            };
        }

        let path = Path::new(trimmed);
        if path.is_file() {
            let ext = extension_of(path);
            return if is_video_extension(&ext) {
                Ok(Self::local(trimmed))
            } else {
                Err(invalid(SourceErrorKind::UnsupportedExtension(ext)))
            };
        }

        if has_prefix_ignore_case(trimmed, RTSP_PREFIX) {
            if trimmed.len() == RTSP_PREFIX.len() {
                return Err(invalid(SourceErrorKind::MalformedUrl));
            }
            let url = Url::parse(trimmed).map_err(|_| invalid(SourceErrorKind::MalformedUrl))?;
            let has_host = url.host_str().is_some_and(|h| !h.is_empty());
            if url.scheme() != "rtsp" || !has_host {
                return Err(invalid(SourceErrorKind::MalformedUrl));
            }
            return Ok(Self {
                location: trimmed.to_string(),
                kind: SourceKind::RemoteStream,
            });
        }

        Err(invalid(SourceErrorKind::Unrecognized))
    }

    fn local(location: &str) -> Self {
        Self {
            location: location.to_string(),
            kind: SourceKind::LocalFile,
        }
    }

    /// The location handed to the engine (path, file URI, or RTSP URL).
    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn is_remote(&self) -> bool {
        self.kind == SourceKind::RemoteStream
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.location)
    }
}

fn has_prefix_ignore_case(s: &str, prefix: &str) -> bool {
    s.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

fn is_video_extension(ext: &str) -> bool {
    VIDEO_EXTENSIONS.contains(&ext)
}
