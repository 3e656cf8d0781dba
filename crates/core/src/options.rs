//! Engine playback options attached to a media object before play.
//!
//! Options use the engine's colon-prefixed string form:
//!
//! ```text
//! :network-caching=1000     (name + value)
//! :rtsp-tcp                 (flag)
//! ```
//!
//! Remote streams get a profile tuned for connection stability over
//! latency; local files only get a read cache.

use std::fmt;

use crate::player::PlayerConfig;
use crate::source::SourceKind;

pub const NETWORK_CACHING: &str = "network-caching";
pub const RTSP_TCP: &str = "rtsp-tcp";
pub const RTSP_FRAME_BUFFER_SIZE: &str = "rtsp-frame-buffer-size";
pub const LIVE_CACHING: &str = "live-caching";
pub const CLOCK_JITTER: &str = "clock-jitter";
pub const CLOCK_SYNCHRO: &str = "clock-synchro";
pub const RTSP_TIMEOUT: &str = "rtsp-timeout";
pub const FILE_CACHING: &str = "file-caching";

/// A single string-keyed engine option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaOption {
    name: String,
    value: Option<String>,
}

impl MediaOption {
    pub fn flag(name: &str) -> Self {
        Self {
            name: name.to_string(),
            value: None,
        }
    }

    pub fn new(name: &str, value: impl fmt::Display) -> Self {
        Self {
            name: name.to_string(),
            value: Some(value.to_string()),
        }
    }

    /// Parse the `:name[=value]` form. The leading colon is optional.
    ///
    /// ```
    /// use player::options::MediaOption;
    ///
    /// let opt = MediaOption::parse(":network-caching=300").unwrap();
    /// assert_eq!(opt.name(), "network-caching");
    /// assert_eq!(opt.value(), Some("300"));
    ///
    /// assert!(MediaOption::parse(":").is_none());
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        let body = s.trim();
        let body = body.strip_prefix(':').unwrap_or(body);
        let (name, value) = match body.split_once('=') {
            Some((name, value)) => (name.trim(), Some(value.trim().to_string())),
            None => (body, None),
        };
        if name.is_empty() || name.contains(char::is_whitespace) {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            value,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }
}

impl fmt::Display for MediaOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, ":{}={}", self.name, value),
            None => write!(f, ":{}", self.name),
        }
    }
}

/// Transport tuning for `rtsp://` sources.
#[derive(Debug, Clone)]
pub struct RemoteTransport {
    pub network_caching_ms: u32,
    /// Interleave RTP over the RTSP TCP connection instead of UDP.
    pub force_tcp: bool,
    pub frame_buffer_size: u32,
    pub live_caching_ms: u32,
    /// Turn off clock jitter and synchro compensation.
    pub disable_clock_compensation: bool,
    pub connect_timeout_ms: u32,
}

impl Default for RemoteTransport {
    fn default() -> Self {
        Self {
            network_caching_ms: 1000,
            force_tcp: true,
            frame_buffer_size: 500_000,
            live_caching_ms: 1000,
            disable_clock_compensation: true,
            connect_timeout_ms: 5000,
        }
    }
}

impl RemoteTransport {
    pub fn options(&self) -> Vec<MediaOption> {
        let mut options = vec![MediaOption::new(NETWORK_CACHING, self.network_caching_ms)];
        if self.force_tcp {
            options.push(MediaOption::flag(RTSP_TCP));
        }
        options.push(MediaOption::new(RTSP_FRAME_BUFFER_SIZE, self.frame_buffer_size));
        options.push(MediaOption::new(LIVE_CACHING, self.live_caching_ms));
        if self.disable_clock_compensation {
            options.push(MediaOption::new(CLOCK_JITTER, 0));
            options.push(MediaOption::new(CLOCK_SYNCHRO, 0));
        }
        options.push(MediaOption::new(RTSP_TIMEOUT, self.connect_timeout_ms));
        options
    }
}

/// Transport tuning for local files.
#[derive(Debug, Clone)]
pub struct LocalTransport {
    pub file_caching_ms: u32,
}

impl Default for LocalTransport {
    fn default() -> Self {
        Self {
            file_caching_ms: 1000,
        }
    }
}

impl LocalTransport {
    pub fn options(&self) -> Vec<MediaOption> {
        vec![MediaOption::new(FILE_CACHING, self.file_caching_ms)]
    }
}

/// Options for a source of the given kind, followed by any configured extras.
pub fn transport_options(kind: SourceKind, config: &PlayerConfig) -> Vec<MediaOption> {
    let mut options = match kind {
        SourceKind::RemoteStream => config.remote.options(),
        SourceKind::LocalFile => config.local.options(),
    };
    options.extend(config.extra_options.iter().cloned());
    options
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(kind: SourceKind, config: &PlayerConfig) -> Vec<String> {
        transport_options(kind, config)
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn remote_profile() {
        assert_eq!(
            rendered(SourceKind::RemoteStream, &PlayerConfig::default()),
            vec![
                ":network-caching=1000",
                ":rtsp-tcp",
                ":rtsp-frame-buffer-size=500000",
                ":live-caching=1000",
                ":clock-jitter=0",
                ":clock-synchro=0",
                ":rtsp-timeout=5000",
            ]
        );
    }

    #[test]
    fn local_profile_is_file_caching_only() {
        assert_eq!(
            rendered(SourceKind::LocalFile, &PlayerConfig::default()),
            vec![":file-caching=1000"]
        );
    }

    #[test]
    fn udp_profile_drops_tcp_flag() {
        let mut config = PlayerConfig::default();
        config.remote.force_tcp = false;
        config.remote.disable_clock_compensation = false;

        let options = rendered(SourceKind::RemoteStream, &config);
        assert!(!options.iter().any(|o| o == ":rtsp-tcp"));
        assert!(!options.iter().any(|o| o.starts_with(":clock-")));
        assert!(options.iter().any(|o| o == ":rtsp-timeout=5000"));
    }

    #[test]
    fn extras_are_appended() {
        let mut config = PlayerConfig::default();
        config.extra_options.push(MediaOption::flag("no-audio"));

        assert_eq!(
            rendered(SourceKind::LocalFile, &config),
            vec![":file-caching=1000", ":no-audio"]
        );
    }

    #[test]
    fn parse_flag_and_value() {
        let flag = MediaOption::parse("rtsp-tcp").unwrap();
        assert_eq!(flag, MediaOption::flag(RTSP_TCP));

        let valued = MediaOption::parse(" :live-caching = 300 ").unwrap();
        assert_eq!(valued, MediaOption::new(LIVE_CACHING, 300));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(MediaOption::parse("").is_none());
        assert!(MediaOption::parse(":=5").is_none());
        assert!(MediaOption::parse(":two words").is_none());
    }
}
