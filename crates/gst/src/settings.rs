//! Translation of controller options into GStreamer element properties.
//!
//! | Option | Element | Property |
//! |--------|---------|----------|
//! | `rtsp-tcp` | `rtspsrc` | `protocols=tcp` |
//! | `network-caching`, `live-caching` | `rtspsrc` | `latency` (ms) |
//! | `rtsp-frame-buffer-size` | `rtspsrc` | `udp-buffer-size` |
//! | `rtsp-timeout` | `rtspsrc` | `tcp-timeout`, `timeout` (µs) |
//! | `clock-synchro=0` | `rtspsrc` | `buffer-mode=none` |
//! | `clock-jitter=0` | `rtspsrc` | `drop-on-latency=true` |
//! | `file-caching` | `playbin` | `buffer-duration` (ns) |

use gst::prelude::*;
use player::options::{self, MediaOption};

/// A single property assignment derived from a [`MediaOption`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Setting {
    /// Set on the source element created by `playbin`, from the property's string form.
    SourceStr(&'static str, &'static str),
    SourceU32(&'static str, u32),
    SourceI32(&'static str, i32),
    SourceU64(&'static str, u64),
    SourceBool(&'static str, bool),
    /// `playbin` buffer duration in nanoseconds.
    BufferDuration(i64),
}

impl Setting {
    pub fn targets_source(&self) -> bool {
        !matches!(self, Self::BufferDuration(_))
    }

    fn property(&self) -> &'static str {
        match self {
            Self::SourceStr(name, _)
            | Self::SourceU32(name, _)
            | Self::SourceI32(name, _)
            | Self::SourceU64(name, _)
            | Self::SourceBool(name, _) => name,
            Self::BufferDuration(_) => "buffer-duration",
        }
    }

    /// Apply to `element` if it has the property; returns whether it did.
    pub fn apply(&self, element: &gst::Element) -> bool {
        if element.find_property(self.property()).is_none() {
            tracing::trace!(
                element = %element.name(),
                property = self.property(),
                "property not supported, skipping"
            );
            return false;
        }
        match *self {
            Self::SourceStr(name, value) => element.set_property_from_str(name, value),
            Self::SourceU32(name, value) => element.set_property(name, value),
            Self::SourceI32(name, value) => element.set_property(name, value),
            Self::SourceU64(name, value) => element.set_property(name, value),
            Self::SourceBool(name, value) => element.set_property(name, value),
            Self::BufferDuration(ns) => element.set_property("buffer-duration", ns),
        }
        true
    }
}

fn number<T: std::str::FromStr>(option: &MediaOption) -> Option<T> {
    option.value().and_then(|v| v.trim().parse().ok())
}

/// Property assignments for `option`. Unknown or malformed options map to nothing.
pub fn settings_for(option: &MediaOption) -> Vec<Setting> {
    let settings = match option.name() {
        options::RTSP_TCP => vec![Setting::SourceStr("protocols", "tcp")],
        options::NETWORK_CACHING | options::LIVE_CACHING => number::<u32>(option)
            .map(|ms| vec![Setting::SourceU32("latency", ms)])
            .unwrap_or_default(),
        options::RTSP_FRAME_BUFFER_SIZE => number::<i32>(option)
            .map(|bytes| vec![Setting::SourceI32("udp-buffer-size", bytes)])
            .unwrap_or_default(),
        options::RTSP_TIMEOUT => number::<u64>(option)
            .map(|ms| {
                let us = ms.saturating_mul(1000);
                vec![
                    Setting::SourceU64("tcp-timeout", us),
                    Setting::SourceU64("timeout", us),
                ]
            })
            .unwrap_or_default(),
        options::CLOCK_SYNCHRO if option.value() == Some("0") => {
            vec![Setting::SourceStr("buffer-mode", "none")]
        }
        options::CLOCK_JITTER if option.value() == Some("0") => {
            vec![Setting::SourceBool("drop-on-latency", true)]
        }
        options::FILE_CACHING => number::<i64>(option)
            .map(|ms| vec![Setting::BufferDuration(ms.saturating_mul(1_000_000))])
            .unwrap_or_default(),
        _ => Vec::new(),
    };
    if settings.is_empty() {
        tracing::trace!(option = %option, "option has no GStreamer equivalent");
    }
    settings
}
