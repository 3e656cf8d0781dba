//! GStreamer implementation of the player's media engine.
//!
//! [`GstEngine`] drives a single `playbin`. RTSP tuning options are applied
//! to the `rtspsrc` that `playbin` creates, through its `source-setup`
//! signal; see [`settings`] for the mapping.
//!
//! A dedicated bus thread translates pipeline messages:
//!
//! | Bus message | Engine state | Event |
//! |-------------|--------------|-------|
//! | `Error` | `Error` | `EncounteredError` |
//! | `Eos` | `Ended` | `EndReached` |
//! | `Buffering(p)`, p < 100 | `Buffering` | `Buffering(p)` |
//! | `playbin` reached `Playing` | `Playing` | `Playing` |

pub mod settings;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};

use gst::prelude::*;
use parking_lot::{Mutex, RwLock};
use player::engine::{EngineEvent, EngineState, EventListener, Media, MediaEngine, SubscriptionId};
use player::options::MediaOption;
use player::{PlayerError, Result};

use crate::settings::{Setting, settings_for};

const BUS_POLL_MS: u64 = 100;

/// A media object: a `playbin` URI plus the options to apply when played.
#[derive(Debug, Clone)]
pub struct GstMedia {
    uri: String,
    options: Vec<MediaOption>,
}

impl GstMedia {
    pub fn uri(&self) -> &str {
        &self.uri
    }
}

impl Media for GstMedia {
    fn add_option(&mut self, option: &MediaOption) {
        self.options.push(option.clone());
    }
}

/// State shared with the bus thread.
struct Shared {
    state: Mutex<EngineState>,
    listeners: RwLock<Vec<(SubscriptionId, EventListener)>>,
    running: AtomicBool,
}

impl Shared {
    fn set_state(&self, state: EngineState) {
        *self.state.lock() = state;
    }

    fn notify(&self, event: EngineEvent) {
        // Held for the whole fan-out so `unsubscribe` waits for callbacks in flight.
        for (_, listener) in self.listeners.read().iter() {
            listener(event);
        }
    }
}

pub struct GstEngine {
    playbin: gst::Element,
    shared: Arc<Shared>,
    /// Options for the source element of the media currently being played.
    source_settings: Arc<Mutex<Vec<Setting>>>,
    next_listener: AtomicU64,
    bus_thread: Option<JoinHandle<()>>,
}

impl GstEngine {
    /// Initialize GStreamer, build the `playbin` and start the bus thread.
    pub fn new() -> Result<Self> {
        gst::init().map_err(|e| PlayerError::Initialization(e.to_string()))?;

        let playbin = gst::ElementFactory::make("playbin")
            .name("player")
            .build()
            .map_err(|e| PlayerError::Initialization(format!("playbin: {e}")))?;
        let bus = playbin
            .bus()
            .ok_or_else(|| PlayerError::Initialization("playbin has no bus".to_string()))?;

        let source_settings: Arc<Mutex<Vec<Setting>>> = Arc::new(Mutex::new(Vec::new()));
        let pending = source_settings.clone();
        playbin.connect("source-setup", false, move |values| {
            let source = values.get(1)?.get::<gst::Element>().ok()?;
            let applied = pending
                .lock()
                .iter()
                .filter(|setting| setting.apply(&source))
                .count();
            tracing::debug!(source = %source.name(), applied, "configured source element");
            None
        });

        let shared = Arc::new(Shared {
            state: Mutex::new(EngineState::Idle),
            listeners: RwLock::new(Vec::new()),
            running: AtomicBool::new(true),
        });

        let bus_thread = {
            let shared = shared.clone();
            let playbin = playbin.clone();
            thread::Builder::new()
                .name("gst-bus".to_string())
                .spawn(move || bus_loop(&bus, &playbin, &shared))
                .map_err(|e| PlayerError::Initialization(format!("bus thread: {e}")))?
        };

        tracing::info!("GStreamer engine ready");
        Ok(Self {
            playbin,
            shared,
            source_settings,
            next_listener: AtomicU64::new(1),
            bus_thread: Some(bus_thread),
        })
    }

    fn reset_pipeline(&self) {
        if let Err(e) = self.playbin.set_state(gst::State::Null) {
            tracing::warn!(error = %e, "failed to reset pipeline");
        }
        // Drop messages that belong to the previous playback.
        if let Some(bus) = self.playbin.bus() {
            bus.set_flushing(true);
            bus.set_flushing(false);
        }
    }
}

impl MediaEngine for GstEngine {
    type Media = GstMedia;

    fn create_media(&self, location: &str) -> Result<GstMedia> {
        let uri = if location.contains("://") {
            location.to_string()
        } else {
            gst::filename_to_uri(location)
                .map_err(|e| PlayerError::Engine(format!("{location}: {e}")))?
                .to_string()
        };
        Ok(GstMedia {
            uri,
            options: Vec::new(),
        })
    }

    fn play(&self, media: &GstMedia) -> Result<()> {
        self.reset_pipeline();

        let (source, pipeline): (Vec<_>, Vec<_>) = media
            .options
            .iter()
            .flat_map(settings_for)
            .partition(Setting::targets_source);
        *self.source_settings.lock() = source;
        for setting in &pipeline {
            setting.apply(&self.playbin);
        }

        self.playbin.set_property("uri", media.uri.as_str());
        self.shared.set_state(EngineState::Connecting);
        tracing::debug!(uri = %media.uri, options = media.options.len(), "starting playbin");

        if let Err(e) = self.playbin.set_state(gst::State::Playing) {
            self.shared.set_state(EngineState::Error);
            return Err(PlayerError::StartRejected(format!("{}: {e}", media.uri)));
        }
        Ok(())
    }

    fn state(&self) -> EngineState {
        *self.shared.state.lock()
    }

    fn stop(&self) {
        self.reset_pipeline();
        let mut state = self.shared.state.lock();
        if *state != EngineState::Idle {
            *state = EngineState::Stopped;
        }
    }

    fn subscribe(&self, listener: EventListener) -> Result<SubscriptionId> {
        let id = SubscriptionId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.shared.listeners.write().push((id, listener));
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.shared.listeners.write().retain(|(lid, _)| *lid != id);
    }
}

impl Drop for GstEngine {
    fn drop(&mut self) {
        self.shared.running.store(false, Ordering::SeqCst);
        if let Err(e) = self.playbin.set_state(gst::State::Null) {
            tracing::warn!(error = %e, "failed to shut down pipeline");
        }
        if let Some(handle) = self.bus_thread.take() {
            if handle.join().is_err() {
                tracing::error!("bus thread panicked");
            }
        }
        tracing::debug!("GStreamer engine released");
    }
}

fn bus_loop(bus: &gst::Bus, playbin: &gst::Element, shared: &Shared) {
    while shared.running.load(Ordering::SeqCst) {
        let Some(msg) = bus.timed_pop(gst::ClockTime::from_mseconds(BUS_POLL_MS)) else {
            continue;
        };
        handle_message(&msg, playbin, shared);
    }
    tracing::debug!("bus thread exiting");
}

fn handle_message(msg: &gst::Message, playbin: &gst::Element, shared: &Shared) {
    use gst::MessageView;

    match msg.view() {
        MessageView::Error(err) => {
            tracing::warn!(
                error = %err.error(),
                debug = ?err.debug(),
                "pipeline error"
            );
            shared.set_state(EngineState::Error);
            shared.notify(EngineEvent::EncounteredError);
        }
        MessageView::Eos(..) => {
            shared.set_state(EngineState::Ended);
            shared.notify(EngineEvent::EndReached);
        }
        MessageView::Buffering(buffering) => {
            let percent = buffering.percent().clamp(0, 100) as u8;
            if percent < 100 {
                shared.set_state(EngineState::Buffering);
            }
            shared.notify(EngineEvent::Buffering(percent));
        }
        MessageView::StateChanged(change) => {
            let from_playbin = msg
                .src()
                .is_some_and(|src| src == playbin.upcast_ref::<gst::Object>());
            if from_playbin && change.current() == gst::State::Playing {
                shared.set_state(EngineState::Playing);
                shared.notify(EngineEvent::Playing);
            }
        }
        _ => {}
    }
}
