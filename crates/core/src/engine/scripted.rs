//! A deterministic in-process engine that replays scripted states.
//!
//! Each call to [`MediaEngine::play`] installs a fresh copy of the script.
//! Every [`MediaEngine::state`] call then consumes one entry; once the script
//! is exhausted the last state repeats. An [`EngineProbe`] shared with the
//! test observes what the controller did to the engine.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::engine::{EngineEvent, EngineState, EventListener, Media, MediaEngine, SubscriptionId};
use crate::error::{PlayerError, Result};
use crate::options::MediaOption;

/// Counters and recordings shared between a [`ScriptedEngine`] and its observer.
#[derive(Debug, Default)]
pub struct EngineProbe {
    media_created: AtomicUsize,
    media_released: AtomicUsize,
    state_polls: AtomicUsize,
    plays: AtomicUsize,
    stops: AtomicUsize,
    listeners: AtomicUsize,
    engine_released: AtomicUsize,
    last_location: Mutex<Option<String>>,
    last_options: Mutex<Vec<MediaOption>>,
}

impl EngineProbe {
    /// Media objects created and not yet dropped.
    pub fn live_media(&self) -> usize {
        self.media_created.load(Ordering::SeqCst) - self.media_released.load(Ordering::SeqCst)
    }

    pub fn media_created(&self) -> usize {
        self.media_created.load(Ordering::SeqCst)
    }

    pub fn state_polls(&self) -> usize {
        self.state_polls.load(Ordering::SeqCst)
    }

    pub fn plays(&self) -> usize {
        self.plays.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    /// Currently registered event listeners.
    pub fn listeners(&self) -> usize {
        self.listeners.load(Ordering::SeqCst)
    }

    /// How many times the engine instance itself was dropped.
    pub fn engine_released(&self) -> usize {
        self.engine_released.load(Ordering::SeqCst)
    }

    /// Location of the most recently played media.
    pub fn last_location(&self) -> Option<String> {
        self.last_location.lock().clone()
    }

    /// Options attached to the most recently played media.
    pub fn last_options(&self) -> Vec<MediaOption> {
        self.last_options.lock().clone()
    }
}

/// Media object produced by [`ScriptedEngine`].
#[derive(Debug)]
pub struct ScriptedMedia {
    location: String,
    options: Vec<MediaOption>,
    probe: Arc<EngineProbe>,
}

impl ScriptedMedia {
    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn options(&self) -> &[MediaOption] {
        &self.options
    }
}

impl Media for ScriptedMedia {
    fn add_option(&mut self, option: &MediaOption) {
        self.options.push(option.clone());
    }
}

impl Drop for ScriptedMedia {
    fn drop(&mut self) {
        self.probe.media_released.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct Playback {
    script: Vec<EngineState>,
    scripts: HashMap<String, Vec<EngineState>>,
    remaining: VecDeque<EngineState>,
    current: EngineState,
}

/// Engine whose state sequence is fixed up front.
pub struct ScriptedEngine {
    playback: Mutex<Playback>,
    listeners: Mutex<Vec<(SubscriptionId, EventListener)>>,
    next_listener: AtomicU64,
    reject_play: AtomicBool,
    reject_media: AtomicBool,
    reject_subscribe: AtomicBool,
    probe: Arc<EngineProbe>,
}

impl ScriptedEngine {
    /// An engine whose playback stays in Connecting until scripted otherwise.
    pub fn new() -> Self {
        Self {
            playback: Mutex::new(Playback::default()),
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(1),
            reject_play: AtomicBool::new(false),
            reject_media: AtomicBool::new(false),
            reject_subscribe: AtomicBool::new(false),
            probe: Arc::new(EngineProbe::default()),
        }
    }

    /// An engine whose every `play` walks through `states`.
    pub fn with_script(states: impl IntoIterator<Item = EngineState>) -> Self {
        let engine = Self::new();
        engine.set_script(states);
        engine
    }

    /// Replace the script used by subsequent `play` calls.
    pub fn set_script(&self, states: impl IntoIterator<Item = EngineState>) {
        self.playback.lock().script = states.into_iter().collect();
    }

    /// Use `states` instead of the default script when `location` is played.
    pub fn set_script_for(&self, location: &str, states: impl IntoIterator<Item = EngineState>) {
        self.playback
            .lock()
            .scripts
            .insert(location.to_string(), states.into_iter().collect());
    }

    /// Force the current state, discarding the rest of the running script.
    pub fn set_state(&self, state: EngineState) {
        let mut playback = self.playback.lock();
        playback.remaining.clear();
        playback.current = state;
    }

    /// Make subsequent `play` calls fail.
    pub fn reject_play(&self, reject: bool) {
        self.reject_play.store(reject, Ordering::SeqCst);
    }

    /// Make subsequent `create_media` calls fail.
    pub fn reject_media(&self, reject: bool) {
        self.reject_media.store(reject, Ordering::SeqCst);
    }

    /// Make subsequent `subscribe` calls fail.
    pub fn reject_subscribe(&self, reject: bool) {
        self.reject_subscribe.store(reject, Ordering::SeqCst);
    }

    /// Raise an engine event to every listener on the calling thread.
    pub fn fire(&self, event: EngineEvent) {
        for (_, listener) in self.listeners.lock().iter() {
            listener(event);
        }
    }

    pub fn probe(&self) -> Arc<EngineProbe> {
        self.probe.clone()
    }
}

impl Default for ScriptedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaEngine for ScriptedEngine {
    type Media = ScriptedMedia;

    fn create_media(&self, location: &str) -> Result<ScriptedMedia> {
        if self.reject_media.load(Ordering::SeqCst) {
            return Err(PlayerError::Engine(format!("cannot open {location}")));
        }
        self.probe.media_created.fetch_add(1, Ordering::SeqCst);
        Ok(ScriptedMedia {
            location: location.to_string(),
            options: Vec::new(),
            probe: self.probe.clone(),
        })
    }

    fn play(&self, media: &ScriptedMedia) -> Result<()> {
        self.probe.plays.fetch_add(1, Ordering::SeqCst);
        *self.probe.last_location.lock() = Some(media.location.clone());
        *self.probe.last_options.lock() = media.options.clone();

        if self.reject_play.load(Ordering::SeqCst) {
            return Err(PlayerError::StartRejected(format!(
                "engine refused {}",
                media.location
            )));
        }

        let mut playback = self.playback.lock();
        let script = playback
            .scripts
            .get(&media.location)
            .unwrap_or(&playback.script)
            .clone();
        playback.remaining = script.into();
        playback.current = EngineState::Connecting;
        Ok(())
    }

    fn state(&self) -> EngineState {
        self.probe.state_polls.fetch_add(1, Ordering::SeqCst);
        let mut playback = self.playback.lock();
        if let Some(next) = playback.remaining.pop_front() {
            playback.current = next;
        }
        playback.current
    }

    fn stop(&self) {
        self.probe.stops.fetch_add(1, Ordering::SeqCst);
        let mut playback = self.playback.lock();
        playback.remaining.clear();
        playback.current = EngineState::Stopped;
    }

    fn subscribe(&self, listener: EventListener) -> Result<SubscriptionId> {
        if self.reject_subscribe.load(Ordering::SeqCst) {
            return Err(PlayerError::Engine("event subscription refused".to_string()));
        }
        let id = SubscriptionId(self.next_listener.fetch_add(1, Ordering::SeqCst));
        self.listeners.lock().push((id, listener));
        self.probe.listeners.fetch_add(1, Ordering::SeqCst);
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        let mut listeners = self.listeners.lock();
        if let Some(pos) = listeners.iter().position(|(lid, _)| *lid == id) {
            listeners.swap_remove(pos);
            self.probe.listeners.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for ScriptedEngine {
    fn drop(&mut self) {
        self.probe.engine_released.fetch_add(1, Ordering::SeqCst);
    }
}
