use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::Receiver;
use parking_lot::Mutex;

use crate::engine::{EngineEvent, EngineState, EventListener, Media, MediaEngine, SubscriptionId};
use crate::error::{PlayerError, Result};
use crate::events::{EventHub, Phase, PlayerEvent, Status};
use crate::options::{LocalTransport, MediaOption, RemoteTransport, transport_options};
use crate::session::poll::wait_for_connection;
use crate::session::{Attempt, Outcome};
use crate::source::{Source, SourceKind};

/// Timing and transport configuration for the controller.
#[derive(Debug, Clone)]
pub struct PlayerConfig {
    /// Delay between engine state polls while connecting.
    pub poll_interval: Duration,
    /// Polls allowed for `rtsp://` sources (60 × 100ms = 6s by default).
    pub remote_poll_budget: u32,
    /// Polls allowed for local files (30 × 100ms = 3s by default).
    pub local_poll_budget: u32,
    /// Wait before re-checking an Error state, to ride out transient errors.
    pub error_grace: Duration,
    /// Emit a progress status every this many polls (0 disables it).
    pub progress_every: u32,
    pub remote: RemoteTransport,
    pub local: LocalTransport,
    /// Options appended for every source kind.
    pub extra_options: Vec<MediaOption>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            remote_poll_budget: 60,
            local_poll_budget: 30,
            error_grace: Duration::from_millis(200),
            progress_every: 10,
            remote: RemoteTransport::default(),
            local: LocalTransport::default(),
            extra_options: Vec::new(),
        }
    }
}

impl PlayerConfig {
    pub fn poll_budget(&self, kind: SourceKind) -> u32 {
        match kind {
            SourceKind::RemoteStream => self.remote_poll_budget,
            SourceKind::LocalFile => self.local_poll_budget,
        }
    }
}

/// Playback session controller.
///
/// Owns the engine handle and at most one media handle. Status and errors
/// are published as [`PlayerEvent`]s on channels from [`events`](Self::events).
///
/// `play` and `stop` take `&self` and may be called from any thread; engine
/// play/stop and media replacement are serialized on the media slot.
pub struct Player<E: MediaEngine> {
    // Declared first so engine events are detached before anything else goes.
    subscription: Option<Subscription<E>>,
    shared: Option<Arc<Shared<E>>>,
}

struct Shared<E: MediaEngine> {
    engine: Arc<E>,
    config: PlayerConfig,
    hub: Arc<EventHub>,
    media: Mutex<Option<E::Media>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

/// Engine event subscription, detached on drop.
struct Subscription<E: MediaEngine> {
    engine: Arc<E>,
    id: SubscriptionId,
}

impl<E: MediaEngine> Drop for Subscription<E> {
    fn drop(&mut self) {
        self.engine.unsubscribe(self.id);
        tracing::debug!(id = self.id.0, "engine events detached");
    }
}

impl<E: MediaEngine> Player<E> {
    /// Take ownership of an engine and attach to its events.
    ///
    /// On failure the engine is released before returning.
    pub fn new(engine: E, config: PlayerConfig) -> Result<Self> {
        let engine = Arc::new(engine);
        let hub = Arc::new(EventHub::new());

        let id = engine.subscribe(relay(Arc::downgrade(&engine), hub.clone()))?;
        let subscription = Subscription {
            engine: engine.clone(),
            id,
        };

        tracing::debug!(?config, "player created");

        Ok(Self {
            subscription: Some(subscription),
            shared: Some(Arc::new(Shared {
                engine,
                config,
                hub,
                media: Mutex::new(None),
                workers: Mutex::new(Vec::new()),
            })),
        })
    }

    /// Start playing `source`, replacing whatever was playing before.
    ///
    /// Returns once the media is created and the connect worker is running.
    /// The returned [`Connect`] resolves when the engine is playing, the
    /// attempt fails, or it is superseded. Failures are always reported on
    /// the event channel; only unexpected ones (media creation, thread spawn)
    /// are also returned here.
    pub fn play(&self, source: &Source) -> Result<Connect> {
        let shared = self.shared.as_ref().ok_or(PlayerError::Disposed)?;
        let attempt = shared.hub.begin();
        let generation = attempt.generation;

        tracing::info!(generation, kind = %source.kind(), location = %source, "starting playback");

        {
            let mut slot = shared.media.lock();
            shared.engine.stop();
            if slot.take().is_some() {
                tracing::debug!(generation, "previous media released");
            }

            let mut media = match shared.engine.create_media(source.location()) {
                Ok(media) => media,
                Err(e) => return Err(shared.report(generation, e)),
            };
            for option in transport_options(source.kind(), &shared.config) {
                tracing::trace!(generation, %option, "media option");
                media.add_option(&option);
            }
            *slot = Some(media);
        }

        shared.hub.status(generation, Status::Connecting);

        let (tx, rx) = crossbeam_channel::bounded(1);
        let worker = shared.clone();
        let kind = source.kind();
        let spawned = thread::Builder::new()
            .name(format!("connect-{generation}"))
            .spawn(move || {
                let outcome = worker.connect(kind, &attempt);
                let _ = tx.send(outcome);
            });

        match spawned {
            Ok(handle) => shared.track(handle),
            Err(e) => return Err(shared.report(generation, e.into())),
        }

        Ok(Connect {
            generation,
            outcome: rx,
            hub: shared.hub.clone(),
        })
    }

    /// Stop playback and release the media handle. Emits `Stopped`.
    ///
    /// Cancels any in-flight connect attempt. Safe to call when idle.
    pub fn stop(&self) {
        let Some(shared) = self.shared.as_ref() else {
            return;
        };
        let generation = shared.hub.retire();
        shared.release_media(generation);
        shared.hub.status(generation, Status::Stopped);
        tracing::info!(generation, "playback stopped");
    }

    /// Detach engine events, stop, release the media and then the engine.
    ///
    /// Waits for connect workers to exit. Calling it again does nothing.
    pub fn dispose(&mut self) {
        drop(self.subscription.take());

        let Some(shared) = self.shared.take() else {
            return;
        };

        let generation = shared.hub.retire();
        shared.release_media(generation);

        let workers = std::mem::take(&mut *shared.workers.lock());
        for worker in workers {
            let name = worker.thread().name().unwrap_or("connect").to_string();
            if worker.join().is_err() {
                tracing::warn!(
                    generation,
                    worker = %name,
                    "connect worker panicked during teardown"
                );
            }
        }

        shared.hub.close();
        tracing::info!(generation, "player disposed");

        if Arc::strong_count(&shared) > 1 {
            tracing::warn!(generation, "player state still referenced after teardown");
        }
    }

    /// Subscribe to status and error notifications.
    ///
    /// After [`dispose`](Self::dispose) the receiver is already disconnected.
    pub fn events(&self) -> Receiver<PlayerEvent> {
        match self.shared.as_ref() {
            Some(shared) => shared.hub.subscribe(),
            None => crossbeam_channel::unbounded().1,
        }
    }

    /// Phase of the current generation; [`Phase::can_play`] drives the play control.
    pub fn phase(&self) -> Phase {
        self.shared
            .as_ref()
            .map_or(Phase::Idle, |shared| shared.hub.phase())
    }

    /// Generation of the most recent `play`/`stop`.
    pub fn generation(&self) -> u64 {
        self.shared
            .as_ref()
            .map_or(0, |shared| shared.hub.generation())
    }

    /// State as currently reported by the engine.
    pub fn engine_state(&self) -> EngineState {
        self.shared
            .as_ref()
            .map_or(EngineState::Idle, |shared| shared.engine.state())
    }

    /// The engine, until the player is disposed.
    pub fn engine(&self) -> Option<&E> {
        self.shared.as_ref().map(|shared| shared.engine.as_ref())
    }

    pub fn config(&self) -> Option<&PlayerConfig> {
        self.shared.as_ref().map(|shared| &shared.config)
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.is_none()
    }
}

impl<E: MediaEngine> Drop for Player<E> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<E: MediaEngine> Shared<E> {
    /// Worker body: start the engine on the current media, then poll.
    fn connect(&self, kind: SourceKind, attempt: &Attempt) -> Outcome {
        let generation = attempt.generation;
        {
            let slot = self.media.lock();
            if attempt.token.is_cancelled() {
                return Outcome::Cancelled;
            }
            let Some(media) = slot.as_ref() else {
                return Outcome::Cancelled;
            };
            if let Err(e) = self.engine.play(media) {
                let error = match e {
                    PlayerError::StartRejected(_) => e,
                    other => PlayerError::StartRejected(other.to_string()),
                };
                tracing::warn!(generation, %error, "engine rejected media");
                let error = Arc::new(error);
                self.hub.error(generation, error.clone());
                return Outcome::Failed(error);
            }
        }

        wait_for_connection(self.engine.as_ref(), kind, attempt, &self.config, &self.hub)
    }

    fn release_media(&self, generation: u64) {
        let mut slot = self.media.lock();
        self.engine.stop();
        if slot.take().is_some() {
            tracing::debug!(generation, "media released");
        }
    }

    fn track(&self, handle: JoinHandle<()>) {
        let mut workers = self.workers.lock();
        workers.retain(|worker| !worker.is_finished());
        workers.push(handle);
    }

    /// Publish an unexpected failure and hand it back for the caller.
    fn report(&self, generation: u64, error: PlayerError) -> PlayerError {
        tracing::error!(generation, %error, "playback could not start");
        self.hub.error(generation, Arc::new(error.mirror()));
        error
    }
}

/// Translate engine callbacks into player notifications.
///
/// Holds only a weak engine reference so the engine's listener list does not
/// keep the engine alive.
///
/// While a connect attempt is polling, the attempt reports the outcome and
/// engine callbacks are not forwarded.
fn relay<E: MediaEngine>(engine: Weak<E>, hub: Arc<EventHub>) -> EventListener {
    Box::new(move |event| {
        let status = match event {
            EngineEvent::EncounteredError => {
                let confirmed = engine
                    .upgrade()
                    .is_some_and(|engine| engine.state() == EngineState::Error);
                if confirmed {
                    hub.error_current(Arc::new(PlayerError::Stream(
                        "the video stream failed; check the URL and that the server is running"
                            .to_string(),
                    )));
                }
                return;
            }
            EngineEvent::EndReached => Status::Ended,
            EngineEvent::Stopped => Status::Stopped,
            EngineEvent::Playing => Status::Playing,
            EngineEvent::Buffering(percent) if percent < 100 => Status::Buffering {
                percent: Some(percent),
            },
            EngineEvent::Buffering(_) => return,
        };
        hub.status_current(status);
    })
}

/// Pending result of a [`Player::play`] call.
pub struct Connect {
    generation: u64,
    outcome: Receiver<Outcome>,
    hub: Arc<EventHub>,
}

impl Connect {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Block until the connect attempt finishes.
    ///
    /// Returns `Err(WorkerLost)`, after publishing it, if the worker died
    /// without reporting.
    pub fn wait(self) -> Result<Outcome> {
        match self.outcome.recv() {
            Ok(outcome) => Ok(outcome),
            Err(_) => {
                self.hub
                    .error(self.generation, Arc::new(PlayerError::WorkerLost));
                Err(PlayerError::WorkerLost)
            }
        }
    }

    /// Like [`wait`](Self::wait) but gives up after `timeout`, returning `None`.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Outcome> {
        self.outcome.recv_timeout(timeout).ok()
    }
}
