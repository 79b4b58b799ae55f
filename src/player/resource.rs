use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, trace, warn};

use super::traits::{MediaPlayer, PlayerFactory};
use super::types::{MediaSource, PlaybackStatus, PlaybackTime, PlayerEvent};
use crate::cache::{Fetcher, FetchTaskHandle};
use crate::config::PlaybackConfig;
use crate::models::ContentId;
use crate::utils::errors::{FetchError, PlayerError};

/// Collaborators shared by every playback resource of a pool
#[derive(Clone)]
pub struct PlaybackContext {
    pub fetcher: Fetcher,
    pub factory: Arc<dyn PlayerFactory>,
    pub config: PlaybackConfig,
}

impl PlaybackContext {
    pub fn new(fetcher: Fetcher, factory: Arc<dyn PlayerFactory>, config: PlaybackConfig) -> Self {
        Self {
            fetcher,
            factory,
            config,
        }
    }
}

/// One player bound to one piece of content, plus its health and retry state.
///
/// Cheap to clone; clones drive the same player. A failing player is torn
/// down and rebuilt after `retry_delay`, at most `max_retries` times, after
/// which the resource stays in terminal failure until [`release`](Self::release).
#[derive(Clone)]
pub struct PlaybackResource {
    inner: Arc<ResourceInner>,
}

struct ResourceInner {
    content_id: ContentId,
    context: PlaybackContext,
    state: Mutex<ResourceState>,
    status: watch::Sender<PlaybackStatus>,
    time: watch::Sender<PlaybackTime>,
}

#[derive(Default)]
struct ResourceState {
    source_url: Option<String>,
    source: Option<MediaSource>,
    player: Option<Arc<dyn MediaPlayer>>,
    fetch: Option<FetchTaskHandle>,
    retries: u32,
    last_error: Option<PlayerError>,
    /// Set once the owning pool lets go; configure is refused from then on
    retired: bool,
    /// Bumped on every teardown so callbacks from an old player are ignored
    generation: u64,
    tasks: ResourceTasks,
}

#[derive(Default)]
struct ResourceTasks {
    events: Option<JoinHandle<()>>,
    fetch_watch: Option<JoinHandle<()>>,
    observer: Option<JoinHandle<()>>,
    retry: Option<JoinHandle<()>>,
}

impl ResourceTasks {
    fn abort_player_tasks(&mut self) {
        for task in [
            self.events.take(),
            self.fetch_watch.take(),
            self.observer.take(),
        ]
        .into_iter()
        .flatten()
        {
            task.abort();
        }
    }

    fn abort_all(&mut self) {
        self.abort_player_tasks();
        if let Some(retry) = self.retry.take() {
            retry.abort();
        }
    }
}

/// Things taken out of the state under the lock and shut down after it
#[derive(Default)]
struct Detached {
    player: Option<Arc<dyn MediaPlayer>>,
    fetch: Option<FetchTaskHandle>,
}

impl Detached {
    fn is_empty(&self) -> bool {
        self.player.is_none() && self.fetch.is_none()
    }

    fn shutdown(self) {
        if let Some(player) = self.player {
            player.stop();
        }
        if let Some(fetch) = self.fetch {
            fetch.cancel();
        }
    }
}

impl PlaybackResource {
    pub fn new(content_id: ContentId, context: PlaybackContext) -> Self {
        let (status, _) = watch::channel(PlaybackStatus::Unconfigured);
        let (time, _) = watch::channel(PlaybackTime::default());

        Self {
            inner: Arc::new(ResourceInner {
                content_id,
                context,
                state: Mutex::new(ResourceState::default()),
                status,
                time,
            }),
        }
    }

    pub fn content_id(&self) -> &ContentId {
        &self.inner.content_id
    }

    pub fn status(&self) -> PlaybackStatus {
        *self.inner.status.borrow()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<PlaybackStatus> {
        self.inner.status.subscribe()
    }

    pub fn time(&self) -> PlaybackTime {
        *self.inner.time.borrow()
    }

    /// Position samples for progress bars, published while the player is ready
    pub fn subscribe_time(&self) -> watch::Receiver<PlaybackTime> {
        self.inner.time.subscribe()
    }

    /// Retries used since the last release
    pub fn retry_count(&self) -> u32 {
        self.inner.state().retries
    }

    pub fn source(&self) -> Option<MediaSource> {
        self.inner.state().source.clone()
    }

    pub fn has_pending_retry(&self) -> bool {
        self.inner.state().tasks.retry.is_some()
    }

    pub fn is_observing_time(&self) -> bool {
        self.inner.state().tasks.observer.is_some()
    }

    /// Most recent failure since the last release. After the final retry
    /// this is [`PlayerError::Exhausted`].
    pub fn last_error(&self) -> Option<PlayerError> {
        self.inner.state().last_error.clone()
    }

    /// True once the pool has evicted or released this resource
    pub fn is_retired(&self) -> bool {
        self.inner.state().retired
    }

    /// Bind a player to `source_url`, from the cache when possible.
    ///
    /// Returns immediately; readiness is reported through the status stream.
    /// Calling again for the same url while configured, configuring or
    /// waiting to retry does nothing.
    pub fn configure(&self, source_url: &str) {
        let inner = &self.inner;
        let mut state = inner.state();
        let status = *inner.status.borrow();

        if state.retired {
            debug!("Not configuring {}: no longer pooled", inner.content_id);
            return;
        }

        if status.is_terminal() {
            debug!(
                "Not configuring {}: retries exhausted until released",
                inner.content_id
            );
            return;
        }

        let same_url = state.source_url.as_deref() == Some(source_url);
        if same_url && (state.player.is_some() || state.tasks.retry.is_some()) {
            trace!("{} already configured, ignoring", inner.content_id);
            return;
        }

        let mut previous = Detached::default();
        if !same_url && state.source_url.is_some() {
            debug!("Rebinding {} to {}", inner.content_id, source_url);
            state.tasks.abort_all();
            previous = inner.detach(&mut state);
            state.retries = 0;
        }

        state.source_url = Some(source_url.to_string());
        let failed = inner.attach(&mut state);
        drop(state);

        previous.shutdown();
        failed.shutdown();
    }

    pub fn play(&self) {
        self.inner
            .control("play", Some(PlaybackStatus::Playing), |player| player.play());
    }

    pub fn pause(&self) {
        self.inner
            .control("pause", Some(PlaybackStatus::Paused), |player| player.pause());
    }

    pub fn seek(&self, position: Duration) {
        self.inner.control("seek", None, |player| player.seek(position));
    }

    /// Seek to the start and play
    pub fn replay(&self) {
        self.inner
            .control("replay", Some(PlaybackStatus::Playing), |player| {
                player.seek(Duration::ZERO)?;
                player.play()
            });
    }

    /// Stop playback, free the player and cancel its download.
    ///
    /// Returns the resource to `Unconfigured`; further calls do nothing.
    pub fn release(&self) {
        let inner = &self.inner;
        let mut state = inner.state();

        let pending_retry = state.tasks.retry.is_some();
        state.generation += 1;
        state.tasks.abort_all();
        let detached = inner.detach(&mut state);
        let was_active = state.source_url.is_some() || pending_retry || !detached.is_empty();

        state.source_url = None;
        state.retries = 0;
        state.last_error = None;
        inner.set_status(PlaybackStatus::Unconfigured);
        inner.time.send_replace(PlaybackTime::default());
        drop(state);

        if was_active {
            info!("Released playback resource {}", inner.content_id);
        }
        detached.shutdown();
    }

    /// Release for good. Stale handles held after the pool dropped this
    /// resource can no longer start a player.
    pub(crate) fn retire(&self) {
        self.inner.state().retired = true;
        self.release();
    }
}

impl ResourceInner {
    fn state(&self) -> MutexGuard<'_, ResourceState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_status(&self, status: PlaybackStatus) {
        let previous = self.status.send_replace(status);
        if previous != status {
            trace!("{}: {:?} -> {:?}", self.content_id, previous, status);
        }
    }

    /// Take the player and its download out of the state
    fn detach(&self, state: &mut ResourceState) -> Detached {
        state.tasks.abort_player_tasks();
        state.source = None;
        Detached {
            player: state.player.take(),
            fetch: state.fetch.take(),
        }
    }

    /// Build a player for the current url; failures go through the retry path
    fn attach(self: &Arc<Self>, state: &mut ResourceState) -> Detached {
        let Some(source_url) = state.source_url.clone() else {
            return Detached::default();
        };

        state.generation += 1;
        let generation = state.generation;
        self.set_status(PlaybackStatus::Configuring);
        debug!(
            "Configuring {} (attempt {})",
            self.content_id,
            state.retries + 1
        );

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let player = match self.context.factory.create(&self.content_id, events_tx) {
            Ok(player) => player,
            Err(e) => return self.fail(state, generation, e),
        };

        let fetcher = &self.context.fetcher;
        let store = fetcher.store();
        let source = if store.exists(&self.content_id) {
            debug!("Playing {} from cache", self.content_id);
            MediaSource::LocalFile(store.path(&self.content_id))
        } else {
            debug!("Streaming {} while it downloads", self.content_id);
            let fetch = fetcher.start(self.content_id.clone(), &source_url);
            state.tasks.fetch_watch = Some(self.watch_fetch(generation, fetch.clone()));
            state.fetch = Some(fetch);
            MediaSource::Stream {
                url: source_url,
                cache_path: store.path(&self.content_id),
            }
        };

        state.player = Some(player.clone());
        state.source = Some(source.clone());
        state.tasks.events = Some(self.listen(generation, events_rx));

        if let Err(e) = player.load(&source).and_then(|_| player.set_looping(true)) {
            return self.fail(state, generation, e);
        }

        Detached::default()
    }

    /// Tear down the failed player and either schedule a retry or give up
    fn fail(self: &Arc<Self>, state: &mut ResourceState, generation: u64, cause: PlayerError) -> Detached {
        if state.generation != generation {
            return Detached::default();
        }

        warn!("Playback failed for {}: {}", self.content_id, cause);
        state.generation += 1;

        let purge = state.source.as_ref().is_some_and(MediaSource::is_local);
        state.tasks.abort_player_tasks();
        state.source = None;
        let mut detached = Detached {
            player: state.player.take(),
            fetch: None,
        };

        if purge {
            let store = self.context.fetcher.store();
            match store.remove(&self.content_id) {
                Ok(true) => info!("Purged unplayable cache entry for {}", self.content_id),
                Ok(false) => {}
                Err(e) => warn!("Failed to purge cache entry for {}: {}", self.content_id, e),
            }
        }

        let max_retries = self.context.config.max_retries;
        if state.retries < max_retries {
            state.retries += 1;
            self.set_status(PlaybackStatus::Failed { terminal: false });
            let delay = self.context.config.retry_delay();
            info!(
                "Retrying {} in {:?} ({}/{})",
                self.content_id, delay, state.retries, max_retries
            );
            state.tasks.retry = Some(self.schedule_retry(state.generation, delay));
            state.last_error = Some(cause);
        } else {
            self.set_status(PlaybackStatus::Failed { terminal: true });
            error!(
                "Giving up on {} after {} retries, last error: {}",
                self.content_id, state.retries, cause
            );
            detached.fetch = state.fetch.take();
            state.last_error = Some(PlayerError::Exhausted {
                attempts: state.retries + 1,
            });
        }

        detached
    }

    fn schedule_retry(self: &Arc<Self>, generation: u64, delay: Duration) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                inner.retry(generation);
            }
        })
    }

    fn retry(self: &Arc<Self>, generation: u64) {
        let mut state = self.state();
        if state.generation != generation {
            return;
        }
        // This task is the retry; dropping its handle just detaches it
        state.tasks.retry = None;
        let failed = self.attach(&mut state);
        drop(state);
        failed.shutdown();
    }

    /// Forward player events for one configuration attempt
    fn listen(
        self: &Arc<Self>,
        generation: u64,
        mut events: mpsc::UnboundedReceiver<PlayerEvent>,
    ) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                if !inner.handle_event(generation, event) {
                    break;
                }
            }
        })
    }

    /// Returns false once the event stream is no longer relevant
    fn handle_event(self: &Arc<Self>, generation: u64, event: PlayerEvent) -> bool {
        let mut state = self.state();
        if state.generation != generation {
            return false;
        }

        match event {
            PlayerEvent::Ready => {
                if *self.status.borrow() == PlaybackStatus::Configuring {
                    info!("Player ready for {}", self.content_id);
                    self.set_status(PlaybackStatus::Ready);
                    if let Some(player) = state.player.clone() {
                        state.tasks.observer = Some(self.observe_time(player));
                    }
                }
                true
            }
            PlayerEvent::Stalled => {
                warn!("Playback stalled for {}", self.content_id);
                true
            }
            PlayerEvent::Failed(reason) => {
                let failed = self.fail(&mut state, generation, PlayerError::Backend(reason));
                drop(state);
                failed.shutdown();
                false
            }
        }
    }

    /// A streaming player cannot outlive a failed download of its media
    fn watch_fetch(self: &Arc<Self>, generation: u64, fetch: FetchTaskHandle) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            let error = match fetch.wait().await {
                Ok(_) | Err(FetchError::Cancelled) => return,
                Err(e) => e,
            };
            let Some(inner) = weak.upgrade() else {
                return;
            };

            let mut state = inner.state();
            if *inner.status.borrow() != PlaybackStatus::Configuring {
                debug!(
                    "Download of {} failed after the player became ready: {}",
                    inner.content_id, error
                );
                return;
            }
            let failed = inner.fail(&mut state, generation, PlayerError::Fetch(error));
            drop(state);
            failed.shutdown();
        })
    }

    fn observe_time(self: &Arc<Self>, player: Arc<dyn MediaPlayer>) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        let period = self.context.config.time_observer_interval();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let sample = PlaybackTime {
                    position: player.position().unwrap_or_default(),
                    duration: player.duration(),
                };
                inner.time.send_if_modified(|current| {
                    let changed = *current != sample;
                    *current = sample;
                    changed
                });
            }
        })
    }

    fn control<F>(&self, action: &str, next: Option<PlaybackStatus>, command: F)
    where
        F: FnOnce(&dyn MediaPlayer) -> Result<(), PlayerError>,
    {
        let state = self.state();
        let status = *self.status.borrow();
        if !status.is_ready() {
            trace!(
                "Ignoring {} for {} while {:?}",
                action, self.content_id, status
            );
            return;
        }
        let Some(player) = state.player.as_deref() else {
            return;
        };

        match command(player) {
            Ok(()) => {
                if let Some(next) = next {
                    self.set_status(next);
                }
            }
            Err(e) => warn!("Failed to {} {}: {}", action, self.content_id, e),
        }
    }
}

impl Drop for ResourceInner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(|poisoned| poisoned.into_inner());
        state.tasks.abort_all();
        let detached = Detached {
            player: state.player.take(),
            fetch: state.fetch.take(),
        };
        if !detached.is_empty() {
            debug!("Dropping live playback resource {}", self.content_id);
        }
        detached.shutdown();
    }
}
