#![cfg(test)]

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;

use crate::cache::{CacheConfig, ContentCacheStore, Fetcher};
use crate::config::{NetworkConfig, PlaybackConfig};
use crate::models::ContentId;
use crate::player::{MediaPlayer, MediaSource, PlaybackContext, PlayerEvent, PlayerFactory};
use crate::utils::errors::PlayerError;

/// How players built by a [`MockPlayerFactory`] react to `load`
#[derive(Debug, Clone, Copy)]
pub enum MockBehavior {
    Succeed,
    /// The first `n` players fail, later ones succeed
    FailFirst(u32),
    AlwaysFail,
    /// Never reports readiness or failure
    Silent,
}

pub struct MockPlayer {
    events: mpsc::UnboundedSender<PlayerEvent>,
    fails: bool,
    silent: bool,
    stop_delay: Duration,
    loaded: Mutex<Option<MediaSource>>,
    position: Mutex<Duration>,
    pub looping: AtomicBool,
    pub playing: AtomicBool,
    pub stops: AtomicU32,
    pub position_reads: AtomicU32,
}

impl MockPlayer {
    pub fn loaded(&self) -> Option<MediaSource> {
        self.loaded.lock().unwrap().clone()
    }

    pub fn position_now(&self) -> Duration {
        *self.position.lock().unwrap()
    }

    /// Report an event as the backend would
    pub fn emit(&self, event: PlayerEvent) {
        let _ = self.events.send(event);
    }
}

impl MediaPlayer for MockPlayer {
    fn load(&self, source: &MediaSource) -> Result<(), PlayerError> {
        *self.loaded.lock().unwrap() = Some(source.clone());
        if self.silent {
            return Ok(());
        }
        let event = if self.fails {
            PlayerEvent::Failed("mock decode error".to_string())
        } else {
            PlayerEvent::Ready
        };
        let _ = self.events.send(event);
        Ok(())
    }

    fn play(&self) -> Result<(), PlayerError> {
        self.playing.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn pause(&self) -> Result<(), PlayerError> {
        self.playing.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn seek(&self, position: Duration) -> Result<(), PlayerError> {
        *self.position.lock().unwrap() = position;
        Ok(())
    }

    fn set_looping(&self, looping: bool) -> Result<(), PlayerError> {
        self.looping.store(looping, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) {
        self.playing.store(false, Ordering::SeqCst);
        self.stops.fetch_add(1, Ordering::SeqCst);
        if !self.stop_delay.is_zero() {
            std::thread::sleep(self.stop_delay);
        }
    }

    fn position(&self) -> Option<Duration> {
        self.position_reads.fetch_add(1, Ordering::SeqCst);
        Some(self.position_now())
    }

    fn duration(&self) -> Option<Duration> {
        Some(Duration::from_secs(30))
    }
}

/// Scripted player backend that records every player it builds
pub struct MockPlayerFactory {
    behavior: MockBehavior,
    stop_delay: Duration,
    players: Mutex<Vec<Arc<MockPlayer>>>,
}

impl MockPlayerFactory {
    pub fn new(behavior: MockBehavior) -> Arc<Self> {
        Self::with_stop_delay(behavior, Duration::ZERO)
    }

    /// Players whose `stop` blocks the calling thread for `stop_delay`
    pub fn with_stop_delay(behavior: MockBehavior, stop_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            stop_delay,
            players: Mutex::new(Vec::new()),
        })
    }

    pub fn created(&self) -> usize {
        self.players.lock().unwrap().len()
    }

    pub fn players(&self) -> Vec<Arc<MockPlayer>> {
        self.players.lock().unwrap().clone()
    }

    pub fn last_player(&self) -> Option<Arc<MockPlayer>> {
        self.players.lock().unwrap().last().cloned()
    }

    pub fn total_stops(&self) -> u32 {
        self.players()
            .iter()
            .map(|p| p.stops.load(Ordering::SeqCst))
            .sum()
    }
}

impl PlayerFactory for MockPlayerFactory {
    fn create(
        &self,
        _content_id: &ContentId,
        events: mpsc::UnboundedSender<PlayerEvent>,
    ) -> Result<Arc<dyn MediaPlayer>, PlayerError> {
        let mut players = self.players.lock().unwrap();
        let fails = match self.behavior {
            MockBehavior::Succeed | MockBehavior::Silent => false,
            MockBehavior::FailFirst(n) => (players.len() as u32) < n,
            MockBehavior::AlwaysFail => true,
        };
        let player = Arc::new(MockPlayer {
            events,
            fails,
            silent: matches!(self.behavior, MockBehavior::Silent),
            stop_delay: self.stop_delay,
            loaded: Mutex::new(None),
            position: Mutex::new(Duration::ZERO),
            looping: AtomicBool::new(false),
            playing: AtomicBool::new(false),
            stops: AtomicU32::new(0),
            position_reads: AtomicU32::new(0),
        });
        players.push(player.clone());
        Ok(player)
    }
}

/// Playback settings with delays short enough for tests
pub fn fast_playback_config() -> PlaybackConfig {
    PlaybackConfig {
        retry_delay_ms: 5,
        time_observer_interval_ms: 10,
        ..PlaybackConfig::default()
    }
}

/// Fetcher over a cache in `dir` that gives up after one attempt
pub fn test_fetcher(dir: &TempDir) -> Fetcher {
    let store = Arc::new(
        ContentCacheStore::open(&CacheConfig::with_directory(dir.path()))
            .expect("open test cache"),
    );
    let network = NetworkConfig {
        fetch_attempts: 1,
        fetch_retry_delay_ms: 5,
        progress_interval_ms: 0,
        ..NetworkConfig::default()
    };
    Fetcher::new(store, network).expect("build test fetcher")
}

pub fn test_context(
    dir: &TempDir,
    factory: Arc<MockPlayerFactory>,
    config: PlaybackConfig,
) -> PlaybackContext {
    PlaybackContext::new(test_fetcher(dir), factory, config)
}

/// Put `content_id` in the cache as if a download had finished
pub fn seed_cache(fetcher: &Fetcher, content_id: &ContentId) {
    std::fs::write(fetcher.store().path(content_id), b"cached media bytes").unwrap();
}

/// Poll `condition` until it holds or `max_wait` passes
pub async fn wait_for<F>(mut condition: F, max_wait: Duration) -> bool
where
    F: FnMut() -> bool,
{
    let start = tokio::time::Instant::now();

    while start.elapsed() < max_wait {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    condition()
}
