use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::cache::CacheConfig;
use crate::constants::{
    DEFAULT_POOL_CAPACITY, FETCH_ATTEMPTS, FETCH_PROGRESS_INTERVAL, FETCH_RETRY_DELAY,
    MAX_PLAYBACK_RETRIES, PLAYBACK_RETRY_DELAY, PREFETCH_LOOKAHEAD, PREFETCH_SKIP_AHEAD,
    REQUEST_TIMEOUT, TIME_OBSERVER_INTERVAL,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub playback: PlaybackConfig,

    #[serde(default)]
    pub prefetch: PrefetchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Connect and per-read timeout; a slow but steady download never times out
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Attempts per fetch task for transient network failures
    #[serde(default = "default_fetch_attempts")]
    pub fetch_attempts: u32,

    #[serde(default = "default_fetch_retry_delay")]
    pub fetch_retry_delay_ms: u64,

    /// Minimum spacing between progress updates of one fetch
    #[serde(default = "default_progress_interval")]
    pub progress_interval_ms: u64,
}

/// Which pooled resource to evict when the pool is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionPolicy {
    /// Oldest insertion goes first; lookups do not refresh an entry
    #[default]
    OldestInserted,
    /// Every lookup refreshes the entry it hits
    LeastRecentlyUsed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    #[serde(default = "default_pool_capacity")]
    pub pool_capacity: usize,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_time_observer_interval")]
    pub time_observer_interval_ms: u64,

    #[serde(default)]
    pub eviction: EvictionPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrefetchConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Positions after the current item left to the playback path
    #[serde(default = "default_skip_ahead")]
    pub skip_ahead: usize,

    /// Feed positions downloaded ahead, starting at `skip_ahead`
    #[serde(default = "default_lookahead")]
    pub lookahead: usize,

    /// Cap on concurrent prefetch downloads; defaults to `lookahead`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrent_fetches: Option<usize>,
}

impl Config {
    /// Load the user config, writing defaults on first run
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            info!("No config file found, using defaults");
            let config = Config::default();
            config.save_to(&config_path)?;
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", path);
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;
        config.validate()?;
        info!("Config loaded successfully");
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure config directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, contents).context("Failed to write config file")?;

        debug!("Config saved to {:?}", path);
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.cache.validate()?;

        if self.network.request_timeout_secs == 0 {
            return Err(anyhow::anyhow!("network.request_timeout_secs must be greater than 0"));
        }

        if self.network.fetch_attempts == 0 {
            return Err(anyhow::anyhow!("network.fetch_attempts must be greater than 0"));
        }

        if self.playback.pool_capacity == 0 {
            return Err(anyhow::anyhow!("playback.pool_capacity must be greater than 0"));
        }

        if self.playback.time_observer_interval_ms == 0 {
            return Err(anyhow::anyhow!(
                "playback.time_observer_interval_ms must be greater than 0"
            ));
        }

        if self.prefetch.lookahead == 0 {
            return Err(anyhow::anyhow!("prefetch.lookahead must be greater than 0"));
        }

        if self.prefetch.max_concurrent_fetches == Some(0) {
            return Err(anyhow::anyhow!(
                "prefetch.max_concurrent_fetches must be greater than 0"
            ));
        }

        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Failed to get config directory")?;
        Ok(config_dir.join("reelfeed").join("config.toml"))
    }
}

impl NetworkConfig {
    /// Never zero, which reqwest would treat as an instant timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn fetch_retry_delay(&self) -> Duration {
        Duration::from_millis(self.fetch_retry_delay_ms)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }
}

impl PlaybackConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Never zero; `tokio::time::interval` rejects a zero period
    pub fn time_observer_interval(&self) -> Duration {
        Duration::from_millis(self.time_observer_interval_ms.max(1))
    }
}

impl PrefetchConfig {
    pub fn concurrency(&self) -> usize {
        self.max_concurrent_fetches.unwrap_or(self.lookahead).max(1)
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
            fetch_attempts: default_fetch_attempts(),
            fetch_retry_delay_ms: default_fetch_retry_delay(),
            progress_interval_ms: default_progress_interval(),
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            pool_capacity: default_pool_capacity(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay(),
            time_observer_interval_ms: default_time_observer_interval(),
            eviction: EvictionPolicy::default(),
        }
    }
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            skip_ahead: default_skip_ahead(),
            lookahead: default_lookahead(),
            max_concurrent_fetches: None,
        }
    }
}

// Default value functions
fn default_true() -> bool { true }
fn default_request_timeout() -> u64 { REQUEST_TIMEOUT.as_secs() }
fn default_fetch_attempts() -> u32 { FETCH_ATTEMPTS }
fn default_fetch_retry_delay() -> u64 { FETCH_RETRY_DELAY.as_millis() as u64 }
fn default_progress_interval() -> u64 { FETCH_PROGRESS_INTERVAL.as_millis() as u64 }
fn default_pool_capacity() -> usize { DEFAULT_POOL_CAPACITY }
fn default_max_retries() -> u32 { MAX_PLAYBACK_RETRIES }
fn default_retry_delay() -> u64 { PLAYBACK_RETRY_DELAY.as_millis() as u64 }
fn default_time_observer_interval() -> u64 { TIME_OBSERVER_INTERVAL.as_millis() as u64 }
fn default_skip_ahead() -> usize { PREFETCH_SKIP_AHEAD }
fn default_lookahead() -> usize { PREFETCH_LOOKAHEAD }
