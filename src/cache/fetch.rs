use anyhow::{Context, Result};
use futures::StreamExt;
use reqwest::Client;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

use super::stats::FetchStats;
use super::storage::ContentCacheStore;
use crate::config::NetworkConfig;
use crate::models::ContentId;
use crate::utils::errors::FetchError;

/// Lifecycle of one fetch task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStatus {
    Pending,
    Downloading,
    Completed,
    Failed(FetchError),
}

impl FetchStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed(_))
    }
}

/// Observable record of a fetch task
#[derive(Debug, Clone)]
pub struct FetchTask {
    pub content_id: ContentId,
    pub source_url: String,
    pub target_path: PathBuf,
    pub status: FetchStatus,
    pub bytes_downloaded: u64,
    pub bytes_expected: Option<u64>,
    /// Attempts used beyond the first
    pub retry_count: u32,
}

impl FetchTask {
    fn new(content_id: ContentId, source_url: String, target_path: PathBuf) -> Self {
        Self {
            content_id,
            source_url,
            target_path,
            status: FetchStatus::Pending,
            bytes_downloaded: 0,
            bytes_expected: None,
            retry_count: 0,
        }
    }

    /// Download progress as a fraction (0.0 to 1.0)
    pub fn progress(&self) -> f64 {
        if self.status == FetchStatus::Completed {
            return 1.0;
        }
        match self.bytes_expected {
            Some(total) if total > 0 => self.bytes_downloaded as f64 / total as f64,
            _ => 0.0,
        }
    }

    fn outcome(&self) -> Option<Result<PathBuf, FetchError>> {
        match &self.status {
            FetchStatus::Completed => Some(Ok(self.target_path.clone())),
            FetchStatus::Failed(e) => Some(Err(e.clone())),
            FetchStatus::Pending | FetchStatus::Downloading => None,
        }
    }
}

/// Handle to an in-flight or finished fetch task.
///
/// Clones observe the same task. Progress is a watch stream of [`FetchTask`]
/// snapshots; the terminal snapshot is the completion and is observed once
/// per waiter.
#[derive(Debug, Clone)]
pub struct FetchTaskHandle {
    content_id: ContentId,
    state: watch::Receiver<FetchTask>,
    cancel: CancellationToken,
}

impl FetchTaskHandle {
    pub fn content_id(&self) -> &ContentId {
        &self.content_id
    }

    pub fn snapshot(&self) -> FetchTask {
        self.state.borrow().clone()
    }

    /// Progress stream for this task
    pub fn subscribe(&self) -> watch::Receiver<FetchTask> {
        self.state.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.state.borrow().status.is_finished()
    }

    /// Wait for the task to finish with the final cache path or the failure
    pub async fn wait(&self) -> Result<PathBuf, FetchError> {
        let mut state = self.state.clone();
        if let Ok(task) = state.wait_for(|task| task.status.is_finished()).await {
            if let Some(outcome) = task.outcome() {
                return outcome;
            }
        }
        // The task publishes its outcome before dropping the sender
        let outcome = self.state.borrow().outcome();
        outcome.unwrap_or(Err(FetchError::Cancelled))
    }

    /// Run `callback` exactly once with the outcome of this task
    pub fn on_complete<F>(&self, callback: F) -> JoinHandle<()>
    where
        F: FnOnce(Result<PathBuf, FetchError>) + Send + 'static,
    {
        let handle = self.clone();
        tokio::spawn(async move {
            let outcome = handle.wait().await;
            callback(outcome);
        })
    }

    /// Best-effort cancellation; a no-op once the task has finished
    pub fn cancel(&self) {
        if !self.is_finished() {
            debug!("Cancelling fetch for {}", self.content_id);
            self.cancel.cancel();
        }
    }

    pub fn same_task(&self, other: &FetchTaskHandle) -> bool {
        self.state.same_channel(&other.state)
    }
}

/// Starts downloads into the content cache.
///
/// At most one task runs per content id: starting an id that is already in
/// flight returns a handle to the running task, and starting an id that is
/// already cached finishes immediately without touching the network.
#[derive(Debug, Clone)]
pub struct Fetcher {
    inner: Arc<FetcherInner>,
}

#[derive(Debug)]
struct FetcherInner {
    client: Client,
    store: Arc<ContentCacheStore>,
    network: NetworkConfig,
    stats: FetchStats,
    active: Mutex<HashMap<ContentId, FetchTaskHandle>>,
}

impl Fetcher {
    pub fn new(store: Arc<ContentCacheStore>, network: NetworkConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(network.request_timeout())
            .read_timeout(network.request_timeout())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            inner: Arc::new(FetcherInner {
                client,
                store,
                network,
                stats: FetchStats::new(),
                active: Mutex::new(HashMap::new()),
            }),
        })
    }

    pub fn store(&self) -> &Arc<ContentCacheStore> {
        &self.inner.store
    }

    pub fn stats(&self) -> &FetchStats {
        &self.inner.stats
    }

    /// Whether a download for `content_id` is running right now
    pub fn is_fetching(&self, content_id: &ContentId) -> bool {
        self.inner
            .active()
            .get(content_id)
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Handles of every running download
    pub fn active_tasks(&self) -> Vec<FetchTaskHandle> {
        self.inner.active().values().cloned().collect()
    }

    /// Begin downloading `source_url` into the cache slot of `content_id`.
    ///
    /// Returns immediately; must be called from within a tokio runtime.
    pub fn start(&self, content_id: ContentId, source_url: &str) -> FetchTaskHandle {
        let store = &self.inner.store;
        let target_path = store.path(&content_id);
        let mut active = self.inner.active();

        if let Some(existing) = active.get(&content_id) {
            if !existing.is_finished() {
                debug!("Joining in-flight fetch for {}", content_id);
                self.inner.stats.increment_joined();
                return existing.clone();
            }
        }

        let mut task = FetchTask::new(content_id.clone(), source_url.to_string(), target_path);

        if let Some(entry) = store.entry(&content_id) {
            debug!("Fetch for {} satisfied from cache", content_id);
            self.inner.stats.increment_cache_hit();
            task.status = FetchStatus::Completed;
            task.bytes_downloaded = entry.size;
            task.bytes_expected = Some(entry.size);
            let (_, state) = watch::channel(task);
            return FetchTaskHandle {
                content_id,
                state,
                cancel: CancellationToken::new(),
            };
        }

        let (sender, state) = watch::channel(task);
        let cancel = CancellationToken::new();
        let handle = FetchTaskHandle {
            content_id: content_id.clone(),
            state,
            cancel: cancel.clone(),
        };
        active.insert(content_id.clone(), handle.clone());
        drop(active);

        self.inner.stats.increment_started();
        info!("Starting fetch for {} from {}", content_id, source_url);

        let inner = self.inner.clone();
        let url = source_url.to_string();
        let registered = handle.clone();
        tokio::spawn(async move {
            let result = inner.run(&content_id, &url, &sender, &cancel).await;

            // Unregister before publishing so a new start sees the committed file
            {
                let mut active = inner.active();
                if active
                    .get(&content_id)
                    .is_some_and(|current| current.same_task(&registered))
                {
                    active.remove(&content_id);
                }
            }

            match result {
                Ok(path) => {
                    inner.stats.increment_completed();
                    info!("✅ Fetch completed for {} at {:?}", content_id, path);
                    sender.send_modify(|task| task.status = FetchStatus::Completed);
                }
                Err(FetchError::Cancelled) => {
                    inner.stats.increment_cancelled();
                    info!("Fetch cancelled for {}", content_id);
                    sender.send_modify(|task| task.status = FetchStatus::Failed(FetchError::Cancelled));
                }
                Err(e) => {
                    inner.stats.increment_failed();
                    error!("❌ Fetch failed for {}: {}", content_id, e);
                    sender.send_modify(|task| task.status = FetchStatus::Failed(e));
                }
            }
        });

        handle
    }
}

impl FetcherInner {
    fn active(&self) -> MutexGuard<'_, HashMap<ContentId, FetchTaskHandle>> {
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Download with retries for transient failures
    async fn run(
        &self,
        content_id: &ContentId,
        source_url: &str,
        sender: &watch::Sender<FetchTask>,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, FetchError> {
        let url = parse_source_url(source_url)?;
        let max_attempts = self.network.fetch_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            sender.send_modify(|task| task.retry_count = attempt - 1);

            match self.download_once(content_id, &url, sender, cancel).await {
                Ok(path) => {
                    if attempt > 1 {
                        info!(
                            "Fetched {} after {} attempts",
                            content_id, attempt
                        );
                    }
                    return Ok(path);
                }
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    let delay = self.network.fetch_retry_delay();
                    warn!(
                        "Attempt {} failed for {}: {}. Retrying in {:?}...",
                        attempt, content_id, e, delay
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// One attempt: stream into a fresh partial file, then commit it
    async fn download_once(
        &self,
        content_id: &ContentId,
        url: &Url,
        sender: &watch::Sender<FetchTask>,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, FetchError> {
        let temp_path = self.store.temp_path(content_id);

        match self
            .stream_to_file(content_id, url, &temp_path, sender, cancel)
            .await
        {
            Ok(()) => {
                let entry = self.store.commit(&temp_path, content_id).await?;
                Ok(entry.file_path)
            }
            Err(e) => {
                self.store.discard(&temp_path).await;
                Err(e)
            }
        }
    }

    async fn stream_to_file(
        &self,
        content_id: &ContentId,
        url: &Url,
        temp_path: &Path,
        sender: &watch::Sender<FetchTask>,
        cancel: &CancellationToken,
    ) -> Result<(), FetchError> {
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FetchError::Cancelled),
            response = self.client.get(url.clone()).send() => response?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let bytes_expected = response.content_length();
        debug!(
            "Downloading {} ({:?} bytes) to {:?}",
            content_id, bytes_expected, temp_path
        );
        sender.send_modify(|task| {
            task.status = FetchStatus::Downloading;
            task.bytes_downloaded = 0;
            task.bytes_expected = bytes_expected;
        });

        let mut file = tokio::fs::File::create(temp_path).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;
        let mut last_progress_update = Instant::now();
        let progress_interval = self.network.progress_interval();

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                next = stream.next() => next,
            };
            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk?;

            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
            self.stats.add_bytes_downloaded(chunk.len() as u64);

            if last_progress_update.elapsed() >= progress_interval {
                sender.send_modify(|task| task.bytes_downloaded = written);
                last_progress_update = Instant::now();
            }
        }

        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        sender.send_modify(|task| task.bytes_downloaded = written);

        if let Some(expected) = bytes_expected {
            if written != expected {
                return Err(FetchError::Network(format!(
                    "response ended after {} of {} bytes",
                    written, expected
                )));
            }
        }

        Ok(())
    }
}

fn parse_source_url(source_url: &str) -> Result<Url, FetchError> {
    let url = Url::parse(source_url).map_err(|e| FetchError::InvalidUrl {
        url: source_url.to_string(),
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(FetchError::InvalidUrl {
            url: source_url.to_string(),
            reason: format!("unsupported scheme {}", scheme),
        }),
    }
}
