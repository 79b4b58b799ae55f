use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Counters shared by every fetch task of one [`Fetcher`](super::Fetcher)
#[derive(Debug, Clone)]
pub struct FetchStats {
    /// Tasks that went to the network
    pub fetches_started: Arc<AtomicU64>,
    pub fetches_completed: Arc<AtomicU64>,
    pub fetches_failed: Arc<AtomicU64>,
    pub fetches_cancelled: Arc<AtomicU64>,
    /// Starts answered from the cache without a download
    pub cache_hits: Arc<AtomicU64>,
    /// Starts that joined a task already in flight
    pub joined: Arc<AtomicU64>,
    pub total_bytes_downloaded: Arc<AtomicU64>,
    /// Start time for calculating uptime
    pub start_time: Instant,
}

impl Default for FetchStats {
    fn default() -> Self {
        Self::new()
    }
}

impl FetchStats {
    pub fn new() -> Self {
        Self {
            fetches_started: Arc::new(AtomicU64::new(0)),
            fetches_completed: Arc::new(AtomicU64::new(0)),
            fetches_failed: Arc::new(AtomicU64::new(0)),
            fetches_cancelled: Arc::new(AtomicU64::new(0)),
            cache_hits: Arc::new(AtomicU64::new(0)),
            joined: Arc::new(AtomicU64::new(0)),
            total_bytes_downloaded: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    pub fn increment_started(&self) {
        self.fetches_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_completed(&self) {
        self.fetches_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_failed(&self) {
        self.fetches_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_cancelled(&self) {
        self.fetches_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_joined(&self) {
        self.joined.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_bytes_downloaded(&self, bytes: u64) {
        self.total_bytes_downloaded
            .fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn started(&self) -> u64 {
        self.fetches_started.load(Ordering::Relaxed)
    }

    pub fn completed(&self) -> u64 {
        self.fetches_completed.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.fetches_failed.load(Ordering::Relaxed)
    }

    pub fn format_report(&self, active: usize) -> String {
        let uptime_secs = self.start_time.elapsed().as_secs();
        let minutes = uptime_secs / 60;
        let seconds = uptime_secs % 60;

        let total_mb =
            self.total_bytes_downloaded.load(Ordering::Relaxed) as f64 / (1024.0 * 1024.0);

        let mut report = format!(
            "📊 Fetch Stats [{}m {}s] | Started: {} | Completed: {} | Failed: {} | Cancelled: {} | Cache hits: {} | Total: {:.1} MB",
            minutes,
            seconds,
            self.started(),
            self.completed(),
            self.failed(),
            self.fetches_cancelled.load(Ordering::Relaxed),
            self.cache_hits.load(Ordering::Relaxed),
            total_mb,
        );

        if active > 0 {
            report.push_str(&format!(" | Active: {}", active));
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_are_shared_between_clones() {
        let stats = FetchStats::new();
        let clone = stats.clone();

        clone.increment_started();
        clone.increment_completed();
        clone.add_bytes_downloaded(2 * 1024 * 1024);

        assert_eq!(stats.started(), 1);
        assert_eq!(stats.completed(), 1);
        assert!(stats.format_report(0).contains("Total: 2.0 MB"));
        assert!(stats.format_report(3).ends_with("Active: 3"));
    }
}
