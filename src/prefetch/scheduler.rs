use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

use super::image::ImagePrefetcher;
use crate::cache::{FetchTaskHandle, Fetcher};
use crate::config::PrefetchConfig;
use crate::models::{ContentId, FeedItem, PostId};

/// What one prefetch pass did
#[derive(Debug, Clone, Default)]
pub struct PrefetchReport {
    /// Videos handed to the fetcher, in feed order
    pub scheduled: Vec<ContentId>,
    pub skipped_cached: Vec<ContentId>,
    pub skipped_in_flight: Vec<ContentId>,
    pub image_urls: Vec<String>,
    /// Handles for the scheduled downloads
    pub tasks: Vec<FetchTaskHandle>,
}

impl PrefetchReport {
    pub fn is_empty(&self) -> bool {
        self.scheduled.is_empty()
            && self.skipped_cached.is_empty()
            && self.skipped_in_flight.is_empty()
            && self.image_urls.is_empty()
    }
}

/// Feed items from `skip_ahead` to `skip_ahead + lookahead` positions past
/// `current`, clamped to the feed. Empty when `current` is not in the feed.
pub fn prefetch_window<'a>(
    feed: &'a [FeedItem],
    current: &PostId,
    skip_ahead: usize,
    lookahead: usize,
) -> &'a [FeedItem] {
    let Some(index) = feed.iter().position(|item| &item.id == current) else {
        return &[];
    };

    let start = index.saturating_add(skip_ahead).min(feed.len());
    let end = start.saturating_add(lookahead).min(feed.len());
    &feed[start..end]
}

/// Downloads upcoming feed videos into the cache ahead of the scroll position
pub struct PrefetchScheduler {
    fetcher: Fetcher,
    images: Arc<dyn ImagePrefetcher>,
    config: PrefetchConfig,
    permits: Arc<Semaphore>,
}

impl PrefetchScheduler {
    pub fn new(fetcher: Fetcher, images: Arc<dyn ImagePrefetcher>, config: PrefetchConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.concurrency().max(1)));

        Self {
            fetcher,
            images,
            config,
            permits,
        }
    }

    /// Plan and start prefetches for the window after `current`.
    ///
    /// Returns at once; the pass runs on the runtime and its handle resolves
    /// once every planned download has been started. Downloads beyond the
    /// concurrency cap wait for a running one to finish.
    pub fn schedule_prefetch(&self, current: &PostId, feed: &[FeedItem]) -> JoinHandle<PrefetchReport> {
        let window = if self.config.enabled {
            prefetch_window(feed, current, self.config.skip_ahead, self.config.lookahead).to_vec()
        } else {
            trace!("Prefetch disabled");
            Vec::new()
        };

        let fetcher = self.fetcher.clone();
        let images = self.images.clone();
        let permits = self.permits.clone();
        let current = current.clone();

        tokio::spawn(async move {
            let mut report = PrefetchReport::default();
            if window.is_empty() {
                return report;
            }

            for item in &window {
                report.image_urls.extend(item.image_urls());

                for video in item.videos() {
                    if fetcher.store().exists(&video.content_id) {
                        trace!("{} already cached", video.content_id);
                        report.skipped_cached.push(video.content_id);
                        continue;
                    }
                    if fetcher.is_fetching(&video.content_id) {
                        trace!("{} already downloading", video.content_id);
                        report.skipped_in_flight.push(video.content_id);
                        continue;
                    }

                    let Ok(permit) = permits.clone().acquire_owned().await else {
                        break;
                    };
                    let handle = fetcher.start(video.content_id.clone(), &video.url);
                    let running = handle.clone();
                    tokio::spawn(async move {
                        let _ = running.wait().await;
                        drop(permit);
                    });

                    debug!("Prefetching {}", video.content_id);
                    report.scheduled.push(video.content_id);
                    report.tasks.push(handle);
                }
            }

            if !report.image_urls.is_empty() {
                images.prefetch(report.image_urls.clone()).await;
            }

            info!(
                "Prefetch after {}: {} scheduled, {} cached, {} in flight, {} images",
                current,
                report.scheduled.len(),
                report.skipped_cached.len(),
                report.skipped_in_flight.len(),
                report.image_urls.len()
            );
            report
        })
    }
}
