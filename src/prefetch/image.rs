use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// Port to the image cache that warms photo and profile images
#[async_trait]
pub trait ImagePrefetcher: Send + Sync {
    async fn prefetch(&self, urls: Vec<String>);
}

/// Stand-in that only logs what it was asked to warm
#[derive(Debug, Default)]
pub struct LoggingImagePrefetcher {
    requested: AtomicUsize,
}

impl LoggingImagePrefetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Image urls received so far
    pub fn requested(&self) -> usize {
        self.requested.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ImagePrefetcher for LoggingImagePrefetcher {
    async fn prefetch(&self, urls: Vec<String>) {
        self.requested.fetch_add(urls.len(), Ordering::Relaxed);
        for url in &urls {
            debug!("Image prefetch requested for {}", url);
        }
    }
}
