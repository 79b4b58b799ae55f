//! Disk cache, prefetcher and bounded player pool behind a scrolling video feed.

pub mod cache;
pub mod config;
pub mod constants;
pub mod models;
pub mod player;
pub mod prefetch;
pub mod utils;

#[cfg(test)]
mod test_utils;

pub use cache::{ContentCacheStore, FetchTaskHandle, Fetcher};
pub use config::Config;
pub use models::{ContentId, FeedItem, PostId};
pub use player::{PlaybackResource, ResourcePool};
pub use prefetch::PrefetchScheduler;
