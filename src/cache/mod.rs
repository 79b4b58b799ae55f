pub mod config;
pub mod fetch;
pub mod stats;
pub mod storage;

pub use config::CacheConfig;
pub use fetch::{FetchStatus, FetchTask, FetchTaskHandle, Fetcher};
pub use stats::FetchStats;
pub use storage::{CacheEntry, CacheStats, ContentCacheStore};
