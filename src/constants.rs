// Playback and caching tuning constants.
// Defaults for the config file live here so tests and config agree.

use std::time::Duration;

// === Content cache ===
/// Extension given to every cached media file (`<cache-dir>/<content-id>.<ext>`)
pub const CACHE_FILE_EXTENSION: &str = "mp4";
/// Suffix marking an in-progress download that must never be read as complete
pub const PARTIAL_FILE_SUFFIX: &str = "part";

// === Network ===
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
pub const FETCH_ATTEMPTS: u32 = 3;
pub const FETCH_RETRY_DELAY: Duration = Duration::from_millis(500);
pub const FETCH_PROGRESS_INTERVAL: Duration = Duration::from_millis(250);

// === Playback ===
pub const DEFAULT_POOL_CAPACITY: usize = 5;
/// Retries before a resource gives up and reports a terminal failure
pub const MAX_PLAYBACK_RETRIES: u32 = 10;
pub const PLAYBACK_RETRY_DELAY: Duration = Duration::from_millis(300);
pub const TIME_OBSERVER_INTERVAL: Duration = Duration::from_millis(500);

// === Prefetch ===
// The item right after the current one is configured for playback directly,
// so the window starts two positions ahead.
pub const PREFETCH_SKIP_AHEAD: usize = 2;
pub const PREFETCH_LOOKAHEAD: usize = 4;
