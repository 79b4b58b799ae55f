use anyhow::{Context, Result, bail};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use reelfeed::cache::{ContentCacheStore, Fetcher};
use reelfeed::config::Config;
use reelfeed::models::{FeedItem, PostId};
use reelfeed::prefetch::{LoggingImagePrefetcher, PrefetchScheduler};

const USAGE: &str = "usage: reelfeed <feed.json> [current-post-id]";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("reelfeed=debug")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let Some(feed_path) = args.next() else {
        bail!(USAGE);
    };
    let current = args.next().map(PostId::from);

    let config = Config::load()?;

    let feed_json = std::fs::read_to_string(&feed_path)
        .with_context(|| format!("Failed to read feed {}", feed_path))?;
    let feed: Vec<FeedItem> =
        serde_json::from_str(&feed_json).with_context(|| format!("Failed to parse feed {}", feed_path))?;

    let Some(first) = feed.first() else {
        info!("Feed {} is empty, nothing to warm", feed_path);
        return Ok(());
    };
    let current = current.unwrap_or_else(|| first.id.clone());
    info!(
        "Warming cache for {} items after {} ({} in feed)",
        config.prefetch.lookahead,
        current,
        feed.len()
    );

    let store = Arc::new(ContentCacheStore::open(&config.cache)?);
    let fetcher = Fetcher::new(store.clone(), config.network.clone())?;
    let scheduler = PrefetchScheduler::new(
        fetcher.clone(),
        Arc::new(LoggingImagePrefetcher::new()),
        config.prefetch.clone(),
    );

    let report = scheduler
        .schedule_prefetch(&current, &feed)
        .await
        .context("Prefetch pass aborted")?;

    let mut failed = 0;
    for task in &report.tasks {
        if let Err(e) = task.wait().await {
            warn!("Could not cache {}: {}", task.content_id(), e);
            failed += 1;
        }
    }

    info!("{}", fetcher.stats().format_report(fetcher.active_tasks().len()));
    let stats = store.stats();
    info!(
        "Cache at {:?}: {} files, {} MB ({} failed this run)",
        stats.cache_dir,
        stats.file_count,
        stats.total_size_bytes / 1024 / 1024,
        failed
    );

    Ok(())
}
