use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs as tokio_fs;
use tracing::{debug, info, warn};

use super::config::CacheConfig;
use crate::constants::PARTIAL_FILE_SUFFIX;
use crate::models::ContentId;

/// A completed file in the content cache
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub content_id: ContentId,
    pub file_path: PathBuf,
    pub size: u64,
    pub is_complete: bool,
    pub modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct CacheStats {
    pub total_size_bytes: u64,
    pub file_count: usize,
    pub cache_dir: PathBuf,
}

/// Maps content ids to files under one cache directory.
///
/// Files only appear under their final name through [`commit`](Self::commit),
/// a rename of a fully written partial file, so a reader that sees a file at
/// [`path`](Self::path) sees all of it.
#[derive(Debug)]
pub struct ContentCacheStore {
    cache_dir: PathBuf,
    extension: String,
}

impl ContentCacheStore {
    /// Open the store, creating the cache directory if needed
    pub fn open(config: &CacheConfig) -> Result<Self> {
        config.validate().context("Invalid cache configuration")?;
        let cache_dir = config.cache_directory()?;

        fs::create_dir_all(&cache_dir)
            .with_context(|| format!("Failed to create cache directory {:?}", cache_dir))?;

        let store = Self {
            cache_dir,
            extension: config.file_extension.clone(),
        };

        if config.sweep_partials_on_start {
            match store.sweep_partials() {
                Ok(0) => {}
                Ok(removed) => info!("Removed {} interrupted downloads", removed),
                Err(e) => warn!("Failed to sweep partial downloads: {}", e),
            }
        }

        let stats = store.stats();
        info!(
            "Content cache opened at {:?} with {} files ({} MB)",
            stats.cache_dir,
            stats.file_count,
            stats.total_size_bytes / 1024 / 1024
        );

        Ok(store)
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Deterministic location of the cached file for `content_id`.
    /// Says nothing about whether the file exists.
    pub fn path(&self, content_id: &ContentId) -> PathBuf {
        self.cache_dir
            .join(format!("{}.{}", content_id.file_stem(), self.extension))
    }

    /// Whether a completed, non-empty file exists for `content_id`
    pub fn exists(&self, content_id: &ContentId) -> bool {
        fs::metadata(self.path(content_id))
            .map(|meta| meta.is_file() && meta.len() > 0)
            .unwrap_or(false)
    }

    pub fn entry(&self, content_id: &ContentId) -> Option<CacheEntry> {
        let file_path = self.path(content_id);
        let meta = fs::metadata(&file_path).ok()?;
        if !meta.is_file() || meta.len() == 0 {
            return None;
        }

        Some(CacheEntry {
            content_id: content_id.clone(),
            file_path,
            size: meta.len(),
            is_complete: true,
            modified: meta.modified().ok().map(DateTime::<Utc>::from),
        })
    }

    /// A fresh partial-file path for one download attempt of `content_id`
    pub fn temp_path(&self, content_id: &ContentId) -> PathBuf {
        self.cache_dir.join(format!(
            "{}.{}.{}.{}",
            content_id.file_stem(),
            self.extension,
            uuid::Uuid::new_v4().simple(),
            PARTIAL_FILE_SUFFIX
        ))
    }

    /// Publish a fully written partial file under the final name
    pub async fn commit(&self, temp_path: &Path, content_id: &ContentId) -> io::Result<CacheEntry> {
        let size = tokio_fs::metadata(temp_path).await?.len();
        if size == 0 {
            let _ = tokio_fs::remove_file(temp_path).await;
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "downloaded file is empty",
            ));
        }

        let file_path = self.path(content_id);
        tokio_fs::rename(temp_path, &file_path).await?;
        debug!("Committed {} ({} bytes) to {:?}", content_id, size, file_path);

        Ok(CacheEntry {
            content_id: content_id.clone(),
            file_path,
            size,
            is_complete: true,
            modified: Some(Utc::now()),
        })
    }

    /// Drop a partial file after a failed or cancelled attempt
    pub async fn discard(&self, temp_path: &Path) {
        match tokio_fs::remove_file(temp_path).await {
            Ok(()) => debug!("Discarded partial download {:?}", temp_path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove partial download {:?}: {}", temp_path, e),
        }
    }

    /// Delete the cached file for `content_id`. Returns whether a file was removed.
    pub fn remove(&self, content_id: &ContentId) -> io::Result<bool> {
        match fs::remove_file(self.path(content_id)) {
            Ok(()) => {
                info!("Removed cached file for {}", content_id);
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Delete partial files left behind by interrupted runs
    pub fn sweep_partials(&self) -> io::Result<usize> {
        let mut removed = 0;
        for dir_entry in fs::read_dir(&self.cache_dir)? {
            let path = dir_entry?.path();
            let is_partial = path
                .extension()
                .is_some_and(|ext| ext == PARTIAL_FILE_SUFFIX);

            if is_partial && path.is_file() {
                match fs::remove_file(&path) {
                    Ok(()) => removed += 1,
                    Err(e) => warn!("Failed to remove stale partial {:?}: {}", path, e),
                }
            }
        }
        Ok(removed)
    }

    /// Every completed file in the cache directory
    pub fn list_entries(&self) -> Vec<CacheEntry> {
        let Ok(read_dir) = fs::read_dir(&self.cache_dir) else {
            return Vec::new();
        };

        read_dir
            .filter_map(|dir_entry| dir_entry.ok())
            .filter_map(|dir_entry| {
                let path = dir_entry.path();
                if path.extension()? != self.extension.as_str() {
                    return None;
                }
                let meta = dir_entry.metadata().ok()?;
                if !meta.is_file() || meta.len() == 0 {
                    return None;
                }
                let content_id = ContentId::from_file_stem(path.file_stem()?.to_str()?)?;

                Some(CacheEntry {
                    content_id,
                    size: meta.len(),
                    is_complete: true,
                    modified: meta.modified().ok().map(DateTime::<Utc>::from),
                    file_path: path,
                })
            })
            .collect()
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.list_entries();
        CacheStats {
            total_size_bytes: entries.iter().map(|e| e.size).sum(),
            file_count: entries.len(),
            cache_dir: self.cache_dir.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store() -> (TempDir, ContentCacheStore) {
        let dir = TempDir::new().unwrap();
        let store = ContentCacheStore::open(&CacheConfig::with_directory(dir.path())).unwrap();
        (dir, store)
    }

    #[test]
    fn test_path_layout() {
        let (dir, store) = open_store();
        let id = ContentId::new("post-1");
        assert_eq!(store.path(&id), dir.path().join("post-1.mp4"));
        assert_eq!(store.path(&id), store.path(&id));
    }

    #[test]
    fn test_exists_requires_non_empty_file() {
        let (_dir, store) = open_store();
        let id = ContentId::new("empty");
        assert!(!store.exists(&id));

        fs::write(store.path(&id), b"").unwrap();
        assert!(!store.exists(&id));
        assert!(store.entry(&id).is_none());

        fs::write(store.path(&id), b"video").unwrap();
        assert!(store.exists(&id));
        assert_eq!(store.entry(&id).unwrap().size, 5);
    }

    #[tokio::test]
    async fn test_partial_file_is_invisible_until_commit() {
        let (_dir, store) = open_store();
        let id = ContentId::new("clip");
        let temp = store.temp_path(&id);

        tokio_fs::write(&temp, b"partial bytes").await.unwrap();
        assert!(!store.exists(&id));
        assert!(store.list_entries().is_empty());

        let entry = store.commit(&temp, &id).await.unwrap();
        assert!(store.exists(&id));
        assert!(!temp.exists());
        assert_eq!(entry.size, 13);
        assert_eq!(store.stats().file_count, 1);
    }

    #[tokio::test]
    async fn test_commit_rejects_empty_download() {
        let (_dir, store) = open_store();
        let id = ContentId::new("zero");
        let temp = store.temp_path(&id);
        tokio_fs::write(&temp, b"").await.unwrap();

        let err = store.commit(&temp, &id).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(!temp.exists());
        assert!(!store.exists(&id));
    }

    #[test]
    fn test_temp_paths_are_unique_per_attempt() {
        let (_dir, store) = open_store();
        let id = ContentId::new("clip");
        assert_ne!(store.temp_path(&id), store.temp_path(&id));
    }

    #[test]
    fn test_sweep_removes_only_partials() {
        let dir = TempDir::new().unwrap();
        let config = CacheConfig::with_directory(dir.path());
        {
            let store = ContentCacheStore::open(&config).unwrap();
            let id = ContentId::new("kept");
            fs::write(store.path(&id), b"done").unwrap();
            fs::write(store.temp_path(&id), b"half").unwrap();
            fs::write(store.temp_path(&ContentId::new("other")), b"half").unwrap();
        }

        let store = ContentCacheStore::open(&config).unwrap();
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["kept.mp4".to_string()]);
        assert!(store.exists(&ContentId::new("kept")));
    }

    #[test]
    fn test_remove() {
        let (_dir, store) = open_store();
        let id = ContentId::new("gone");
        fs::write(store.path(&id), b"data").unwrap();

        assert!(store.remove(&id).unwrap());
        assert!(!store.exists(&id));
        assert!(!store.remove(&id).unwrap());
    }

    #[test]
    fn test_distinct_ids_never_share_a_file() {
        let (_dir, store) = open_store();
        let slash = ContentId::new("a/b");
        let colon = ContentId::new("a:b");
        let underscore = ContentId::new("a_b");

        assert_ne!(store.path(&slash), store.path(&colon));
        assert_ne!(store.path(&slash), store.path(&underscore));
        assert_ne!(store.path(&colon), store.path(&underscore));
        assert_eq!(store.path(&slash).parent(), Some(store.cache_dir()));

        fs::write(store.path(&underscore), b"data").unwrap();
        assert!(store.exists(&underscore));
        assert!(!store.exists(&slash));
        assert!(!store.exists(&colon));
    }

    #[test]
    fn test_entries_report_the_original_id() {
        let (_dir, store) = open_store();
        let id = ContentId::new("posts/42:v");
        fs::write(store.path(&id), b"data").unwrap();

        let entries = store.list_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].content_id, id);
    }
}
