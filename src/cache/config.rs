use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::constants::CACHE_FILE_EXTENSION;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory to store cached media files
    pub cache_directory: Option<PathBuf>,

    /// Extension of every cached file, without the leading dot
    pub file_extension: String,

    /// Remove leftover partial downloads when the store opens
    pub sweep_partials_on_start: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_directory: None, // Will be set to platform-specific default
            file_extension: CACHE_FILE_EXTENSION.to_string(),
            sweep_partials_on_start: true,
        }
    }
}

impl CacheConfig {
    /// Config rooted at an explicit directory
    pub fn with_directory(dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_directory: Some(dir.into()),
            ..Self::default()
        }
    }

    /// Get the cache directory path, using platform-specific defaults if not set
    pub fn cache_directory(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.cache_directory {
            Ok(dir.clone())
        } else {
            Self::default_cache_directory()
        }
    }

    /// Get platform-specific default cache directory
    pub fn default_cache_directory() -> Result<PathBuf> {
        #[cfg(target_os = "macos")]
        {
            // On macOS, use ~/Library/Caches/ReelFeed/media
            let cache_dir = dirs::cache_dir()
                .or_else(|| dirs::home_dir().map(|h| h.join("Library/Caches")))
                .ok_or_else(|| anyhow::anyhow!("Failed to get cache directory"))?;
            Ok(cache_dir.join("ReelFeed").join("media"))
        }
        #[cfg(not(target_os = "macos"))]
        {
            // On Linux and other platforms, use ~/.cache/reelfeed/media/
            let cache_dir = dirs::cache_dir()
                .ok_or_else(|| anyhow::anyhow!("Failed to get cache directory"))?;
            Ok(cache_dir.join("reelfeed").join("media"))
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let ext = self.file_extension.as_str();
        if ext.is_empty() {
            return Err(anyhow::anyhow!("file_extension must not be empty"));
        }

        if ext.starts_with('.') || ext.contains(['/', '\\']) {
            return Err(anyhow::anyhow!(
                "file_extension must be a bare extension like \"mp4\", got {:?}",
                ext
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.file_extension, "mp4");
        assert!(config.sweep_partials_on_start);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_explicit_directory_wins() {
        let config = CacheConfig::with_directory("/tmp/feed-cache");
        assert_eq!(
            config.cache_directory().unwrap(),
            PathBuf::from("/tmp/feed-cache")
        );
    }

    #[test]
    fn test_rejects_bad_extensions() {
        let mut config = CacheConfig::default();
        config.file_extension = String::new();
        assert!(config.validate().is_err());

        config.file_extension = ".mp4".into();
        assert!(config.validate().is_err());

        config.file_extension = "a/b".into();
        assert!(config.validate().is_err());
    }
}
