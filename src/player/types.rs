use std::path::PathBuf;
use std::time::Duration;

/// Where a player reads its media from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    /// A completed file in the content cache
    LocalFile(PathBuf),
    /// Remote media that is being downloaded to `cache_path` at the same time
    Stream { url: String, cache_path: PathBuf },
}

impl MediaSource {
    pub fn is_local(&self) -> bool {
        matches!(self, Self::LocalFile(_))
    }
}

/// Notifications a player backend sends about the loaded media
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    Ready,
    Failed(String),
    Stalled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackStatus {
    #[default]
    Unconfigured,
    Configuring,
    Ready,
    Playing,
    Paused,
    /// `terminal` once retries are exhausted
    Failed { terminal: bool },
}

impl PlaybackStatus {
    /// Whether transport controls reach the player
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready | Self::Playing | Self::Paused)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed { terminal: true })
    }
}

/// Position sample published by the time observer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlaybackTime {
    pub position: Duration,
    pub duration: Option<Duration>,
}

impl PlaybackTime {
    /// Played fraction (0.0 to 1.0), zero while the duration is unknown
    pub fn progress(&self) -> f64 {
        match self.duration {
            Some(total) if !total.is_zero() => {
                (self.position.as_secs_f64() / total.as_secs_f64()).min(1.0)
            }
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_ready_states() {
        assert!(!PlaybackStatus::Unconfigured.is_ready());
        assert!(!PlaybackStatus::Configuring.is_ready());
        assert!(PlaybackStatus::Ready.is_ready());
        assert!(PlaybackStatus::Paused.is_ready());
        assert!(!PlaybackStatus::Failed { terminal: false }.is_ready());
        assert!(PlaybackStatus::Failed { terminal: true }.is_terminal());
    }

    #[test]
    fn test_time_progress() {
        let time = PlaybackTime {
            position: Duration::from_secs(5),
            duration: Some(Duration::from_secs(20)),
        };
        assert_eq!(time.progress(), 0.25);
        assert_eq!(PlaybackTime::default().progress(), 0.0);
    }
}
