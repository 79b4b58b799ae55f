use thiserror::Error;

/// Why a fetch task did not produce a cached file.
///
/// Cloneable so one terminal result can be handed to every subscriber of a
/// shared task.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP error: {0}")]
    HttpStatus(u16),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Download cancelled")]
    Cancelled,
}

impl FetchError {
    /// Failures worth another attempt within the same task
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::HttpStatus(status) => *status >= 500 || *status == 408 || *status == 429,
            Self::InvalidUrl { .. } | Self::Io(_) | Self::Cancelled => false,
        }
    }
}

impl From<std::io::Error> for FetchError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(error: reqwest::Error) -> Self {
        match error.status() {
            Some(status) => Self::HttpStatus(status.as_u16()),
            None => Self::Network(error.to_string()),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlayerError {
    #[error("Player backend error: {0}")]
    Backend(String),

    #[error("Media fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Playback failed after {attempts} attempts")]
    Exhausted { attempts: u32 },
}
