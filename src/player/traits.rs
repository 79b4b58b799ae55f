use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use super::types::{MediaSource, PlayerEvent};
use crate::models::ContentId;
use crate::utils::errors::PlayerError;

/// A platform media player bound to one piece of content.
///
/// Controls are fire-and-forget: they hand the command to the backend and
/// return. Readiness and failures arrive later as [`PlayerEvent`]s on the
/// channel given to [`PlayerFactory::create`].
pub trait MediaPlayer: Send + Sync {
    fn load(&self, source: &MediaSource) -> Result<(), PlayerError>;
    fn play(&self) -> Result<(), PlayerError>;
    fn pause(&self) -> Result<(), PlayerError>;
    fn seek(&self, position: Duration) -> Result<(), PlayerError>;
    /// Restart the current item whenever it reaches its end
    fn set_looping(&self, looping: bool) -> Result<(), PlayerError>;
    /// Stop playback and drop the loaded media
    fn stop(&self);
    fn position(&self) -> Option<Duration>;
    fn duration(&self) -> Option<Duration>;
}

pub trait PlayerFactory: Send + Sync {
    fn create(
        &self,
        content_id: &ContentId,
        events: mpsc::UnboundedSender<PlayerEvent>,
    ) -> Result<Arc<dyn MediaPlayer>, PlayerError>;
}
