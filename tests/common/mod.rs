use reelfeed::models::ContentId;
use reelfeed::player::{MediaPlayer, MediaSource, PlayerEvent, PlayerFactory};
use reelfeed::utils::PlayerError;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Player that reports ready as soon as it is given media
pub struct InstantPlayer {
    events: mpsc::UnboundedSender<PlayerEvent>,
    pub source: Mutex<Option<MediaSource>>,
}

impl MediaPlayer for InstantPlayer {
    fn load(&self, source: &MediaSource) -> Result<(), PlayerError> {
        *self.source.lock().unwrap() = Some(source.clone());
        let _ = self.events.send(PlayerEvent::Ready);
        Ok(())
    }

    fn play(&self) -> Result<(), PlayerError> {
        Ok(())
    }

    fn pause(&self) -> Result<(), PlayerError> {
        Ok(())
    }

    fn seek(&self, _position: Duration) -> Result<(), PlayerError> {
        Ok(())
    }

    fn set_looping(&self, _looping: bool) -> Result<(), PlayerError> {
        Ok(())
    }

    fn stop(&self) {}

    fn position(&self) -> Option<Duration> {
        Some(Duration::ZERO)
    }

    fn duration(&self) -> Option<Duration> {
        None
    }
}

#[derive(Default)]
pub struct InstantPlayerFactory {
    pub players: Mutex<Vec<(ContentId, Arc<InstantPlayer>)>>,
}

impl InstantPlayerFactory {
    pub fn source_for(&self, content_id: &ContentId) -> Option<MediaSource> {
        self.players
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(id, _)| id == content_id)
            .and_then(|(_, player)| player.source.lock().unwrap().clone())
    }
}

impl PlayerFactory for InstantPlayerFactory {
    fn create(
        &self,
        content_id: &ContentId,
        events: mpsc::UnboundedSender<PlayerEvent>,
    ) -> Result<Arc<dyn MediaPlayer>, PlayerError> {
        let player = Arc::new(InstantPlayer {
            events,
            source: Mutex::new(None),
        });
        self.players
            .lock()
            .unwrap()
            .push((content_id.clone(), player.clone()));
        Ok(player)
    }
}

/// Poll `condition` until it holds or five seconds pass
pub async fn eventually<F: FnMut() -> bool>(mut condition: F) -> bool {
    for _ in 0..1000 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
