pub mod pool;
pub mod resource;
pub mod traits;
pub mod types;

pub use pool::ResourcePool;
pub use resource::{PlaybackContext, PlaybackResource};
pub use traits::{MediaPlayer, PlayerFactory};
pub use types::{MediaSource, PlaybackStatus, PlaybackTime, PlayerEvent};
