mod feed;
mod identifiers;

pub use feed::{FeedItem, MediaKind, MediaType, MixedMediaItem, VideoRef};
pub use identifiers::{ContentId, PostId};
