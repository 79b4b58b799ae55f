use serde::{Deserialize, Serialize};

use super::{ContentId, PostId};

/// Top-level media type of a feed post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Photo,
    Video,
    Mixed,
}

/// Kind of a single media item inside a mixed post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Photo,
    Video,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MixedMediaItem {
    pub id: ContentId,
    pub url: String,
    pub kind: MediaKind,
}

/// A playable video referenced by a feed item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoRef {
    pub content_id: ContentId,
    pub url: String,
}

/// One post in the scrolling feed, as supplied by the feed view model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItem {
    pub id: PostId,
    pub media_type: MediaType,
    #[serde(default)]
    pub media_urls: Vec<String>,
    #[serde(default)]
    pub mixed_media: Vec<MixedMediaItem>,
    /// Avatar images shown alongside the post (author, venue)
    #[serde(default)]
    pub profile_image_urls: Vec<String>,
}

impl FeedItem {
    pub fn video(id: impl Into<PostId>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            media_type: MediaType::Video,
            media_urls: vec![url.into()],
            mixed_media: Vec::new(),
            profile_image_urls: Vec::new(),
        }
    }

    pub fn photo(id: impl Into<PostId>, urls: Vec<String>) -> Self {
        Self {
            id: id.into(),
            media_type: MediaType::Photo,
            media_urls: urls,
            mixed_media: Vec::new(),
            profile_image_urls: Vec::new(),
        }
    }

    pub fn mixed(id: impl Into<PostId>, items: Vec<MixedMediaItem>) -> Self {
        Self {
            id: id.into(),
            media_type: MediaType::Mixed,
            media_urls: Vec::new(),
            mixed_media: items,
            profile_image_urls: Vec::new(),
        }
    }

    /// Every playable video in this post.
    ///
    /// Mixed posts key each video by its media item id. Single-video posts
    /// play their first URL and are keyed by the post id.
    pub fn videos(&self) -> Vec<VideoRef> {
        match self.media_type {
            MediaType::Mixed => self
                .mixed_media
                .iter()
                .filter(|item| item.kind == MediaKind::Video)
                .map(|item| VideoRef {
                    content_id: item.id.clone(),
                    url: item.url.clone(),
                })
                .collect(),
            MediaType::Video => self
                .media_urls
                .first()
                .map(|url| VideoRef {
                    content_id: ContentId::from(self.id.clone()),
                    url: url.clone(),
                })
                .into_iter()
                .collect(),
            MediaType::Photo => Vec::new(),
        }
    }

    /// Image URLs worth warming in the image cache: photos plus avatars
    pub fn image_urls(&self) -> Vec<String> {
        let photos: Vec<String> = match self.media_type {
            MediaType::Photo => self.media_urls.clone(),
            MediaType::Mixed => self
                .mixed_media
                .iter()
                .filter(|item| item.kind == MediaKind::Photo)
                .map(|item| item.url.clone())
                .collect(),
            MediaType::Video => Vec::new(),
        };

        photos
            .into_iter()
            .chain(self.profile_image_urls.iter().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_video_is_keyed_by_post_id() {
        let item = FeedItem::video("post-1", "https://cdn.test/a.mp4");
        let videos = item.videos();

        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].content_id, ContentId::new("post-1"));
        assert_eq!(videos[0].url, "https://cdn.test/a.mp4");
        assert!(item.image_urls().is_empty());
    }

    #[test]
    fn test_mixed_post_splits_videos_and_photos() {
        let mut item = FeedItem::mixed(
            "post-2",
            vec![
                MixedMediaItem {
                    id: ContentId::new("m1"),
                    url: "https://cdn.test/m1.jpg".into(),
                    kind: MediaKind::Photo,
                },
                MixedMediaItem {
                    id: ContentId::new("m2"),
                    url: "https://cdn.test/m2.mp4".into(),
                    kind: MediaKind::Video,
                },
            ],
        );
        item.profile_image_urls = vec!["https://cdn.test/avatar.jpg".into()];

        let videos = item.videos();
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].content_id, ContentId::new("m2"));
        assert_eq!(
            item.image_urls(),
            vec![
                "https://cdn.test/m1.jpg".to_string(),
                "https://cdn.test/avatar.jpg".to_string()
            ]
        );
    }

    #[test]
    fn test_video_post_without_urls_has_no_videos() {
        let mut item = FeedItem::video("post-3", "unused");
        item.media_urls.clear();
        assert!(item.videos().is_empty());
    }

    #[test]
    fn test_deserialize_from_manifest_json() {
        let json = r#"[
            {"id": "p1", "media_type": "video", "media_urls": ["https://cdn.test/p1.mp4"]},
            {"id": "p2", "media_type": "photo", "media_urls": ["https://cdn.test/p2.jpg"],
             "profile_image_urls": ["https://cdn.test/u.jpg"]}
        ]"#;

        let items: Vec<FeedItem> = serde_json::from_str(json).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].media_type, MediaType::Video);
        assert!(items[0].mixed_media.is_empty());
        assert_eq!(items[1].image_urls().len(), 2);
    }
}
