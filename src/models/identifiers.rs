use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Bytes escaped in cache file names: path separators, characters reserved
/// on common filesystems, and the escape character itself
const FILE_NAME_RESERVED: &AsciiSet = &CONTROLS
    .add(b'/')
    .add(b'\\')
    .add(b':')
    .add(b'*')
    .add(b'?')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'|')
    .add(b'%');

/// Stem used for the empty id; never produced by escaping a non-empty one
const EMPTY_STEM: &str = "%";

macro_rules! impl_id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = std::convert::Infallible;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.to_string()))
            }
        }
    };
}

impl_id_type!(
    /// Identifier of one playable, cacheable media item. Used as both the
    /// cache key and the pool key.
    ContentId
);
impl_id_type!(
    /// Identifier of a feed post
    PostId
);

impl ContentId {
    /// Filename-safe form of the id. The mapping is reversible, so distinct
    /// ids never share a cache file.
    pub fn file_stem(&self) -> String {
        match self.0.as_str() {
            "" => EMPTY_STEM.to_string(),
            "." => "%2E".to_string(),
            ".." => "%2E%2E".to_string(),
            id => utf8_percent_encode(id, FILE_NAME_RESERVED).to_string(),
        }
    }

    /// Inverse of [`file_stem`](Self::file_stem); `None` for names it never produces
    pub fn from_file_stem(stem: &str) -> Option<Self> {
        if stem == EMPTY_STEM {
            return Some(Self(String::new()));
        }
        let decoded = percent_decode_str(stem).decode_utf8().ok()?;
        Some(Self(decoded.into_owned()))
    }
}

impl From<PostId> for ContentId {
    fn from(post_id: PostId) -> Self {
        Self(post_id.0)
    }
}
