use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Post author as populated by the backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Author {
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Comment {
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    pub content: String,
    #[serde(rename = "author_id", default)]
    pub author: Option<Author>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Comment {
    pub fn author_name(&self) -> &str {
        self.author
            .as_ref()
            .and_then(|a| a.username.as_deref())
            .unwrap_or("Anonymous")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Post {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "author_id", default)]
    pub author: Author,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub media_urls: Vec<String>,
    /// IDs of the users who liked the post
    #[serde(default)]
    pub likes: Vec<String>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Post {
    pub fn like_count(&self) -> usize {
        self.likes.len()
    }

    pub fn is_liked_by(&self, user_id: &str) -> bool {
        self.likes.iter().any(|id| id == user_id)
    }

    /// First attachment is a video rather than an image.
    pub fn has_video(&self) -> bool {
        self.media_urls
            .first()
            .map(|url| url.ends_with(".mp4") || url.ends_with(".mov"))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewPost {
    pub content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub media_urls: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewComment {
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct LikeRequest<'a> {
    pub user_id: &'a str,
}
