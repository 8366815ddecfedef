use serde::{Deserialize, Serialize};

/// Reference to the chat room shared with a friend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct ChatRoomRef {
    #[serde(rename = "_id")]
    pub id: String,
}

/// A user as listed in friend lists, request lists and search results.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Friend {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(rename = "chatRoom", default)]
    pub chat_room: Option<ChatRoomRef>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct FriendRequestBody<'a> {
    pub friend_id: &'a str,
}
