use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct ChatRoom {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "displayName", default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewChatRoom {
    /// Other members; the backend adds the caller itself.
    pub members: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatedChatRoom {
    #[serde(rename = "chatRoom")]
    pub chat_room: ChatRoom,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserChats {
    #[serde(rename = "chatRooms", default)]
    pub chat_rooms: Vec<ChatRoom>,
    #[serde(rename = "userId", default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Message {
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    pub room_id: String,
    pub sender_id: String,
    #[serde(default)]
    pub sender_name: Option<String>,
    pub content: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewMessage {
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SentMessage {
    pub message: Message,
}

/// One page of room history, newest first.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessagePage {
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(rename = "nextCursor", default)]
    pub next_cursor: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_message_page() {
        let json = r#"{
            "messages": [
                {"_id": "m2", "room_id": "r1", "sender_id": "u1", "content": "later", "timestamp": "2024-11-02T08:16:00Z"},
                {"_id": "m1", "room_id": "r1", "sender_id": "u2", "sender_name": "an", "content": "first"}
            ],
            "nextCursor": "m1"
        }"#;
        let page: MessagePage = serde_json::from_str(json).unwrap();
        assert_eq!(page.messages.len(), 2);
        assert_eq!(page.next_cursor.as_deref(), Some("m1"));
        assert_eq!(page.messages[1].sender_name.as_deref(), Some("an"));
    }

    #[test]
    fn test_parse_last_page() {
        let page: MessagePage =
            serde_json::from_str(r#"{"messages": [], "nextCursor": null}"#).unwrap();
        assert!(page.messages.is_empty());
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn test_parse_user_chats() {
        let json = r#"{"chatRooms":[{"_id":"r1","displayName":"Lan","avatar":"a.png"}],"userId":"u1"}"#;
        let chats: UserChats = serde_json::from_str(json).unwrap();
        assert_eq!(chats.chat_rooms[0].display_name.as_deref(), Some("Lan"));
        assert_eq!(chats.user_id.as_deref(), Some("u1"));
    }
}
