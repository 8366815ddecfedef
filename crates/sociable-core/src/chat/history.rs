use std::collections::HashMap;

use tracing::debug;

use crate::api::{ApiClient, ApiError, DEFAULT_MESSAGE_PAGE_SIZE};
use crate::models::{Message, MessagePage};

/// Loaded history of one room, newest message first.
#[derive(Debug, Clone)]
pub struct MessageHistory {
    pub messages: Vec<Message>,
    /// Cursor for the next (older) page; `None` before the first load.
    pub cursor: Option<String>,
    pub has_more: bool,
}

impl Default for MessageHistory {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            cursor: None,
            has_more: true,
        }
    }
}

impl MessageHistory {
    /// Merge a fetched page. A page fetched without a cursor replaces what is
    /// loaded; later pages are older and go to the end.
    pub fn apply_page(&mut self, page: MessagePage) {
        if page.messages.is_empty() {
            self.has_more = false;
            return;
        }
        if self.cursor.is_some() {
            self.messages.extend(page.messages);
        } else {
            self.messages = page.messages;
        }
        self.has_more = page.next_cursor.is_some();
        self.cursor = page.next_cursor;
    }

    /// A message pushed over the realtime channel is the newest one.
    pub fn receive(&mut self, message: Message) {
        self.messages.insert(0, message);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Message history for every opened room.
#[derive(Debug)]
pub struct RoomHistories {
    rooms: HashMap<String, MessageHistory>,
    page_size: u32,
}

impl Default for RoomHistories {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomHistories {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_MESSAGE_PAGE_SIZE)
    }

    pub fn with_page_size(page_size: u32) -> Self {
        Self {
            rooms: HashMap::new(),
            page_size: page_size.max(1),
        }
    }

    pub fn room(&self, room_id: &str) -> Option<&MessageHistory> {
        self.rooms.get(room_id)
    }

    pub fn room_mut(&mut self, room_id: &str) -> &mut MessageHistory {
        self.rooms.entry(room_id.to_string()).or_default()
    }

    pub fn receive(&mut self, message: Message) {
        let room_id = message.room_id.clone();
        self.room_mut(&room_id).receive(message);
    }

    /// Drop what is loaded for `room_id` so the next load starts from the newest page.
    pub fn reset(&mut self, room_id: &str) {
        self.rooms.remove(room_id);
    }

    /// Fetch the next page for `room_id` if the room has more history.
    /// Returns how many messages were added.
    pub async fn load_more(&mut self, client: &ApiClient, room_id: &str) -> Result<usize, ApiError> {
        let page_size = self.page_size;
        let history = self.room_mut(room_id);
        if !history.has_more {
            return Ok(0);
        }
        let before = history.len();
        let page = client
            .get_messages(room_id, page_size, history.cursor.as_deref())
            .await?;
        history.apply_page(page);
        debug!(room = room_id, loaded = history.len(), has_more = history.has_more, "Loaded messages");
        Ok(history.len().saturating_sub(before))
    }
}
