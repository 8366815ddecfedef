//! Chat room state kept on the client.
//!
//! `RoomHistories` holds the cursor-paginated message history of every room
//! the user has opened, newest message first.

pub mod history;

pub use history::{MessageHistory, RoomHistories};
