//! Data models for the social backend.
//!
//! - `User` and the auth request/response bodies
//! - `Post`, `Comment`, `Author`: newsfeed
//! - `Friend`: friend lists, requests and search results
//! - `ChatRoom`, `Message`, `MessagePage`: chat
//! - `Notification`

pub mod chat;
pub mod friend;
pub mod notification;
pub mod post;
pub mod user;

pub use chat::{ChatRoom, CreatedChatRoom, Message, MessagePage, NewChatRoom, NewMessage, UserChats};
pub use friend::{ChatRoomRef, Friend};
pub use notification::{unread_count, Notification};
pub use post::{Author, Comment, NewComment, NewPost, Post};
pub use user::{
    Ack, LoginRequest, LoginResponse, RegisterRequest, ResetPasswordOtpRequest,
    ResetPasswordRequest, User, VerifyOtpRequest,
};
