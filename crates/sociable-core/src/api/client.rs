//! API client for the social backend.
//!
//! `ApiClient` composes the request pipeline
//! `Signed<RefreshOnExpiry<base>>` over a base transport and exposes one
//! method per backend endpoint. Callers never see an expired token: they get
//! the (possibly replayed) response, a final error, or
//! `ApiError::SessionExpired` after the session has been terminated.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::auth::Session;
use crate::config::Config;
use crate::models::chat::SentMessage;
use crate::models::friend::FriendRequestBody;
use crate::models::post::LikeRequest;
use crate::models::user::LogoutRequest;
use crate::models::{
    Ack, ChatRoom, CreatedChatRoom, Friend, LoginRequest, LoginResponse, Message, MessagePage,
    NewChatRoom, NewComment, NewMessage, NewPost, Notification, Post, RegisterRequest,
    ResetPasswordOtpRequest, ResetPasswordRequest, User, UserChats, VerifyOtpRequest,
};

use super::refresh::{RefreshCoordinator, RefreshOnExpiry};
use super::{ApiError, ApiRequest, ApiResponse, HttpTransport, SessionEndReason, Signed, Transport};

/// Default number of messages fetched per page of room history.
pub const DEFAULT_MESSAGE_PAGE_SIZE: u32 = 20;

/// Clone is cheap - the pipeline and the session are shared.
#[derive(Clone)]
pub struct ApiClient {
    pipeline: Arc<dyn Transport>,
    session: Session,
    coordinator: RefreshCoordinator,
}

impl ApiClient {
    /// Client over the real HTTP backend described by `config`.
    pub fn from_config(config: &Config, session: Session) -> Result<Self, ApiError> {
        let transport = HttpTransport::new(
            &config.api_base_url(),
            Duration::from_secs(config.request_timeout_secs()),
        )?;
        Ok(Self::with_transport(transport, session))
    }

    /// Client over any base transport.
    pub fn with_transport(base: impl Transport + 'static, session: Session) -> Self {
        let base: Arc<dyn Transport> = Arc::new(base);
        let coordinator = RefreshCoordinator::new(Arc::clone(&base), session.clone());
        let pipeline = Signed::new(
            RefreshOnExpiry::new(base, coordinator.clone()),
            session.clone(),
        );
        Self {
            pipeline: Arc::new(pipeline),
            session,
            coordinator,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    /// Send through the full pipeline; non-2xx becomes `ApiError::Http`.
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        self.pipeline.send(&request).await?.error_for_status()
    }

    async fn call<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        let path = request.path.clone();
        let response = self.execute(request).await?;
        response.json().map_err(|e| {
            warn!(path = %path, error = %e, "Failed to parse response");
            e
        })
    }

    /// Decode a list that the backend returns either bare or wrapped as
    /// `{ "<key>": [...] }`.
    async fn call_list<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
        key: &str,
    ) -> Result<Vec<T>, ApiError> {
        let value: serde_json::Value = self.call(request).await?;
        let list = match value {
            list @ serde_json::Value::Array(_) => list,
            serde_json::Value::Object(mut map) => map
                .remove(key)
                .ok_or_else(|| ApiError::Decode(format!("Missing `{}` in response", key)))?,
            other => {
                return Err(ApiError::Decode(format!(
                    "Expected a list of {}, got {}",
                    key, other
                )))
            }
        };
        serde_json::from_value(list).map_err(|e| ApiError::Decode(e.to_string()))
    }

    // ===== Users =====

    pub async fn register(&self, request: &RegisterRequest) -> Result<Ack, ApiError> {
        self.call(ApiRequest::post("users/register").json(request)?)
            .await
    }

    pub async fn verify_otp(&self, request: &VerifyOtpRequest) -> Result<Ack, ApiError> {
        self.call(ApiRequest::post("users/verify-otp").json(request)?)
            .await
    }

    /// Log in and install the returned tokens in the session.
    pub async fn login(&self, request: &LoginRequest) -> Result<Option<User>, ApiError> {
        let response: LoginResponse = self
            .call(ApiRequest::post("users/login").json(request)?)
            .await?;
        if response.refresh_token.is_none() {
            warn!("Login response carried no refresh token; session cannot be refreshed");
        }
        self.session
            .begin(response.token, response.refresh_token, response.user.clone())
            .await
            .map_err(|e| ApiError::Storage(format!("{:#}", e)))?;
        info!(user = ?response.user.as_ref().map(|u| &u.id), "Logged in");
        Ok(response.user)
    }

    /// Fetch the current user and cache it in the session.
    pub async fn get_user(&self) -> Result<User, ApiError> {
        let value: serde_json::Value = self.call(ApiRequest::get("users/user")).await?;
        let user_value = match value {
            serde_json::Value::Object(ref map) if map.contains_key("user") => map["user"].clone(),
            other => other,
        };
        let user: User =
            serde_json::from_value(user_value).map_err(|e| ApiError::Decode(e.to_string()))?;
        if !self.session.set_user(user.clone()).await {
            debug!("Session ended before the user arrived, not caching it");
        }
        Ok(user)
    }

    /// Tell the backend to revoke the refresh token, then end the session
    /// locally whatever the backend said.
    pub async fn logout(&self) -> Result<(), ApiError> {
        let body = LogoutRequest {
            refresh_token: self.session.refresh_token().await,
        };
        if let Err(e) = self
            .execute(ApiRequest::post("users/logout").json(&body)?)
            .await
        {
            warn!(error = %e, "Logout request failed; clearing session anyway");
        }
        self.session.terminate(SessionEndReason::LoggedOut).await;
        Ok(())
    }

    pub async fn send_reset_password_otp(
        &self,
        request: &ResetPasswordOtpRequest,
    ) -> Result<Ack, ApiError> {
        self.call(ApiRequest::post("users/send-reset-password-otp").json(request)?)
            .await
    }

    pub async fn reset_password(&self, request: &ResetPasswordRequest) -> Result<Ack, ApiError> {
        self.call(ApiRequest::post("users/reset-password").json(request)?)
            .await
    }

    // ===== Posts =====

    pub async fn create_post(&self, post: &NewPost) -> Result<Post, ApiError> {
        let value: serde_json::Value = self.call(ApiRequest::post("posts").json(post)?).await?;
        let post_value = match value {
            serde_json::Value::Object(ref map) if map.contains_key("post") => map["post"].clone(),
            other => other,
        };
        serde_json::from_value(post_value).map_err(|e| ApiError::Decode(e.to_string()))
    }

    pub async fn get_posts(&self) -> Result<Vec<Post>, ApiError> {
        self.call_list(ApiRequest::get("posts"), "posts").await
    }

    pub async fn like_post(&self, post_id: &str, user_id: &str) -> Result<Ack, ApiError> {
        let body = LikeRequest { user_id };
        self.call(ApiRequest::post(format!("posts/{}/like", post_id)).json(&body)?)
            .await
    }

    pub async fn add_comment(&self, post_id: &str, comment: &NewComment) -> Result<Ack, ApiError> {
        self.call(ApiRequest::post(format!("posts/{}/comment", post_id)).json(comment)?)
            .await
    }

    // ===== Friendships =====

    pub async fn search_users(&self, query: &str) -> Result<Vec<Friend>, ApiError> {
        self.call_list(
            ApiRequest::get("friendships/search").query("query", query),
            "users",
        )
        .await
    }

    pub async fn send_friend_request(&self, friend_id: &str) -> Result<Ack, ApiError> {
        let body = FriendRequestBody { friend_id };
        self.call(ApiRequest::post("friendships/send").json(&body)?)
            .await
    }

    pub async fn accept_friend_request(&self, friend_id: &str) -> Result<Ack, ApiError> {
        let body = FriendRequestBody { friend_id };
        self.call(ApiRequest::post("friendships/accept").json(&body)?)
            .await
    }

    pub async fn remove_friend(&self, friend_id: &str) -> Result<Ack, ApiError> {
        let body = FriendRequestBody { friend_id };
        self.call(ApiRequest::delete("friendships/remove").json(&body)?)
            .await
    }

    pub async fn get_friends(&self) -> Result<Vec<Friend>, ApiError> {
        self.call_list(ApiRequest::get("friendships/list"), "friends")
            .await
    }

    /// Requests this user sent that are still pending.
    pub async fn get_sent_requests(&self) -> Result<Vec<Friend>, ApiError> {
        self.call_list(ApiRequest::get("friendships/requests"), "requests")
            .await
    }

    /// Requests other users sent to this user.
    pub async fn get_received_requests(&self) -> Result<Vec<Friend>, ApiError> {
        self.call_list(ApiRequest::get("friendships/pending"), "requests")
            .await
    }

    // ===== Chats =====

    pub async fn create_chat_room(&self, members: Vec<String>) -> Result<ChatRoom, ApiError> {
        let created: CreatedChatRoom = self
            .call(ApiRequest::post("chats/create").json(&NewChatRoom { members })?)
            .await?;
        Ok(created.chat_room)
    }

    pub async fn get_user_chats(&self) -> Result<UserChats, ApiError> {
        self.call(ApiRequest::get("chats/chatrooms")).await
    }

    // ===== Messages =====

    pub async fn send_message(&self, room_id: &str, content: &str) -> Result<Message, ApiError> {
        let body = NewMessage {
            content: content.to_string(),
        };
        let sent: SentMessage = self
            .call(ApiRequest::post(format!("messages/{}/send", room_id)).json(&body)?)
            .await?;
        Ok(sent.message)
    }

    /// One page of room history. `cursor` is the `nextCursor` of the previous page.
    pub async fn get_messages(
        &self,
        room_id: &str,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<MessagePage, ApiError> {
        let mut request =
            ApiRequest::get(format!("messages/{}/messages", room_id)).query("limit", limit);
        if let Some(cursor) = cursor {
            request = request.query("cursor", cursor);
        }
        debug!(room = room_id, limit, cursor = ?cursor, "Fetching messages");
        self.call(request).await
    }

    // ===== Notifications =====

    pub async fn get_notifications(&self) -> Result<Vec<Notification>, ApiError> {
        self.call_list(ApiRequest::get("notifications"), "notifications")
            .await
    }

    pub async fn mark_notification_read(&self, notification_id: &str) -> Result<Ack, ApiError> {
        self.call(ApiRequest::patch(format!(
            "notifications/{}/read",
            notification_id
        )))
        .await
    }
}
