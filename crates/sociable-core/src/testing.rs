//! Test doubles shared by the unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use reqwest::StatusCode;
use tokio::sync::Notify;

use crate::api::expiry::EXPIRED_TOKEN_MESSAGE;
use crate::api::refresh::REFRESH_PATH;
use crate::api::{ApiError, ApiRequest, ApiResponse, Transport};
use crate::auth::{MemoryTokenStore, StoredTokens, TokenStore};

type Handler = dyn Fn(&ApiRequest) -> Result<ApiResponse, ApiError> + Send + Sync;

/// Transport that records every request and answers from a closure.
#[derive(Clone)]
pub struct ScriptedTransport {
    requests: Arc<Mutex<Vec<ApiRequest>>>,
    handler: Arc<Handler>,
    refresh_gate: Option<Arc<Notify>>,
}

impl ScriptedTransport {
    pub fn new(
        handler: impl Fn(&ApiRequest) -> Result<ApiResponse, ApiError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            requests: Arc::new(Mutex::new(Vec::new())),
            handler: Arc::new(handler),
            refresh_gate: None,
        }
    }

    /// Hold every refresh call (after recording it) until `gate` is notified.
    pub fn with_refresh_gate(mut self, gate: Arc<Notify>) -> Self {
        self.refresh_gate = Some(gate);
        self
    }

    pub fn ok_everywhere() -> Self {
        Self::new(|_| Ok(ApiResponse::new(StatusCode::OK, "{}")))
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count_path(&self, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.path == path)
            .count()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(gate) = self.refresh_gate.as_ref().filter(|_| request.path == REFRESH_PATH) {
            gate.notified().await;
        }
        // Let other in-flight requests interleave like real I/O would
        tokio::task::yield_now().await;
        (self.handler)(request)
    }
}

pub fn expired_response() -> ApiResponse {
    ApiResponse::new(
        StatusCode::FORBIDDEN,
        serde_json::json!({ "message": EXPIRED_TOKEN_MESSAGE }).to_string(),
    )
}

pub enum RefreshBehavior {
    Issue(&'static str),
    Rotate(&'static str, &'static str),
    Reject(StatusCode),
}

/// A backend that accepts only `valid_token` and answers the refresh
/// endpoint according to `refresh`. Successful responses echo the path and
/// the token the request carried.
pub fn backend(valid_token: &'static str, refresh: RefreshBehavior) -> ScriptedTransport {
    ScriptedTransport::new(move |request| {
        if request.path == REFRESH_PATH {
            return Ok(match refresh {
                RefreshBehavior::Issue(token) => ApiResponse::new(
                    StatusCode::OK,
                    serde_json::json!({ "token": token }).to_string(),
                ),
                RefreshBehavior::Rotate(token, refresh_token) => ApiResponse::new(
                    StatusCode::OK,
                    serde_json::json!({ "token": token, "refreshToken": refresh_token })
                        .to_string(),
                ),
                RefreshBehavior::Reject(status) => ApiResponse::new(
                    status,
                    r#"{"message":"Refresh token is invalid or revoked."}"#,
                ),
            });
        }
        match request.bearer_token() {
            Some(token) if token == valid_token => Ok(ApiResponse::new(
                StatusCode::OK,
                serde_json::json!({ "path": request.path, "token": token }).to_string(),
            )),
            _ => Ok(expired_response()),
        }
    })
}

/// Memory store that counts how often it was cleared.
#[derive(Clone, Default)]
pub struct CountingStore {
    inner: Arc<MemoryTokenStore>,
    clears: Arc<AtomicUsize>,
}

impl CountingStore {
    pub fn clears(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }
}

impl TokenStore for CountingStore {
    fn get(&self) -> Result<Option<StoredTokens>> {
        self.inner.get()
    }

    fn set(&self, tokens: &StoredTokens) -> Result<()> {
        self.inner.set(tokens)
    }

    fn clear(&self) -> Result<()> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        self.inner.clear()
    }
}
