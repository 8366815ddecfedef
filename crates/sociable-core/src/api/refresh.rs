//! Single-flight token refresh and replay.
//!
//! At most one refresh call is in flight at a time. The first request that
//! comes back expired starts the refresh on its own task and parks a shared
//! handle to its outcome in the coordinator; every other expired request
//! awaits that same handle instead of issuing its own call. The refresh task
//! owns every transition of the coordinator state, so a caller that gives up
//! waiting cannot leave it stuck `InFlight`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::auth::Session;
use crate::models::user::RefreshResponse;

use super::expiry::is_expired_token;
use super::{ApiError, ApiRequest, ApiResponse, SessionEndReason, Transport};

/// Endpoint that exchanges the refresh credential for a new access token
pub const REFRESH_PATH: &str = "users/refresh-token";

/// Observable phase of the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    InFlight,
    /// The refresh failed and the session is being terminated.
    Failed,
}

#[derive(Debug, Clone)]
enum RefreshOutcome {
    Refreshed(String),
    Failed(SessionEndReason),
}

type SharedRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

enum Slot {
    Idle,
    InFlight(SharedRefresh),
    Failed(SessionEndReason),
}

struct CoordinatorInner {
    session: Session,
    /// Unsigned transport used for the refresh call itself.
    transport: Arc<dyn Transport>,
    slot: Mutex<Slot>,
    refresh_calls: AtomicU64,
}

/// Owns `RefreshState` and is the only writer into the session during a refresh.
/// Clone is cheap and clones share state.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<CoordinatorInner>,
}

impl RefreshCoordinator {
    pub fn new(transport: Arc<dyn Transport>, session: Session) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                session,
                transport,
                slot: Mutex::new(Slot::Idle),
                refresh_calls: AtomicU64::new(0),
            }),
        }
    }

    pub async fn state(&self) -> RefreshState {
        match *self.inner.slot.lock().await {
            Slot::Idle => RefreshState::Idle,
            Slot::InFlight(_) => RefreshState::InFlight,
            Slot::Failed(_) => RefreshState::Failed,
        }
    }

    /// Number of refresh calls sent to the backend since construction.
    pub fn refresh_count(&self) -> u64 {
        self.inner.refresh_calls.load(Ordering::Relaxed)
    }

    /// Obtain an access token newer than `stale`, the token the failed
    /// request was sent with.
    ///
    /// Joins the refresh in flight if there is one. If the session already
    /// holds a different token (a refresh finished after the request left),
    /// that token is returned without another refresh call.
    pub async fn fresh_token(&self, stale: Option<&str>) -> Result<String, ApiError> {
        let outcome = {
            let mut slot = self.inner.slot.lock().await;
            let joined = match &*slot {
                Slot::InFlight(outcome) => Some(outcome.clone()),
                Slot::Failed(reason) => return Err(ApiError::SessionExpired(*reason)),
                Slot::Idle => None,
            };
            match joined {
                Some(outcome) => {
                    debug!("Joining refresh in flight");
                    outcome
                }
                None => {
                    if let Some(current) = self.inner.session.access_token().await {
                        if stale != Some(current.as_str()) {
                            debug!("Token already refreshed, reusing current token");
                            return Ok(current);
                        }
                    }
                    let outcome = self.start();
                    *slot = Slot::InFlight(outcome.clone());
                    outcome
                }
            }
        };

        match outcome.await {
            RefreshOutcome::Refreshed(token) => Ok(token),
            RefreshOutcome::Failed(reason) => Err(ApiError::SessionExpired(reason)),
        }
    }

    /// End the session for a reason detected outside the refresh itself.
    pub async fn abandon(&self, reason: SessionEndReason) -> ApiError {
        self.inner.session.terminate(reason).await;
        ApiError::SessionExpired(reason)
    }

    /// Spawn the refresh so it runs to completion even if every waiter drops.
    /// Must be called with the slot locked.
    fn start(&self) -> SharedRefresh {
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(inner.run());
        async move {
            task.await.unwrap_or_else(|e| {
                warn!(error = %e, "Refresh task did not complete");
                RefreshOutcome::Failed(SessionEndReason::RefreshAborted)
            })
        }
        .boxed()
        .shared()
    }
}

impl CoordinatorInner {
    async fn run(self: Arc<Self>) -> RefreshOutcome {
        let generation = self.session.generation().await;
        let outcome = match self.request_token().await {
            Ok((token, rotated)) => {
                match self
                    .session
                    .set_access_token(generation, token.clone(), rotated)
                    .await
                {
                    Ok(true) => {
                        info!("Access token refreshed");
                        RefreshOutcome::Refreshed(token)
                    }
                    Ok(false) => {
                        warn!("Session ended during refresh, discarding new token");
                        RefreshOutcome::Failed(SessionEndReason::SessionReplaced)
                    }
                    Err(e) => {
                        warn!(error = %e, "Refreshed token kept in memory only");
                        RefreshOutcome::Refreshed(token)
                    }
                }
            }
            Err(reason) => {
                warn!(reason = %reason, "Token refresh failed");
                *self.slot.lock().await = Slot::Failed(reason);
                self.session.terminate_generation(generation, reason).await;
                RefreshOutcome::Failed(reason)
            }
        };
        *self.slot.lock().await = Slot::Idle;
        outcome
    }

    /// Returns the new access token and, if the backend rotated it, the new
    /// refresh token.
    async fn request_token(&self) -> Result<(String, Option<String>), SessionEndReason> {
        let refresh_token = self
            .session
            .refresh_token()
            .await
            .ok_or(SessionEndReason::NoRefreshToken)?;

        let mut request = ApiRequest::post(REFRESH_PATH);
        request.body = Some(serde_json::json!({ "refreshToken": refresh_token }));

        self.refresh_calls.fetch_add(1, Ordering::Relaxed);
        info!("Refreshing access token");
        let response = self.transport.send(&request).await.map_err(|e| {
            warn!(error = %e, "Refresh request failed to send");
            SessionEndReason::RefreshUnavailable
        })?;

        if !response.is_success() {
            return Err(SessionEndReason::RefreshRejected(response.status));
        }
        match response.json::<RefreshResponse>() {
            Ok(RefreshResponse {
                token: Some(token),
                refresh_token,
            }) if !token.is_empty() => Ok((token, refresh_token)),
            _ => Err(SessionEndReason::MalformedRefreshResponse),
        }
    }
}

/// Transport decorator that turns an expired-token response into a refresh
/// followed by one replay of the same request.
///
/// The replay goes straight to the wrapped transport with the fresh token
/// set on it, bypassing any signer, so it cannot pick up an older token.
pub struct RefreshOnExpiry<T> {
    inner: T,
    coordinator: RefreshCoordinator,
}

impl<T: Transport> RefreshOnExpiry<T> {
    pub fn new(inner: T, coordinator: RefreshCoordinator) -> Self {
        Self { inner, coordinator }
    }
}

#[async_trait]
impl<T: Transport> Transport for RefreshOnExpiry<T> {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let response = self.inner.send(request).await?;
        if response.is_success() || !is_expired_token(&response) {
            return Ok(response);
        }
        if request.replayed {
            warn!(path = %request.path, "Replayed request expired again");
            return Err(self.coordinator.abandon(SessionEndReason::RetryLoopGuard).await);
        }

        let token = self.coordinator.fresh_token(request.bearer_token()).await?;
        let replay = request.replay_with(&token)?;
        debug!(method = %replay.method, path = %replay.path, "Replaying request with refreshed token");

        let response = self.inner.send(&replay).await?;
        if !response.is_success() && is_expired_token(&response) {
            warn!(path = %replay.path, "Replayed request expired again");
            return Err(self.coordinator.abandon(SessionEndReason::RetryLoopGuard).await);
        }
        Ok(response)
    }
}
