use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{watch, RwLock};
use tracing::{debug, info, warn};

use crate::api::SessionEndReason;
use crate::models::User;

use super::store::{StoredTokens, TokenStore};

/// Coarse authentication state published to the rest of the app.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Authenticated,
    Unauthenticated,
}

#[derive(Debug, Default)]
struct SessionData {
    access_token: Option<String>,
    refresh_token: Option<String>,
    user: Option<User>,
    /// Bumped by every login and termination.
    generation: u64,
}

impl SessionData {
    fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }

    fn stored(&self) -> StoredTokens {
        StoredTokens::new(self.access_token.clone(), self.refresh_token.clone())
    }
}

struct SessionInner {
    store: Box<dyn TokenStore>,
    data: RwLock<SessionData>,
    state: watch::Sender<AuthState>,
}

/// The authenticated session, owned by whoever builds the `ApiClient`.
///
/// Clone is cheap and every clone sees the same state. The session is the
/// only path into its `TokenStore`: login, refresh and terminate all write
/// through here so the in-memory copy and the persisted copy never diverge.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Empty session over `store`. Nothing is read from the store.
    pub fn new(store: impl TokenStore + 'static) -> Self {
        Self::from_parts(Box::new(store), SessionData::default())
    }

    /// Session restored from whatever `store` holds from a previous run.
    pub fn restore(store: impl TokenStore + 'static) -> Result<Self> {
        let data = match store.get()? {
            Some(tokens) if !tokens.is_empty() => SessionData {
                access_token: tokens.access_token,
                refresh_token: tokens.refresh_token,
                ..SessionData::default()
            },
            _ => SessionData::default(),
        };
        debug!(authenticated = data.is_authenticated(), "Session restored");
        Ok(Self::from_parts(Box::new(store), data))
    }

    fn from_parts(store: Box<dyn TokenStore>, data: SessionData) -> Self {
        let initial = if data.is_authenticated() {
            AuthState::Authenticated
        } else {
            AuthState::Unauthenticated
        };
        let (state, _) = watch::channel(initial);
        Self {
            inner: Arc::new(SessionInner {
                store,
                data: RwLock::new(data),
                state,
            }),
        }
    }

    pub async fn access_token(&self) -> Option<String> {
        self.inner.data.read().await.access_token.clone()
    }

    pub async fn refresh_token(&self) -> Option<String> {
        self.inner.data.read().await.refresh_token.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.inner.data.read().await.is_authenticated()
    }

    /// Cached identity of the logged-in user, if it has been fetched.
    pub async fn user(&self) -> Option<User> {
        self.inner.data.read().await.user.clone()
    }

    /// Cache `user` as the logged-in identity. Ignored (returns `false`)
    /// once the session has ended.
    pub async fn set_user(&self, user: User) -> bool {
        let mut data = self.inner.data.write().await;
        if !data.is_authenticated() {
            return false;
        }
        data.user = Some(user);
        true
    }

    /// Identifies the current login. A result computed under an older
    /// generation must not be written back.
    pub async fn generation(&self) -> u64 {
        self.inner.data.read().await.generation
    }

    /// Current auth state without subscribing.
    pub fn state(&self) -> AuthState {
        *self.inner.state.borrow()
    }

    /// Receiver that observes every change of `AuthState`.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.inner.state.subscribe()
    }

    /// Install the tokens returned by a successful login.
    pub async fn begin(
        &self,
        access_token: String,
        refresh_token: Option<String>,
        user: Option<User>,
    ) -> Result<()> {
        let mut data = self.inner.data.write().await;
        data.access_token = Some(access_token);
        data.refresh_token = refresh_token;
        data.user = user;
        data.generation += 1;
        let persisted = self.inner.store.set(&data.stored());
        drop(data);

        self.publish(AuthState::Authenticated);
        info!("Session started");
        persisted
    }

    /// Replace the access token after a refresh started under `generation`.
    /// A rotated refresh token replaces the stored one; `None` keeps the
    /// current refresh token.
    ///
    /// Returns `Ok(false)` without touching anything if the session was
    /// terminated or replaced since. The in-memory token is updated even when
    /// persisting fails; the error is returned for logging.
    pub async fn set_access_token(
        &self,
        generation: u64,
        access_token: String,
        refresh_token: Option<String>,
    ) -> Result<bool> {
        let mut data = self.inner.data.write().await;
        if data.generation != generation {
            return Ok(false);
        }
        data.access_token = Some(access_token);
        if refresh_token.is_some() {
            data.refresh_token = refresh_token;
        }
        self.inner.store.set(&data.stored())?;
        Ok(true)
    }

    /// Session terminator: clear tokens, the cached user and the store, then
    /// signal `Unauthenticated`.
    ///
    /// Returns `false` when there was nothing left to terminate.
    pub async fn terminate(&self, reason: SessionEndReason) -> bool {
        self.end(None, reason).await
    }

    /// Terminate only if the session is still the one identified by
    /// `generation`. A failed refresh for an older login must not end a
    /// newer one.
    pub async fn terminate_generation(&self, generation: u64, reason: SessionEndReason) -> bool {
        self.end(Some(generation), reason).await
    }

    async fn end(&self, expected: Option<u64>, reason: SessionEndReason) -> bool {
        let mut data = self.inner.data.write().await;
        if expected.is_some_and(|generation| generation != data.generation) {
            debug!(reason = %reason, "Session already replaced, not terminating");
            return false;
        }
        let had_state =
            data.access_token.is_some() || data.refresh_token.is_some() || data.user.is_some();
        if !had_state && self.state() == AuthState::Unauthenticated {
            return false;
        }
        let generation = data.generation + 1;
        *data = SessionData {
            generation,
            ..SessionData::default()
        };
        if let Err(e) = self.inner.store.clear() {
            warn!(error = %e, "Failed to clear token store");
        }
        drop(data);

        self.publish(AuthState::Unauthenticated);
        warn!(reason = %reason, "Session terminated");
        true
    }

    fn publish(&self, state: AuthState) {
        self.inner.state.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryTokenStore;
    use crate::testing::CountingStore;

    fn user() -> User {
        User {
            id: "u1".into(),
            username: "linh".into(),
            email: None,
            avatar_url: None,
            bio: None,
        }
    }

    #[tokio::test]
    async fn test_new_session_is_unauthenticated() {
        let session = Session::new(MemoryTokenStore::new());
        assert!(!session.is_authenticated().await);
        assert_eq!(session.state(), AuthState::Unauthenticated);
        assert_eq!(session.access_token().await, None);
    }

    #[tokio::test]
    async fn test_restore_from_store() {
        let store = MemoryTokenStore::with_tokens(StoredTokens::new(
            Some("a".into()),
            Some("r".into()),
        ));
        let session = Session::restore(store).unwrap();
        assert_eq!(session.access_token().await.as_deref(), Some("a"));
        assert_eq!(session.refresh_token().await.as_deref(), Some("r"));
        assert_eq!(session.state(), AuthState::Authenticated);
    }

    #[tokio::test]
    async fn test_begin_persists_and_signals() {
        let store = CountingStore::default();
        let session = Session::new(store.clone());
        let mut rx = session.subscribe();

        session
            .begin("a".into(), Some("r".into()), Some(user()))
            .await
            .unwrap();

        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), AuthState::Authenticated);
        assert_eq!(session.user().await.map(|u| u.id).as_deref(), Some("u1"));
        let stored = store.get().unwrap().unwrap();
        assert_eq!(stored.access_token.as_deref(), Some("a"));
        assert_eq!(stored.refresh_token.as_deref(), Some("r"));
    }

    #[tokio::test]
    async fn test_set_access_token_keeps_refresh_unless_rotated() {
        let session = Session::new(MemoryTokenStore::new());
        session.begin("a".into(), Some("r1".into()), None).await.unwrap();

        let generation = session.generation().await;

        assert!(session.set_access_token(generation, "b".into(), None).await.unwrap());
        assert_eq!(session.access_token().await.as_deref(), Some("b"));
        assert_eq!(session.refresh_token().await.as_deref(), Some("r1"));

        assert!(session
            .set_access_token(generation, "c".into(), Some("r2".into()))
            .await
            .unwrap());
        assert_eq!(session.refresh_token().await.as_deref(), Some("r2"));
    }

    #[tokio::test]
    async fn test_set_access_token_after_terminate_is_discarded() {
        let store = CountingStore::default();
        let session = Session::new(store.clone());
        session.begin("a".into(), Some("r".into()), None).await.unwrap();
        let generation = session.generation().await;

        session.terminate(SessionEndReason::RetryLoopGuard).await;
        let installed = session
            .set_access_token(generation, "late".into(), None)
            .await
            .unwrap();

        assert!(!installed);
        assert!(!session.is_authenticated().await);
        assert_eq!(session.state(), AuthState::Unauthenticated);
        assert_eq!(store.get().unwrap(), None);
    }

    #[tokio::test]
    async fn test_terminate_generation_spares_newer_login() {
        let store = CountingStore::default();
        let session = Session::new(store.clone());
        session.begin("a".into(), Some("r1".into()), None).await.unwrap();
        let old = session.generation().await;
        session.begin("b".into(), Some("r2".into()), None).await.unwrap();

        assert!(!session
            .terminate_generation(old, SessionEndReason::NoRefreshToken)
            .await);
        assert_eq!(session.access_token().await.as_deref(), Some("b"));
        assert_eq!(store.clears(), 0);

        let current = session.generation().await;
        assert!(session
            .terminate_generation(current, SessionEndReason::NoRefreshToken)
            .await);
        assert!(!session.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_set_user_ignored_after_terminate() {
        let session = Session::new(MemoryTokenStore::new());
        assert!(!session.set_user(user()).await);

        session.begin("a".into(), None, None).await.unwrap();
        assert!(session.set_user(user()).await);
        session.terminate(SessionEndReason::LoggedOut).await;

        assert!(!session.set_user(user()).await);
        assert_eq!(session.user().await, None);
    }

    #[tokio::test]
    async fn test_restore_ignores_empty_record() {
        let store = MemoryTokenStore::with_tokens(StoredTokens::new(None, None));
        let session = Session::restore(store).unwrap();
        assert_eq!(session.state(), AuthState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_terminate_is_idempotent() {
        let store = CountingStore::default();
        let session = Session::new(store.clone());
        session
            .begin("a".into(), Some("r".into()), Some(user()))
            .await
            .unwrap();
        let mut rx = session.subscribe();

        assert!(session.terminate(SessionEndReason::LoggedOut).await);
        assert!(!session.terminate(SessionEndReason::LoggedOut).await);

        assert_eq!(store.clears(), 1);
        assert_eq!(store.get().unwrap(), None);
        assert_eq!(session.access_token().await, None);
        assert_eq!(session.user().await, None);
        assert_eq!(*rx.borrow_and_update(), AuthState::Unauthenticated);
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_terminate_on_empty_session_does_nothing() {
        let store = CountingStore::default();
        let session = Session::new(store.clone());
        assert!(!session.terminate(SessionEndReason::NoRefreshToken).await);
        assert_eq!(store.clears(), 0);
    }
}
