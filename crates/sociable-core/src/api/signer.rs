//! Request signer: attaches the session's bearer token.

use async_trait::async_trait;
use tracing::trace;

use crate::auth::Session;

use super::{ApiError, ApiRequest, ApiResponse, Transport};

/// Wraps a transport so every request carries the current access token.
///
/// With no token in the session the request goes out unmodified.
pub struct Signed<T> {
    inner: T,
    session: Session,
}

impl<T: Transport> Signed<T> {
    pub fn new(inner: T, session: Session) -> Self {
        Self { inner, session }
    }

    pub async fn sign(&self, request: &ApiRequest) -> Result<ApiRequest, ApiError> {
        let mut signed = request.clone();
        if let Some(token) = self.session.access_token().await {
            signed.set_bearer(&token)?;
            trace!(path = %request.path, "Signed request");
        }
        Ok(signed)
    }
}

#[async_trait]
impl<T: Transport> Transport for Signed<T> {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let signed = self.sign(request).await?;
        self.inner.send(&signed).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryTokenStore;
    use crate::testing::ScriptedTransport;

    #[tokio::test]
    async fn test_attaches_bearer_when_token_present() {
        let session = Session::new(MemoryTokenStore::new());
        session.begin("tok-a".into(), None, None).await.unwrap();
        let transport = ScriptedTransport::ok_everywhere();
        let signed = Signed::new(transport.clone(), session);

        signed.send(&ApiRequest::get("posts")).await.unwrap();

        let sent = transport.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].bearer_token(), Some("tok-a"));
    }

    #[tokio::test]
    async fn test_forwards_unmodified_without_token() {
        let session = Session::new(MemoryTokenStore::new());
        let transport = ScriptedTransport::ok_everywhere();
        let signed = Signed::new(transport.clone(), session);

        signed.send(&ApiRequest::get("posts")).await.unwrap();

        assert!(transport.requests()[0].headers.is_empty());
    }
}
