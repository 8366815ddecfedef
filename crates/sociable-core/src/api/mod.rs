//! REST API client for the social backend.
//!
//! Every call goes through a pipeline of transport decorators:
//!
//! - `Signed`: attaches the session's bearer token
//! - `RefreshOnExpiry`: detects the expired-token response, runs the
//!   single-flight refresh through `RefreshCoordinator` and replays once
//! - `HttpTransport`: the reqwest-backed base call
//!
//! `ApiClient` builds that pipeline and exposes the typed endpoints.

pub mod client;
pub mod error;
pub mod expiry;
pub mod refresh;
pub mod request;
pub mod signer;
pub mod transport;

pub use client::{ApiClient, DEFAULT_MESSAGE_PAGE_SIZE};
pub use error::{ApiError, SessionEndReason};
pub use expiry::{classify, Classification};
pub use refresh::{RefreshCoordinator, RefreshOnExpiry, RefreshState};
pub use request::{ApiRequest, ApiResponse};
pub use signer::Signed;
pub use transport::{HttpTransport, Transport, REQUEST_TIMEOUT_SECS};
