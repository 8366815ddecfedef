//! sociable-core: client library for the sociable social network.
//!
//! - `api`: request pipeline (signing, expiry detection, single-flight
//!   token refresh) and the typed endpoints
//! - `auth`: the owned `Session` and token persistence
//! - `chat`: paginated room history
//! - `config`: user configuration
//! - `models`: request and response bodies

pub mod api;
pub mod auth;
pub mod chat;
pub mod config;
pub mod models;

#[cfg(test)]
mod testing;

pub use api::{ApiClient, ApiError, SessionEndReason};
pub use auth::{AuthState, Session};
pub use config::Config;
