//! Authentication state: the owned `Session` and where its tokens live.
//!
//! - `Session`: in-memory tokens, cached user, auth-state signal, terminator
//! - `TokenStore`: durable storage for the tokens (`FileTokenStore`,
//!   `KeyringTokenStore`, `MemoryTokenStore`)

pub mod credentials;
pub mod session;
pub mod store;

pub use credentials::KeyringTokenStore;
pub use session::{AuthState, Session};
pub use store::{FileTokenStore, MemoryTokenStore, StoredTokens, TokenStore};
