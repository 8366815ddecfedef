use anyhow::{Context, Result};
use keyring::Entry;

use super::store::{StoredTokens, TokenStore};

const SERVICE_NAME: &str = "sociable";

/// Keychain account the session is stored under
const TOKEN_ACCOUNT: &str = "token";

/// Tokens kept in the OS keychain as a single JSON entry.
pub struct KeyringTokenStore {
    service: String,
}

impl KeyringTokenStore {
    pub fn new() -> Self {
        Self {
            service: SERVICE_NAME.to_string(),
        }
    }

    /// Use a different keychain service name, e.g. one per backend.
    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self) -> Result<Entry> {
        Entry::new(&self.service, TOKEN_ACCOUNT).context("Failed to create keyring entry")
    }
}

impl Default for KeyringTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenStore for KeyringTokenStore {
    fn get(&self) -> Result<Option<StoredTokens>> {
        match self.entry()?.get_password() {
            Ok(secret) => {
                let tokens = serde_json::from_str(&secret)
                    .context("Failed to parse session from keychain")?;
                Ok(Some(tokens))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve session from keychain"),
        }
    }

    fn set(&self, tokens: &StoredTokens) -> Result<()> {
        let secret = serde_json::to_string(tokens)?;
        self.entry()?
            .set_password(&secret)
            .context("Failed to store session in keychain")
    }

    fn clear(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete session from keychain"),
        }
    }
}
