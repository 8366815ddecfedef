use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Session file name in the storage directory
const SESSION_FILE: &str = "session.json";

/// Persisted form of the session. Tokens are opaque strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTokens {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub saved_at: DateTime<Utc>,
}

impl StoredTokens {
    pub fn new(access_token: Option<String>, refresh_token: Option<String>) -> Self {
        Self {
            access_token,
            refresh_token,
            saved_at: Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none()
    }
}

/// Durable holder of the session tokens.
///
/// Writes are synchronous: once `set` or `clear` returns, the change is on
/// disk (or in the keychain) and a partially written value is never visible.
pub trait TokenStore: Send + Sync {
    fn get(&self) -> Result<Option<StoredTokens>>;
    fn set(&self, tokens: &StoredTokens) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

impl<T: TokenStore + ?Sized> TokenStore for Box<T> {
    fn get(&self) -> Result<Option<StoredTokens>> {
        (**self).get()
    }

    fn set(&self, tokens: &StoredTokens) -> Result<()> {
        (**self).set(tokens)
    }

    fn clear(&self) -> Result<()> {
        (**self).clear()
    }
}

/// Tokens stored as JSON in a file under the app's data directory.
pub struct FileTokenStore {
    dir: PathBuf,
}

impl FileTokenStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(SESSION_FILE)
    }

    fn temp_path(&self) -> PathBuf {
        self.dir.join(format!("{}.tmp", SESSION_FILE))
    }

    fn write_atomic(&self, path: &Path, contents: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;
        let temp = self.temp_path();
        std::fs::write(&temp, contents).context("Failed to write session file")?;
        std::fs::rename(&temp, path).context("Failed to replace session file")?;
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self) -> Result<Option<StoredTokens>> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path).context("Failed to read session file")?;
        let tokens: StoredTokens =
            serde_json::from_str(&contents).context("Failed to parse session file")?;
        Ok(Some(tokens))
    }

    fn set(&self, tokens: &StoredTokens) -> Result<()> {
        let contents = serde_json::to_string_pretty(tokens)?;
        self.write_atomic(&self.path(), &contents)
    }

    fn clear(&self) -> Result<()> {
        let path = self.path();
        if path.exists() {
            std::fs::remove_file(&path).context("Failed to remove session file")?;
        }
        Ok(())
    }
}

/// Process-local store. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryTokenStore {
    tokens: Mutex<Option<StoredTokens>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(tokens: StoredTokens) -> Self {
        Self {
            tokens: Mutex::new(Some(tokens)),
        }
    }

    fn slot(&self) -> Result<std::sync::MutexGuard<'_, Option<StoredTokens>>> {
        self.tokens
            .lock()
            .map_err(|_| anyhow::anyhow!("Token store lock poisoned"))
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> Result<Option<StoredTokens>> {
        Ok(self.slot()?.clone())
    }

    fn set(&self, tokens: &StoredTokens) -> Result<()> {
        *self.slot()? = Some(tokens.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.slot()? = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_store_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path());
        assert_eq!(store.get().unwrap(), None);
        // Clearing an absent session is fine
        store.clear().unwrap();
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let tokens = StoredTokens::new(Some("access".into()), Some("refresh".into()));

        FileTokenStore::new(dir.path()).set(&tokens).unwrap();

        let reopened = FileTokenStore::new(dir.path());
        assert_eq!(reopened.get().unwrap(), Some(tokens));
        assert!(!dir.path().join("session.json.tmp").exists());
    }

    #[test]
    fn test_file_store_clear_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("nested"));
        store
            .set(&StoredTokens::new(Some("a".into()), None))
            .unwrap();
        assert!(store.path().exists());

        store.clear().unwrap();
        assert!(!store.path().exists());
        assert_eq!(store.get().unwrap(), None);
    }

    #[test]
    fn test_file_store_corrupt_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SESSION_FILE), "{not json").unwrap();
        assert!(FileTokenStore::new(dir.path()).get().is_err());
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryTokenStore::new();
        assert_eq!(store.get().unwrap(), None);

        let tokens = StoredTokens::new(Some("a".into()), Some("r".into()));
        store.set(&tokens).unwrap();
        assert_eq!(store.get().unwrap(), Some(tokens));

        store.clear().unwrap();
        assert_eq!(store.get().unwrap(), None);
    }

    #[test]
    fn test_stored_tokens_is_empty() {
        assert!(StoredTokens::new(None, None).is_empty());
        assert!(!StoredTokens::new(None, Some("r".into())).is_empty());
    }
}
