//! Persistence of the access/refresh token pair.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::TokenStoreError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tokens {
    pub access: String,
    pub refresh: Option<String>,
}

pub trait TokenStore: Send + Sync {
    fn load(&self) -> Result<Option<Tokens>, TokenStoreError>;
    fn save(&self, tokens: &Tokens) -> Result<(), TokenStoreError>;
    fn clear(&self) -> Result<(), TokenStoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: Mutex<Option<Tokens>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(tokens: Tokens) -> Self {
        Self {
            tokens: Mutex::new(Some(tokens)),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<Tokens>, TokenStoreError> {
        Ok(self.tokens.lock().clone())
    }

    fn save(&self, tokens: &Tokens) -> Result<(), TokenStoreError> {
        *self.tokens.lock() = Some(tokens.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), TokenStoreError> {
        *self.tokens.lock() = None;
        Ok(())
    }
}

/// Tokens persisted as a small JSON file between CLI invocations.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<Tokens>, TokenStoreError> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn save(&self, tokens: &Tokens) -> Result<(), TokenStoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, serde_json::to_vec_pretty(tokens)?)?;
        debug!(path = %self.path.display(), "tokens saved");
        Ok(())
    }

    fn clear(&self) -> Result<(), TokenStoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{FileTokenStore, MemoryTokenStore, TokenStore, Tokens};

    fn pair() -> Tokens {
        Tokens {
            access: "a".into(),
            refresh: Some("r".into()),
        }
    }

    #[test]
    fn memory_store_save_and_clear() {
        let store = MemoryTokenStore::new();
        assert_eq!(store.load().expect("load"), None);
        store.save(&pair()).expect("save");
        assert_eq!(store.load().expect("load"), Some(pair()));
        store.clear().expect("clear");
        assert_eq!(store.load().expect("load"), None);
    }

    #[test]
    fn file_store_persists_across_instances() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("tokens.json");

        FileTokenStore::new(&path).save(&pair()).expect("save");
        let reopened = FileTokenStore::new(&path);
        assert_eq!(reopened.load().expect("load"), Some(pair()));

        reopened.clear().expect("clear");
        reopened.clear().expect("clear twice");
        assert_eq!(reopened.load().expect("load"), None);
    }

    #[test]
    fn file_store_rejects_garbage() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("tokens.json");
        std::fs::write(&path, b"not json").expect("write");
        assert!(FileTokenStore::new(&path).load().is_err());
    }
}
