//! Durable storage for the session token.
//!
//! Exactly one value is persisted on the client: the bearer token, stored
//! under [`TOKEN_KEY`].

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde_json::{Map, Value};

use crate::errors::GymResult;

/// Key the token is stored under.
pub const TOKEN_KEY: &str = "token";

/// Storage backing a [`Session`](crate::Session).
pub trait TokenStore: Send + Sync {
    fn load(&self) -> GymResult<Option<String>>;
    fn save(&self, token: &str) -> GymResult<()>;
    fn clear(&self) -> GymResult<()>;
}

/// Token persisted as a small JSON document on disk.
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
    fn load(&self) -> GymResult<Option<String>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        // An unreadable file is the same as no session
        let Ok(doc) = serde_json::from_str::<Map<String, Value>>(&raw) else {
            tracing::warn!(path = %self.path.display(), "Ignoring unreadable token file");
            return Ok(None);
        };

        Ok(doc
            .get(TOKEN_KEY)
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    fn save(&self, token: &str) -> GymResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut doc = Map::new();
        doc.insert(TOKEN_KEY.to_string(), Value::String(token.to_string()));
        let body = Value::Object(doc).to_string();
        fs::write(&self.path, body)?;
        Ok(())
    }

    fn clear(&self) -> GymResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// In-process store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    slot: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> GymResult<Option<String>> {
        Ok(self.slot.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn save(&self, token: &str) -> GymResult<()> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> GymResult<()> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}
