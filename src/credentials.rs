//! Key store: the two API keys, persisted between sessions.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Two independent keys. Either may be empty (not configured).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(rename = "geminiApiKey", default)]
    pub gemini_api_key: String,
    #[serde(rename = "veoApiKey", default)]
    pub veo_api_key: String,
}

impl Credentials {
    pub fn new(gemini_api_key: impl Into<String>, veo_api_key: impl Into<String>) -> Self {
        Self {
            gemini_api_key: gemini_api_key.into(),
            veo_api_key: veo_api_key.into(),
        }
    }

    pub fn has_gemini_key(&self) -> bool {
        !self.gemini_api_key.trim().is_empty()
    }

    pub fn has_veo_key(&self) -> bool {
        !self.veo_api_key.trim().is_empty()
    }
}

/// Storage backend for [`Credentials`].
pub trait CredentialStore: Send + Sync {
    fn load_credentials(&self) -> Result<Credentials>;
    fn save_credentials(&self, credentials: &Credentials) -> Result<()>;
}

/// JSON file with the `geminiApiKey` / `veoApiKey` slots.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn load_credentials(&self) -> Result<Credentials> {
        if !self.path.exists() {
            return Ok(Credentials::default());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read credentials: {}", self.path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse credentials: {}", self.path.display()))
    }

    fn save_credentials(&self, credentials: &Credentials) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create dir {}", parent.display()))?;
            }
        }
        let body = serde_json::to_string_pretty(credentials)?;
        std::fs::write(&self.path, body)
            .with_context(|| format!("Failed to write credentials: {}", self.path.display()))
    }
}

/// Non-persistent store, handy for tests and one-shot CLI runs.
#[derive(Default)]
pub struct MemoryCredentialStore {
    inner: Mutex<Credentials>,
}

impl MemoryCredentialStore {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            inner: Mutex::new(credentials),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load_credentials(&self) -> Result<Credentials> {
        Ok(self.inner.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn save_credentials(&self, credentials: &Credentials) -> Result<()> {
        *self.inner.lock().unwrap_or_else(|e| e.into_inner()) = credentials.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_store_round_trips_through_named_slots() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("nested/credentials.json"));
        assert_eq!(store.load_credentials().unwrap(), Credentials::default());

        store
            .save_credentials(&Credentials::new("g-key", "v-key"))
            .unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["geminiApiKey"], "g-key");
        assert_eq!(value["veoApiKey"], "v-key");

        let loaded = store.load_credentials().unwrap();
        assert!(loaded.has_gemini_key());
        assert_eq!(loaded.veo_api_key, "v-key");
    }

    #[test]
    fn missing_slot_reads_as_unconfigured() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(&path, r#"{"geminiApiKey":"only-text"}"#).unwrap();

        let loaded = FileCredentialStore::new(&path).load_credentials().unwrap();
        assert!(loaded.has_gemini_key());
        assert!(!loaded.has_veo_key());
    }
}
