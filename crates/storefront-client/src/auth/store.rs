//! Durable client-side credential storage

use super::Credential;
use crate::error::{Error, Result};
use async_trait::async_trait;
use secrecy::ExposeSecret;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tokio::io::AsyncWriteExt;

/// Storage key of the access token.
pub const ACCESS_TOKEN_KEY: &str = "access-token";

/// Storage key of the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refresh-token";

/// String key/value storage that survives a process restart.
///
/// Only the [`TokenManager`](super::TokenManager) talks to the store, and
/// never while holding its credential lock.
#[async_trait]
pub trait CredentialStore: Send + Sync + fmt::Debug {
    /// Read a key. Absence is `Ok(None)`, not an error.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a key.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete a key. Deleting a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Restore a credential. A missing access token means "unauthenticated".
pub(crate) async fn load(store: &dyn CredentialStore) -> Result<Option<Credential>> {
    let Some(access) = store.get(ACCESS_TOKEN_KEY).await? else {
        return Ok(None);
    };

    let credential = match store.get(REFRESH_TOKEN_KEY).await? {
        Some(refresh) => Credential::new(access).with_refresh_token(refresh),
        None => Credential::new(access),
    };
    Ok(Some(credential))
}

pub(crate) async fn save(store: &dyn CredentialStore, credential: &Credential) -> Result<()> {
    store
        .set(ACCESS_TOKEN_KEY, credential.access_token().expose_secret())
        .await?;
    match credential.refresh_token() {
        Some(refresh) => store.set(REFRESH_TOKEN_KEY, refresh.expose_secret()).await,
        None => store.remove(REFRESH_TOKEN_KEY).await,
    }
}

pub(crate) async fn purge(store: &dyn CredentialStore) -> Result<()> {
    store.remove(ACCESS_TOKEN_KEY).await?;
    store.remove(REFRESH_TOKEN_KEY).await
}

/// Process-local store, lost on exit. The default when nothing else is
/// configured.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries().remove(key);
        Ok(())
    }
}

/// Store backed by a JSON object file.
///
/// Every write replaces the file through a `<name>.tmp` sibling and a rename,
/// so a crash never leaves a half-written file behind. On unix the file is
/// readable by its owner only.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: tokio::sync::Mutex<()>,
}

impl FileStore {
    /// Use `path` as the backing file. It is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(OsString::from)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    async fn read(&self) -> Result<BTreeMap<String, String>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                Error::Storage(format!("corrupt store {}: {}", self.path.display(), e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(io_error(&self.path, e)),
        }
    }

    async fn write(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(parent, e))?;
        }

        let tmp = self.temp_path();
        let bytes = serde_json::to_vec_pretty(entries)?;

        // A leftover from a crashed write may carry looser permissions.
        match tokio::fs::remove_file(&tmp).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
                return Err(io_error(&tmp, e));
            }
            _ => {}
        }

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options.open(&tmp).await.map_err(|e| io_error(&tmp, e))?;
        file.write_all(&bytes).await.map_err(|e| io_error(&tmp, e))?;
        file.sync_all().await.map_err(|e| io_error(&tmp, e))?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| io_error(&self.path, e))
    }

    async fn update(&self, f: impl FnOnce(&mut BTreeMap<String, String>) + Send) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read().await?;
        f(&mut entries);
        self.write(&entries).await
    }
}

#[async_trait]
impl CredentialStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().await;
        Ok(self.read().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
        .await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.update(|entries| {
            entries.remove(key);
        })
        .await
    }
}

fn io_error(path: &Path, err: std::io::Error) -> Error {
    Error::Storage(format!("{}: {}", path.display(), err))
}
