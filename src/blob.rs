// SPDX-FileCopyrightText: 2026 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Blob storage behind a dyn-safe trait.
//!
//! The serving and cleanup paths only ever talk to [`BlobStore`]; which
//! backend holds the bytes is decided once, at startup. Deleting an absent
//! object is success, so reaper retries and overlapping runs stay harmless.

use async_trait::async_trait;
use rand::Rng;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

/// Blob backend failures.
#[derive(Debug, Error)]
pub enum BlobError {
    #[error("blob io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("blob not found: {0}")]
    NotFound(String),
}

/// Result of storing one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub path: String,
    pub public_url: String,
}

/// Object-store interface consumed by the upload, serving, and reaper paths.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes under a collision-resistant name derived from
    /// `suggested_name`.
    async fn put(
        &self,
        bytes: &[u8],
        suggested_name: &str,
        mime_type: &str,
    ) -> Result<StoredBlob, BlobError>;

    /// Remove an object. An already-absent path is success, not an error.
    async fn delete(&self, path: &str) -> Result<(), BlobError>;

    /// Fetch an object's bytes for streaming.
    async fn read(&self, path: &str) -> Result<Vec<u8>, BlobError>;

    /// Resolve the public URL for an object.
    fn public_url(&self, path: &str) -> String;
}

/// Build a unique object name from a timestamp, a random component, and a
/// sanitized version of the original base name, so concurrent uploads of
/// the same filename never collide.
pub fn unique_object_name(suggested_name: &str) -> String {
    let base: String = suggested_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(suggested_name)
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '-'
            }
        })
        .take(80)
        .collect();
    let base = if base.is_empty() {
        "blob".to_string()
    } else {
        base
    };

    let millis = chrono::Utc::now().timestamp_millis();
    let nonce: u32 = rand::thread_rng().gen();
    format!("{millis}-{nonce:08x}-{base}")
}

/// Filesystem-backed blob store. Objects live flat under one directory;
/// public URLs are `{base_url}/{name}` when a base URL is configured, else
/// the bare object name (the service then streams bytes itself).
pub struct FsBlobStore {
    dir: PathBuf,
    public_base_url: String,
}

impl FsBlobStore {
    pub async fn new(dir: impl Into<PathBuf>, public_base_url: &str) -> Result<Self, BlobError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn object_path(&self, name: &str) -> PathBuf {
        // Names are generated by unique_object_name and contain no
        // separators, but never trust a stored path blindly.
        let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
        self.dir.join(base)
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(
        &self,
        bytes: &[u8],
        suggested_name: &str,
        _mime_type: &str,
    ) -> Result<StoredBlob, BlobError> {
        let name = unique_object_name(suggested_name);
        tokio::fs::write(self.object_path(&name), bytes).await?;
        debug!(name = %name, size = bytes.len(), "blob stored");
        Ok(StoredBlob {
            public_url: self.public_url(&name),
            path: name,
        })
    }

    async fn delete(&self, path: &str) -> Result<(), BlobError> {
        match tokio::fs::remove_file(self.object_path(path)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>, BlobError> {
        match tokio::fs::read(self.object_path(path)).await {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(BlobError::NotFound(path.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn public_url(&self, path: &str) -> String {
        if self.public_base_url.is_empty() {
            path.to_string()
        } else {
            format!("{}/{}", self.public_base_url, path)
        }
    }
}

/// In-memory blob store used by tests and as a no-filesystem fallback.
#[derive(Default)]
pub struct MemoryBlobStore {
    objects: RwLock<HashMap<String, Vec<u8>>>,
    /// When set, `delete` fails for this path (test hook for partial-failure
    /// behavior in cleanup runs).
    fail_delete_path: RwLock<Option<String>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn contains(&self, path: &str) -> bool {
        self.objects.read().await.contains_key(path)
    }

    pub async fn object_count(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn fail_next_delete_of(&self, path: &str) {
        *self.fail_delete_path.write().await = Some(path.to_string());
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(
        &self,
        bytes: &[u8],
        suggested_name: &str,
        _mime_type: &str,
    ) -> Result<StoredBlob, BlobError> {
        let name = unique_object_name(suggested_name);
        self.objects
            .write()
            .await
            .insert(name.clone(), bytes.to_vec());
        Ok(StoredBlob {
            public_url: self.public_url(&name),
            path: name,
        })
    }

    async fn delete(&self, path: &str) -> Result<(), BlobError> {
        {
            let mut fail = self.fail_delete_path.write().await;
            if fail.as_deref() == Some(path) {
                *fail = None;
                return Err(BlobError::Io(std::io::Error::new(
                    ErrorKind::Other,
                    "injected delete failure",
                )));
            }
        }
        self.objects.write().await.remove(path);
        Ok(())
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>, BlobError> {
        self.objects
            .read()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| BlobError::NotFound(path.to_string()))
    }

    fn public_url(&self, path: &str) -> String {
        path.to_string()
    }
}
