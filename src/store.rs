// SPDX-FileCopyrightText: 2026 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Retention records and the in-memory share store.
//!
//! The store keeps every record in a map plus a secondary ordering by
//! expiry time, both mutated inside the same critical section so a record
//! is never present in one and absent from the other. Readers treat an
//! expired-but-not-yet-reaped record as not found; physical deletion is the
//! reaper's job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Validation failures raised at record creation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("title must not be empty")]
    EmptyTitle,

    #[error("title exceeds {max} characters")]
    TitleTooLong { max: usize },

    #[error("a share needs text, a file, or both")]
    NoPayload,
}

/// Reference to an object held by the blob store. All-or-nothing by
/// construction: a record either carries a complete reference or none.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlobRef {
    /// Backend path/name of the object
    pub path: String,
    /// Resolved public URL (may be a relative serving path)
    pub public_url: String,
    /// Name the file was uploaded under
    pub original_name: String,
    /// Object size in bytes
    pub size_bytes: u64,
    /// MIME type reported at upload
    pub mime_type: String,
}

/// Metadata record for one shared item. Content fields are set once at
/// creation and never updated; the reaper destroys the whole record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionRecord {
    pub id: Uuid,
    pub title: String,
    pub inline_text: Option<String>,
    pub blob: Option<BlobRef>,
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl RetentionRecord {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_protected(&self) -> bool {
        self.password_hash.is_some()
    }
}

/// Input for creating a record.
#[derive(Debug, Clone, Default)]
pub struct NewShare {
    pub title: String,
    pub inline_text: Option<String>,
    pub blob: Option<BlobRef>,
    pub password_hash: Option<String>,
}

/// One page of live records.
#[derive(Debug, Clone)]
pub struct SharePage {
    pub items: Vec<RetentionRecord>,
    pub has_more: bool,
    pub total: usize,
}

#[derive(Debug, Default)]
struct StoreInner {
    records: HashMap<Uuid, RetentionRecord>,
    // Secondary ordering by expiry instant; the Uuid disambiguates records
    // expiring at the same instant.
    by_expiry: BTreeMap<(DateTime<Utc>, Uuid), ()>,
}

/// In-memory retention record store with an expiry index.
pub struct ShareStore {
    ttl: Duration,
    max_title_chars: usize,
    inner: RwLock<StoreInner>,
}

impl ShareStore {
    pub fn new(ttl: Duration, max_title_chars: usize) -> Self {
        Self {
            ttl,
            max_title_chars,
            inner: RwLock::new(StoreInner::default()),
        }
    }

    /// Create a record: validates the input, stamps `created_at = now` and
    /// `expires_at = now + ttl`, and indexes it by expiry atomically.
    pub async fn create(&self, share: NewShare) -> Result<RetentionRecord, StoreError> {
        let title = share.title.trim().to_string();
        if title.is_empty() {
            return Err(StoreError::EmptyTitle);
        }
        if title.chars().count() > self.max_title_chars {
            return Err(StoreError::TitleTooLong {
                max: self.max_title_chars,
            });
        }
        let has_text = share
            .inline_text
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty());
        if !has_text && share.blob.is_none() {
            return Err(StoreError::NoPayload);
        }

        let created_at = Utc::now();
        let expires_at = created_at + chrono::Duration::milliseconds(self.ttl.as_millis() as i64);
        let record = RetentionRecord {
            id: Uuid::new_v4(),
            title,
            inline_text: if has_text { share.inline_text } else { None },
            blob: share.blob,
            password_hash: share.password_hash,
            created_at,
            expires_at,
        };

        let mut inner = self.inner.write().await;
        inner.by_expiry.insert((record.expires_at, record.id), ());
        inner.records.insert(record.id, record.clone());
        debug!(id = %record.id, expires_at = %record.expires_at, "share created");
        Ok(record)
    }

    /// Look up a live record. Absent ids and expired records are
    /// indistinguishable to callers, whether or not the reaper has run.
    pub async fn get(&self, id: Uuid) -> Option<RetentionRecord> {
        let inner = self.inner.read().await;
        inner
            .records
            .get(&id)
            .filter(|record| !record.is_expired_at(Utc::now()))
            .cloned()
    }

    /// Remove a record and its index entry. Idempotent; returns whether a
    /// record was actually removed. The caller must have dealt with any
    /// associated blob first.
    pub async fn delete(&self, id: Uuid) -> bool {
        let mut inner = self.inner.write().await;
        match inner.records.remove(&id) {
            Some(record) => {
                inner.by_expiry.remove(&(record.expires_at, record.id));
                debug!(id = %id, "share deleted");
                true
            }
            None => false,
        }
    }

    /// One page of live records, newest-first. Pages are 1-based.
    pub async fn list_page(&self, page: usize, page_size: usize) -> SharePage {
        let now = Utc::now();
        let page = page.max(1);
        let inner = self.inner.read().await;

        let mut live: Vec<&RetentionRecord> = inner
            .records
            .values()
            .filter(|record| !record.is_expired_at(now))
            .collect();
        live.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = live.len();
        let start = (page - 1).saturating_mul(page_size);
        let items: Vec<RetentionRecord> = live
            .into_iter()
            .skip(start)
            .take(page_size)
            .cloned()
            .collect();
        let has_more = start + items.len() < total;

        SharePage {
            items,
            has_more,
            total,
        }
    }

    /// All records whose expiry instant has passed, via an index range scan
    /// rather than a full table walk.
    pub async fn expired(&self, now: DateTime<Utc>) -> Vec<RetentionRecord> {
        let inner = self.inner.read().await;
        inner
            .by_expiry
            .range(..=(now, Uuid::max()))
            .filter_map(|((_, id), ())| inner.records.get(id))
            .cloned()
            .collect()
    }

    /// Number of records physically present, expired or not.
    pub async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Number of records still within their retention window.
    pub async fn live_count(&self) -> usize {
        let now = Utc::now();
        let inner = self.inner.read().await;
        inner
            .records
            .values()
            .filter(|record| !record.is_expired_at(now))
            .count()
    }
}
