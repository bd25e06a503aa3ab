// SPDX-FileCopyrightText: 2026 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Background deletion of expired shares.
//!
//! A run scans the expiry index, and for each expired record deletes the
//! blob first and the metadata record second. A record must never outlive
//! its blob reference's validity the other way around: if the crash point
//! is between the two deletes, the survivor is an orphaned blob, which the
//! next pass (or an operator) can remove, not a record pointing at nothing.
//!
//! A failed blob delete is logged and recorded but does not block the
//! record delete, and never aborts the rest of the batch. Every step is
//! delete-if-exists, so overlapping runs are tolerated; the `running` flag
//! only keeps a manual trigger from doubling the log noise of a scheduled
//! one.

use crate::blob::BlobStore;
use crate::metrics::Metrics;
use crate::store::ShareStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

/// Outcome of one reaper run.
#[derive(Debug, Clone, Serialize, Default)]
pub struct ReapSummary {
    /// Records found past their expiry instant
    pub total_expired: usize,
    /// Metadata records deleted
    pub deleted_shares: usize,
    /// Blobs deleted
    pub deleted_files: usize,
    /// Per-item failures, none of which aborted the run
    pub errors: Vec<String>,
    /// Whether this run was skipped because another was in flight
    pub skipped: bool,
    /// When the run finished
    pub finished_at: Option<DateTime<Utc>>,
}

/// Snapshot for the cleanup admin surface.
#[derive(Debug, Clone, Serialize)]
pub struct ReapStats {
    pub live_shares: usize,
    pub stored_records: usize,
    pub scheduled: bool,
    pub interval_secs: u64,
    pub last_run: Option<ReapSummary>,
}

/// Deletes expired records and their blobs.
pub struct Reaper {
    store: Arc<ShareStore>,
    blobs: Arc<dyn BlobStore>,
    metrics: Arc<Metrics>,
    running: AtomicBool,
    last_run: RwLock<Option<ReapSummary>>,
}

impl Reaper {
    pub fn new(store: Arc<ShareStore>, blobs: Arc<dyn BlobStore>, metrics: Arc<Metrics>) -> Self {
        Self {
            store,
            blobs,
            metrics,
            running: AtomicBool::new(false),
            last_run: RwLock::new(None),
        }
    }

    /// Run one pass over the expiry index. Zero expired records is a
    /// successful no-op.
    pub async fn run(&self) -> ReapSummary {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("reaper run already in progress, skipping trigger");
            return ReapSummary {
                skipped: true,
                finished_at: Some(Utc::now()),
                ..ReapSummary::default()
            };
        }

        let summary = self.run_inner().await;
        self.running.store(false, Ordering::Release);

        *self.last_run.write().await = Some(summary.clone());
        summary
    }

    async fn run_inner(&self) -> ReapSummary {
        let now = Utc::now();
        let expired = self.store.expired(now).await;
        let mut summary = ReapSummary {
            total_expired: expired.len(),
            ..ReapSummary::default()
        };

        for record in expired {
            // Blob first, record second.
            if let Some(blob) = &record.blob {
                match self.blobs.delete(&blob.path).await {
                    Ok(()) => {
                        summary.deleted_files += 1;
                        self.metrics.blobs_reaped.inc();
                    }
                    Err(err) => {
                        // An orphaned blob is the lesser failure; keep going
                        // and still remove the record.
                        error!(id = %record.id, path = %blob.path, error = %err, "blob delete failed during reaping");
                        self.metrics.reap_errors.inc();
                        summary
                            .errors
                            .push(format!("{}: blob {}: {}", record.id, blob.path, err));
                    }
                }
            }

            if self.store.delete(record.id).await {
                summary.deleted_shares += 1;
                self.metrics.shares_reaped.inc();
            }
        }

        summary.finished_at = Some(Utc::now());
        if summary.total_expired > 0 || !summary.errors.is_empty() {
            info!(
                total_expired = summary.total_expired,
                deleted_shares = summary.deleted_shares,
                deleted_files = summary.deleted_files,
                errors = summary.errors.len(),
                "reaper run finished"
            );
        }
        summary
    }

    /// Snapshot for `GET /cleanup/stats`.
    pub async fn stats(&self, scheduled: bool, interval: Duration) -> ReapStats {
        ReapStats {
            live_shares: self.store.live_count().await,
            stored_records: self.store.len().await,
            scheduled,
            interval_secs: interval.as_secs(),
            last_run: self.last_run.read().await.clone(),
        }
    }

    /// Spawn the scheduled loop. The first tick fires after one full
    /// interval, not at startup.
    pub fn spawn_scheduled(self: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await; // swallow the immediate first tick
            loop {
                ticker.tick().await;
                self.run().await;
            }
        })
    }
}
