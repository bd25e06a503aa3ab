// SPDX-FileCopyrightText: 2026 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTTP handlers for the driftbin sharing service.
//!
//! The handlers stay thin: admission control via the quota tracker, field
//! parsing, then one call into the store/blob/reaper core. Every handler
//! resolves the caller's fingerprint and must pass both the global ceiling
//! and its endpoint tier before doing any work.

use crate::blob::BlobStore;
use crate::config::{Config, QuotaPolicy};
use crate::error::{AppError, Result};
use crate::fingerprint;
use crate::metrics::Metrics;
use crate::quota::{QuotaDecision, QuotaTracker};
use crate::reaper::Reaper;
use crate::store::{BlobRef, NewShare, RetentionRecord, ShareStore};
use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::extract::{ConnectInfo, Multipart, Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub quota: QuotaTracker,
    pub store: Arc<ShareStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub reaper: Arc<Reaper>,
    pub metrics: Arc<Metrics>,
    pub started_at: Instant,
}

/// Resolve the fingerprint and pass the request through the global ceiling
/// plus its endpoint tier. `Delayed` sleeps here so the handler body only
/// ever sees an admitted request.
async fn admit(
    state: &AppState,
    headers: &HeaderMap,
    addr: SocketAddr,
    tier: &QuotaPolicy,
) -> Result<String> {
    let key = fingerprint::fingerprint_key(headers, Some(addr.ip()));
    let decision = state
        .quota
        .check_request(&key, &state.config.quota.global, tier)
        .await;

    match decision {
        QuotaDecision::Allowed => {
            state.metrics.admitted.with_label_values(&[tier.name.as_str()]).inc();
        }
        QuotaDecision::Delayed { delay_ms } => {
            state.metrics.delayed.with_label_values(&[tier.name.as_str()]).inc();
            debug!(key = %key, tier = %tier.name, delay_ms, "slowing request before admission");
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
        QuotaDecision::Rejected { retry_after_secs } => {
            state.metrics.rejected.with_label_values(&[tier.name.as_str()]).inc();
            info!(key = %key, tier = %tier.name, retry_after_secs, "request rejected over quota");
            return Err(AppError::QuotaExceeded { retry_after_secs });
        }
    }
    Ok(key)
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AppError::Internal(format!("password hashing failed: {err}")))
}

fn verify_password(hash: &str, password: &str) -> Result<()> {
    let parsed = PasswordHash::new(hash)
        .map_err(|err| AppError::Internal(format!("stored password hash unreadable: {err}")))?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| AppError::PasswordIncorrect)
}

/// Enforce a record's password gate for a read.
fn check_access(record: &RetentionRecord, supplied: Option<&str>) -> Result<()> {
    match (&record.password_hash, supplied) {
        (None, _) => Ok(()),
        (Some(_), None) => Err(AppError::PasswordRequired),
        (Some(hash), Some(password)) => verify_password(hash, password),
    }
}

fn parse_share_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::Validation("invalid share id".to_string()))
}

/// URL a client should fetch the file from: the backend's public URL when
/// it is absolute, otherwise this service's own streaming route.
fn file_url(record: &RetentionRecord) -> Option<String> {
    record.blob.as_ref().map(|blob| {
        if blob.public_url.starts_with("http://") || blob.public_url.starts_with("https://") {
            blob.public_url.clone()
        } else {
            format!("/file/{}", record.id)
        }
    })
}

// ---------------------------------------------------------------------------
// Upload

#[derive(Debug, Serialize)]
pub struct UploadData {
    pub title: String,
    pub has_text: bool,
    pub has_file: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub id: Uuid,
    pub share_link: String,
    pub expires_at: DateTime<Utc>,
    pub data: UploadData,
}

struct UploadForm {
    title: Option<String>,
    text: Option<String>,
    password: Option<String>,
    file: Option<(String, String, Vec<u8>)>, // original name, mime, bytes
}

async fn read_upload_form(mut multipart: Multipart, max_bytes: usize) -> Result<UploadForm> {
    let mut form = UploadForm {
        title: None,
        text: None,
        password: None,
        file: None,
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::Validation(format!("malformed multipart body: {err}")))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("title") => {
                form.title = Some(field.text().await.map_err(|err| {
                    AppError::Validation(format!("unreadable title field: {err}"))
                })?);
            }
            Some("text") => {
                form.text = Some(field.text().await.map_err(|err| {
                    AppError::Validation(format!("unreadable text field: {err}"))
                })?);
            }
            Some("password") => {
                form.password = Some(field.text().await.map_err(|err| {
                    AppError::Validation(format!("unreadable password field: {err}"))
                })?);
            }
            Some("file") => {
                let original_name = field
                    .file_name()
                    .filter(|n| !n.is_empty())
                    .unwrap_or("upload")
                    .to_string();
                let mime = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await.map_err(|err| {
                    AppError::Validation(format!("unreadable file field: {err}"))
                })?;
                if bytes.len() > max_bytes {
                    return Err(AppError::Validation(format!(
                        "file exceeds the {max_bytes} byte limit"
                    )));
                }
                form.file = Some((original_name, mime, bytes.to_vec()));
            }
            _ => {} // unknown fields are ignored
        }
    }

    Ok(form)
}

/// `POST /upload` — create a share from a multipart form.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<impl IntoResponse> {
    let key = admit(&state, &headers, addr, &state.config.quota.upload).await?;

    let form = read_upload_form(multipart, state.config.retention.max_upload_bytes).await?;

    // Reject bad input before touching the blob store so a validation
    // failure can never strand an orphaned object.
    let title = form
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Validation("title is required".to_string()))?
        .to_string();
    let has_text = form.text.as_deref().is_some_and(|t| !t.trim().is_empty());
    if !has_text && form.file.is_none() {
        return Err(AppError::Validation(
            "a share needs text, a file, or both".to_string(),
        ));
    }

    let password_hash = match form.password.as_deref().filter(|p| !p.is_empty()) {
        Some(password) => Some(hash_password(password)?),
        None => None,
    };

    let blob = match &form.file {
        Some((original_name, mime, bytes)) => {
            let stored = state.blobs.put(bytes, original_name, mime).await?;
            Some(BlobRef {
                path: stored.path,
                public_url: stored.public_url,
                original_name: original_name.clone(),
                size_bytes: bytes.len() as u64,
                mime_type: mime.clone(),
            })
        }
        None => None,
    };

    let record = match state
        .store
        .create(NewShare {
            title,
            inline_text: form.text,
            blob: blob.clone(),
            password_hash,
        })
        .await
    {
        Ok(record) => record,
        Err(err) => {
            // Unwind the blob we just wrote; best effort, the reaper cannot
            // see it because no record references it.
            if let Some(blob) = &blob {
                if let Err(cleanup_err) = state.blobs.delete(&blob.path).await {
                    warn!(path = %blob.path, error = %cleanup_err, "failed to unwind blob after rejected upload");
                }
            }
            return Err(err.into());
        }
    };

    state.metrics.shares_created.inc();
    info!(
        key = %key,
        id = %record.id,
        has_text = record.inline_text.is_some(),
        has_file = record.blob.is_some(),
        protected = record.is_protected(),
        expires_at = %record.expires_at,
        "share created"
    );

    let response = UploadResponse {
        success: true,
        id: record.id,
        share_link: format!(
            "{}/{}",
            state.config.public_base_url.trim_end_matches('/'),
            record.id
        ),
        expires_at: record.expires_at,
        data: UploadData {
            title: record.title.clone(),
            has_text: record.inline_text.is_some(),
            has_file: record.blob.is_some(),
            original_file_name: record.blob.as_ref().map(|b| b.original_name.clone()),
            file_size: record.blob.as_ref().map(|b| b.size_bytes),
            mime_type: record.blob.as_ref().map(|b| b.mime_type.clone()),
        },
    };
    Ok((StatusCode::CREATED, Json(response)))
}

// ---------------------------------------------------------------------------
// Reads

#[derive(Debug, Deserialize)]
pub struct ReadQuery {
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FileInfo {
    pub url: String,
    pub original_name: String,
    pub size: u64,
    pub mime_type: String,
}

#[derive(Debug, Serialize)]
pub struct ShareResponse {
    pub success: bool,
    pub id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<FileInfo>,
}

/// `GET /:id` — fetch one share's content.
pub async fn get_share(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<ReadQuery>,
) -> Result<Json<ShareResponse>> {
    admit(&state, &headers, addr, &state.config.quota.read).await?;

    let id = parse_share_id(&id)?;
    let record = state.store.get(id).await.ok_or(AppError::NotFound)?;
    check_access(&record, query.password.as_deref())?;

    let file = record.blob.as_ref().map(|blob| FileInfo {
        url: file_url(&record).unwrap_or_default(),
        original_name: blob.original_name.clone(),
        size: blob.size_bytes,
        mime_type: blob.mime_type.clone(),
    });

    Ok(Json(ShareResponse {
        success: true,
        id: record.id,
        title: record.title,
        created_at: record.created_at,
        expires_at: record.expires_at,
        text: record.inline_text,
        file,
    }))
}

/// `GET /file/:id` — redirect to the blob's public URL, or stream the bytes
/// when the backend has no absolute URL of its own.
pub async fn get_file(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<ReadQuery>,
) -> Result<Response> {
    admit(&state, &headers, addr, &state.config.quota.read).await?;

    let id = parse_share_id(&id)?;
    let record = state.store.get(id).await.ok_or(AppError::NotFound)?;
    check_access(&record, query.password.as_deref())?;

    let blob = record.blob.as_ref().ok_or(AppError::NotFound)?;

    if blob.public_url.starts_with("http://") || blob.public_url.starts_with("https://") {
        return Ok(Redirect::temporary(&blob.public_url).into_response());
    }

    let bytes = state.blobs.read(&blob.path).await?;
    let disposition = format!(
        "inline; filename=\"{}\"",
        blob.original_name.replace(['"', '\\'], "_")
    );
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, blob.mime_type.clone()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

// ---------------------------------------------------------------------------
// Listing

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub page: Option<usize>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ListFile {
    pub original_name: String,
    pub size_bytes: u64,
    pub mime_type: String,
}

#[derive(Debug, Serialize)]
pub struct ListItem {
    pub id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub protected: bool,
    pub has_text: bool,
    pub has_file: bool,
    /// Truncated text preview; withheld entirely for protected shares
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<ListFile>,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub success: bool,
    pub items: Vec<ListItem>,
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub has_more: bool,
}

const PREVIEW_CHARS: usize = 120;
const MAX_PAGE_SIZE: usize = 100;

fn preview_of(record: &RetentionRecord) -> Option<String> {
    if record.is_protected() {
        return None;
    }
    record
        .inline_text
        .as_deref()
        .map(|text| text.chars().take(PREVIEW_CHARS).collect())
}

/// `GET /all?page=&limit=` — paginated listing of live shares.
pub async fn list_all(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse>> {
    admit(&state, &headers, addr, &state.config.quota.list).await?;

    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20).clamp(1, MAX_PAGE_SIZE);

    let share_page = state.store.list_page(page, limit).await;
    let items = share_page
        .items
        .iter()
        .map(|record| ListItem {
            id: record.id,
            title: record.title.clone(),
            created_at: record.created_at,
            expires_at: record.expires_at,
            protected: record.is_protected(),
            has_text: record.inline_text.is_some(),
            has_file: record.blob.is_some(),
            preview: preview_of(record),
            file: record.blob.as_ref().map(|blob| ListFile {
                original_name: blob.original_name.clone(),
                size_bytes: blob.size_bytes,
                mime_type: blob.mime_type.clone(),
            }),
        })
        .collect();

    Ok(Json(ListResponse {
        success: true,
        items,
        page,
        limit,
        total: share_page.total,
        has_more: share_page.has_more,
    }))
}

// ---------------------------------------------------------------------------
// Admin & ops

/// `POST /cleanup` — trigger a reaper run now.
pub async fn trigger_cleanup(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Result<impl IntoResponse> {
    admit(&state, &headers, addr, &state.config.quota.admin).await?;
    let summary = state.reaper.run().await;
    Ok(Json(summary))
}

/// `GET /cleanup/stats` — reaper status and last-run summary.
pub async fn cleanup_stats(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Result<impl IntoResponse> {
    admit(&state, &headers, addr, &state.config.quota.admin).await?;
    let stats = state
        .reaper
        .stats(
            state.config.retention.reaper_enabled,
            state.config.retention.reaper_interval(),
        )
        .await;
    Ok(Json(stats))
}

#[derive(Debug, Serialize)]
pub struct RateLimitStatsResponse {
    pub success: bool,
    pub tracked_keys: usize,
    pub violations: Vec<crate::quota::ViolationStat>,
}

/// `GET /rate-limit/stats` — current violation counters.
pub async fn rate_limit_stats(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Result<impl IntoResponse> {
    admit(&state, &headers, addr, &state.config.quota.admin).await?;
    Ok(Json(RateLimitStatsResponse {
        success: true,
        tracked_keys: state.quota.tracked_keys().await,
        violations: state.quota.violation_stats().await,
    }))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub live_shares: usize,
}

/// `GET /health` — liveness probe.
pub async fn health(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Result<Json<HealthResponse>> {
    admit(&state, &headers, addr, &state.config.quota.health).await?;
    Ok(Json(HealthResponse {
        status: "healthy",
        service: "driftbin",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started_at.elapsed().as_secs(),
        live_shares: state.store.live_count().await,
    }))
}

/// `GET /metrics` — Prometheus text exposition. Left outside the quota
/// tiers so a scraper can never be locked out.
pub async fn metrics(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse> {
    let text = state
        .metrics
        .render()
        .map_err(|err| AppError::Internal(format!("metrics encoding failed: {err}")))?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_round_trip() {
        let hash = hash_password("secret").expect("hashing succeeds");
        assert!(verify_password(&hash, "secret").is_ok());
        assert!(matches!(
            verify_password(&hash, "wrong"),
            Err(AppError::PasswordIncorrect)
        ));
    }

    #[test]
    fn access_rules_follow_protection() {
        let mut record = RetentionRecord {
            id: Uuid::new_v4(),
            title: "t".to_string(),
            inline_text: Some("x".to_string()),
            blob: None,
            password_hash: None,
            created_at: Utc::now(),
            expires_at: Utc::now(),
        };
        assert!(check_access(&record, None).is_ok());

        record.password_hash = Some(hash_password("pw").expect("hashing succeeds"));
        assert!(matches!(
            check_access(&record, None),
            Err(AppError::PasswordRequired)
        ));
        assert!(matches!(
            check_access(&record, Some("nope")),
            Err(AppError::PasswordIncorrect)
        ));
        assert!(check_access(&record, Some("pw")).is_ok());
    }

    #[test]
    fn preview_withheld_for_protected_shares() {
        let record = RetentionRecord {
            id: Uuid::new_v4(),
            title: "t".to_string(),
            inline_text: Some("a".repeat(500)),
            blob: None,
            password_hash: Some("hash".to_string()),
            created_at: Utc::now(),
            expires_at: Utc::now(),
        };
        assert_eq!(preview_of(&record), None);

        let open = RetentionRecord {
            password_hash: None,
            ..record
        };
        assert_eq!(
            preview_of(&open).map(|p| p.chars().count()),
            Some(PREVIEW_CHARS)
        );
    }

    #[test]
    fn bad_share_ids_are_validation_errors() {
        assert!(matches!(
            parse_share_id("not-a-uuid"),
            Err(AppError::Validation(_))
        ));
        assert!(parse_share_id(&Uuid::new_v4().to_string()).is_ok());
    }
}
