// SPDX-FileCopyrightText: 2026 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Request-path error taxonomy and its HTTP mapping.
//!
//! Absent and expired shares are deliberately the same error: a reader must
//! never be able to tell "never existed" from "expired but not yet reaped".
//! Password failures are distinct from not-found so clients can prompt for
//! a password instead of treating the link as dead.

use crate::blob::BlobError;
use crate::store::StoreError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Application error types.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("share not found or expired")]
    NotFound,

    #[error("password required")]
    PasswordRequired,

    #[error("password incorrect")]
    PasswordIncorrect,

    #[error("quota exceeded, retry after {retry_after_secs}s")]
    QuotaExceeded { retry_after_secs: u64 },

    #[error("blob store error: {0}")]
    Blob(#[from] BlobError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        // Every store creation failure is caller input, not a server fault
        AppError::Validation(err.to_string())
    }
}

/// Result type alias for handlers.
pub type Result<T> = std::result::Result<T, AppError>;

/// JSON error body shared by every failure response.
#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
    code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    password_required: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after_secs: Option<u64>,
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::PasswordRequired | AppError::PasswordIncorrect => StatusCode::UNAUTHORIZED,
            AppError::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Blob(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION",
            AppError::NotFound => "NOT_FOUND",
            AppError::PasswordRequired => "PASSWORD_REQUIRED",
            AppError::PasswordIncorrect => "PASSWORD_INCORRECT",
            AppError::QuotaExceeded { .. } => "RATE_LIMITED",
            AppError::Blob(_) => "BLOB_STORE",
            AppError::Internal(_) => "INTERNAL",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }

        let body = ErrorBody {
            success: false,
            // Never leak backend detail in 5xx bodies
            error: if status.is_server_error() {
                "internal server error".to_string()
            } else {
                self.to_string()
            },
            code: self.code(),
            password_required: match self {
                AppError::PasswordRequired | AppError::PasswordIncorrect => Some(true),
                _ => None,
            },
            retry_after_secs: match self {
                AppError::QuotaExceeded { retry_after_secs } => Some(retry_after_secs),
                _ => None,
            },
        };

        if let AppError::QuotaExceeded { retry_after_secs } = self {
            (
                status,
                [("Retry-After", retry_after_secs.to_string())],
                Json(body),
            )
                .into_response()
        } else {
            (status, Json(body)).into_response()
        }
    }
}
