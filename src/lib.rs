// SPDX-FileCopyrightText: 2026 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! driftbin — temporary content sharing.
//!
//! Clients upload text or a file (optionally password-protected), get a
//! unique link, and the content is physically deleted after a fixed
//! retention window. The crate is organized around two cores:
//!
//! - **Retention**: a record store with an expiry index, a blob store
//!   behind a trait, and a reaper that deletes each expired share's blob
//!   before its metadata record, exactly once per artifact.
//! - **Abuse control**: anonymous clients are fingerprinted from address
//!   and header characteristics, then held to tiered fixed-window quotas
//!   with graduated delay before hard rejection.
//!
//! The HTTP surface in [`handlers`] is a thin layer over those cores.

pub mod blob;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod handlers;
pub mod metrics;
pub mod quota;
pub mod reaper;
pub mod store;

pub use blob::{BlobStore, FsBlobStore, MemoryBlobStore};
pub use config::Config;
pub use error::AppError;
pub use quota::{QuotaDecision, QuotaTracker};
pub use reaper::{ReapSummary, Reaper};
pub use store::{RetentionRecord, ShareStore};
