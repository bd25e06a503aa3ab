// SPDX-FileCopyrightText: 2026 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Configuration for the driftbin sharing service.
//!
//! Every knob has a serde default so a partial config (or none at all)
//! yields a working service. `main.rs` overlays environment variables on top.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address (default: 0.0.0.0:8080)
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Public base URL used when building share links (default: http://localhost:8080)
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    /// Retention and cleanup configuration
    #[serde(default)]
    pub retention: RetentionConfig,

    /// Quota (rate limiting) configuration
    #[serde(default)]
    pub quota: QuotaConfig,

    /// Blob storage configuration
    #[serde(default)]
    pub blob: BlobConfig,
}

/// Retention and cleanup configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Time-to-live for every share in seconds (default: 10800 = 3 hours)
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Maximum upload size in bytes (default: 50 MiB)
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Maximum title length in characters (default: 200)
    #[serde(default = "default_max_title_chars")]
    pub max_title_chars: usize,

    /// Interval between scheduled reaper runs in seconds (default: 3600)
    #[serde(default = "default_reaper_interval_secs")]
    pub reaper_interval_secs: u64,

    /// Whether the scheduled reaper runs at all (default: true).
    /// Manual `POST /cleanup` triggers keep working either way.
    #[serde(default = "default_true")]
    pub reaper_enabled: bool,
}

/// A single named quota tier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuotaPolicy {
    /// Tier name used in tracking keys and log fields
    pub name: String,
    /// Counting window length in milliseconds
    pub window_ms: u64,
    /// Maximum requests per window
    pub max: u32,
    /// Request count after which graduated delay kicks in (0 = no delay)
    #[serde(default)]
    pub delay_after: u32,
    /// Delay increment per request past `delay_after`, in milliseconds
    #[serde(default)]
    pub base_delay_ms: u64,
    /// Upper bound on a single artificial delay, in milliseconds
    #[serde(default)]
    pub max_delay_ms: u64,
}

impl QuotaPolicy {
    /// Counting window as a duration.
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

/// All quota tiers. Each tier is tracked independently per fingerprint,
/// and every request must additionally pass the `global` tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaConfig {
    #[serde(default = "default_upload_policy")]
    pub upload: QuotaPolicy,
    #[serde(default = "default_read_policy")]
    pub read: QuotaPolicy,
    #[serde(default = "default_list_policy")]
    pub list: QuotaPolicy,
    #[serde(default = "default_admin_policy")]
    pub admin: QuotaPolicy,
    #[serde(default = "default_health_policy")]
    pub health: QuotaPolicy,
    #[serde(default = "default_global_policy")]
    pub global: QuotaPolicy,
}

/// Blob storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobConfig {
    /// Directory for stored blobs (default: ./blobs)
    #[serde(default = "default_blob_dir")]
    pub dir: String,

    /// Base URL prefix for public blob links; empty means the service
    /// streams bytes itself via `GET /file/:id` (default: empty)
    #[serde(default)]
    pub public_base_url: String,
}

// Default value functions

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_public_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_ttl_secs() -> u64 {
    10_800 // 3 hours
}

fn default_max_upload_bytes() -> usize {
    50 * 1024 * 1024
}

fn default_max_title_chars() -> usize {
    200
}

fn default_reaper_interval_secs() -> u64 {
    3_600
}

fn default_true() -> bool {
    true
}

fn default_blob_dir() -> String {
    "./blobs".to_string()
}

const FIFTEEN_MINUTES_MS: u64 = 15 * 60 * 1000;

fn default_upload_policy() -> QuotaPolicy {
    QuotaPolicy {
        name: "upload".to_string(),
        window_ms: FIFTEEN_MINUTES_MS,
        max: 10,
        delay_after: 3,
        base_delay_ms: 500,
        max_delay_ms: 5_000,
    }
}

fn default_read_policy() -> QuotaPolicy {
    QuotaPolicy {
        name: "read".to_string(),
        window_ms: FIFTEEN_MINUTES_MS,
        max: 100,
        delay_after: 0,
        base_delay_ms: 0,
        max_delay_ms: 0,
    }
}

fn default_list_policy() -> QuotaPolicy {
    QuotaPolicy {
        name: "list".to_string(),
        window_ms: FIFTEEN_MINUTES_MS,
        max: 200,
        delay_after: 0,
        base_delay_ms: 0,
        max_delay_ms: 0,
    }
}

fn default_admin_policy() -> QuotaPolicy {
    QuotaPolicy {
        name: "admin".to_string(),
        window_ms: 60 * 60 * 1000,
        max: 10,
        delay_after: 0,
        base_delay_ms: 0,
        max_delay_ms: 0,
    }
}

fn default_health_policy() -> QuotaPolicy {
    QuotaPolicy {
        name: "health".to_string(),
        window_ms: 60 * 1000,
        max: 1_000,
        delay_after: 0,
        base_delay_ms: 0,
        max_delay_ms: 0,
    }
}

fn default_global_policy() -> QuotaPolicy {
    QuotaPolicy {
        name: "global".to_string(),
        window_ms: FIFTEEN_MINUTES_MS,
        max: 300,
        delay_after: 0,
        base_delay_ms: 0,
        max_delay_ms: 0,
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            public_base_url: default_public_base_url(),
            retention: RetentionConfig::default(),
            quota: QuotaConfig::default(),
            blob: BlobConfig::default(),
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            max_upload_bytes: default_max_upload_bytes(),
            max_title_chars: default_max_title_chars(),
            reaper_interval_secs: default_reaper_interval_secs(),
            reaper_enabled: default_true(),
        }
    }
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            upload: default_upload_policy(),
            read: default_read_policy(),
            list: default_list_policy(),
            admin: default_admin_policy(),
            health: default_health_policy(),
            global: default_global_policy(),
        }
    }
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            dir: default_blob_dir(),
            public_base_url: String::new(),
        }
    }
}

impl RetentionConfig {
    /// Share time-to-live as a duration.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// Interval between scheduled reaper runs.
    pub fn reaper_interval(&self) -> Duration {
        Duration::from_secs(self.reaper_interval_secs)
    }
}
