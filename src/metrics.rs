// SPDX-FileCopyrightText: 2026 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Prometheus counters for the quota and retention paths.

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// Service-wide metrics, registered on a private registry and rendered at
/// `GET /metrics`.
pub struct Metrics {
    registry: Registry,
    /// Requests admitted, by quota tier
    pub admitted: IntCounterVec,
    /// Requests admitted with graduated delay, by quota tier
    pub delayed: IntCounterVec,
    /// Requests rejected over-limit, by quota tier
    pub rejected: IntCounterVec,
    /// Shares created
    pub shares_created: IntCounter,
    /// Metadata records deleted by the reaper
    pub shares_reaped: IntCounter,
    /// Blobs deleted by the reaper
    pub blobs_reaped: IntCounter,
    /// Per-item reaper failures
    pub reap_errors: IntCounter,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let admitted = IntCounterVec::new(
            Opts::new("driftbin_requests_admitted_total", "Requests admitted by the quota tracker"),
            &["tier"],
        )?;
        let delayed = IntCounterVec::new(
            Opts::new("driftbin_requests_delayed_total", "Requests admitted with graduated delay"),
            &["tier"],
        )?;
        let rejected = IntCounterVec::new(
            Opts::new("driftbin_requests_rejected_total", "Requests rejected over quota"),
            &["tier"],
        )?;
        let shares_created =
            IntCounter::new("driftbin_shares_created_total", "Shares created")?;
        let shares_reaped =
            IntCounter::new("driftbin_shares_reaped_total", "Expired records deleted")?;
        let blobs_reaped =
            IntCounter::new("driftbin_blobs_reaped_total", "Expired blobs deleted")?;
        let reap_errors =
            IntCounter::new("driftbin_reap_errors_total", "Per-item reaper failures")?;

        registry.register(Box::new(admitted.clone()))?;
        registry.register(Box::new(delayed.clone()))?;
        registry.register(Box::new(rejected.clone()))?;
        registry.register(Box::new(shares_created.clone()))?;
        registry.register(Box::new(shares_reaped.clone()))?;
        registry.register(Box::new(blobs_reaped.clone()))?;
        registry.register(Box::new(reap_errors.clone()))?;

        Ok(Self {
            registry,
            admitted,
            delayed,
            rejected,
            shares_created,
            shares_reaped,
            blobs_reaped,
            reap_errors,
        })
    }

    /// Render the registry in the Prometheus text format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer).unwrap_or_default())
    }
}
