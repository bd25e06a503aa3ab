// SPDX-FileCopyrightText: 2026 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Fixed-window quota tracking with graduated delay.
//!
//! Counters are keyed by `"{tier}:{fingerprint}"` and live only in process
//! memory: a restart resets everything, which is acceptable for abuse
//! mitigation and explicitly not a security boundary. Absent state is
//! treated as zero prior requests, so the tracker itself never fails.

use crate::config::QuotaPolicy;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Admission decision for one request against one tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuotaDecision {
    /// Under the limit, no backpressure
    Allowed,
    /// Under the limit, but past the delay threshold; the caller should
    /// sleep this long before proceeding
    Delayed {
        /// Artificial delay to apply, in milliseconds
        delay_ms: u64,
    },
    /// Over the limit for the current window
    Rejected {
        /// Seconds until a retry can succeed
        retry_after_secs: u64,
    },
}

impl QuotaDecision {
    pub fn is_rejected(&self) -> bool {
        matches!(self, QuotaDecision::Rejected { .. })
    }

    /// Delay to apply, zero unless `Delayed`.
    pub fn delay_ms(&self) -> u64 {
        match self {
            QuotaDecision::Delayed { delay_ms } => *delay_ms,
            _ => 0,
        }
    }
}

/// Per-key, per-tier counting state.
#[derive(Debug)]
struct QuotaState {
    window_start: Instant,
    count: u32,
    delay_level: u32,
    window: Duration,
}

impl QuotaState {
    fn fresh(now: Instant, window: Duration) -> Self {
        Self {
            window_start: now,
            count: 0,
            delay_level: 0,
            window,
        }
    }

    fn window_elapsed(&self, now: Instant) -> bool {
        now.duration_since(self.window_start) >= self.window
    }
}

/// A recorded over-limit event for one fingerprint key.
#[derive(Debug)]
struct Violation {
    count: u64,
    last: Instant,
    window: Duration,
}

/// Violation counters exposed via the admin surface.
#[derive(Debug, Clone, Serialize)]
pub struct ViolationStat {
    /// Composite `"{tier}:{fingerprint}"` key
    pub key: String,
    /// Rejections recorded inside the still-open window
    pub violations: u64,
    /// Seconds since the most recent rejection
    pub last_violation_secs_ago: u64,
}

#[derive(Debug, Default)]
struct TrackerInner {
    states: HashMap<String, QuotaState>,
    violations: HashMap<String, Violation>,
}

/// Thread-safe quota tracker shared across all request handlers.
///
/// A key's read-modify-write happens entirely under the write lock, so two
/// concurrent requests racing for the last slot can never both be admitted.
pub struct QuotaTracker {
    inner: Arc<RwLock<TrackerInner>>,
}

impl Default for QuotaTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl QuotaTracker {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(TrackerInner::default())),
        }
    }

    /// Check one fingerprint key against one tier and count the request.
    ///
    /// The window is fixed-length: once `window_ms` has elapsed since the
    /// window opened, the counter resets and the window restarts at the
    /// current request. Requests past `delay_after` accrue graduated delay,
    /// `min(max_delay_ms, base_delay_ms * (count - delay_after))`, until the
    /// hard limit rejects with a full-window retry hint.
    pub async fn check_and_increment(&self, key: &str, policy: &QuotaPolicy) -> QuotaDecision {
        let state_key = format!("{}:{}", policy.name, key);
        let now = Instant::now();

        let mut guard = self.inner.write().await;
        let inner = &mut *guard;

        let state = inner
            .states
            .entry(state_key.clone())
            .or_insert_with(|| QuotaState::fresh(now, policy.window()));

        if state.window_elapsed(now) {
            *state = QuotaState::fresh(now, policy.window());
        }

        if state.count >= policy.max {
            let retry_after_secs = policy.window_ms / 1000;
            debug!(key = %state_key, tier = %policy.name, retry_after_secs, "quota exceeded");

            let violation = inner
                .violations
                .entry(state_key)
                .or_insert_with(|| Violation {
                    count: 0,
                    last: now,
                    window: policy.window(),
                });
            violation.count += 1;
            violation.last = now;
            violation.window = policy.window();

            return QuotaDecision::Rejected { retry_after_secs };
        }

        state.count += 1;

        if policy.delay_after > 0 && state.count > policy.delay_after {
            state.delay_level = state.count - policy.delay_after;
            let delay_ms =
                (policy.base_delay_ms * u64::from(state.delay_level)).min(policy.max_delay_ms);
            if delay_ms > 0 {
                debug!(key = %state_key, tier = %policy.name, delay_ms, "applying graduated delay");
                return QuotaDecision::Delayed { delay_ms };
            }
        }

        QuotaDecision::Allowed
    }

    /// Check a request against the global ceiling and its endpoint tier.
    ///
    /// Both tiers are counted; a rejection from either wins, and delays from
    /// both combine as the larger of the two.
    pub async fn check_request(
        &self,
        key: &str,
        global: &QuotaPolicy,
        tier: &QuotaPolicy,
    ) -> QuotaDecision {
        let global_decision = self.check_and_increment(key, global).await;
        if global_decision.is_rejected() {
            warn!(key, tier = %global.name, "request rejected by global ceiling");
            return global_decision;
        }

        let tier_decision = self.check_and_increment(key, tier).await;
        if tier_decision.is_rejected() {
            return tier_decision;
        }

        let delay_ms = global_decision.delay_ms().max(tier_decision.delay_ms());
        if delay_ms > 0 {
            QuotaDecision::Delayed { delay_ms }
        } else {
            QuotaDecision::Allowed
        }
    }

    /// Violations whose window has not yet elapsed, most-violated first.
    /// Expired entries are purged as a side effect.
    pub async fn violation_stats(&self) -> Vec<ViolationStat> {
        let now = Instant::now();
        let mut inner = self.inner.write().await;

        inner
            .violations
            .retain(|_, v| now.duration_since(v.last) < v.window);

        let mut stats: Vec<ViolationStat> = inner
            .violations
            .iter()
            .map(|(key, v)| ViolationStat {
                key: key.clone(),
                violations: v.count,
                last_violation_secs_ago: now.duration_since(v.last).as_secs(),
            })
            .collect();
        stats.sort_by(|a, b| b.violations.cmp(&a.violations));
        stats
    }

    /// Drop state whose window has elapsed (called periodically).
    pub async fn sweep(&self) {
        let now = Instant::now();
        let mut inner = self.inner.write().await;
        inner.states.retain(|_, state| !state.window_elapsed(now));
        inner
            .violations
            .retain(|_, v| now.duration_since(v.last) < v.window);
    }

    /// Number of tracked counter entries (for diagnostics).
    pub async fn tracked_keys(&self) -> usize {
        self.inner.read().await.states.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(name: &str, window_ms: u64, max: u32) -> QuotaPolicy {
        QuotaPolicy {
            name: name.to_string(),
            window_ms,
            max,
            delay_after: 0,
            base_delay_ms: 0,
            max_delay_ms: 0,
        }
    }

    #[tokio::test]
    async fn window_fills_rejects_then_resets() {
        let tracker = QuotaTracker::new();
        let policy = policy("upload", 1_000, 3);

        for i in 0..3 {
            let decision = tracker.check_and_increment("k", &policy).await;
            assert_eq!(decision, QuotaDecision::Allowed, "request {} in window", i + 1);
        }

        match tracker.check_and_increment("k", &policy).await {
            QuotaDecision::Rejected { retry_after_secs } => assert_eq!(retry_after_secs, 1),
            other => panic!("4th request should be rejected, got {other:?}"),
        }

        tokio::time::sleep(Duration::from_millis(1_050)).await;

        assert_eq!(
            tracker.check_and_increment("k", &policy).await,
            QuotaDecision::Allowed,
            "fresh window should admit again"
        );
    }

    #[tokio::test]
    async fn graduated_delay_grows_and_caps() {
        let tracker = QuotaTracker::new();
        let policy = QuotaPolicy {
            name: "upload".to_string(),
            window_ms: 60_000,
            max: 10,
            delay_after: 3,
            base_delay_ms: 500,
            max_delay_ms: 1_200,
        };

        for _ in 0..3 {
            assert_eq!(
                tracker.check_and_increment("k", &policy).await,
                QuotaDecision::Allowed
            );
        }

        assert_eq!(
            tracker.check_and_increment("k", &policy).await,
            QuotaDecision::Delayed { delay_ms: 500 }
        );
        assert_eq!(
            tracker.check_and_increment("k", &policy).await,
            QuotaDecision::Delayed { delay_ms: 1_000 }
        );
        // 3 past the threshold would be 1500ms but the cap clamps it
        assert_eq!(
            tracker.check_and_increment("k", &policy).await,
            QuotaDecision::Delayed { delay_ms: 1_200 }
        );
    }

    #[tokio::test]
    async fn concurrent_requests_admit_exactly_one_at_the_boundary() {
        let tracker = Arc::new(QuotaTracker::new());
        let policy = Arc::new(policy("admin", 60_000, 1));

        let mut handles = Vec::new();
        for _ in 0..2 {
            let tracker = tracker.clone();
            let policy = policy.clone();
            handles.push(tokio::spawn(async move {
                tracker.check_and_increment("same", &policy).await
            }));
        }

        let mut allowed = 0;
        let mut rejected = 0;
        for handle in handles {
            match handle.await.expect("task should not panic") {
                QuotaDecision::Allowed => allowed += 1,
                QuotaDecision::Rejected { .. } => rejected += 1,
                QuotaDecision::Delayed { .. } => panic!("no delay configured"),
            }
        }
        assert_eq!((allowed, rejected), (1, 1));
    }

    #[tokio::test]
    async fn tiers_track_independently() {
        let tracker = QuotaTracker::new();
        let upload = policy("upload", 60_000, 1);
        let read = policy("read", 60_000, 1);

        assert_eq!(
            tracker.check_and_increment("k", &upload).await,
            QuotaDecision::Allowed
        );
        // Same fingerprint, different tier: unaffected by the upload counter
        assert_eq!(
            tracker.check_and_increment("k", &read).await,
            QuotaDecision::Allowed
        );
        assert!(tracker.check_and_increment("k", &upload).await.is_rejected());
    }

    #[tokio::test]
    async fn global_ceiling_applies_in_addition_to_tier() {
        let tracker = QuotaTracker::new();
        let global = policy("global", 60_000, 2);
        let read = policy("read", 60_000, 100);

        assert!(!tracker.check_request("k", &global, &read).await.is_rejected());
        assert!(!tracker.check_request("k", &global, &read).await.is_rejected());
        // Tier has room, global does not
        assert!(tracker.check_request("k", &global, &read).await.is_rejected());
    }

    #[tokio::test]
    async fn violations_recorded_and_purged() {
        let tracker = QuotaTracker::new();
        let policy = policy("upload", 200, 1);

        assert_eq!(
            tracker.check_and_increment("k", &policy).await,
            QuotaDecision::Allowed
        );
        assert!(tracker.check_and_increment("k", &policy).await.is_rejected());
        assert!(tracker.check_and_increment("k", &policy).await.is_rejected());

        let stats = tracker.violation_stats().await;
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].violations, 2);
        assert_eq!(stats[0].key, "upload:k");

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(tracker.violation_stats().await.is_empty());
    }

    #[tokio::test]
    async fn sweep_drops_elapsed_windows() {
        let tracker = QuotaTracker::new();
        let policy = policy("read", 100, 5);

        tracker.check_and_increment("a", &policy).await;
        tracker.check_and_increment("b", &policy).await;
        assert_eq!(tracker.tracked_keys().await, 2);

        tokio::time::sleep(Duration::from_millis(150)).await;
        tracker.sweep().await;
        assert_eq!(tracker.tracked_keys().await, 0);
    }
}
