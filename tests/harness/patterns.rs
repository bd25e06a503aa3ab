// SPDX-FileCopyrightText: 2026 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Pressure patterns for quota testing.

/// Pressure pattern configuration.
#[derive(Debug, Clone)]
pub struct PressureConfig {
    /// Total number of requests to send
    pub total_requests: usize,
    /// Number of distinct fingerprint keys issuing them
    pub unique_keys: usize,
    /// Number of distinct client addresses behind those keys
    pub unique_addrs: usize,
}

impl Default for PressureConfig {
    fn default() -> Self {
        Self {
            total_requests: 100,
            unique_keys: 1,
            unique_addrs: 1,
        }
    }
}

/// Predefined pressure patterns.
impl PressureConfig {
    /// Single-client flood: one fingerprint hammers one tier.
    pub fn single_client_flood() -> Self {
        Self {
            total_requests: 200,
            unique_keys: 1,
            unique_addrs: 1,
        }
    }

    /// NAT flood: many devices behind one address.
    pub fn nat_flood() -> Self {
        Self {
            total_requests: 200,
            unique_keys: 20,
            unique_addrs: 1,
        }
    }

    /// Distributed pressure: many clients, each under the per-key limit.
    pub fn distributed() -> Self {
        Self {
            total_requests: 400,
            unique_keys: 100,
            unique_addrs: 100,
        }
    }

    /// Slow drip: a single client staying under the per-key limit.
    pub fn slow_drip(per_key_max: u32) -> Self {
        Self {
            total_requests: per_key_max as usize,
            unique_keys: 1,
            unique_addrs: 1,
        }
    }
}

/// Expected outcome bounds for a pattern under a given tier.
pub struct PressureExpectations {
    /// Maximum ratio of requests that should get through
    pub max_admitted_ratio: f64,
    /// Minimum ratio that should be rejected
    pub min_rejected_ratio: f64,
    /// Description of expected behavior
    pub description: &'static str,
}

impl PressureConfig {
    /// Expected outcomes when every key targets a tier with `per_key_max`
    /// slots per window, all inside one window.
    pub fn expectations(&self, per_key_max: u32) -> PressureExpectations {
        let budget = self.unique_keys as f64 * f64::from(per_key_max);
        let admitted = (budget / self.total_requests as f64).min(1.0);

        if admitted >= 1.0 {
            PressureExpectations {
                max_admitted_ratio: 1.0,
                min_rejected_ratio: 0.0,
                description: "Within budget, nothing should be rejected",
            }
        } else {
            PressureExpectations {
                max_admitted_ratio: admitted,
                min_rejected_ratio: 1.0 - admitted,
                description: "Over budget, the excess must be rejected",
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flood_expectations_cap_admissions() {
        let expectations = PressureConfig::single_client_flood().expectations(10);
        assert!((expectations.max_admitted_ratio - 0.05).abs() < 1e-9);
        assert!((expectations.min_rejected_ratio - 0.95).abs() < 1e-9);
    }

    #[test]
    fn slow_drip_is_never_rejected() {
        let expectations = PressureConfig::slow_drip(10).expectations(10);
        assert_eq!(expectations.min_rejected_ratio, 0.0);
    }
}
