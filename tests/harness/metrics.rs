// SPDX-FileCopyrightText: 2026 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Outcome collection for pressure-pattern simulation results.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Possible outcomes for a simulated request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Allowed,
    Delayed,
    Rejected,
}

/// Collects outcomes during a pressure simulation.
#[derive(Debug, Default)]
pub struct PressureMetrics {
    start_time: Option<Instant>,
    end_time: Option<Instant>,
    outcomes: HashMap<Outcome, usize>,
    requests_per_key: HashMap<String, usize>,
    /// Total artificial delay the tracker asked for, in milliseconds
    total_delay_ms: u64,
}

impl PressureMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {
        self.start_time = Some(Instant::now());
    }

    pub fn finish(&mut self) {
        self.end_time = Some(Instant::now());
    }

    /// Record one request outcome.
    pub fn record(&mut self, outcome: Outcome, key: &str, delay_ms: u64) {
        *self.outcomes.entry(outcome).or_insert(0) += 1;
        *self.requests_per_key.entry(key.to_string()).or_insert(0) += 1;
        self.total_delay_ms += delay_ms;
    }

    pub fn total_requests(&self) -> usize {
        self.outcomes.values().sum()
    }

    pub fn count(&self, outcome: Outcome) -> usize {
        self.outcomes.get(&outcome).copied().unwrap_or(0)
    }

    /// Requests that got through, with or without delay.
    pub fn admitted(&self) -> usize {
        self.count(Outcome::Allowed) + self.count(Outcome::Delayed)
    }

    pub fn total_delay(&self) -> Duration {
        Duration::from_millis(self.total_delay_ms)
    }

    pub fn duration(&self) -> Duration {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => end.duration_since(start),
            (Some(start), None) => start.elapsed(),
            _ => Duration::ZERO,
        }
    }

    /// Ratio of rejected to total (0.0-1.0).
    pub fn rejection_rate(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            return 0.0;
        }
        self.count(Outcome::Rejected) as f64 / total as f64
    }

    pub fn unique_keys(&self) -> usize {
        self.requests_per_key.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_and_rates() {
        let mut metrics = PressureMetrics::new();
        metrics.start();
        for _ in 0..3 {
            metrics.record(Outcome::Allowed, "k1", 0);
        }
        metrics.record(Outcome::Delayed, "k1", 500);
        for _ in 0..6 {
            metrics.record(Outcome::Rejected, "k1", 0);
        }
        metrics.finish();

        assert_eq!(metrics.total_requests(), 10);
        assert_eq!(metrics.admitted(), 4);
        assert_eq!(metrics.total_delay(), Duration::from_millis(500));
        assert!((metrics.rejection_rate() - 0.6).abs() < 0.01);
        assert_eq!(metrics.unique_keys(), 1);
    }
}
