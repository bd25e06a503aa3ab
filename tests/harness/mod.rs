// SPDX-FileCopyrightText: 2026 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Test harness for quota pressure-pattern simulation.
//!
//! This module provides utilities for simulating abusive request patterns
//! against the quota tracker to validate the admission controls.

pub mod generators;
pub mod metrics;
pub mod patterns;
