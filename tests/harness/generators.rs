// SPDX-FileCopyrightText: 2026 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Test data generators for pressure-pattern simulation.

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use std::net::{IpAddr, Ipv4Addr};

/// Generate a pool of client addresses.
pub fn generate_addrs(count: usize) -> Vec<IpAddr> {
    (0..count)
        .map(|i| {
            // Use 10.x.x.x private range
            let a = ((i >> 16) & 0xFF) as u8;
            let b = ((i >> 8) & 0xFF) as u8;
            let c = (i & 0xFF) as u8;
            IpAddr::V4(Ipv4Addr::new(10, a, b, c))
        })
        .collect()
}

/// Generate header maps for distinct simulated devices.
pub fn generate_device_headers(count: usize) -> Vec<HeaderMap> {
    (0..count)
        .map(|i| {
            let mut headers = HeaderMap::new();
            headers.insert(
                HeaderName::from_static("user-agent"),
                HeaderValue::from_str(&format!("pressure-agent/{i}.0"))
                    .expect("ascii header value"),
            );
            headers.insert(
                HeaderName::from_static("accept-language"),
                HeaderValue::from_static("en-GB"),
            );
            headers
        })
        .collect()
}

/// Generate fingerprint keys for `devices` devices spread over `addrs`
/// addresses, round-robin.
pub fn generate_keys(addrs: usize, devices: usize) -> Vec<String> {
    let pool = generate_addrs(addrs);
    let headers = generate_device_headers(devices);
    (0..devices)
        .map(|i| {
            driftbin::fingerprint::fingerprint_key(&headers[i], Some(pool[i % pool.len()]))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_addrs_are_unique() {
        let addrs = generate_addrs(256);
        let unique: std::collections::HashSet<_> = addrs.iter().collect();
        assert_eq!(unique.len(), 256);
    }

    #[test]
    fn generated_keys_are_unique_per_device() {
        let keys = generate_keys(4, 32);
        let unique: std::collections::HashSet<_> = keys.iter().collect();
        // Devices sharing an address still differ by digest
        assert_eq!(unique.len(), 32);
    }
}
