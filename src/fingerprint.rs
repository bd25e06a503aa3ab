// SPDX-FileCopyrightText: 2026 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Client fingerprinting for anonymous rate limiting.
//!
//! A fingerprint key is the resolved client address concatenated with a
//! truncated digest of device-ish request headers. Two devices behind the
//! same NAT share an address but usually differ in headers, so they get
//! distinct identities; a single device cannot trivially shed its identity
//! because the digest covers headers it does not control.
//!
//! The address chain (x-forwarded-for, x-real-ip, cf-connecting-ip, then the
//! transport address) assumes the first hop is a trusted proxy. The values
//! are not verified; do not treat the fingerprint as a security boundary.

use axum::http::HeaderMap;
use std::net::IpAddr;

/// Placeholder for any missing header or address component.
const UNKNOWN: &str = "unknown";

/// Hex characters of the device digest kept in the final key.
const DIGEST_PREFIX_LEN: usize = 16;

/// Headers folded into the device digest, in fixed order. The order is part
/// of the fingerprint contract; changing it changes every identity.
const DEVICE_HEADERS: &[&str] = &[
    "user-agent",
    "accept-language",
    "accept-encoding",
    "connection",
    "dnt",
    "sec-fetch-dest",
    "sec-fetch-mode",
    "sec-fetch-site",
    "x-client-screen",
    "x-client-timezone",
];

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Resolve the canonical client address for a request.
///
/// Prefers the first element of `x-forwarded-for`, then `x-real-ip`, then
/// `cf-connecting-ip`, falling back to the transport-level address. Never
/// fails; returns `"unknown"` when nothing resolves.
pub fn client_addr(headers: &HeaderMap, transport: Option<IpAddr>) -> String {
    if let Some(value) = header_str(headers, "x-forwarded-for") {
        if let Some(first) = value.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    for name in ["x-real-ip", "cf-connecting-ip"] {
        if let Some(value) = header_str(headers, name) {
            let value = value.trim();
            if !value.is_empty() {
                return value.to_string();
            }
        }
    }

    transport
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// Compute the device digest over the fixed header tuple.
///
/// Deterministic: identical header tuples always produce the same digest,
/// independent of request order or timing. Missing headers contribute the
/// literal `"unknown"` so omitting a header is itself a stable signal.
pub fn device_digest(headers: &HeaderMap) -> String {
    let mut hasher = blake3::Hasher::new();
    for name in DEVICE_HEADERS {
        hasher.update(name.as_bytes());
        hasher.update(b"=");
        hasher.update(header_str(headers, name).unwrap_or(UNKNOWN).as_bytes());
        hasher.update(b";");
    }
    hasher.finalize().to_hex().to_string()
}

/// Build the rate-limit key for a request: `"{addr}:{digest_prefix}"`.
pub fn fingerprint_key(headers: &HeaderMap, transport: Option<IpAddr>) -> String {
    let addr = client_addr(headers, transport);
    let digest = device_digest(headers);
    format!("{}:{}", addr, &digest[..DIGEST_PREFIX_LEN])
}
