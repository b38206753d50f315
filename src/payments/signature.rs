//! Webhook signature verification.
//!
//! The provider signs a canonical manifest built from the notification's
//! `data.id`, request id, and timestamp with HMAC-SHA256 over a shared
//! secret, and sends the lowercase-hex digest in the `x-signature` header as
//! `ts=<timestamp>,v1=<digest>`.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Parsed fields of the `x-signature` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub ts: String,
    pub v1: String,
}

impl SignatureHeader {
    /// Parse `ts=<timestamp>,v1=<digest>`. Unknown keys are ignored; both
    /// `ts` and `v1` must be present and non-empty.
    pub fn parse(header: &str) -> Option<Self> {
        let mut ts = None;
        let mut v1 = None;

        for part in header.split(',') {
            let part = part.trim();
            if let Some(t) = part.strip_prefix("ts=") {
                ts = Some(t.to_string());
            } else if let Some(s) = part.strip_prefix("v1=") {
                v1 = Some(s.to_string());
            }
        }

        match (ts, v1) {
            (Some(ts), Some(v1)) if !ts.is_empty() && !v1.is_empty() => {
                Some(SignatureHeader { ts, v1 })
            }
            _ => None,
        }
    }
}

/// Canonical manifest the digest is computed over. The `request-id` segment
/// is omitted entirely when the request id is empty; no stray separator is
/// inserted.
fn build_manifest(data_id: &str, timestamp: &str, request_id: &str) -> String {
    let mut manifest = format!("id:{};", data_id);
    if !request_id.is_empty() {
        manifest.push_str(&format!("request-id:{};", request_id));
    }
    manifest.push_str(&format!("ts:{};", timestamp));
    manifest
}

/// Verify a received digest against the manifest HMAC.
///
/// Fails closed: empty `data_id`, `timestamp`, or digest, or an unusable
/// secret all yield `false`. Never panics or surfaces an error to the caller.
pub fn verify(
    data_id: &str,
    timestamp: &str,
    request_id: &str,
    received_digest: &str,
    secret: &[u8],
) -> bool {
    if data_id.is_empty() || timestamp.is_empty() || received_digest.is_empty() {
        return false;
    }
    if secret.is_empty() {
        return false;
    }

    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(build_manifest(data_id, timestamp, request_id).as_bytes());
    let expected = hex::encode(mac.finalize().into_bytes());

    // Length is not secret (always 64 hex chars for SHA-256); the digest
    // comparison itself is constant-time.
    if expected.len() != received_digest.len() {
        return false;
    }
    expected.as_bytes().ct_eq(received_digest.as_bytes()).into()
}

/// Compute the expected digest for a manifest. Exposed for tests and tooling
/// that need to produce valid signatures.
pub fn compute_digest(
    data_id: &str,
    timestamp: &str,
    request_id: &str,
    secret: &[u8],
) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(build_manifest(data_id, timestamp, request_id).as_bytes());
    Some(hex::encode(mac.finalize().into_bytes()))
}
