//! `Stripe-Signature` header verification.
//!
//! Header format: `t=<unix ts>,v1=<hex hmac>[,v1=...]`. The signed payload is
//! `"<t>.<raw body>"`, keyed with the endpoint's signing secret.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Maximum age of a webhook timestamp, as Stripe recommends.
pub const WEBHOOK_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureError {
    /// Header lacks `t=` or `v1=`.
    Malformed,
    InvalidTimestamp,
    /// Timestamp outside the tolerance window.
    Stale,
    Mismatch,
}

impl std::fmt::Display for SignatureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            SignatureError::Malformed => "invalid signature header format",
            SignatureError::InvalidTimestamp => "invalid timestamp in signature",
            SignatureError::Stale => "signature timestamp outside tolerance",
            SignatureError::Mismatch => "no matching v1 signature",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for SignatureError {}

fn compute_signature(payload: &[u8], timestamp: &str, secret: &str) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    Some(hex::encode(mac.finalize().into_bytes()))
}

pub fn verify_webhook_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now: i64,
) -> Result<(), SignatureError> {
    let mut timestamp = None;
    let mut candidates = Vec::new();

    for part in header.split(',') {
        let part = part.trim();
        if let Some(t) = part.strip_prefix("t=") {
            timestamp = Some(t);
        } else if let Some(s) = part.strip_prefix("v1=") {
            candidates.push(s);
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
    if candidates.is_empty() {
        return Err(SignatureError::Malformed);
    }

    let ts: i64 = timestamp
        .parse()
        .map_err(|_| SignatureError::InvalidTimestamp)?;
    if (now - ts).abs() > WEBHOOK_TOLERANCE_SECS {
        tracing::warn!(age = now - ts, "Stripe webhook timestamp outside tolerance");
        return Err(SignatureError::Stale);
    }

    let expected = compute_signature(payload, timestamp, secret).ok_or(SignatureError::Mismatch)?;
    let matched = candidates
        .iter()
        .any(|c| c.len() == expected.len() && bool::from(c.as_bytes().ct_eq(expected.as_bytes())));

    if matched {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Build a header the way Stripe signs deliveries.
#[cfg(test)]
pub fn signature_header(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let ts = timestamp.to_string();
    let sig = compute_signature(payload, &ts, secret).unwrap_or_default();
    format!("t={},v1={}", ts, sig)
}
