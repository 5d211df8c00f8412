//! Webhook request signing.
//!
//! The platform signs every webhook delivery with hex HMAC-SHA256 over
//! `"v0:{timestamp}:{raw body}"`, keyed by the per-workspace signing secret
//! and prefixed `v0=`. Verification also enforces a replay window: a
//! timestamp more than five minutes from the receiving clock fails no matter
//! how good the MAC is.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the delivery timestamp (seconds since the epoch).
pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";

/// Header carrying the `v0=`-prefixed signature.
pub const SIGNATURE_HEADER: &str = "x-slack-signature";

/// Maximum allowed clock skew between delivery and verification.
pub const REPLAY_WINDOW_SECS: i64 = 300;

/// Compute the signature for a body at a timestamp. Used by tests and by
/// peers re-validating forwarded requests.
pub fn sign(secret: &str, timestamp: i64, raw_body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(format!("v0:{timestamp}:").as_bytes());
    mac.update(raw_body);
    format!("v0={}", hex::encode(mac.finalize().into_bytes()))
}

/// Verify a signature against an explicit clock. The expected signature is
/// recomputed and compared for exact equality, constant-time; a malformed
/// header simply never matches.
pub fn verify_at(
    secret: &str,
    timestamp: i64,
    signature: &str,
    raw_body: &[u8],
    now: i64,
) -> bool {
    if (now - timestamp).abs() > REPLAY_WINDOW_SECS {
        return false;
    }
    let expected = sign(secret, timestamp, raw_body);
    expected.as_bytes().ct_eq(signature.as_bytes()).into()
}

/// Verify against the wall clock.
pub fn verify(secret: &str, timestamp: i64, signature: &str, raw_body: &[u8]) -> bool {
    verify_at(secret, timestamp, signature, raw_body, unix_now())
}

/// Seconds since the Unix epoch.
pub fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
