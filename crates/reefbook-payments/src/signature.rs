//! HMAC-SHA256 request signing.
//!
//! The gateway authenticates every request and callback with an
//! HMAC-SHA256 digest over a canonical `key=value&…` string, hex-encoded
//! in lowercase. The canonical layouts live with the wire types; this
//! module only owns the MAC.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Sign a canonical string, returning the lowercase hex digest.
#[must_use]
pub fn sign(secret: &str, canonical: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(canonical.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Check a presented hex signature against the canonical string.
///
/// The comparison runs in constant time. A signature that is not valid
/// hex can never match, so it is rejected without comparing.
#[must_use]
pub fn verify(secret: &str, canonical: &str, signature: &str) -> bool {
    let Ok(presented) = hex::decode(signature) else {
        return false;
    };
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(canonical.as_bytes());
    mac.verify_slice(&presented).is_ok()
}
