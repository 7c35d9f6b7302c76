//! Beacon authentication token
//!
//! A node that hears a beacon answers with base64(SHA-256(beacon || key)).
//! This proves knowledge of the shared key, not node identity, and a
//! recorded token can be replayed by anyone.

use multibase::Base;
use sha2::{Digest, Sha256};

/// Token a peer must send back in answer to `beacon`
pub fn beacon_response(beacon: &str, key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(beacon.as_bytes());
    hasher.update(key.as_bytes());
    let digest = hasher.finalize();

    // Drop the one-character multibase prefix to get plain padded base64
    let encoded = multibase::encode(Base::Base64Pad, digest);
    encoded[1..].to_string()
}
