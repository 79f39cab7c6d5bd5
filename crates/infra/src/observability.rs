//! Logging helpers.

use sha2::{Digest, Sha256};

/// Produce a stable, non-reversible tag for a user identifier so log lines
/// can be correlated without exposing the raw id or email.
#[must_use]
pub fn redact_user(user_id: &str) -> String {
    const USER_HASH_SALT: &[u8] = b"quorum-sync-user-salt";
    let mut hasher = Sha256::new();
    hasher.update(USER_HASH_SALT);
    hasher.update(user_id.as_bytes());
    let digest = hasher.finalize();
    let hash = hex::encode(&digest[..8]);
    format!("user_hash={hash}")
}
