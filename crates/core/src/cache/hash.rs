//! Entry key generation.

use sha2::{Digest, Sha256};

/// Compute the storage key for a request identity.
///
/// Keys are scoped per generation by the table's composite primary key, so
/// only the identity itself is hashed.
pub fn compute_entry_key(identity: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(identity.as_bytes());
    hex::encode(hasher.finalize())
}
