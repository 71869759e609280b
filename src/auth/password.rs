//! Credential digest.
//!
//! `sha256(secret + "|" + email)` in lowercase hex. Deterministic so that a
//! login can be matched by digest in SQL. The salt is the (unique) email, not
//! a random nonce, and SHA-256 is fast: this offers no protection against
//! precomputation and is kept only for compatibility with stored digests.

use sha2::{Digest, Sha256};

pub fn hash_password(secret: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(b"|");
    hasher.update(salt.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn verify_password(secret: &str, salt: &str, digest: &str) -> bool {
    hash_password(secret, salt) == digest
}
