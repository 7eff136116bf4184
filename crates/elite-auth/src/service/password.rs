//! Password and PIN hashing

use elite_common::EliteError;

use crate::model::BCRYPT_COST;

/// Hash a secret (password or PIN) with bcrypt
pub fn hash_secret(secret: &str) -> anyhow::Result<String> {
    bcrypt::hash(secret, BCRYPT_COST)
        .map_err(|e| EliteError::InternalError(format!("failed to hash secret: {}", e)).into())
}

/// Verify a secret against its bcrypt hash. A malformed hash never matches.
pub fn verify_secret(secret: &str, hash: &str) -> bool {
    bcrypt::verify(secret, hash).unwrap_or(false)
}
