//! Password hashing utilities

use bcrypt::{hash, verify};

use crate::support::InfraError;

pub use bcrypt::DEFAULT_COST;

/// Lowest work factor bcrypt accepts; keeps hashing fast in tests.
#[cfg(test)]
pub(crate) const TEST_BCRYPT_COST: u32 = 4;

/// Hash a password using bcrypt with the given work factor
pub fn hash_password(password: &str, cost: u32) -> Result<String, InfraError> {
    hash(password, cost).map_err(|e| InfraError::Crypto(e.to_string()))
}

/// Verify a password against a stored hash. A malformed hash never matches.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    verify(password, stored_hash).unwrap_or(false)
}
