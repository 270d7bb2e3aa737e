//! Password verification and registration.
//!
//! Both operations use bcrypt at a fixed cost factor, matching the protocol
//! contract: one slow, salted comparison per attempt. They are synchronous
//! and deliberately slow; async callers run them on a blocking thread pool
//! and never under the registry lock.

use tracing::warn;

use crate::registry::{RegistryError, SharedRegistry};

/// Fixed bcrypt cost factor for all hashes in a registry.
pub const HASH_COST: u32 = 10;

/// Outcome of a credential check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// No user with that exact name is registered.
    NotFound,
    /// The user exists but the password does not match the stored hash.
    Rejected,
    /// Name and password both match.
    Accepted,
}

/// Errors from the registration path.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The hashing primitive failed.
    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    /// The name was taken between the unknown-user check and the insert.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Checks `password` against the registered hash for `username`.
///
/// The plaintext is dropped after the comparison; it is never stored or
/// logged.
pub fn verify(registry: &SharedRegistry, username: &str, password: &str) -> VerifyOutcome {
    let Some(hash) = registry.password_hash(username) else {
        return VerifyOutcome::NotFound;
    };
    match bcrypt::verify(password, &hash) {
        Ok(true) => VerifyOutcome::Accepted,
        Ok(false) => VerifyOutcome::Rejected,
        Err(error) => {
            // A stored hash that bcrypt cannot parse can never match.
            warn!(user = username, %error, "stored password hash is unusable");
            VerifyOutcome::Rejected
        }
    }
}

/// Hashes `password` at [`HASH_COST`] and inserts a new, not-yet-connected
/// user.
///
/// # Errors
///
/// Fails only if the hashing primitive errors or the name is already taken.
pub fn register(
    registry: &SharedRegistry,
    username: &str,
    password: &str,
) -> Result<(), AuthError> {
    let hash = bcrypt::hash(password, HASH_COST)?;
    registry.insert(username, hash)?;
    Ok(())
}
