//! Static identity keys.

use rand_core::OsRng;
use x25519_dalek::StaticSecret;

pub use x25519_dalek::PublicKey;

/// A static X25519 identity keypair.
///
/// Hosts generate one keypair per listening role and reuse it across every
/// accepted connection, so all clients of one host fingerprint the same key.
/// Joining clients generate a fresh keypair per dial.
#[derive(Clone)]
pub struct Keypair {
    secret: StaticSecret,
    public: PublicKey,
}

impl Keypair {
    /// Generates a fresh keypair from the operating system RNG.
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    /// The public half, shared with peers during the handshake.
    pub fn public(&self) -> &PublicKey {
        &self.public
    }

    pub(crate) fn secret(&self) -> &StaticSecret {
        &self.secret
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The secret half never appears in logs.
        f.debug_struct("Keypair").field("public", self.public.as_bytes()).finish_non_exhaustive()
    }
}
