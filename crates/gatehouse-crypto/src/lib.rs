//! Encrypted transport primitive for Gatehouse sessions.
//!
//! This crate is the session layer's transport collaborator: it turns any
//! reliable byte stream into a confidentiality- and integrity-protected
//! frame stream that exposes both parties' raw public keys for
//! trust-on-first-use fingerprinting.
//!
//! The handshake is deliberately minimal: each side contributes a static
//! X25519 key, the shared secret feeds an HKDF key schedule, and every frame
//! is sealed with ChaCha20-Poly1305 under a per-direction counter nonce.
//! Peers are *not* authenticated here; verifying who owns a public key is
//! exactly the TOFU fingerprint comparison the session layer exists for.

pub mod error;
pub mod keys;
pub mod stream;

pub use error::TransportError;
pub use keys::{Keypair, PublicKey};
pub use stream::{SecureReader, SecureStream, SecureWriter};
