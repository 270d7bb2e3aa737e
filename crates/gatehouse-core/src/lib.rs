//! Gatehouse core logic.
//!
//! Pure domain state for the Gatehouse protocol, decoupled from all I/O: the
//! in-memory user registry, the password verification and registration
//! service, and the word fingerprint encoder used for trust-on-first-use key
//! confirmation. The session layer drives everything in here; nothing in
//! this crate touches a socket.

pub mod auth;
pub mod config;
pub mod fingerprint;
pub mod registry;

pub use auth::{AuthError, VerifyOutcome, register, verify};
pub use config::HostConfig;
pub use fingerprint::{Fingerprint, fingerprint, format_words};
pub use registry::{RegistryError, SharedRegistry, User};
