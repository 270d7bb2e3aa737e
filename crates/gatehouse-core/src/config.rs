//! Host-role configuration.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::registry::SharedRegistry;

/// Shared host configuration: the user registry plus the operator-togglable
/// registration switch.
///
/// Cloned into every host session; the registration flag is read immediately
/// before each unknown-user decision, so an operator toggle takes effect for
/// the very next attempt.
#[derive(Debug, Clone)]
pub struct HostConfig {
    registration_enabled: Arc<AtomicBool>,
    /// The user registry this host authenticates against.
    pub registry: SharedRegistry,
}

impl HostConfig {
    /// Creates a config around an existing registry.
    pub fn new(registry: SharedRegistry, registration_enabled: bool) -> Self {
        Self { registration_enabled: Arc::new(AtomicBool::new(registration_enabled)), registry }
    }

    /// Whether unknown users may currently request registration.
    pub fn registration_enabled(&self) -> bool {
        self.registration_enabled.load(Ordering::Relaxed)
    }

    /// Operator toggle for the registration flow.
    pub fn set_registration_enabled(&self, enabled: bool) {
        self.registration_enabled.store(enabled, Ordering::Relaxed);
    }
}
