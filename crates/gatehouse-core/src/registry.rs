//! In-memory user registry.
//!
//! One registry exists per host role. It is shared across every concurrently
//! active host session through [`SharedRegistry`], whose mutex serializes
//! all reads and writes; the slow password hashing never happens under that
//! lock (see [`crate::auth`]).

use std::sync::{Arc, Mutex, MutexGuard};

use gatehouse_proto::Packet;
use tokio::sync::mpsc;

/// Errors from registry mutations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    /// A user with this name already exists; nothing was overwritten.
    #[error("user {0:?} already exists")]
    DuplicateName(String),
}

/// One registered user.
///
/// The outbound queue sender is present exactly while the user's connection
/// is authenticated; the session that owns the connection installs it on
/// authentication success and removes it when the connection closes.
#[derive(Debug)]
pub struct User {
    /// Unique account name.
    pub name: String,
    /// Salted password digest. The plaintext is never stored.
    pub password_hash: String,
    /// Whether an authenticated connection for this user is live.
    pub connected: bool,
    /// Sender half of the user's outbound wire queue, while connected.
    pub outbound: Option<mpsc::Sender<Packet>>,
}

impl User {
    fn new(name: String, password_hash: String) -> Self {
        Self { name, password_hash, connected: false, outbound: None }
    }
}

/// Mutex-guarded registry handle, cloned into every host session.
///
/// Names are unique; iteration order is insertion order.
#[derive(Debug, Clone, Default)]
pub struct SharedRegistry {
    users: Arc<Mutex<Vec<User>>>,
}

impl SharedRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<User>> {
        // No path panics while holding the lock; a poisoned guard still
        // holds a valid registry.
        self.users.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Inserts a new, not-yet-connected user.
    ///
    /// # Errors
    ///
    /// Refuses duplicate names: of two racing registrations for the same
    /// name, the first wins and the second gets
    /// [`RegistryError::DuplicateName`].
    pub fn insert(&self, name: &str, password_hash: String) -> Result<(), RegistryError> {
        let mut users = self.lock();
        if users.iter().any(|user| user.name == name) {
            return Err(RegistryError::DuplicateName(name.to_string()));
        }
        users.push(User::new(name.to_string(), password_hash));
        Ok(())
    }

    /// The stored password hash for `name`, if registered.
    pub fn password_hash(&self, name: &str) -> Option<String> {
        self.lock().iter().find(|user| user.name == name).map(|user| user.password_hash.clone())
    }

    /// True if a user with this exact name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.lock().iter().any(|user| user.name == name)
    }

    /// Marks `name` connected and installs its outbound queue sender.
    pub fn mark_connected(&self, name: &str, outbound: mpsc::Sender<Packet>) {
        if let Some(user) = self.lock().iter_mut().find(|user| user.name == name) {
            user.connected = true;
            user.outbound = Some(outbound);
        }
    }

    /// Marks `name` disconnected and destroys its outbound queue sender.
    pub fn mark_disconnected(&self, name: &str) {
        if let Some(user) = self.lock().iter_mut().find(|user| user.name == name) {
            user.connected = false;
            user.outbound = None;
        }
    }

    /// Whether `name` currently has an authenticated connection.
    pub fn is_connected(&self, name: &str) -> bool {
        self.lock().iter().any(|user| user.name == name && user.connected)
    }

    /// The outbound queue sender for `name`, while connected.
    pub fn outbound(&self, name: &str) -> Option<mpsc::Sender<Packet>> {
        self.lock().iter().find(|user| user.name == name).and_then(|user| user.outbound.clone())
    }

    /// All registered names, in insertion order.
    pub fn names(&self) -> Vec<String> {
        self.lock().iter().map(|user| user.name.clone()).collect()
    }

    /// Number of registered users.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True when no users are registered.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
