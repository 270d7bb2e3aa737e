//! Engine error type.

use gatehouse_crypto::TransportError;
use gatehouse_proto::{Packet, ProtoError};
use tokio::sync::mpsc;

use crate::event::Notification;

/// Errors that end a session task.
///
/// These never cross the notification bus as values; sessions translate
/// them into notifications (or log lines) before the task exits.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The secure transport failed. Timeouts never surface here; read
    /// loops retry them internally.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The peer sent a frame this side cannot interpret.
    #[error(transparent)]
    Proto(#[from] ProtoError),

    /// The connection's writer task is gone, so nothing more can be sent.
    #[error("connection writer stopped")]
    WriterGone,

    /// The notification consumer went away.
    #[error("notification bus closed")]
    BusClosed,

    /// A blocking worker (password hashing) failed to complete.
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl From<mpsc::error::SendError<Packet>> for EngineError {
    fn from(_: mpsc::error::SendError<Packet>) -> Self {
        Self::WriterGone
    }
}

impl From<mpsc::error::SendError<Notification>> for EngineError {
    fn from(_: mpsc::error::SendError<Notification>) -> Self {
        Self::BusClosed
    }
}
