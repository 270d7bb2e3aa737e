//! Transport error taxonomy.

use std::io;

/// Errors surfaced by the secure stream.
///
/// Callers distinguish three fates: [`TransportError::TimedOut`] is
/// recoverable and the read should simply be retried; everything else is
/// fatal for the connection it occurred on.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Underlying socket failure.
    #[error("i/o failure: {0}")]
    Io(#[from] io::Error),

    /// The configured read timeout elapsed before a full frame arrived.
    /// Recoverable: partial frame bytes are retained and the read may be
    /// reissued.
    #[error("read timed out")]
    TimedOut,

    /// The peer closed the connection.
    #[error("connection closed by peer")]
    Closed,

    /// An inbound frame declared a length beyond the protocol limit.
    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge {
        /// Declared frame length.
        len: usize,
        /// Maximum accepted frame length.
        max: usize,
    },

    /// A frame failed AEAD authentication or could not be sealed.
    #[error("frame failed authentication")]
    Crypto,

    /// The peer presented a key yielding a non-contributory shared secret.
    #[error("handshake failed: degenerate peer key")]
    Handshake,
}

impl TransportError {
    /// True for the one recoverable variant, [`TransportError::TimedOut`].
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut)
    }
}
