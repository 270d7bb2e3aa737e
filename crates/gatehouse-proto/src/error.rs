//! Protocol error types.

use std::io;

/// Convenience alias for protocol results.
pub type Result<T> = std::result::Result<T, ProtoError>;

/// Errors raised while encoding or decoding wire messages.
///
/// Every variant except the encode failure means the peer put something on
/// the wire that this side cannot interpret; callers treat those as fatal
/// for the connection that produced them.
#[derive(Debug, thiserror::Error)]
pub enum ProtoError {
    /// A frame carried no bytes at all, not even a tag.
    #[error("empty frame: missing packet tag")]
    EmptyFrame,

    /// The payload following a known tag failed to decode.
    #[error("malformed payload for tag {tag}: {source}")]
    MalformedPayload {
        /// Tag whose payload failed to decode.
        tag: u8,
        /// Underlying CBOR decode error.
        #[source]
        source: ciborium::de::Error<io::Error>,
    },

    /// A payload failed to serialize. Indicates a local bug, not peer input.
    #[error("payload encode failed: {0}")]
    Encode(#[from] ciborium::ser::Error<io::Error>),
}
