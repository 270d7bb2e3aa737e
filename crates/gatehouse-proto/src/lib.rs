//! Wire format for the Gatehouse protocol.
//!
//! Every message travels as one transport frame whose plaintext is a single
//! tag byte followed by a CBOR-encoded payload. The tag identifies which of
//! the four payload shapes follows; because tag and payload share a frame,
//! an unknown tag skips exactly its own frame and the stream can never
//! desynchronize.
//!
//! Decode failure of a known tag's payload is connection-fatal: a peer that
//! sends a tag it cannot back up with a well-formed payload is not worth
//! resynchronizing with.

pub mod codec;
pub mod error;
pub mod packet;

pub use codec::{Decoded, decode_packet, encode_packet};
pub use error::{ProtoError, Result};
pub use packet::{Auth, AuthStatus, Packet, PacketTag, Ping, Pong};
