//! Encoding and decoding of tagged packets within one transport frame.

use crate::error::{ProtoError, Result};
use crate::packet::{Auth, AuthStatus, Packet, PacketTag, Ping, Pong};

/// Outcome of decoding one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// The frame carried one of the four known messages.
    Known(Packet),
    /// The frame carried an unassigned tag; callers log it and move on.
    /// The payload was discarded with the frame, so the stream stays
    /// aligned.
    Unknown {
        /// The unassigned tag byte.
        tag: u8,
    },
}

/// Serializes a packet into frame plaintext: tag byte, then CBOR payload.
pub fn encode_packet(packet: &Packet) -> Result<Vec<u8>> {
    let mut buf = vec![packet.tag() as u8];
    match packet {
        Packet::Ping(p) => ciborium::ser::into_writer(p, &mut buf)?,
        Packet::Pong(p) => ciborium::ser::into_writer(p, &mut buf)?,
        Packet::Auth(p) => ciborium::ser::into_writer(p, &mut buf)?,
        Packet::AuthStatus(p) => ciborium::ser::into_writer(p, &mut buf)?,
    }
    Ok(buf)
}

/// Decodes one frame's plaintext back into a packet.
///
/// # Errors
///
/// Returns [`ProtoError::EmptyFrame`] for a zero-length frame and
/// [`ProtoError::MalformedPayload`] when a known tag's payload does not
/// decode; both are connection-fatal for the caller.
pub fn decode_packet(frame: &[u8]) -> Result<Decoded> {
    let (&tag, payload) = frame.split_first().ok_or(ProtoError::EmptyFrame)?;
    let Some(tag) = PacketTag::from_byte(tag) else {
        return Ok(Decoded::Unknown { tag });
    };

    let packet = match tag {
        PacketTag::Ping => Packet::Ping(decode_payload::<Ping>(tag, payload)?),
        PacketTag::Pong => Packet::Pong(decode_payload::<Pong>(tag, payload)?),
        PacketTag::Auth => Packet::Auth(decode_payload::<Auth>(tag, payload)?),
        PacketTag::AuthStatus => Packet::AuthStatus(decode_payload::<AuthStatus>(tag, payload)?),
    };
    Ok(Decoded::Known(packet))
}

fn decode_payload<T: serde::de::DeserializeOwned>(tag: PacketTag, payload: &[u8]) -> Result<T> {
    ciborium::de::from_reader(payload)
        .map_err(|source| ProtoError::MalformedPayload { tag: tag as u8, source })
}
