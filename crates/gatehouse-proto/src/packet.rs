//! The four wire messages and their one-byte tag space.

use serde::{Deserialize, Serialize};

/// Wire tag values. One unsigned byte precedes every payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketTag {
    /// Keep-alive probe.
    Ping = 0,
    /// Keep-alive echo.
    Pong = 1,
    /// Credential presentation.
    Auth = 2,
    /// Authentication verdict.
    AuthStatus = 3,
}

impl PacketTag {
    /// Maps a raw tag byte to its variant, or `None` for an unassigned tag.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Ping),
            1 => Some(Self::Pong),
            2 => Some(Self::Auth),
            3 => Some(Self::AuthStatus),
            _ => None,
        }
    }
}

/// Keep-alive probe. The token is echoed back verbatim in a [`Pong`]; it is
/// logged for liveness diagnostics and carries no protocol meaning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ping {
    /// Arbitrary text echoed by the peer.
    pub token: String,
}

/// Keep-alive echo answering a [`Ping`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pong {
    /// The token from the ping being answered.
    pub token: String,
}

/// Credentials presented by a joining client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Auth {
    /// Account name to authenticate as.
    pub username: String,
    /// Plaintext password; only ever held long enough to hash or compare.
    pub password: String,
}

/// The host's verdict on an [`Auth`] attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthStatus {
    /// Whether the credentials were accepted.
    pub success: bool,
}

/// One decoded wire message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    /// Keep-alive probe.
    Ping(Ping),
    /// Keep-alive echo.
    Pong(Pong),
    /// Credential presentation.
    Auth(Auth),
    /// Authentication verdict.
    AuthStatus(AuthStatus),
}

impl Packet {
    /// The tag byte this packet is framed with.
    pub fn tag(&self) -> PacketTag {
        match self {
            Self::Ping(_) => PacketTag::Ping,
            Self::Pong(_) => PacketTag::Pong,
            Self::Auth(_) => PacketTag::Auth,
            Self::AuthStatus(_) => PacketTag::AuthStatus,
        }
    }
}
