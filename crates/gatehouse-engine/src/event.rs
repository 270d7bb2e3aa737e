//! The two bus vocabularies.
//!
//! Each direction of the event bus carries its own closed union: control
//! events flow from the caller into the engine, notifications flow back
//! out. Dispatch is an exhaustive `match` on either side, so an
//! unrecognized discriminator cannot exist.

use std::net::SocketAddr;

use gatehouse_core::Fingerprint;
use tokio::sync::oneshot;

/// One-shot reply handle for a pending registration approval.
///
/// Created by the host session that is blocked awaiting the decision and
/// carried to the caller inside [`Notification::UnknownConnection`]; the
/// caller hands it back with [`ControlEvent::RegistrationDecision`] (or
/// resolves it directly). Dropping it unresolved reads as a denial.
#[derive(Debug)]
pub struct RegistrationReply {
    tx: oneshot::Sender<bool>,
}

impl RegistrationReply {
    pub(crate) fn new() -> (Self, oneshot::Receiver<bool>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    /// Delivers the approve/deny decision to the waiting host session.
    pub fn resolve(self, allow: bool) {
        // The session may have died while waiting; nothing to deliver to.
        let _ = self.tx.send(allow);
    }
}

/// Control events: caller → engine.
#[derive(Debug)]
pub enum ControlEvent {
    /// Start hosting on the given listen address.
    RequestHost {
        /// Address to bind, e.g. `"127.0.0.1:9000"`.
        addr: String,
    },

    /// Dial a host and authenticate with the given credentials.
    RequestJoin {
        /// Host address to dial.
        addr: String,
        /// Account name to present.
        username: String,
        /// Password to present.
        password: String,
    },

    /// The operator's verdict on a pending registration request.
    RegistrationDecision {
        /// Candidate account name, for display and logging.
        username: String,
        /// Candidate password. Carried for interface completeness; the
        /// pending session authenticates with the credentials it captured
        /// from the wire.
        password: String,
        /// Approve or deny.
        allow: bool,
        /// The reply handle from the matching
        /// [`Notification::UnknownConnection`].
        reply: RegistrationReply,
    },

    /// The operator's verdict on a dialed host's key (trust-on-first-use).
    ConnectionTrustDecision {
        /// Continue with authentication, or abort without sending anything.
        proceed: bool,
    },

    /// Operator toggle for whether unknown users may request registration.
    SetRegistration {
        /// New value of the flag.
        enabled: bool,
    },

    /// Cancel every running session and stop the engine.
    Shutdown,
}

/// Notifications: engine → caller.
#[derive(Debug)]
pub enum Notification {
    /// The host role is bound and accepting connections.
    HostReady {
        /// The actually bound address (resolves `:0` requests).
        addr: SocketAddr,
        /// Fingerprint of the host's own key, for operators to share.
        fingerprint: Fingerprint,
    },

    /// The host listener could not be started. Reported once; the host
    /// role has terminated.
    HostFailed {
        /// Human-readable bind failure.
        reason: String,
    },

    /// An unknown user asked to register; a host session is blocked
    /// awaiting the decision carried back through `reply`.
    UnknownConnection {
        /// Fingerprint of the candidate's key, for TOFU comparison.
        fingerprint: Fingerprint,
        /// Candidate account name.
        username: String,
        /// Candidate password, so the operator tooling can re-present it.
        password: String,
        /// Reply handle resolving this request.
        reply: RegistrationReply,
    },

    /// A dialed host presented this key; confirm before authenticating.
    RemoteKeyForConfirmation {
        /// Fingerprint of the remote host's key.
        fingerprint: Fingerprint,
    },

    /// Own identity presented after trusting a host, for relaying to its
    /// operator out-of-band.
    OwnKeyForConfirmation {
        /// Fingerprint of the local key.
        fingerprint: Fingerprint,
    },

    /// Terminal verdict of a join attempt's authentication.
    AuthResult {
        /// Whether the host accepted the credentials.
        success: bool,
    },

    /// A user authenticated against this host.
    UserConnected {
        /// The authenticated account name.
        username: String,
    },

    /// A connection ended on a read-fatal error.
    Disconnected {
        /// The authenticated user on that connection, if any (host side).
        username: Option<String>,
    },

    /// Free-form status for display.
    GenericStatus {
        /// Short heading.
        title: String,
        /// Detail line.
        message: String,
    },
}
