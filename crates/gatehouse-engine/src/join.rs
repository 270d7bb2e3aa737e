//! Join role: one outbound connection attempt.
//!
//! `Dialing → KeyPresented → {Aborted | Authenticating → AuthResult}`. The
//! trust-on-first-use gate sits between dialing and the first protocol
//! message: until the caller confirms the host's fingerprint, nothing is
//! sent at all.

use gatehouse_core::fingerprint;
use gatehouse_crypto::{Keypair, PublicKey, SecureStream};
use gatehouse_proto::{Auth, Decoded, Packet, Pong, decode_packet};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::EngineError;
use crate::event::Notification;
use crate::wire::{READ_TIMEOUT, WIRE_QUEUE_DEPTH, write_loop};

/// Parameters of one join attempt.
#[derive(Debug)]
pub(crate) struct JoinRequest {
    pub addr: String,
    pub username: String,
    pub password: String,
}

/// Everything one join attempt owns, replaced wholesale per attempt.
struct ClientConfig {
    conn: SecureStream<TcpStream>,
    remote_key: PublicKey,
    local_key: PublicKey,
    username: String,
    password: String,
}

pub(crate) async fn run_join(
    request: JoinRequest,
    trust: oneshot::Receiver<bool>,
    notify: mpsc::Sender<Notification>,
    token: CancellationToken,
) {
    if let Err(error) = join_session(request, trust, notify.clone(), token).await {
        debug!(%error, "join session ended");
        if matches!(error, EngineError::Transport(_) | EngineError::Proto(_)) {
            let _ = notify.send(Notification::Disconnected { username: None }).await;
        }
    }
}

async fn join_session(
    request: JoinRequest,
    trust: oneshot::Receiver<bool>,
    notify: mpsc::Sender<Notification>,
    token: CancellationToken,
) -> Result<(), EngineError> {
    info!(addr = %request.addr, user = %request.username, "dialing host");

    // Dialing: a failure here is reported once and ends the session.
    let keypair = Keypair::generate();
    let stream = match TcpStream::connect(&request.addr).await {
        Ok(stream) => stream,
        Err(error) => {
            warn!(addr = %request.addr, %error, "failed to connect");
            notify
                .send(Notification::GenericStatus {
                    title: "Join".into(),
                    message: format!("Failed to connect: {error}"),
                })
                .await?;
            return Ok(());
        }
    };
    let conn = match SecureStream::connect(stream, &keypair).await {
        Ok(conn) => conn,
        Err(error) => {
            warn!(addr = %request.addr, %error, "handshake failed");
            notify
                .send(Notification::GenericStatus {
                    title: "Join".into(),
                    message: format!("Handshake failed: {error}"),
                })
                .await?;
            return Ok(());
        }
    };
    let client = ClientConfig {
        remote_key: *conn.remote_public_key(),
        local_key: *conn.local_public_key(),
        conn,
        username: request.username,
        password: request.password,
    };

    // KeyPresented: the caller compares fingerprints out-of-band.
    notify
        .send(Notification::RemoteKeyForConfirmation {
            fingerprint: fingerprint(client.remote_key.as_bytes()),
        })
        .await?;
    let proceed = tokio::select! {
        () = token.cancelled() => return Ok(()),
        decision = trust => decision.unwrap_or(false),
    };
    if !proceed {
        // Aborted: close without ever having sent a protocol message.
        info!("host key not trusted, aborting");
        return Ok(());
    }
    notify
        .send(Notification::OwnKeyForConfirmation {
            fingerprint: fingerprint(client.local_key.as_bytes()),
        })
        .await?;

    // Authenticating.
    let ClientConfig { mut conn, username, password, .. } = client;
    conn.set_read_timeout(Some(READ_TIMEOUT));
    let (mut reader, writer) = conn.into_split();
    let (wire_tx, wire_rx) = mpsc::channel(WIRE_QUEUE_DEPTH);
    tokio::spawn(write_loop(wire_rx, writer));

    wire_tx.send(Packet::Auth(Auth { username, password })).await?;

    loop {
        let read = tokio::select! {
            () = token.cancelled() => return Ok(()),
            read = reader.read_frame() => read,
        };
        let frame = match read {
            Ok(frame) => frame,
            Err(error) if error.is_timeout() => {
                debug!("read timed out, retrying");
                continue;
            }
            Err(error) => return Err(error.into()),
        };
        match decode_packet(&frame)? {
            Decoded::Unknown { tag } => {
                warn!(tag, "unknown packet tag, skipping");
            }
            Decoded::Known(Packet::Ping(ping)) => {
                debug!(token = %ping.token, "ping received, echoing");
                wire_tx.send(Packet::Pong(Pong { token: ping.token })).await?;
            }
            Decoded::Known(Packet::Pong(pong)) => {
                debug!(token = %pong.token, "pong received");
            }
            Decoded::Known(Packet::AuthStatus(status)) => {
                // Terminal for the authentication attempt; keep-alives
                // continue regardless.
                info!(success = status.success, "authentication result");
                notify.send(Notification::AuthResult { success: status.success }).await?;
            }
            Decoded::Known(Packet::Auth(_)) => {
                debug!("ignoring auth request from host");
            }
        }
    }
}
