//! Host role: listener and per-connection session state machine.
//!
//! Each accepted connection runs `Connected → KeepAlive → AwaitingAuth →
//! {Authenticated | AwaitingApproval → {Authenticated | Closed} | Closed}`.
//! The approval hand-off blocks only the one connection awaiting it; the
//! listener, the bus, and every other connection keep running.

use gatehouse_core::auth::{self, VerifyOutcome};
use gatehouse_core::{HostConfig, fingerprint};
use gatehouse_crypto::{Keypair, PublicKey, SecureReader, SecureStream};
use gatehouse_proto::{Auth, Decoded, Packet, Ping, Pong, decode_packet};
use tokio::io::ReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::EngineError;
use crate::event::{Notification, RegistrationReply};
use crate::wire::{READ_TIMEOUT, WIRE_QUEUE_DEPTH, send_status, write_loop};

/// Token carried in the host's opening ping. Logged on echo, never checked.
const PING_TOKEN: &str = "anyone home";

/// Binds the listener and accepts connections until cancelled.
///
/// A bind failure is reported once and ends the host role; an individual
/// accept failure is logged and the listener keeps running.
pub(crate) async fn run_host(
    addr: String,
    config: HostConfig,
    notify: mpsc::Sender<Notification>,
    token: CancellationToken,
) {
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(error) => {
            warn!(%addr, %error, "failed to bind listener");
            let _ = notify.send(Notification::HostFailed { reason: error.to_string() }).await;
            return;
        }
    };
    let local_addr = match listener.local_addr() {
        Ok(local_addr) => local_addr,
        Err(error) => {
            let _ = notify.send(Notification::HostFailed { reason: error.to_string() }).await;
            return;
        }
    };

    let keypair = Keypair::generate();
    info!(%local_addr, "host accepting connections");
    if notify
        .send(Notification::HostReady {
            addr: local_addr,
            fingerprint: fingerprint(keypair.public().as_bytes()),
        })
        .await
        .is_err()
    {
        return;
    }

    loop {
        tokio::select! {
            () = token.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!(%peer, "connection accepted");
                    let keypair = keypair.clone();
                    let config = config.clone();
                    let notify = notify.clone();
                    let child = token.child_token();
                    tokio::spawn(async move {
                        if let Err(error) =
                            host_session(stream, keypair, config, notify, child).await
                        {
                            debug!(%peer, %error, "host session ended");
                        }
                    });
                }
                Err(error) => warn!(%error, "accept failed"),
            },
        }
    }
    info!(%local_addr, "host listener stopped");
}

/// Drives one accepted connection through the host state machine.
async fn host_session(
    stream: TcpStream,
    keypair: Keypair,
    config: HostConfig,
    notify: mpsc::Sender<Notification>,
    token: CancellationToken,
) -> Result<(), EngineError> {
    let mut conn = SecureStream::accept(stream, &keypair).await?;
    conn.set_read_timeout(Some(READ_TIMEOUT));
    let client_key = *conn.remote_public_key();
    let (reader, writer) = conn.into_split();

    let (wire_tx, wire_rx) = mpsc::channel(WIRE_QUEUE_DEPTH);
    tokio::spawn(write_loop(wire_rx, writer));

    // Connected: probe liveness straight away.
    wire_tx.send(Packet::Ping(Ping { token: PING_TOKEN.into() })).await?;

    let mut session = HostSession {
        reader,
        wire: wire_tx,
        client_key,
        config: config.clone(),
        notify: notify.clone(),
        token,
        authenticated: None,
    };
    let result = session.run().await;

    // Closed: the user's outbound queue dies with this connection.
    if let Some(username) = session.authenticated.take() {
        config.registry.mark_disconnected(&username);
        info!(user = %username, "user disconnected");
        if matches!(result, Err(EngineError::Transport(_) | EngineError::Proto(_))) {
            let _ = notify.send(Notification::Disconnected { username: Some(username) }).await;
        }
    } else if matches!(result, Err(EngineError::Transport(_) | EngineError::Proto(_))) {
        let _ = notify.send(Notification::Disconnected { username: None }).await;
    }
    result
}

struct HostSession {
    reader: SecureReader<ReadHalf<TcpStream>>,
    wire: mpsc::Sender<Packet>,
    client_key: PublicKey,
    config: HostConfig,
    notify: mpsc::Sender<Notification>,
    token: CancellationToken,
    /// Set once the peer authenticates; `AwaitingAuth` otherwise.
    authenticated: Option<String>,
}

impl HostSession {
    /// The keep-alive / authentication read loop.
    ///
    /// Returns `Ok(())` on cancellation, `Err` on a read-fatal condition.
    async fn run(&mut self) -> Result<(), EngineError> {
        let token = self.token.clone();
        loop {
            let read = tokio::select! {
                () = token.cancelled() => return Ok(()),
                read = self.reader.read_frame() => read,
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
                    self.wire.send(Packet::Pong(Pong { token: ping.token })).await?;
                }
                Decoded::Known(Packet::Pong(pong)) => {
                    debug!(token = %pong.token, "pong received");
                }
                Decoded::Known(Packet::AuthStatus(_)) => {
                    debug!("ignoring auth status from client");
                }
                Decoded::Known(Packet::Auth(auth)) => {
                    if self.authenticated.is_some() {
                        debug!("ignoring auth on authenticated connection");
                    } else {
                        self.handle_auth(auth).await?;
                    }
                }
            }
        }
    }

    /// One authentication attempt, `AwaitingAuth → {Authenticated |
    /// AwaitingApproval | AwaitingAuth}`.
    async fn handle_auth(&mut self, auth: Auth) -> Result<(), EngineError> {
        let Auth { username, password } = auth;
        info!(user = %username, "authentication attempt");

        let outcome = {
            let registry = self.config.registry.clone();
            let (username, password) = (username.clone(), password.clone());
            task::spawn_blocking(move || auth::verify(&registry, &username, &password)).await?
        };

        match outcome {
            VerifyOutcome::Accepted => {
                self.admit(username).await?;
            }
            VerifyOutcome::Rejected => {
                info!(user = %username, "password rejected");
                send_status(&self.wire, false).await?;
            }
            VerifyOutcome::NotFound => {
                // The flag is read anew for every unknown-user decision.
                if self.config.registration_enabled() {
                    self.await_approval(username, password).await?;
                } else {
                    info!(user = %username, "unknown user, registration disabled");
                    send_status(&self.wire, false).await?;
                }
            }
        }
        Ok(())
    }

    /// AwaitingApproval: park this connection on a one-shot decision
    /// channel. Other connections and the bus keep moving.
    async fn await_approval(
        &mut self,
        username: String,
        password: String,
    ) -> Result<(), EngineError> {
        let (reply, decision) = RegistrationReply::new();
        self.notify
            .send(Notification::UnknownConnection {
                fingerprint: fingerprint(self.client_key.as_bytes()),
                username: username.clone(),
                password: password.clone(),
                reply,
            })
            .await?;

        let allowed = tokio::select! {
            () = self.token.cancelled() => return Ok(()),
            decision = decision => decision.unwrap_or(false),
        };
        if !allowed {
            info!(user = %username, "registration denied");
            send_status(&self.wire, false).await?;
            return Ok(());
        }

        let registered = {
            let registry = self.config.registry.clone();
            let (username, password) = (username.clone(), password);
            task::spawn_blocking(move || auth::register(&registry, &username, &password)).await?
        };
        match registered {
            Ok(()) => {
                info!(user = %username, "user registered");
                self.admit(username).await?;
            }
            Err(error) => {
                warn!(user = %username, %error, "registration failed");
                send_status(&self.wire, false).await?;
            }
        }
        Ok(())
    }

    /// Authenticated: install the user's outbound queue and report.
    async fn admit(&mut self, username: String) -> Result<(), EngineError> {
        self.config.registry.mark_connected(&username, self.wire.clone());
        send_status(&self.wire, true).await?;
        self.notify.send(Notification::UserConnected { username: username.clone() }).await?;
        info!(user = %username, "user authenticated");
        self.authenticated = Some(username);
        Ok(())
    }
}
