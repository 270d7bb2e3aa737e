//! Session-flow integration tests over real loopback sockets.
//!
//! The engine side always runs through its public bus; the peer is either a
//! second engine (full join flow) or a hand-driven protocol client where a
//! test needs to inject exact wire traffic.

use std::net::SocketAddr;
use std::time::Duration;

use gatehouse_core::{Fingerprint, SharedRegistry, auth, fingerprint};
use gatehouse_crypto::{Keypair, SecureStream};
use gatehouse_engine::{
    ControlEvent, Engine, EngineConfig, EngineHandle, Notification, notification_channel,
};
use gatehouse_proto::{Auth, AuthStatus, Decoded, Packet, Ping, decode_packet, encode_packet};
use tokio::net::TcpStream;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(10);

/// Receives notifications until one matches, discarding the rest.
async fn wait_for(
    handle: &mut EngineHandle,
    pred: impl Fn(&Notification) -> bool,
) -> Notification {
    timeout(WAIT, async {
        loop {
            match handle.notifications.recv().await {
                Some(notification) if pred(&notification) => return notification,
                Some(_) => {}
                None => unreachable!("notification bus closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for notification")
}

/// Starts an engine hosting on an ephemeral port.
async fn start_host(
    registry: SharedRegistry,
    registration_enabled: bool,
) -> (EngineHandle, SocketAddr) {
    let mut handle = Engine::start(registry, EngineConfig { registration_enabled });
    handle
        .control
        .send(ControlEvent::RequestHost { addr: "127.0.0.1:0".into() })
        .await
        .expect("control bus open");
    let ready = wait_for(&mut handle, |n| matches!(n, Notification::HostReady { .. })).await;
    let Notification::HostReady { addr, .. } = ready else { unreachable!() };
    (handle, addr)
}

/// A hand-driven protocol client speaking the real wire format.
struct RawClient {
    conn: SecureStream<TcpStream>,
    public_key: [u8; 32],
}

impl RawClient {
    async fn connect(addr: SocketAddr) -> Self {
        let keypair = Keypair::generate();
        let stream = TcpStream::connect(addr).await.expect("tcp connect");
        let conn = SecureStream::connect(stream, &keypair).await.expect("secure handshake");
        Self { conn, public_key: *keypair.public().as_bytes() }
    }

    fn fingerprint(&self) -> Fingerprint {
        fingerprint(&self.public_key)
    }

    async fn send(&mut self, packet: Packet) {
        let frame = encode_packet(&packet).expect("encode");
        self.conn.write_frame(&frame).await.expect("write frame");
    }

    async fn send_auth(&mut self, username: &str, password: &str) {
        self.send(Packet::Auth(Auth { username: username.into(), password: password.into() }))
            .await;
    }

    /// Reads packets until one matches, discarding keep-alives and the like.
    async fn recv_until(&mut self, pred: impl Fn(&Packet) -> bool) -> Packet {
        timeout(WAIT, async {
            loop {
                let frame = self.conn.read_frame().await.expect("read frame");
                if let Decoded::Known(packet) = decode_packet(&frame).expect("decode") {
                    if pred(&packet) {
                        return packet;
                    }
                }
            }
        })
        .await
        .expect("timed out waiting for packet")
    }

    async fn recv_auth_status(&mut self) -> bool {
        let packet = self.recv_until(|p| matches!(p, Packet::AuthStatus(_))).await;
        let Packet::AuthStatus(AuthStatus { success }) = packet else { unreachable!() };
        success
    }
}

#[tokio::test]
async fn known_user_authenticates_and_keepalive_echoes() {
    let registry = SharedRegistry::new();
    auth::register(&registry, "alice", "correct-horse").expect("provision");
    let (mut host, addr) = start_host(registry.clone(), false).await;

    let mut client = RawClient::connect(addr).await;
    client.send_auth("alice", "correct-horse").await;
    assert!(client.recv_auth_status().await);

    wait_for(&mut host, |n| {
        matches!(n, Notification::UserConnected { username } if username == "alice")
    })
    .await;
    assert!(registry.is_connected("alice"));

    // An authenticated connection keeps servicing pings; the echoed pong
    // carries the identical token.
    client.send(Packet::Ping(Ping { token: "echo-check-417".into() })).await;
    let pong = client
        .recv_until(|p| matches!(p, Packet::Pong(pong) if pong.token == "echo-check-417"))
        .await;
    assert!(matches!(pong, Packet::Pong(_)));

    host.control.send(ControlEvent::Shutdown).await.expect("shutdown");
}

#[tokio::test]
async fn wrong_password_is_rejected_but_retry_succeeds() {
    let registry = SharedRegistry::new();
    auth::register(&registry, "alice", "correct-horse").expect("provision");
    let (_host, addr) = start_host(registry.clone(), false).await;

    let mut client = RawClient::connect(addr).await;
    client.send_auth("alice", "correct-horsex").await;
    assert!(!client.recv_auth_status().await);
    assert!(!registry.is_connected("alice"));

    // The session stays open awaiting another attempt.
    client.send_auth("alice", "correct-horse").await;
    assert!(client.recv_auth_status().await);
}

#[tokio::test]
async fn unknown_user_with_registration_disabled_gets_explicit_failure() {
    let (_host, addr) = start_host(SharedRegistry::new(), false).await;

    let mut client = RawClient::connect(addr).await;
    client.send_auth("stranger", "whatever").await;
    assert!(!client.recv_auth_status().await);
}

#[tokio::test]
async fn registration_approval_admits_and_registers_the_user() {
    let registry = SharedRegistry::new();
    let (mut host, addr) = start_host(registry.clone(), true).await;

    let mut client = RawClient::connect(addr).await;
    client.send_auth("alice", "correct-horse").await;

    let event =
        wait_for(&mut host, |n| matches!(n, Notification::UnknownConnection { .. })).await;
    let Notification::UnknownConnection { fingerprint, username, password, reply } = event else {
        unreachable!()
    };
    assert_eq!(username, "alice");
    assert_eq!(password, "correct-horse");
    // The presented fingerprint is the candidate's key, not the host's.
    assert_eq!(fingerprint, client.fingerprint());

    host.control
        .send(ControlEvent::RegistrationDecision { username, password, allow: true, reply })
        .await
        .expect("control bus open");

    assert!(client.recv_auth_status().await);
    wait_for(&mut host, |n| {
        matches!(n, Notification::UserConnected { username } if username == "alice")
    })
    .await;

    assert_eq!(registry.names(), ["alice"]);
    assert!(registry.is_connected("alice"));
    assert_eq!(auth::verify(&registry, "alice", "correct-horse"), auth::VerifyOutcome::Accepted);
}

#[tokio::test]
async fn registration_denial_leaves_the_registry_unchanged() {
    let registry = SharedRegistry::new();
    let (mut host, addr) = start_host(registry.clone(), true).await;

    let mut client = RawClient::connect(addr).await;
    client.send_auth("mallory", "sneaky").await;

    let event =
        wait_for(&mut host, |n| matches!(n, Notification::UnknownConnection { .. })).await;
    let Notification::UnknownConnection { username, password, reply, .. } = event else {
        unreachable!()
    };
    host.control
        .send(ControlEvent::RegistrationDecision { username, password, allow: false, reply })
        .await
        .expect("control bus open");

    assert!(!client.recv_auth_status().await);
    assert!(registry.is_empty());

    // Denial returns the session to awaiting-auth: a fresh attempt raises a
    // fresh approval request.
    client.send_auth("mallory", "sneaky").await;
    wait_for(&mut host, |n| matches!(n, Notification::UnknownConnection { .. })).await;
}

#[tokio::test]
async fn join_flow_end_to_end_with_registration() {
    // Host side: registration enabled, empty registry.
    let host_registry = SharedRegistry::new();
    let (mut host, addr) = start_host(host_registry.clone(), true).await;

    // Client side: a second engine joining as alice.
    let mut client = Engine::start(SharedRegistry::new(), EngineConfig::default());
    client
        .control
        .send(ControlEvent::RequestJoin {
            addr: addr.to_string(),
            username: "alice".into(),
            password: "correct-horse".into(),
        })
        .await
        .expect("control bus open");

    wait_for(&mut client, |n| matches!(n, Notification::RemoteKeyForConfirmation { .. })).await;
    client
        .control
        .send(ControlEvent::ConnectionTrustDecision { proceed: true })
        .await
        .expect("control bus open");
    wait_for(&mut client, |n| matches!(n, Notification::OwnKeyForConfirmation { .. })).await;

    let event =
        wait_for(&mut host, |n| matches!(n, Notification::UnknownConnection { .. })).await;
    let Notification::UnknownConnection { username, password, reply, .. } = event else {
        unreachable!()
    };
    assert_eq!(username, "alice");
    host.control
        .send(ControlEvent::RegistrationDecision { username, password, allow: true, reply })
        .await
        .expect("control bus open");

    let result = wait_for(&mut client, |n| matches!(n, Notification::AuthResult { .. })).await;
    assert!(matches!(result, Notification::AuthResult { success: true }));

    wait_for(&mut host, |n| {
        matches!(n, Notification::UserConnected { username } if username == "alice")
    })
    .await;
    assert_eq!(host_registry.names(), ["alice"]);

    client.control.send(ControlEvent::Shutdown).await.expect("shutdown");
    host.control.send(ControlEvent::Shutdown).await.expect("shutdown");
}

#[tokio::test]
async fn join_result_reports_the_hosts_rejection() {
    let registry = SharedRegistry::new();
    auth::register(&registry, "alice", "correct-horse").expect("provision");
    let (_host, addr) = start_host(registry, false).await;

    let mut client = Engine::start(SharedRegistry::new(), EngineConfig::default());
    client
        .control
        .send(ControlEvent::RequestJoin {
            addr: addr.to_string(),
            username: "alice".into(),
            password: "wrong".into(),
        })
        .await
        .expect("control bus open");

    wait_for(&mut client, |n| matches!(n, Notification::RemoteKeyForConfirmation { .. })).await;
    client
        .control
        .send(ControlEvent::ConnectionTrustDecision { proceed: true })
        .await
        .expect("control bus open");

    let result = wait_for(&mut client, |n| matches!(n, Notification::AuthResult { .. })).await;
    assert!(matches!(result, Notification::AuthResult { success: false }));
}

#[tokio::test]
async fn aborted_join_never_sends_credentials() {
    let registry = SharedRegistry::new();
    let (mut host, addr) = start_host(registry.clone(), true).await;

    let mut client = Engine::start(SharedRegistry::new(), EngineConfig::default());
    client
        .control
        .send(ControlEvent::RequestJoin {
            addr: addr.to_string(),
            username: "alice".into(),
            password: "correct-horse".into(),
        })
        .await
        .expect("control bus open");

    wait_for(&mut client, |n| matches!(n, Notification::RemoteKeyForConfirmation { .. })).await;
    client
        .control
        .send(ControlEvent::ConnectionTrustDecision { proceed: false })
        .await
        .expect("control bus open");

    // No Auth ever reaches the host: nothing to approve, nobody connected.
    let auth_seen = timeout(
        Duration::from_millis(500),
        wait_for(&mut host, |n| {
            matches!(
                n,
                Notification::UnknownConnection { .. } | Notification::UserConnected { .. }
            )
        }),
    )
    .await;
    assert!(auth_seen.is_err(), "host saw authentication traffic after an abort");
    assert!(registry.is_empty());
}

#[tokio::test]
async fn bus_is_capacity_one_ordered_and_lossless() {
    let (tx, mut rx) = notification_channel();

    tx.send(Notification::GenericStatus { title: "t".into(), message: "first".into() })
        .await
        .expect("first send");

    // The slot is full: a second send parks until the first is drained.
    let second = tokio::spawn({
        let tx = tx.clone();
        async move {
            tx.send(Notification::GenericStatus { title: "t".into(), message: "second".into() })
                .await
                .expect("second send");
        }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!second.is_finished(), "second send completed against a full capacity-one bus");

    let Some(Notification::GenericStatus { message, .. }) = rx.recv().await else {
        unreachable!()
    };
    assert_eq!(message, "first");
    second.await.expect("second send task");
    let Some(Notification::GenericStatus { message, .. }) = rx.recv().await else {
        unreachable!()
    };
    assert_eq!(message, "second");
}
