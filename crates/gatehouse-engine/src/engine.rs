//! Engine startup and the control-event loop.

use gatehouse_core::{HostConfig, SharedRegistry};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bus::{EngineHandle, control_channel, notification_channel};
use crate::event::{ControlEvent, Notification};
use crate::{host, join};

/// Engine-wide settings fixed at startup.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Initial value of the registration switch; the operator can toggle it
    /// later with [`ControlEvent::SetRegistration`].
    pub registration_enabled: bool,
}

/// The Gatehouse session engine.
pub struct Engine;

impl Engine {
    /// Spawns the control loop and returns the caller's bus handle.
    ///
    /// The registry is injected so the caller can pre-provision users and
    /// observe registrations; the engine holds only a shared handle.
    pub fn start(registry: SharedRegistry, config: EngineConfig) -> EngineHandle {
        let (control_tx, control_rx) = control_channel();
        let (notify_tx, notify_rx) = notification_channel();
        let host_config = HostConfig::new(registry, config.registration_enabled);

        info!("starting engine control loop");
        tokio::spawn(run_control_loop(control_rx, notify_tx, host_config));

        EngineHandle { control: control_tx, notifications: notify_rx }
    }
}

/// The sole consumer of the control bus.
///
/// Sessions are spawned from here and report back only through the
/// notification bus; the loop itself never blocks on a session.
async fn run_control_loop(
    mut control_rx: mpsc::Receiver<ControlEvent>,
    notify: mpsc::Sender<Notification>,
    host_config: HostConfig,
) {
    let shutdown = CancellationToken::new();
    // Trust decision for the one join attempt in flight; replaced wholesale
    // whenever a new join starts.
    let mut pending_trust: Option<oneshot::Sender<bool>> = None;

    while let Some(event) = control_rx.recv().await {
        match event {
            ControlEvent::RequestHost { addr } => {
                debug!(%addr, "host requested");
                tokio::spawn(host::run_host(
                    addr,
                    host_config.clone(),
                    notify.clone(),
                    shutdown.child_token(),
                ));
            }

            ControlEvent::RequestJoin { addr, username, password } => {
                debug!(%addr, user = %username, "join requested");
                let (trust_tx, trust_rx) = oneshot::channel();
                pending_trust = Some(trust_tx);
                tokio::spawn(join::run_join(
                    join::JoinRequest { addr, username, password },
                    trust_rx,
                    notify.clone(),
                    shutdown.child_token(),
                ));
            }

            ControlEvent::RegistrationDecision { username, password: _, allow, reply } => {
                info!(user = %username, allow, "registration decision");
                reply.resolve(allow);
            }

            ControlEvent::ConnectionTrustDecision { proceed } => {
                match pending_trust.take() {
                    Some(trust_tx) => {
                        // The join session may have died waiting; that is
                        // its own notification, not ours.
                        let _ = trust_tx.send(proceed);
                    }
                    None => warn!("trust decision with no join awaiting one"),
                }
            }

            ControlEvent::SetRegistration { enabled } => {
                info!(enabled, "registration toggled");
                host_config.set_registration_enabled(enabled);
            }

            ControlEvent::Shutdown => {
                info!("shutdown requested");
                break;
            }
        }
    }

    // Reached on Shutdown or when the caller drops its control sender;
    // either way every session winds down.
    shutdown.cancel();
    debug!("control loop stopped");
}
