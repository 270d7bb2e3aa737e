//! Gatehouse terminal front end.
//!
//! A thin presentation layer over the engine's event bus: operator commands
//! go in as control events, notifications come back out as text. All
//! protocol behavior lives behind the bus.

// This binary is the rendering layer; stdout is its screen.
#![allow(clippy::print_stdout)]

use anyhow::{Context, bail};
use clap::Parser;
use gatehouse_core::{SharedRegistry, auth, format_words};
use gatehouse_engine::{ControlEvent, Engine, EngineConfig, Notification, RegistrationReply};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::Command;

/// Words per line when rendering key fingerprints.
const FINGERPRINT_WORDS_PER_LINE: usize = 4;

#[derive(Debug, Parser)]
#[command(name = "gatehouse", about = "Encrypted host/join sessions with TOFU key confirmation")]
struct Args {
    /// Listen address to start hosting on immediately.
    #[arg(long, value_name = "ADDR")]
    host: Option<String>,

    /// Pre-provision a user (repeatable).
    #[arg(long = "user", value_name = "NAME:PASSWORD")]
    users: Vec<String>,

    /// Accept registration requests from unknown users.
    #[arg(long)]
    allow_registration: bool,

    /// Log filter, e.g. `info` or `gatehouse_engine=debug`.
    #[arg(long, default_value = "warn")]
    log: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&args.log))
        .with_writer(std::io::stderr)
        .init();

    let registry = SharedRegistry::new();
    for entry in &args.users {
        let Some((name, password)) = entry.split_once(':') else {
            bail!("--user takes NAME:PASSWORD, got {entry:?}");
        };
        auth::register(&registry, name, password)
            .with_context(|| format!("provisioning user {name:?}"))?;
    }

    let mut handle = Engine::start(
        registry.clone(),
        EngineConfig { registration_enabled: args.allow_registration },
    );
    if let Some(addr) = args.host {
        handle.control.send(ControlEvent::RequestHost { addr }).await?;
    }

    println!("gatehouse ready; /host <addr>, /join <addr> <user> <pass>, /quit");

    // One loop owns both the operator's input and the notification bus, so
    // each direction keeps its single consumer.
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut pending_registration: Option<(String, String, RegistrationReply)> = None;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                match commands::parse(&line) {
                    Command::Host { addr } => {
                        handle.control.send(ControlEvent::RequestHost { addr }).await?;
                    }
                    Command::Join { addr, username, password } => {
                        handle
                            .control
                            .send(ControlEvent::RequestJoin { addr, username, password })
                            .await?;
                    }
                    Command::Register { enabled } => {
                        handle.control.send(ControlEvent::SetRegistration { enabled }).await?;
                        println!("registration {}", if enabled { "enabled" } else { "disabled" });
                    }
                    decision @ (Command::Allow | Command::Deny) => {
                        let allow = matches!(decision, Command::Allow);
                        match pending_registration.take() {
                            Some((username, password, reply)) => {
                                handle
                                    .control
                                    .send(ControlEvent::RegistrationDecision {
                                        username,
                                        password,
                                        allow,
                                        reply,
                                    })
                                    .await?;
                            }
                            None => println!("no registration request pending"),
                        }
                    }
                    Command::Trust => {
                        handle
                            .control
                            .send(ControlEvent::ConnectionTrustDecision { proceed: true })
                            .await?;
                    }
                    Command::Abort => {
                        handle
                            .control
                            .send(ControlEvent::ConnectionTrustDecision { proceed: false })
                            .await?;
                    }
                    Command::Users => {
                        let names = registry.names();
                        if names.is_empty() {
                            println!("no users registered");
                        } else {
                            println!("{}", names.join("\n"));
                        }
                    }
                    Command::Quit => {
                        handle.control.send(ControlEvent::Shutdown).await?;
                        break;
                    }
                    Command::Unknown { input } => {
                        println!("unknown command {input:?}; commands start with /");
                    }
                    Command::InvalidArgs { error, .. } => println!("{error}"),
                }
            }

            notification = handle.notifications.recv() => {
                let Some(notification) = notification else { break };
                render(notification, &mut pending_registration);
            }
        }
    }

    Ok(())
}

/// Renders one notification as text, stashing any pending approval so the
/// operator can answer it with `/allow` or `/deny`.
fn render(
    notification: Notification,
    pending: &mut Option<(String, String, RegistrationReply)>,
) {
    match notification {
        Notification::HostReady { addr, fingerprint } => {
            println!("hosting on {addr}");
            println!("your host key:");
            println!("{}", format_words(&fingerprint, FINGERPRINT_WORDS_PER_LINE));
            println!("share this with your users");
        }
        Notification::HostFailed { reason } => println!("hosting failed: {reason}"),
        Notification::UnknownConnection { fingerprint, username, password, reply } => {
            println!("unknown user {username:?} asks to register, presenting key:");
            println!("{}", format_words(&fingerprint, FINGERPRINT_WORDS_PER_LINE));
            println!("/allow to register, /deny to refuse");
            if let Some((old_user, ..)) = pending.replace((username, password, reply)) {
                // The dropped reply reads as a denial on the old session.
                println!("(superseded pending request from {old_user:?})");
            }
        }
        Notification::RemoteKeyForConfirmation { fingerprint } => {
            println!("the host presents this key:");
            println!("{}", format_words(&fingerprint, FINGERPRINT_WORDS_PER_LINE));
            println!("/trust to continue, /abort to disconnect");
        }
        Notification::OwnKeyForConfirmation { fingerprint } => {
            println!("your key, for the host operator to verify:");
            println!("{}", format_words(&fingerprint, FINGERPRINT_WORDS_PER_LINE));
        }
        Notification::AuthResult { success } => {
            println!("authentication {}", if success { "succeeded" } else { "failed" });
        }
        Notification::UserConnected { username } => println!("{username} connected"),
        Notification::Disconnected { username } => match username {
            Some(username) => println!("{username} disconnected"),
            None => println!("connection lost"),
        },
        Notification::GenericStatus { title, message } => println!("[{title}] {message}"),
    }
}
