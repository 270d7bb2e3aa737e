//! Gatehouse session engine.
//!
//! Drives the host and join protocol state machines on tokio and connects
//! them to an external caller through two bounded, single-consumer event
//! channels: the control bus into the engine and the notification bus out
//! of it. The caller never touches a socket; the engine never touches a
//! screen.
//!
//! # Task model
//!
//! One task runs the control loop (sole consumer of control events), one
//! task per listening host role, one task per accepted or dialed
//! connection, and one writer task per connection fanning queued outbound
//! packets onto the wire. Cooperative shutdown flows through a
//! [`tokio_util::sync::CancellationToken`] tree rooted in the control loop.

pub mod bus;
pub mod engine;
pub mod error;
pub mod event;
mod host;
mod join;
mod wire;

pub use bus::{BUS_CAPACITY, EngineHandle, control_channel, notification_channel};
pub use engine::{Engine, EngineConfig};
pub use error::EngineError;
pub use event::{ControlEvent, Notification, RegistrationReply};
