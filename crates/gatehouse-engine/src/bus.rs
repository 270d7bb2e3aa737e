//! The event bus: two bounded, ordered, single-consumer channels.

use tokio::sync::mpsc;

use crate::event::{ControlEvent, Notification};

/// Bus channels hold at most one in-flight event per direction.
///
/// A producer blocks until the previous event is consumed: strict
/// backpressure in exchange for a trivially predictable bus: nothing is
/// ever dropped or reordered, and a stalled consumer stalls exactly the
/// producers of its own direction.
pub const BUS_CAPACITY: usize = 1;

/// Creates the control channel (caller → engine).
pub fn control_channel() -> (mpsc::Sender<ControlEvent>, mpsc::Receiver<ControlEvent>) {
    mpsc::channel(BUS_CAPACITY)
}

/// Creates the notification channel (engine → caller).
pub fn notification_channel() -> (mpsc::Sender<Notification>, mpsc::Receiver<Notification>) {
    mpsc::channel(BUS_CAPACITY)
}

/// The caller's end of both bus directions, returned by
/// [`crate::Engine::start`].
pub struct EngineHandle {
    /// Send control events here.
    pub control: mpsc::Sender<ControlEvent>,
    /// Consume notifications here. Exactly one consumer loop should own
    /// this; the engine blocks on a full slot.
    pub notifications: mpsc::Receiver<Notification>,
}
