//! Shared per-connection wiring: the single-writer task and its queue.

use std::time::Duration;

use gatehouse_crypto::SecureWriter;
use gatehouse_proto::{AuthStatus, Packet, encode_packet};
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::EngineError;

/// Read timeout for session loops; timeouts are non-fatal and retried.
pub(crate) const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Depth of each connection's outbound packet queue.
pub(crate) const WIRE_QUEUE_DEPTH: usize = 16;

/// Drains queued packets onto the wire.
///
/// The one and only writer for its connection: the session loop and, once a
/// user is authenticated, the user's registry entry both hold senders into
/// the queue, and every outbound packet funnels through here. Ends when the
/// last sender is dropped or the transport rejects a write.
pub(crate) async fn write_loop<W>(mut queue: mpsc::Receiver<Packet>, mut writer: SecureWriter<W>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    while let Some(packet) = queue.recv().await {
        let frame = match encode_packet(&packet) {
            Ok(frame) => frame,
            Err(error) => {
                warn!(%error, "failed to encode outbound packet");
                continue;
            }
        };
        if let Err(error) = writer.write_frame(&frame).await {
            debug!(%error, "connection writer stopped");
            break;
        }
    }
}

/// Queues an authentication verdict for the peer.
pub(crate) async fn send_status(
    wire: &mpsc::Sender<Packet>,
    success: bool,
) -> Result<(), EngineError> {
    wire.send(Packet::AuthStatus(AuthStatus { success })).await?;
    Ok(())
}
