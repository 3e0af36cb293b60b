use canbcm_frame::{BcmMessage, FrameError};
use tracing::debug;

/// Receives inbound BCM notifications on the event loop's worker thread.
///
/// Calls happen in arrival order, one at a time. The message borrows the
/// loop's receive buffer and must be copied out to be kept. Handlers should
/// return quickly: the next receive is armed only after they return.
///
/// A panic inside a handler is caught by the loop, logged, and counted in
/// `LoopStats::handler_panics`; the message is dropped and reception goes on.
pub trait NotificationHandler: Send + 'static {
    /// A well-formed notification arrived.
    fn on_notification(&mut self, message: &BcmMessage<'_>);

    /// A datagram was discarded because its length disagreed with its header.
    /// The loop has already logged it.
    fn on_malformed(&mut self, error: &FrameError) {
        let _ = error;
    }
}

impl<F> NotificationHandler for F
where
    F: FnMut(&BcmMessage<'_>) + Send + 'static,
{
    fn on_notification(&mut self, message: &BcmMessage<'_>) {
        self(message)
    }
}

/// Handler that only logs what arrives.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogHandler;

impl NotificationHandler for LogHandler {
    fn on_notification(&mut self, message: &BcmMessage<'_>) {
        debug!(
            opcode = %message.opcode(),
            can_id = %format_args!("{:#x}", message.can_id()),
            nframes = message.len(),
            fd = message.is_fd(),
            "BCM notification"
        );
    }
}
