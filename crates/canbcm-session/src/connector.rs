use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use canbcm_frame::{BcmRequest, CyclicTask, Frame};
use canbcm_transport::{BcmSocket, DatagramIo, InterfaceIndex};
use tracing::{debug, info};

use crate::error::Result;
use crate::event_loop::{EventLoop, EventLoopConfig, LoopStats, SendResult};
use crate::handler::NotificationHandler;

/// Connector configuration. Only the interface name is required.
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    /// Interface to connect to, e.g. `vcan0`.
    pub interface: String,
    /// Pause before re-arming after a failed receive.
    pub recv_error_backoff: Duration,
    /// Name of the event loop's worker thread.
    pub worker_name: String,
}

impl ConnectorConfig {
    pub fn new(interface: impl Into<String>) -> Self {
        let defaults = EventLoopConfig::default();
        Self {
            interface: interface.into(),
            recv_error_backoff: defaults.recv_error_backoff,
            worker_name: defaults.worker_name,
        }
    }

    pub fn with_recv_error_backoff(mut self, backoff: Duration) -> Self {
        self.recv_error_backoff = backoff;
        self
    }

    pub fn with_worker_name(mut self, name: impl Into<String>) -> Self {
        self.worker_name = name.into();
        self
    }

    fn event_loop(&self) -> EventLoopConfig {
        EventLoopConfig {
            recv_error_backoff: self.recv_error_backoff,
            worker_name: self.worker_name.clone(),
        }
    }
}

/// A running BCM session on one interface.
///
/// Construction resolves the interface, connects a BCM socket, arms the first
/// receive and starts the worker; if any step fails nothing is left running.
/// Dropping the connector stops and joins the worker and closes the socket.
///
/// All request methods encode synchronously (so argument errors surface
/// immediately) and then return without waiting for the socket. Each
/// completion callback runs once, on the worker thread.
#[derive(Debug)]
pub struct Connector {
    interface: String,
    index: Option<InterfaceIndex>,
    event_loop: EventLoop,
}

impl Connector {
    /// Connect to `config.interface` and start dispatching notifications to
    /// `handler`.
    pub fn open<H: NotificationHandler>(config: ConnectorConfig, handler: H) -> Result<Self> {
        let socket = BcmSocket::open_by_name(&config.interface)?;
        let index = socket.interface_index();
        let event_loop = EventLoop::start(socket, handler, config.event_loop())?;

        info!(interface = %config.interface, %index, "BCM connector ready");
        Ok(Self {
            interface: config.interface,
            index: Some(index),
            event_loop,
        })
    }

    /// Run a connector over an already-open channel.
    ///
    /// `config.interface` is used only as a label.
    pub fn with_channel<T, H>(channel: T, config: ConnectorConfig, handler: H) -> Result<Self>
    where
        T: DatagramIo,
        H: NotificationHandler,
    {
        let event_loop = EventLoop::start(channel, handler, config.event_loop())?;
        debug!(interface = %config.interface, "connector started on supplied channel");
        Ok(Self {
            interface: config.interface,
            index: None,
            event_loop,
        })
    }

    /// `TX_SEND` one frame, classic or FD.
    pub fn send_frame<F>(&self, frame: Frame, on_complete: F) -> Result<()>
    where
        F: FnOnce(SendResult) + Send + 'static,
    {
        self.submit(&BcmRequest::Send(frame), on_complete)
    }

    /// Send each frame as its own `TX_SEND`.
    ///
    /// Every frame is encoded before anything is submitted. The sends are
    /// independent: they may complete in any order and some may fail while
    /// others succeed. `on_complete` receives the frame's position in
    /// `frames` along with its result.
    pub fn send_frames<F>(&self, frames: &[Frame], on_complete: F) -> Result<()>
    where
        F: Fn(usize, SendResult) + Send + Sync + 'static,
    {
        let messages = frames
            .iter()
            .map(|frame| BcmRequest::Send(*frame).encode())
            .collect::<std::result::Result<Vec<Bytes>, _>>()?;

        let on_complete = Arc::new(on_complete);
        for (position, message) in messages.into_iter().enumerate() {
            let on_complete = on_complete.clone();
            self.event_loop
                .submit(message, move |result| on_complete(position, result))?;
        }
        Ok(())
    }

    /// `TX_SETUP` a cyclic task and start its timer.
    ///
    /// Re-using the `can_id` of a running task updates it in place.
    pub fn setup_cyclic<F>(&self, task: CyclicTask, on_complete: F) -> Result<()>
    where
        F: FnOnce(SendResult) + Send + 'static,
    {
        self.submit(&BcmRequest::SetupCyclic(task), on_complete)
    }

    /// `TX_DELETE` the cyclic task for `can_id`. `fd` must match the task.
    ///
    /// Deleting a task that does not exist is left to the kernel to report.
    pub fn delete_cyclic<F>(&self, can_id: u32, fd: bool, on_complete: F) -> Result<()>
    where
        F: FnOnce(SendResult) + Send + 'static,
    {
        self.submit(&BcmRequest::DeleteCyclic { can_id, fd }, on_complete)
    }

    /// Encode and submit any request.
    pub fn submit<F>(&self, request: &BcmRequest, on_complete: F) -> Result<()>
    where
        F: FnOnce(SendResult) + Send + 'static,
    {
        let message = request.encode()?;
        debug!(
            opcode = %request.opcode(),
            can_id = %format_args!("{:#x}", request.can_id()),
            len = message.len(),
            "submitting BCM request"
        );
        self.event_loop.submit(message, on_complete)
    }

    /// Stop dispatching and join the worker. Idempotent.
    ///
    /// Cyclic tasks already set up keep running in the kernel until deleted
    /// or until the socket is closed when the connector is dropped.
    pub fn stop(&mut self) {
        self.event_loop.stop();
    }

    pub fn is_running(&self) -> bool {
        self.event_loop.is_running()
    }

    pub fn stats(&self) -> &LoopStats {
        self.event_loop.stats()
    }

    /// The interface name this connector was opened with.
    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// The resolved interface index; `None` for [`with_channel`](Self::with_channel).
    pub fn interface_index(&self) -> Option<InterfaceIndex> {
        self.index
    }
}
