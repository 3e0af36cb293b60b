use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use canbcm_frame::{decode_message, MAX_MESSAGE_SIZE};
use canbcm_transport::{DatagramIo, TransportError};
use tokio::io::unix::AsyncFd;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::error::{Result, SessionError};
use crate::handler::NotificationHandler;

/// Outcome of one send: bytes accepted by the socket, or why it failed.
pub type SendResult = std::result::Result<usize, TransportError>;

type SendCallback = Box<dyn FnOnce(SendResult) + Send + 'static>;

/// Configuration for the event loop.
#[derive(Debug, Clone)]
pub struct EventLoopConfig {
    /// Pause before re-arming after a failed receive.
    pub recv_error_backoff: Duration,
    /// Name of the worker thread.
    pub worker_name: String,
}

impl Default for EventLoopConfig {
    fn default() -> Self {
        Self {
            recv_error_backoff: Duration::from_millis(10),
            worker_name: "canbcm-io".to_string(),
        }
    }
}

/// Counters maintained by the event loop.
#[derive(Debug, Default)]
pub struct LoopStats {
    receives_armed: AtomicU64,
    receives_completed: AtomicU64,
    notifications: AtomicU64,
    malformed: AtomicU64,
    handler_panics: AtomicU64,
    receive_errors: AtomicU64,
    sends_submitted: AtomicU64,
    sends_completed: AtomicU64,
    send_errors: AtomicU64,
}

impl LoopStats {
    pub fn receives_armed(&self) -> u64 {
        self.receives_armed.load(Ordering::Acquire)
    }

    pub fn receives_completed(&self) -> u64 {
        self.receives_completed.load(Ordering::Acquire)
    }

    /// Receives armed but not yet completed. 1 while the loop is waiting for
    /// a datagram, 0 only while a completion is being handled.
    ///
    /// A snapshot: `armed` is read before `completed`, so a completion and
    /// re-arm racing the read can only make it lower, never above 1.
    pub fn receives_in_flight(&self) -> u64 {
        let armed = self.receives_armed();
        armed.saturating_sub(self.receives_completed())
    }

    /// Well-formed notifications handed to the handler.
    pub fn notifications(&self) -> u64 {
        self.notifications.load(Ordering::Acquire)
    }

    /// Datagrams discarded as malformed.
    pub fn malformed(&self) -> u64 {
        self.malformed.load(Ordering::Acquire)
    }

    /// Handler calls that panicked. The datagram is dropped and reception
    /// continues.
    pub fn handler_panics(&self) -> u64 {
        self.handler_panics.load(Ordering::Acquire)
    }

    pub fn receive_errors(&self) -> u64 {
        self.receive_errors.load(Ordering::Acquire)
    }

    pub fn sends_submitted(&self) -> u64 {
        self.sends_submitted.load(Ordering::Acquire)
    }

    /// Sends whose completion has fired, successfully or not.
    pub fn sends_completed(&self) -> u64 {
        self.sends_completed.load(Ordering::Acquire)
    }

    pub fn send_errors(&self) -> u64 {
        self.send_errors.load(Ordering::Acquire)
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::AcqRel);
    }
}

/// A message waiting to be sent, and the callback owed for it.
///
/// The buffer is held until the callback has run. If the send never happens
/// (the loop stopped first) the callback still fires, with
/// [`TransportError::Shutdown`].
struct PendingSend {
    message: Bytes,
    on_complete: Option<SendCallback>,
}

impl PendingSend {
    fn new(message: Bytes, on_complete: SendCallback) -> Self {
        Self {
            message,
            on_complete: Some(on_complete),
        }
    }

    fn complete(mut self, result: SendResult) {
        if let Some(on_complete) = self.on_complete.take() {
            on_complete(result);
        }
    }

    /// Drop without firing the callback; used when submission itself failed
    /// and the caller is told synchronously.
    fn disarm(mut self) {
        self.on_complete = None;
    }
}

impl Drop for PendingSend {
    fn drop(&mut self) {
        if let Some(on_complete) = self.on_complete.take() {
            on_complete(Err(TransportError::Shutdown));
        }
    }
}

/// Drives one datagram channel on a dedicated worker thread.
///
/// The worker runs a single-threaded tokio runtime with two tasks: a receive
/// pump that always has exactly one receive outstanding, and a dispatcher
/// that turns each submitted message into its own send task. Submissions
/// may come from any thread; completions and notifications are delivered on
/// the worker.
pub struct EventLoop {
    sends: mpsc::UnboundedSender<PendingSend>,
    shutdown: CancellationToken,
    worker: Option<thread::JoinHandle<()>>,
    stats: Arc<LoopStats>,
    transport: &'static str,
}

impl EventLoop {
    /// Arm the first receive on `channel` and start the worker.
    ///
    /// On error nothing is left running and `channel` is closed.
    pub fn start<T, H>(channel: T, handler: H, config: EventLoopConfig) -> Result<Self>
    where
        T: DatagramIo,
        H: NotificationHandler,
    {
        channel.set_nonblocking(true).map_err(TransportError::Io)?;
        let transport = channel.transport_name();

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_io()
            .enable_time()
            .build()
            .map_err(SessionError::Runtime)?;

        let io = {
            let _enter = runtime.enter();
            Arc::new(AsyncFd::new(channel).map_err(TransportError::Io)?)
        };

        let stats = Arc::new(LoopStats::default());
        let shutdown = CancellationToken::new();
        let (sends, send_rx) = mpsc::unbounded_channel();

        LoopStats::bump(&stats.receives_armed);
        runtime.spawn(receive_pump(
            io.clone(),
            handler,
            stats.clone(),
            shutdown.clone(),
            config.recv_error_backoff,
        ));
        runtime.spawn(dispatch_sends(io, send_rx, stats.clone()));

        let worker_shutdown = shutdown.clone();
        let worker = thread::Builder::new()
            .name(config.worker_name.clone())
            .spawn(move || {
                runtime.block_on(worker_shutdown.cancelled());
                // Dropping the runtime cancels in-flight sends (their callbacks
                // fire with `Shutdown`) and closes the channel.
                drop(runtime);
            })
            .map_err(SessionError::Runtime)?;

        info!(transport, worker = %config.worker_name, "event loop started");

        Ok(Self {
            sends,
            shutdown,
            worker: Some(worker),
            stats,
            transport,
        })
    }

    /// Queue `message` for sending. Never blocks.
    ///
    /// `on_complete` fires exactly once, on the worker, after the socket has
    /// accepted or rejected the message. Returns [`SessionError::Stopped`]
    /// (and never calls `on_complete`) if the loop is already stopped.
    pub fn submit<F>(&self, message: Bytes, on_complete: F) -> Result<()>
    where
        F: FnOnce(SendResult) + Send + 'static,
    {
        if self.shutdown.is_cancelled() {
            return Err(SessionError::Stopped);
        }

        LoopStats::bump(&self.stats.sends_submitted);
        let pending = PendingSend::new(message, Box::new(on_complete));
        self.sends.send(pending).map_err(|rejected| {
            rejected.0.disarm();
            self.stats.sends_submitted.fetch_sub(1, Ordering::AcqRel);
            SessionError::Stopped
        })
    }

    /// Signal the worker to stop and join it. Safe to call repeatedly.
    ///
    /// Kernel-side cyclic tasks keep running; only client dispatch stops.
    pub fn stop(&mut self) {
        if !self.shutdown.is_cancelled() {
            debug!(transport = self.transport, "stopping event loop");
            self.shutdown.cancel();
        }

        let Some(worker) = self.worker.take() else {
            return;
        };

        if worker.thread().id() == thread::current().id() {
            error!("event loop stopped from its own worker; not joining");
            return;
        }

        match worker.join() {
            Ok(()) => info!(transport = self.transport, "event loop stopped"),
            Err(_) => error!(transport = self.transport, "event loop worker panicked"),
        }
    }

    /// True until [`stop`](Self::stop) is called.
    pub fn is_running(&self) -> bool {
        !self.shutdown.is_cancelled()
    }

    pub fn stats(&self) -> &LoopStats {
        &self.stats
    }

    /// Shared handle to the counters, usable after the loop is gone.
    pub fn stats_handle(&self) -> Arc<LoopStats> {
        self.stats.clone()
    }
}

impl Drop for EventLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLoop")
            .field("transport", &self.transport)
            .field("running", &self.is_running())
            .finish()
    }
}

async fn receive_pump<T, H>(
    io: Arc<AsyncFd<T>>,
    mut handler: H,
    stats: Arc<LoopStats>,
    shutdown: CancellationToken,
    backoff: Duration,
) where
    T: DatagramIo,
    H: NotificationHandler,
{
    let mut buf = vec![0u8; MAX_MESSAGE_SIZE].into_boxed_slice();

    // One receive is armed on entry (counted by `EventLoop::start`).
    loop {
        let result = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            result = recv_datagram(&io, &mut buf) => result,
        };
        LoopStats::bump(&stats.receives_completed);

        match result {
            Ok(len) => dispatch(&buf[..len], &mut handler, &stats),
            Err(err) => {
                LoopStats::bump(&stats.receive_errors);
                warn!(error = %err, "receive failed");
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(backoff) => {}
                }
            }
        }

        if shutdown.is_cancelled() {
            break;
        }
        LoopStats::bump(&stats.receives_armed);
    }

    debug!("receive pump stopped");
}

fn dispatch<H: NotificationHandler>(datagram: &[u8], handler: &mut H, stats: &LoopStats) {
    match decode_message(datagram) {
        Ok(message) => {
            LoopStats::bump(&stats.notifications);
            trace!(
                opcode = %message.opcode(),
                can_id = message.can_id(),
                nframes = message.len(),
                "notification received"
            );
            let caught =
                panic::catch_unwind(AssertUnwindSafe(|| handler.on_notification(&message)));
            if caught.is_err() {
                LoopStats::bump(&stats.handler_panics);
                error!(
                    opcode = %message.opcode(),
                    can_id = message.can_id(),
                    "notification handler panicked; notification dropped"
                );
            }
        }
        Err(err) => {
            LoopStats::bump(&stats.malformed);
            warn!(len = datagram.len(), error = %err, "discarding malformed BCM message");
            if panic::catch_unwind(AssertUnwindSafe(|| handler.on_malformed(&err))).is_err() {
                LoopStats::bump(&stats.handler_panics);
                error!(error = %err, "malformed-message handler panicked");
            }
        }
    }
}

async fn dispatch_sends<T: DatagramIo>(
    io: Arc<AsyncFd<T>>,
    mut sends: mpsc::UnboundedReceiver<PendingSend>,
    stats: Arc<LoopStats>,
) {
    while let Some(pending) = sends.recv().await {
        tokio::spawn(send_one(io.clone(), pending, stats.clone()));
    }
}

async fn send_one<T: DatagramIo>(io: Arc<AsyncFd<T>>, pending: PendingSend, stats: Arc<LoopStats>) {
    let result = send_datagram(&io, &pending.message)
        .await
        .map_err(TransportError::Io);

    match &result {
        Ok(sent) => trace!(sent, len = pending.message.len(), "send completed"),
        Err(err) => {
            LoopStats::bump(&stats.send_errors);
            warn!(len = pending.message.len(), error = %err, "send failed");
        }
    }
    LoopStats::bump(&stats.sends_completed);
    pending.complete(result);
}

async fn recv_datagram<T: DatagramIo>(io: &AsyncFd<T>, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        let mut guard = io.readable().await?;
        match guard.try_io(|inner| inner.get_ref().recv(&mut buf[..])) {
            Ok(result) => return result,
            Err(_would_block) => continue,
        }
    }
}

async fn send_datagram<T: DatagramIo>(io: &AsyncFd<T>, buf: &[u8]) -> io::Result<usize> {
    loop {
        let mut guard = io.writable().await?;
        match guard.try_io(|inner| inner.get_ref().send(buf)) {
            Ok(result) => return result,
            Err(_would_block) => continue,
        }
    }
}
