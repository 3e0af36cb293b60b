/// Errors that can occur in session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Transport-level error (interface lookup, socket connect, I/O).
    #[error("transport error: {0}")]
    Transport(#[from] canbcm_transport::TransportError),

    /// A request could not be encoded.
    #[error("frame error: {0}")]
    Frame(#[from] canbcm_frame::FrameError),

    /// The event loop has been stopped; nothing was submitted.
    #[error("event loop stopped")]
    Stopped,

    /// The event loop's runtime or worker thread could not be created.
    #[error("failed to start event loop: {0}")]
    Runtime(std::io::Error),
}

pub type Result<T> = std::result::Result<T, SessionError>;
