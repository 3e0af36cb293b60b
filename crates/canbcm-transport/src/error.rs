/// Errors that can occur in BCM transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The interface name does not name an interface on this host.
    #[error("unknown interface {name:?}: {source}")]
    Lookup {
        name: String,
        source: std::io::Error,
    },

    /// Failed to create the BCM socket or connect it to the interface.
    #[error("failed to connect BCM socket to interface index {index}: {source}")]
    Connect { index: u32, source: std::io::Error },

    /// An I/O error occurred on the connected socket.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The transport has been shut down.
    #[error("transport shut down")]
    Shutdown,
}

pub type Result<T> = std::result::Result<T, TransportError>;
