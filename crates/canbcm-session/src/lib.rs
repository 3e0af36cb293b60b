//! BCM session management.
//!
//! This is the "just works" layer. A [`Connector`] resolves an interface,
//! connects a BCM socket to it, and runs an [`EventLoop`] on a dedicated
//! worker thread that keeps one receive armed at all times while sends are
//! submitted from any thread.

pub mod error;

#[cfg(target_os = "linux")]
pub mod connector;
#[cfg(target_os = "linux")]
pub mod event_loop;
#[cfg(target_os = "linux")]
pub mod handler;

pub use error::{Result, SessionError};

#[cfg(target_os = "linux")]
pub use connector::{Connector, ConnectorConfig};
#[cfg(target_os = "linux")]
pub use event_loop::{EventLoop, EventLoopConfig, LoopStats, SendResult};
#[cfg(target_os = "linux")]
pub use handler::{LogHandler, NotificationHandler};
