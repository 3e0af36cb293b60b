//! SocketCAN broadcast manager (BCM) transport.
//!
//! This is the lowest layer of canbcm:
//! - [`resolve`] turns an interface name such as `vcan0` into a kernel index
//! - [`BcmSocket`] is a datagram socket connected to the BCM of one interface
//! - [`DatagramIo`] is the seam the event loop drives, so anything that moves
//!   whole datagrams over a non-blocking fd can stand in for the kernel
//!
//! Everything else builds on top of these.

pub mod error;
pub mod traits;

#[cfg(target_os = "linux")]
pub mod bcm;
#[cfg(target_os = "linux")]
pub mod resolver;

pub use error::{Result, TransportError};
pub use traits::DatagramIo;

#[cfg(target_os = "linux")]
pub use bcm::BcmSocket;
#[cfg(target_os = "linux")]
pub use resolver::{resolve, InterfaceIndex};
