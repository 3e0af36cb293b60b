//! Client for the Linux CAN broadcast manager (BCM).
//!
//! The broadcast manager is a kernel facility that sends single frames,
//! runs cyclic transmissions, and filters reception on behalf of a socket
//! connected to one CAN interface.
//!
//! # Crate Structure
//!
//! - [`transport`]: interface lookup and the BCM socket
//! - [`frame`]: CAN frames and the BCM message codec
//! - [`session`]: event loop and connector (behind the `session` feature)

/// Re-export transport types.
pub mod transport {
    pub use canbcm_transport::*;
}

/// Re-export frame and codec types.
pub mod frame {
    pub use canbcm_frame::*;
}

/// Re-export session types (requires `session` feature).
#[cfg(feature = "session")]
pub mod session {
    pub use canbcm_session::*;
}
