//! Encoding and decoding of SocketCAN broadcast manager (BCM) messages.
//!
//! Every BCM message is a `bcm_msg_head` followed by `nframes` CAN frames:
//! - the header layout follows the host's C ABI (`long`-sized timevals)
//! - frames are either classic `can_frame` (16 bytes) or `canfd_frame`
//!   (72 bytes), selected by the `CAN_FD_FRAME` header flag
//!
//! Outgoing requests are built from [`BcmRequest`]; incoming datagrams are
//! validated against their own header by [`decode_message`] before any frame
//! is interpreted.

pub mod codec;
pub mod error;
pub mod flags;
pub mod frame;
pub mod request;

pub use codec::{
    decode_message, encode_message, frame_size, message_size, BcmHead, BcmMessage, FrameIter,
    CLASSIC_FRAME_SIZE, FD_FRAME_SIZE, HEADER_SIZE, MAX_MESSAGE_SIZE, MAX_NFRAMES,
};
pub use error::{FrameError, Result};
pub use flags::{BcmFlags, FdFlags, Opcode};
pub use frame::{id, ClassicFrame, FdFrame, Frame};
pub use request::{BcmRequest, CyclicTask};
