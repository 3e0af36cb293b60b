use std::time::Duration;

/// Errors that can occur while encoding or decoding BCM messages.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A message would carry a number of frames the kernel does not accept.
    #[error("frame count {count} out of range (1..={max})")]
    FrameCount { count: usize, max: usize },

    /// A frame payload exceeds the capacity of its frame kind.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An arbitration id does not fit its frame format.
    #[error("can id {0:#x} out of range")]
    InvalidId(u32),

    /// An interval cannot be represented as a kernel `bcm_timeval`.
    #[error("interval {0:?} does not fit a bcm_timeval")]
    IntervalOutOfRange(Duration),

    /// A frame's kind (classic or FD) differs from the rest of the message.
    #[error("frame kind mismatch (message expects fd={expected_fd})")]
    MixedFrameKinds { expected_fd: bool },

    /// A received datagram is shorter than a BCM header.
    #[error("message truncated ({len} bytes, header needs {min})")]
    Truncated { len: usize, min: usize },

    /// A received datagram's length disagrees with its own header.
    #[error("message length {actual} does not match header ({expected} bytes for {nframes} frames)")]
    LengthMismatch {
        expected: u64,
        actual: usize,
        nframes: u32,
    },
}

impl FrameError {
    /// True for errors describing a malformed inbound datagram.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Truncated { .. } | Self::LengthMismatch { .. })
    }

    /// True for errors caused by caller misuse when building a request.
    pub fn is_invalid_argument(&self) -> bool {
        !self.is_malformed()
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
