use std::time::Duration;

use bytes::{Bytes, BytesMut};

use crate::codec::{encode_message, message_size, BcmHead, MAX_NFRAMES};
use crate::error::{FrameError, Result};
use crate::flags::{BcmFlags, Opcode};
use crate::frame::Frame;

/// A kernel-scheduled cyclic transmission, identified by its `can_id`.
///
/// The kernel sends `frames` in order, one per interval: `count` times at
/// `ival1`, then forever at `ival2`. With `count == 0` only `ival2` is used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CyclicTask {
    can_id: u32,
    frames: Vec<Frame>,
    count: u32,
    ival1: Duration,
    ival2: Duration,
}

impl CyclicTask {
    /// Create a task sending `frames` (1..=256, all of one kind).
    pub fn new(can_id: u32, frames: Vec<Frame>) -> Result<Self> {
        validate_frames(&frames)?;
        Ok(Self {
            can_id,
            frames,
            count: 0,
            ival1: Duration::ZERO,
            ival2: Duration::ZERO,
        })
    }

    /// Number of `ival1` repetitions before switching to `ival2`.
    pub fn with_count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    pub fn with_intervals(mut self, ival1: Duration, ival2: Duration) -> Self {
        self.ival1 = ival1;
        self.ival2 = ival2;
        self
    }

    pub fn can_id(&self) -> u32 {
        self.can_id
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn ival1(&self) -> Duration {
        self.ival1
    }

    pub fn ival2(&self) -> Duration {
        self.ival2
    }

    /// True if the task sends CAN FD frames.
    pub fn is_fd(&self) -> bool {
        self.frames.first().is_some_and(Frame::is_fd)
    }
}

/// A request to the broadcast manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BcmRequest {
    /// `TX_SEND`: transmit one frame now.
    Send(Frame),
    /// `TX_SETUP` with `SETTIMER | STARTTIMER`: create (or update) a cyclic
    /// task and start it immediately.
    SetupCyclic(CyclicTask),
    /// `TX_DELETE`: remove a cyclic task. `fd` must match the task's frame
    /// kind, as the kernel keys tasks on `can_id` and the FD flag.
    DeleteCyclic { can_id: u32, fd: bool },
}

impl BcmRequest {
    pub fn opcode(&self) -> Opcode {
        match self {
            BcmRequest::Send(_) => Opcode::TxSend,
            BcmRequest::SetupCyclic(_) => Opcode::TxSetup,
            BcmRequest::DeleteCyclic { .. } => Opcode::TxDelete,
        }
    }

    pub fn can_id(&self) -> u32 {
        match self {
            BcmRequest::Send(frame) => frame.can_id(),
            BcmRequest::SetupCyclic(task) => task.can_id(),
            BcmRequest::DeleteCyclic { can_id, .. } => *can_id,
        }
    }

    pub fn is_fd(&self) -> bool {
        match self {
            BcmRequest::Send(frame) => frame.is_fd(),
            BcmRequest::SetupCyclic(task) => task.is_fd(),
            BcmRequest::DeleteCyclic { fd, .. } => *fd,
        }
    }

    /// Number of frames the encoded message carries.
    pub fn frame_count(&self) -> usize {
        match self {
            BcmRequest::Send(_) => 1,
            BcmRequest::SetupCyclic(task) => task.frames().len(),
            BcmRequest::DeleteCyclic { .. } => 0,
        }
    }

    /// Exact size of the encoded message.
    pub fn wire_size(&self) -> usize {
        message_size(self.is_fd(), self.frame_count())
    }

    /// The message header for this request.
    pub fn head(&self) -> BcmHead {
        let mut head = BcmHead::new(self.opcode(), self.can_id());
        if self.is_fd() {
            head.flags |= BcmFlags::CAN_FD_FRAME;
        }
        if let BcmRequest::SetupCyclic(task) = self {
            head.flags |= BcmFlags::SETTIMER | BcmFlags::STARTTIMER;
            head.count = task.count();
            head.ival1 = task.ival1();
            head.ival2 = task.ival2();
        }
        head.nframes = self.frame_count() as u32;
        head
    }

    /// Encode into an immutable, shareable buffer.
    pub fn encode(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.wire_size());
        self.encode_into(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Encode by appending to `dst`.
    pub fn encode_into(&self, dst: &mut BytesMut) -> Result<()> {
        let head = self.head();
        match self {
            BcmRequest::Send(frame) => encode_message(&head, std::slice::from_ref(frame), dst),
            BcmRequest::SetupCyclic(task) => {
                validate_frames(task.frames())?;
                encode_message(&head, task.frames(), dst)
            }
            BcmRequest::DeleteCyclic { .. } => encode_message(&head, &[], dst),
        }
    }
}

fn validate_frames(frames: &[Frame]) -> Result<()> {
    if frames.is_empty() || frames.len() > MAX_NFRAMES {
        return Err(FrameError::FrameCount {
            count: frames.len(),
            max: MAX_NFRAMES,
        });
    }
    let is_fd = frames[0].is_fd();
    if frames.iter().any(|frame| frame.is_fd() != is_fd) {
        return Err(FrameError::MixedFrameKinds { expected_fd: is_fd });
    }
    Ok(())
}
