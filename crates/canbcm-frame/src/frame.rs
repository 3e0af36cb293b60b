use crate::error::{FrameError, Result};
use crate::flags::FdFlags;

/// CAN identifier helpers (`canid_t` layout from `linux/can.h`).
///
/// A `can_id` is the 11- or 29-bit arbitration id plus flag bits in the top
/// three bits.
pub mod id {
    use crate::error::{FrameError, Result};

    /// Extended frame format (29-bit id).
    pub const EFF_FLAG: u32 = 0x8000_0000;
    /// Remote transmission request.
    pub const RTR_FLAG: u32 = 0x4000_0000;
    /// Error message frame.
    pub const ERR_FLAG: u32 = 0x2000_0000;
    /// Valid bits of a standard id.
    pub const SFF_MASK: u32 = 0x0000_07FF;
    /// Valid bits of an extended id.
    pub const EFF_MASK: u32 = 0x1FFF_FFFF;

    /// Build a standard (11-bit) `can_id`.
    pub fn standard(raw: u32) -> Result<u32> {
        if raw > SFF_MASK {
            return Err(FrameError::InvalidId(raw));
        }
        Ok(raw)
    }

    /// Build an extended (29-bit) `can_id`, setting [`EFF_FLAG`].
    pub fn extended(raw: u32) -> Result<u32> {
        if raw > EFF_MASK {
            return Err(FrameError::InvalidId(raw));
        }
        Ok(raw | EFF_FLAG)
    }

    /// True if `can_id` carries [`EFF_FLAG`].
    pub fn is_extended(can_id: u32) -> bool {
        can_id & EFF_FLAG != 0
    }

    /// The arbitration id without flag bits.
    pub fn arbitration(can_id: u32) -> u32 {
        if is_extended(can_id) {
            can_id & EFF_MASK
        } else {
            can_id & SFF_MASK
        }
    }
}

/// A classic CAN frame (`struct can_frame`), up to 8 data bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassicFrame {
    can_id: u32,
    len: u8,
    len8_dlc: u8,
    data: [u8; 8],
}

impl ClassicFrame {
    /// Payload capacity in bytes.
    pub const CAPACITY: usize = 8;

    /// Create a frame carrying `data`.
    pub fn new(can_id: u32, data: &[u8]) -> Result<Self> {
        if data.len() > Self::CAPACITY {
            return Err(FrameError::PayloadTooLarge {
                size: data.len(),
                max: Self::CAPACITY,
            });
        }
        let mut buf = [0u8; Self::CAPACITY];
        buf[..data.len()].copy_from_slice(data);
        Ok(Self {
            can_id,
            len: data.len() as u8,
            len8_dlc: 0,
            data: buf,
        })
    }

    /// Set the raw DLC (9..=15) used when an 8-byte payload is sent with a
    /// larger DLC. Ignored by the kernel unless the interface enables it.
    pub fn with_len8_dlc(mut self, dlc: u8) -> Self {
        self.len8_dlc = dlc;
        self
    }

    pub(crate) fn from_wire(can_id: u32, len: u8, len8_dlc: u8, data: [u8; 8]) -> Self {
        Self {
            can_id,
            len: len.min(Self::CAPACITY as u8),
            len8_dlc,
            data,
        }
    }

    pub fn can_id(&self) -> u32 {
        self.can_id
    }

    /// Payload length (the data length code for 0..=8).
    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn len8_dlc(&self) -> u8 {
        self.len8_dlc
    }

    /// The payload bytes.
    pub fn data(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }

    pub(crate) fn raw_data(&self) -> &[u8; 8] {
        &self.data
    }
}

/// A CAN FD frame (`struct canfd_frame`), up to 64 data bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FdFrame {
    can_id: u32,
    len: u8,
    flags: FdFlags,
    data: [u8; 64],
}

impl FdFrame {
    /// Payload capacity in bytes.
    pub const CAPACITY: usize = 64;

    /// Create a frame carrying `data`.
    pub fn new(can_id: u32, data: &[u8]) -> Result<Self> {
        if data.len() > Self::CAPACITY {
            return Err(FrameError::PayloadTooLarge {
                size: data.len(),
                max: Self::CAPACITY,
            });
        }
        let mut buf = [0u8; Self::CAPACITY];
        buf[..data.len()].copy_from_slice(data);
        Ok(Self {
            can_id,
            len: data.len() as u8,
            flags: FdFlags::empty(),
            data: buf,
        })
    }

    /// Set per-frame FD flags (bit rate switch, error state).
    pub fn with_flags(mut self, flags: FdFlags) -> Self {
        self.flags = flags;
        self
    }

    pub(crate) fn from_wire(can_id: u32, len: u8, flags: u8, data: [u8; 64]) -> Self {
        Self {
            can_id,
            len: len.min(Self::CAPACITY as u8),
            flags: FdFlags::from_bits_retain(flags),
            data,
        }
    }

    pub fn can_id(&self) -> u32 {
        self.can_id
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn flags(&self) -> FdFlags {
        self.flags
    }

    pub fn data(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }

    pub(crate) fn raw_data(&self) -> &[u8; 64] {
        &self.data
    }
}

/// Either kind of CAN frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    Classic(ClassicFrame),
    Fd(FdFrame),
}

impl Frame {
    /// Classic frame shorthand.
    pub fn classic(can_id: u32, data: &[u8]) -> Result<Self> {
        ClassicFrame::new(can_id, data).map(Frame::Classic)
    }

    /// FD frame shorthand.
    pub fn fd(can_id: u32, data: &[u8]) -> Result<Self> {
        FdFrame::new(can_id, data).map(Frame::Fd)
    }

    pub fn is_fd(&self) -> bool {
        matches!(self, Frame::Fd(_))
    }

    pub fn can_id(&self) -> u32 {
        match self {
            Frame::Classic(frame) => frame.can_id(),
            Frame::Fd(frame) => frame.can_id(),
        }
    }

    pub fn data(&self) -> &[u8] {
        match self {
            Frame::Classic(frame) => frame.data(),
            Frame::Fd(frame) => frame.data(),
        }
    }

    /// Size of this frame's kernel struct.
    pub fn wire_size(&self) -> usize {
        crate::codec::frame_size(self.is_fd())
    }
}

impl From<ClassicFrame> for Frame {
    fn from(frame: ClassicFrame) -> Self {
        Frame::Classic(frame)
    }
}

impl From<FdFrame> for Frame {
    fn from(frame: FdFrame) -> Self {
        Frame::Fd(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classic_frame_keeps_payload() {
        let frame = ClassicFrame::new(0x123, &[0xDE, 0xAD, 0xBE, 0xEF]).unwrap();
        assert_eq!(frame.can_id(), 0x123);
        assert_eq!(frame.len(), 4);
        assert_eq!(frame.data(), &[0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(&frame.raw_data()[4..], &[0u8; 4]);
    }

    #[test]
    fn classic_frame_rejects_nine_bytes() {
        let err = ClassicFrame::new(0x1, &[0u8; 9]).unwrap_err();
        assert!(matches!(
            err,
            FrameError::PayloadTooLarge { size: 9, max: 8 }
        ));
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn fd_frame_accepts_full_payload() {
        let data = [0x5Au8; 64];
        let frame = FdFrame::new(0x567, &data)
            .unwrap()
            .with_flags(FdFlags::BRS);
        assert_eq!(frame.len(), 64);
        assert_eq!(frame.flags(), FdFlags::BRS);
        assert!(FdFrame::new(0x567, &[0u8; 65]).is_err());
    }

    #[test]
    fn frame_kind_and_size() {
        let classic = Frame::classic(0x10, b"ab").unwrap();
        let fd = Frame::fd(0x10, b"ab").unwrap();
        assert!(!classic.is_fd());
        assert!(fd.is_fd());
        assert_eq!(classic.wire_size(), 16);
        assert_eq!(fd.wire_size(), 72);
        assert_eq!(classic.data(), fd.data());
    }

    #[test]
    fn id_helpers() {
        assert_eq!(id::standard(0x7FF).unwrap(), 0x7FF);
        assert!(id::standard(0x800).is_err());

        let ext = id::extended(0x18DA_F110).unwrap();
        assert!(id::is_extended(ext));
        assert_eq!(id::arbitration(ext), 0x18DA_F110);
        assert!(id::extended(0x2000_0000).is_err());
    }

    #[test]
    fn wire_len_is_clamped_to_capacity() {
        let frame = ClassicFrame::from_wire(0x1, 15, 0, [1; 8]);
        assert_eq!(frame.len(), 8);
    }
}
