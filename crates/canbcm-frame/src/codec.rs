use std::ffi::c_long;
use std::time::Duration;

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{FrameError, Result};
use crate::flags::{BcmFlags, Opcode};
use crate::frame::{ClassicFrame, FdFrame, Frame};

const LONG_SIZE: usize = std::mem::size_of::<c_long>();
const TIMEVAL_SIZE: usize = 2 * LONG_SIZE;

const OPCODE_OFFSET: usize = 0;
const IVAL1_OFFSET: usize = (OPCODE_OFFSET + 12).next_multiple_of(LONG_SIZE);
const IVAL2_OFFSET: usize = IVAL1_OFFSET + TIMEVAL_SIZE;
const CAN_ID_OFFSET: usize = IVAL2_OFFSET + TIMEVAL_SIZE;
const NFRAMES_OFFSET: usize = CAN_ID_OFFSET + 4;

/// Size of `struct bcm_msg_head` on this host.
///
/// `frames[]` is declared 8-byte aligned, so the header is padded to a
/// multiple of 8: 56 bytes on 64-bit Linux, 40 on 32-bit.
pub const HEADER_SIZE: usize = (NFRAMES_OFFSET + 4).next_multiple_of(8);

/// Size of `struct can_frame`.
pub const CLASSIC_FRAME_SIZE: usize = 16;

/// Size of `struct canfd_frame`.
pub const FD_FRAME_SIZE: usize = 72;

/// Kernel ceiling on frames per message (cyclic sequences).
pub const MAX_NFRAMES: usize = 256;

/// Largest message the kernel can produce: a header and 256 FD frames.
pub const MAX_MESSAGE_SIZE: usize = HEADER_SIZE + MAX_NFRAMES * FD_FRAME_SIZE;

/// Wire size of one frame of the given kind.
pub const fn frame_size(is_fd: bool) -> usize {
    if is_fd {
        FD_FRAME_SIZE
    } else {
        CLASSIC_FRAME_SIZE
    }
}

/// Wire size of a message carrying `nframes` frames of the given kind.
pub const fn message_size(is_fd: bool, nframes: usize) -> usize {
    HEADER_SIZE + nframes * frame_size(is_fd)
}

/// `struct bcm_msg_head` without its trailing frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BcmHead {
    pub opcode: Opcode,
    pub flags: BcmFlags,
    /// Repetitions at `ival1` before switching to `ival2`.
    pub count: u32,
    pub ival1: Duration,
    pub ival2: Duration,
    pub can_id: u32,
    pub nframes: u32,
}

impl BcmHead {
    /// A header with no flags, timers, or frames.
    pub fn new(opcode: Opcode, can_id: u32) -> Self {
        Self {
            opcode,
            flags: BcmFlags::empty(),
            count: 0,
            ival1: Duration::ZERO,
            ival2: Duration::ZERO,
            can_id,
            nframes: 0,
        }
    }

    /// True if the frames following this header are `canfd_frame`s.
    pub fn is_fd(&self) -> bool {
        self.flags.contains(BcmFlags::CAN_FD_FRAME)
    }

    /// Total message size this header declares.
    pub fn declared_size(&self) -> u64 {
        HEADER_SIZE as u64 + u64::from(self.nframes) * frame_size(self.is_fd()) as u64
    }
}

/// Encode a header followed by `frames` into `dst`.
///
/// The frame kind comes from `head.flags` (`CAN_FD_FRAME`) and every frame
/// must match it. `nframes` is written as `frames.len()`, whatever the
/// header says, so the message length always agrees with its header.
///
/// Wire format (native byte order, offsets for 64-bit Linux):
/// ```text
/// ┌────────┬───────┬───────┬─────┬─────────────┬─────────────┬────────┬─────────┬─────┬──────────┐
/// │ opcode │ flags │ count │ pad │ ival1       │ ival2       │ can_id │ nframes │ pad │ frames[] │
/// │ u32    │ u32   │ u32   │ 4B  │ long, long  │ long, long  │ u32    │ u32     │ -   │          │
/// │ 0      │ 4     │ 8     │ 12  │ 16          │ 32          │ 48     │ 52      │ 56  │ 56       │
/// └────────┴───────┴───────┴─────┴─────────────┴─────────────┴────────┴─────────┴─────┴──────────┘
/// ```
pub fn encode_message(head: &BcmHead, frames: &[Frame], dst: &mut BytesMut) -> Result<()> {
    if frames.len() > MAX_NFRAMES {
        return Err(FrameError::FrameCount {
            count: frames.len(),
            max: MAX_NFRAMES,
        });
    }
    let is_fd = head.is_fd();
    if frames.iter().any(|frame| frame.is_fd() != is_fd) {
        return Err(FrameError::MixedFrameKinds { expected_fd: is_fd });
    }
    let (ival1_sec, ival1_usec) = to_timeval(head.ival1)?;
    let (ival2_sec, ival2_usec) = to_timeval(head.ival2)?;

    let start = dst.len();
    dst.reserve(message_size(is_fd, frames.len()));

    dst.put_u32_ne(head.opcode.as_u32());
    dst.put_u32_ne(head.flags.bits());
    dst.put_u32_ne(head.count);
    pad_to(dst, start + IVAL1_OFFSET);
    put_long(dst, ival1_sec);
    put_long(dst, ival1_usec);
    put_long(dst, ival2_sec);
    put_long(dst, ival2_usec);
    dst.put_u32_ne(head.can_id);
    dst.put_u32_ne(frames.len() as u32);
    pad_to(dst, start + HEADER_SIZE);

    for frame in frames {
        match frame {
            Frame::Classic(frame) => put_classic(dst, frame),
            Frame::Fd(frame) => put_fd(dst, frame),
        }
    }

    debug_assert_eq!(dst.len() - start, message_size(is_fd, frames.len()));
    Ok(())
}

/// Validate and decode one received datagram.
///
/// The datagram must be exactly as long as its header declares; anything
/// else (short read, trailing bytes, garbled `nframes`) is rejected before
/// a single frame is interpreted.
pub fn decode_message(buf: &[u8]) -> Result<BcmMessage<'_>> {
    if buf.len() < HEADER_SIZE {
        return Err(FrameError::Truncated {
            len: buf.len(),
            min: HEADER_SIZE,
        });
    }

    let mut src = &buf[..HEADER_SIZE];
    let opcode = Opcode::from(src.get_u32_ne());
    let flags = BcmFlags::from_bits_retain(src.get_u32_ne());
    let count = src.get_u32_ne();
    src.advance(IVAL1_OFFSET - 12);
    let ival1 = from_timeval(get_long(&mut src), get_long(&mut src));
    let ival2 = from_timeval(get_long(&mut src), get_long(&mut src));
    let can_id = src.get_u32_ne();
    let nframes = src.get_u32_ne();

    let head = BcmHead {
        opcode,
        flags,
        count,
        ival1,
        ival2,
        can_id,
        nframes,
    };

    let expected = head.declared_size();
    if expected != buf.len() as u64 {
        return Err(FrameError::LengthMismatch {
            expected,
            actual: buf.len(),
            nframes,
        });
    }

    Ok(BcmMessage {
        head,
        frames: &buf[HEADER_SIZE..],
    })
}

/// A validated inbound message borrowing the receive buffer.
///
/// Only valid while the buffer is; frames are copied out as they are read.
#[derive(Debug, Clone, Copy)]
pub struct BcmMessage<'a> {
    head: BcmHead,
    frames: &'a [u8],
}

impl<'a> BcmMessage<'a> {
    pub fn head(&self) -> &BcmHead {
        &self.head
    }

    pub fn opcode(&self) -> Opcode {
        self.head.opcode
    }

    pub fn can_id(&self) -> u32 {
        self.head.can_id
    }

    pub fn is_fd(&self) -> bool {
        self.head.is_fd()
    }

    /// Number of frames carried.
    pub fn len(&self) -> usize {
        self.head.nframes as usize
    }

    pub fn is_empty(&self) -> bool {
        self.head.nframes == 0
    }

    /// Raw frame bytes as received.
    pub fn frame_bytes(&self) -> &'a [u8] {
        self.frames
    }

    /// Iterate the frames in wire order.
    pub fn frames(&self) -> FrameIter<'a> {
        FrameIter {
            chunks: self.frames.chunks_exact(frame_size(self.is_fd())),
            is_fd: self.is_fd(),
        }
    }
}

/// Iterator over the frames of a [`BcmMessage`].
#[derive(Debug, Clone)]
pub struct FrameIter<'a> {
    chunks: std::slice::ChunksExact<'a, u8>,
    is_fd: bool,
}

impl Iterator for FrameIter<'_> {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        let chunk = self.chunks.next()?;
        Some(if self.is_fd {
            Frame::Fd(get_fd(chunk))
        } else {
            Frame::Classic(get_classic(chunk))
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }
}

impl ExactSizeIterator for FrameIter<'_> {}

fn put_classic(dst: &mut BytesMut, frame: &ClassicFrame) {
    dst.put_u32_ne(frame.can_id());
    dst.put_u8(frame.len() as u8);
    dst.put_u8(0); // __pad
    dst.put_u8(0); // __res0
    dst.put_u8(frame.len8_dlc());
    dst.put_slice(frame.raw_data());
}

fn put_fd(dst: &mut BytesMut, frame: &FdFrame) {
    dst.put_u32_ne(frame.can_id());
    dst.put_u8(frame.len() as u8);
    dst.put_u8(frame.flags().bits());
    dst.put_u8(0); // __res0
    dst.put_u8(0); // __res1
    dst.put_slice(frame.raw_data());
}

fn get_classic(mut chunk: &[u8]) -> ClassicFrame {
    let can_id = chunk.get_u32_ne();
    let len = chunk.get_u8();
    chunk.advance(2);
    let len8_dlc = chunk.get_u8();
    let mut data = [0u8; 8];
    chunk.copy_to_slice(&mut data);
    ClassicFrame::from_wire(can_id, len, len8_dlc, data)
}

fn get_fd(mut chunk: &[u8]) -> FdFrame {
    let can_id = chunk.get_u32_ne();
    let len = chunk.get_u8();
    let flags = chunk.get_u8();
    chunk.advance(2);
    let mut data = [0u8; 64];
    chunk.copy_to_slice(&mut data);
    FdFrame::from_wire(can_id, len, flags, data)
}

fn pad_to(dst: &mut BytesMut, offset: usize) {
    if dst.len() < offset {
        dst.put_bytes(0, offset - dst.len());
    }
}

fn put_long(dst: &mut BytesMut, value: c_long) {
    dst.put_slice(&value.to_ne_bytes());
}

fn get_long(src: &mut &[u8]) -> c_long {
    let mut raw = [0u8; LONG_SIZE];
    src.copy_to_slice(&mut raw);
    c_long::from_ne_bytes(raw)
}

fn to_timeval(interval: Duration) -> Result<(c_long, c_long)> {
    let secs =
        c_long::try_from(interval.as_secs()).map_err(|_| FrameError::IntervalOutOfRange(interval))?;
    Ok((secs, c_long::from(interval.subsec_micros() as i32)))
}

fn from_timeval(secs: c_long, usecs: c_long) -> Duration {
    let secs = u64::try_from(secs).unwrap_or(0);
    let usecs = u64::try_from(usecs).unwrap_or(0);
    Duration::from_secs(secs) + Duration::from_micros(usecs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::FdFlags;

    fn setup_head(is_fd: bool) -> BcmHead {
        let mut head = BcmHead::new(Opcode::TxSetup, 0x567);
        head.flags = BcmFlags::SETTIMER | BcmFlags::STARTTIMER;
        if is_fd {
            head.flags |= BcmFlags::CAN_FD_FRAME;
        }
        head.count = 3;
        head.ival1 = Duration::from_micros(500);
        head.ival2 = Duration::from_secs(1);
        head
    }

    fn encode(head: &BcmHead, frames: &[Frame]) -> BytesMut {
        let mut buf = BytesMut::new();
        encode_message(head, frames, &mut buf).unwrap();
        buf
    }

    #[test]
    fn test_header_size_matches_c_layout() {
        #[cfg(target_pointer_width = "64")]
        assert_eq!(HEADER_SIZE, 56);
        #[cfg(target_pointer_width = "32")]
        assert_eq!(HEADER_SIZE, 40);
        assert_eq!(HEADER_SIZE % 8, 0);
    }

    #[test]
    fn test_encode_field_offsets() {
        let frame = Frame::classic(0x123, &[0xDE, 0xAD, 0xBE, 0xEF]).unwrap();
        let mut head = BcmHead::new(Opcode::TxSend, 0x123);
        head.count = 0xAABB_CCDD;
        let buf = encode(&head, &[frame]);

        assert_eq!(buf.len(), HEADER_SIZE + CLASSIC_FRAME_SIZE);
        assert_eq!(buf[0..4], 4u32.to_ne_bytes());
        assert_eq!(buf[8..12], 0xAABB_CCDDu32.to_ne_bytes());
        assert_eq!(buf[CAN_ID_OFFSET..CAN_ID_OFFSET + 4], 0x123u32.to_ne_bytes());
        assert_eq!(buf[NFRAMES_OFFSET..NFRAMES_OFFSET + 4], 1u32.to_ne_bytes());

        let frame_bytes = &buf[HEADER_SIZE..];
        assert_eq!(frame_bytes[0..4], 0x123u32.to_ne_bytes());
        assert_eq!(frame_bytes[4], 4);
        assert_eq!(frame_bytes[8..12], [0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(frame_bytes[12..16], [0, 0, 0, 0]);
    }

    #[test]
    fn test_encode_intervals_as_timeval() {
        let head = setup_head(false);
        let frame = Frame::classic(0x567, b"x").unwrap();
        let buf = encode(&head, &[frame]);

        let mut src = &buf[IVAL1_OFFSET..CAN_ID_OFFSET];
        assert_eq!(get_long(&mut src), 0);
        assert_eq!(get_long(&mut src), 500);
        assert_eq!(get_long(&mut src), 1);
        assert_eq!(get_long(&mut src), 0);
    }

    #[test]
    fn test_setup_roundtrip_classic() {
        let head = setup_head(false);
        let frames: Vec<Frame> = (0..3u8)
            .map(|i| Frame::classic(0x567, &[i, i + 1, i + 2]).unwrap())
            .collect();
        let buf = encode(&head, &frames);

        let msg = decode_message(&buf).unwrap();
        assert_eq!(
            *msg.head(),
            BcmHead {
                nframes: 3,
                ..head
            }
        );
        assert_eq!(msg.frames().collect::<Vec<_>>(), frames);
    }

    #[test]
    fn test_setup_roundtrip_fd_max_frames() {
        let head = setup_head(true);
        let frames: Vec<Frame> = (0..MAX_NFRAMES)
            .map(|i| {
                let payload = vec![i as u8; (i % 65).min(64)];
                Frame::Fd(
                    FdFrame::new(0x567, &payload)
                        .unwrap()
                        .with_flags(FdFlags::BRS),
                )
            })
            .collect();
        let buf = encode(&head, &frames);
        assert_eq!(buf.len(), MAX_MESSAGE_SIZE);

        let msg = decode_message(&buf).unwrap();
        assert!(msg.is_fd());
        assert_eq!(msg.len(), MAX_NFRAMES);
        assert_eq!(msg.frame_bytes(), &buf[HEADER_SIZE..]);
        assert_eq!(msg.frames().collect::<Vec<_>>(), frames);
    }

    #[test]
    fn test_encode_rejects_too_many_frames() {
        let head = setup_head(false);
        let frames = vec![Frame::classic(0x1, b"").unwrap(); MAX_NFRAMES + 1];
        let mut buf = BytesMut::new();
        let err = encode_message(&head, &frames, &mut buf).unwrap_err();
        assert!(matches!(err, FrameError::FrameCount { count: 257, .. }));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_encode_rejects_mixed_kinds() {
        let head = setup_head(true);
        let frames = [
            Frame::fd(0x1, b"a").unwrap(),
            Frame::classic(0x1, b"b").unwrap(),
        ];
        let mut buf = BytesMut::new();
        let err = encode_message(&head, &frames, &mut buf).unwrap_err();
        assert!(matches!(
            err,
            FrameError::MixedFrameKinds { expected_fd: true }
        ));
    }

    #[test]
    fn test_header_only_message() {
        let head = BcmHead::new(Opcode::TxDelete, 0x567);
        let buf = encode(&head, &[]);
        assert_eq!(buf.len(), HEADER_SIZE);

        let msg = decode_message(&buf).unwrap();
        assert_eq!(msg.opcode(), Opcode::TxDelete);
        assert_eq!(msg.can_id(), 0x567);
        assert!(msg.is_empty());
        assert_eq!(msg.frames().count(), 0);
    }

    #[test]
    fn test_decode_shorter_than_header() {
        for len in [0, 1, HEADER_SIZE - 1] {
            let buf = vec![0u8; len];
            let err = decode_message(&buf).unwrap_err();
            assert!(matches!(err, FrameError::Truncated { .. }));
            assert!(err.is_malformed());
        }
    }

    #[test]
    fn test_decode_length_mismatch() {
        let frame = Frame::classic(0x1, b"abc").unwrap();
        let buf = encode(&BcmHead::new(Opcode::RxChanged, 0x1), &[frame]);

        let short = &buf[..buf.len() - 1];
        assert!(matches!(
            decode_message(short),
            Err(FrameError::LengthMismatch { nframes: 1, .. })
        ));

        let mut long = buf.to_vec();
        long.push(0);
        assert!(matches!(
            decode_message(&long),
            Err(FrameError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_decode_distrusts_nframes() {
        let mut buf = encode(&BcmHead::new(Opcode::RxChanged, 0x1), &[]).to_vec();
        buf[NFRAMES_OFFSET..NFRAMES_OFFSET + 4].copy_from_slice(&u32::MAX.to_ne_bytes());
        let err = decode_message(&buf).unwrap_err();
        assert!(matches!(err, FrameError::LengthMismatch { nframes, .. } if nframes == u32::MAX));
    }

    #[test]
    fn test_decode_uses_fd_flag_for_frame_size() {
        // A classic-sized payload under an FD header is malformed.
        let frame = Frame::classic(0x1, b"abc").unwrap();
        let mut buf = encode(&BcmHead::new(Opcode::RxChanged, 0x1), &[frame]).to_vec();
        buf[4..8].copy_from_slice(&BcmFlags::CAN_FD_FRAME.bits().to_ne_bytes());
        assert!(matches!(
            decode_message(&buf),
            Err(FrameError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_decode_keeps_unknown_opcode() {
        let mut buf = encode(&BcmHead::new(Opcode::TxExpired, 0x1), &[]).to_vec();
        buf[0..4].copy_from_slice(&77u32.to_ne_bytes());
        let msg = decode_message(&buf).unwrap();
        assert_eq!(msg.opcode(), Opcode::Unknown(77));
    }

    #[test]
    fn test_message_size() {
        assert_eq!(message_size(false, 1), HEADER_SIZE + 16);
        assert_eq!(message_size(true, 2), HEADER_SIZE + 144);
        assert_eq!(message_size(true, 0), HEADER_SIZE);
    }
}
