//! BCM opcodes and flag words, with the values from `linux/can/bcm.h`.

use std::fmt;

/// BCM message opcode.
///
/// Requests this crate builds use only `TxSetup`, `TxDelete` and `TxSend`;
/// the remaining values appear in notifications from the kernel. Values the
/// kernel may add later are kept as `Unknown` rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    TxSetup,
    TxDelete,
    TxRead,
    TxSend,
    RxSetup,
    RxDelete,
    RxRead,
    TxStatus,
    TxExpired,
    RxStatus,
    RxTimeout,
    RxChanged,
    Unknown(u32),
}

impl Opcode {
    /// The kernel's numeric value for this opcode.
    pub fn as_u32(self) -> u32 {
        match self {
            Opcode::TxSetup => 1,
            Opcode::TxDelete => 2,
            Opcode::TxRead => 3,
            Opcode::TxSend => 4,
            Opcode::RxSetup => 5,
            Opcode::RxDelete => 6,
            Opcode::RxRead => 7,
            Opcode::TxStatus => 8,
            Opcode::TxExpired => 9,
            Opcode::RxStatus => 10,
            Opcode::RxTimeout => 11,
            Opcode::RxChanged => 12,
            Opcode::Unknown(raw) => raw,
        }
    }

    /// Kernel macro name, for diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            Opcode::TxSetup => "TX_SETUP",
            Opcode::TxDelete => "TX_DELETE",
            Opcode::TxRead => "TX_READ",
            Opcode::TxSend => "TX_SEND",
            Opcode::RxSetup => "RX_SETUP",
            Opcode::RxDelete => "RX_DELETE",
            Opcode::RxRead => "RX_READ",
            Opcode::TxStatus => "TX_STATUS",
            Opcode::TxExpired => "TX_EXPIRED",
            Opcode::RxStatus => "RX_STATUS",
            Opcode::RxTimeout => "RX_TIMEOUT",
            Opcode::RxChanged => "RX_CHANGED",
            Opcode::Unknown(_) => "UNKNOWN",
        }
    }
}

impl From<u32> for Opcode {
    fn from(raw: u32) -> Self {
        match raw {
            1 => Opcode::TxSetup,
            2 => Opcode::TxDelete,
            3 => Opcode::TxRead,
            4 => Opcode::TxSend,
            5 => Opcode::RxSetup,
            6 => Opcode::RxDelete,
            7 => Opcode::RxRead,
            8 => Opcode::TxStatus,
            9 => Opcode::TxExpired,
            10 => Opcode::RxStatus,
            11 => Opcode::RxTimeout,
            12 => Opcode::RxChanged,
            other => Opcode::Unknown(other),
        }
    }
}

impl From<Opcode> for u32 {
    fn from(opcode: Opcode) -> Self {
        opcode.as_u32()
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Opcode::Unknown(raw) => write!(f, "UNKNOWN({raw})"),
            known => f.write_str(known.name()),
        }
    }
}

bitflags::bitflags! {
    /// `bcm_msg_head.flags`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BcmFlags: u32 {
        const SETTIMER = 0x0001;
        const STARTTIMER = 0x0002;
        const TX_COUNTEVT = 0x0004;
        const TX_ANNOUNCE = 0x0008;
        const TX_CP_CAN_ID = 0x0010;
        const RX_FILTER_ID = 0x0020;
        const RX_CHECK_DLC = 0x0040;
        const RX_NO_AUTOTIMER = 0x0080;
        const RX_ANNOUNCE_RESUME = 0x0100;
        const TX_RESET_MULTI_IDX = 0x0200;
        const RX_RTR_FRAME = 0x0400;
        /// Frames in this message are `canfd_frame`s.
        const CAN_FD_FRAME = 0x0800;

        // Keep bits a newer kernel may report.
        const _ = !0;
    }
}

bitflags::bitflags! {
    /// `canfd_frame.flags`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FdFlags: u8 {
        /// Bit rate switch.
        const BRS = 0x01;
        /// Error state indicator.
        const ESI = 0x02;
        /// Mark as FD frame on mixed-mode interfaces.
        const FDF = 0x04;

        const _ = !0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_values_match_kernel_header() {
        assert_eq!(Opcode::TxSetup.as_u32(), 1);
        assert_eq!(Opcode::TxDelete.as_u32(), 2);
        assert_eq!(Opcode::TxSend.as_u32(), 4);
        assert_eq!(Opcode::RxChanged.as_u32(), 12);
    }

    #[test]
    fn opcode_conversion_is_lossless() {
        for raw in 0..=20u32 {
            assert_eq!(Opcode::from(raw).as_u32(), raw);
        }
        assert_eq!(Opcode::from(99), Opcode::Unknown(99));
    }

    #[test]
    fn opcode_display_uses_kernel_names() {
        assert_eq!(Opcode::TxSend.to_string(), "TX_SEND");
        assert_eq!(Opcode::Unknown(42).to_string(), "UNKNOWN(42)");
    }

    #[test]
    fn unknown_flag_bits_are_retained() {
        let flags = BcmFlags::from_bits_retain(0x8000 | BcmFlags::CAN_FD_FRAME.bits());
        assert!(flags.contains(BcmFlags::CAN_FD_FRAME));
        assert_eq!(flags.bits(), 0x8800);
    }
}
