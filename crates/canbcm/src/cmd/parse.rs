use std::time::Duration;

use canbcm_frame::{id, FdFlags, Frame};

use crate::exit::{frame_error, CliError, CliResult, USAGE};

/// Parse a duration with a `us`, `ms` or `s` suffix. A bare number is
/// seconds. Zero is allowed: a zero interval disables that timer.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("us") {
        (num, "us")
    } else if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    match unit {
        "us" => Ok(Duration::from_micros(value)),
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

/// Like [`parse_duration`] but rejects zero.
pub fn parse_timeout(input: &str) -> CliResult<Duration> {
    let timeout = parse_duration(input)?;
    if timeout.is_zero() {
        return Err(CliError::new(USAGE, "timeout must be greater than zero"));
    }
    Ok(timeout)
}

/// Parse a CAN id given as decimal or `0x` hex and apply the frame format.
pub fn parse_can_id(input: &str, extended: bool) -> CliResult<u32> {
    let input = input.trim();
    let raw = match input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => input.parse(),
    }
    .map_err(|_| CliError::new(USAGE, format!("invalid CAN id: {input}")))?;

    let can_id = if extended {
        id::extended(raw)
    } else {
        id::standard(raw)
    };
    can_id.map_err(|err| frame_error("invalid CAN id", err))
}

/// Parse a hex payload. Separators `:`, `-`, `.` and spaces are ignored.
pub fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let digits: Vec<u8> = input
        .bytes()
        .filter(|b| !matches!(b, b':' | b'-' | b'.' | b' '))
        .collect();
    if digits.len() % 2 != 0 {
        return Err(CliError::new(
            USAGE,
            format!("hex payload has an odd number of digits: {input}"),
        ));
    }

    digits
        .chunks_exact(2)
        .map(|pair| {
            let hi = hex_value(pair[0]);
            let lo = hex_value(pair[1]);
            match (hi, lo) {
                (Some(hi), Some(lo)) => Ok((hi << 4) | lo),
                _ => Err(CliError::new(
                    USAGE,
                    format!("invalid hex payload: {input}"),
                )),
            }
        })
        .collect()
}

fn hex_value(digit: u8) -> Option<u8> {
    (digit as char).to_digit(16).map(|v| v as u8)
}

/// Build a classic or FD frame, mapping size errors to invalid data.
pub fn build_frame(can_id: u32, data: &[u8], fd: bool, brs: bool) -> CliResult<Frame> {
    let frame = if fd {
        let flags = if brs { FdFlags::BRS } else { FdFlags::empty() };
        canbcm_frame::FdFrame::new(can_id, data).map(|f| Frame::Fd(f.with_flags(flags)))
    } else {
        Frame::classic(can_id, data)
    };
    frame.map_err(|err| frame_error("invalid frame", err))
}
