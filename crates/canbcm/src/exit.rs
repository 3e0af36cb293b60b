use std::fmt;
use std::io;

use canbcm_frame::FrameError;
use canbcm_session::SessionError;
use canbcm_transport::TransportError;

// Exit codes follow the BSD sysexits conventions where one applies.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const INTERFACE_UNAVAILABLE: i32 = 69;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::InvalidInput => DATA_INVALID,
        _ => TRANSPORT_ERROR,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Lookup { .. } | TransportError::Connect { .. } => {
            CliError::new(INTERFACE_UNAVAILABLE, format!("{context}: {err}"))
        }
        TransportError::Io(source) => io_error(context, source),
        TransportError::Shutdown => CliError::new(FAILURE, format!("{context}: {err}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    if err.is_invalid_argument() {
        CliError::new(DATA_INVALID, format!("{context}: {err}"))
    } else {
        CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
    }
}

pub fn session_error(context: &str, err: SessionError) -> CliError {
    match err {
        SessionError::Transport(err) => transport_error(context, err),
        SessionError::Frame(err) => frame_error(context, err),
        SessionError::Stopped => CliError::new(FAILURE, format!("{context}: {err}")),
        SessionError::Runtime(_) => CliError::new(INTERNAL, format!("{context}: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_and_connect_are_interface_unavailable() {
        let lookup = TransportError::Lookup {
            name: "nosuchcan0".into(),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        assert_eq!(transport_error("open", lookup).code, INTERFACE_UNAVAILABLE);

        let connect = SessionError::Transport(TransportError::Connect {
            index: 1,
            source: io::Error::from(io::ErrorKind::Unsupported),
        });
        assert_eq!(session_error("open", connect).code, INTERFACE_UNAVAILABLE);
    }

    #[test]
    fn invalid_arguments_are_invalid_data() {
        let err = SessionError::Frame(FrameError::FrameCount { count: 0, max: 256 });
        assert_eq!(session_error("setup", err).code, DATA_INVALID);
    }

    #[test]
    fn completion_errors() {
        assert_eq!(transport_error("send", TransportError::Shutdown).code, FAILURE);
        let io = TransportError::Io(io::Error::from(io::ErrorKind::BrokenPipe));
        assert_eq!(transport_error("send", io).code, TRANSPORT_ERROR);
        assert_eq!(session_error("send", SessionError::Stopped).code, FAILURE);
    }
}
