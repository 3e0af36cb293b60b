use std::sync::mpsc;
use std::time::Duration;

use canbcm_session::SendResult;
use clap::{Args, Subcommand};

use crate::exit::{transport_error, CliError, CliResult, TIMEOUT};
use crate::output::OutputFormat;

pub mod cyclic;
pub mod parse;
pub mod resolve;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the kernel index of the interface.
    Resolve(ResolveArgs),
    /// Send a single frame (TX_SEND).
    Send(SendArgs),
    /// Run a cyclic transmission (TX_SETUP), deleting it on exit.
    Cyclic(CyclicArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, interface: &str, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Resolve(args) => resolve::run(args, interface, format),
        Command::Send(args) => send::run(args, interface, format),
        Command::Cyclic(args) => cyclic::run(args, interface, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug, Default)]
pub struct ResolveArgs {}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// CAN id, decimal or 0x-prefixed hex.
    #[arg(long)]
    pub id: String,
    /// Payload as hex (e.g. DEADBEEF or de:ad:be:ef).
    #[arg(long, default_value = "")]
    pub data: String,
    /// Send a CAN FD frame.
    #[arg(long)]
    pub fd: bool,
    /// Set the bit rate switch flag (FD only).
    #[arg(long, requires = "fd")]
    pub brs: bool,
    /// Use a 29-bit extended id.
    #[arg(long)]
    pub extended: bool,
    /// Maximum time to wait for the send to complete (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct CyclicArgs {
    /// CAN id, decimal or 0x-prefixed hex.
    #[arg(long)]
    pub id: String,
    /// Payload of one frame as hex; repeat for a multi-frame sequence.
    #[arg(long = "data", required = true)]
    pub data: Vec<String>,
    /// Send CAN FD frames.
    #[arg(long)]
    pub fd: bool,
    /// Use a 29-bit extended id.
    #[arg(long)]
    pub extended: bool,
    /// Number of transmissions at --ival1 before switching to --ival2.
    #[arg(long, default_value_t = 0)]
    pub count: u32,
    /// Interval for the first --count transmissions (e.g. 500us, 10ms).
    #[arg(long, default_value = "0s")]
    pub ival1: String,
    /// Interval after the first --count transmissions.
    #[arg(long)]
    pub ival2: String,
    /// Stop after this long instead of waiting for Ctrl-C.
    #[arg(long)]
    pub duration: Option<String>,
    /// Maximum time to wait for each request to complete.
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Completion callback feeding a channel, and the receiving end.
pub(crate) fn completion() -> (
    impl FnOnce(SendResult) + Send + 'static,
    mpsc::Receiver<SendResult>,
) {
    let (tx, rx) = mpsc::channel::<SendResult>();
    let on_complete = move |result: SendResult| {
        let _ = tx.send(result);
    };
    (on_complete, rx)
}

/// Block until a completion arrives or `timeout` elapses.
pub(crate) fn wait_completion(
    rx: &mpsc::Receiver<SendResult>,
    timeout: Duration,
    context: &str,
) -> CliResult<usize> {
    match rx.recv_timeout(timeout) {
        Ok(Ok(sent)) => Ok(sent),
        Ok(Err(err)) => Err(transport_error(context, err)),
        Err(mpsc::RecvTimeoutError::Timeout) => Err(CliError::new(
            TIMEOUT,
            format!("{context}: no completion within {timeout:?}"),
        )),
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(CliError::new(
            crate::exit::FAILURE,
            format!("{context}: completion dropped"),
        )),
    }
}
