use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use canbcm_frame::{BcmMessage, CyclicTask, Frame, Opcode};
use canbcm_session::{Connector, ConnectorConfig};
use tracing::info;

use crate::cmd::parse::{build_frame, parse_can_id, parse_duration, parse_hex, parse_timeout};
use crate::cmd::{completion, wait_completion, CyclicArgs};
use crate::exit::{frame_error, session_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{
    format_can_id, print_completion, print_notification, CompletionOutput, OutputFormat,
};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

pub fn run(args: CyclicArgs, interface: &str, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_timeout(&args.timeout)?;
    let can_id = parse_can_id(&args.id, args.extended)?;
    let ival1 = parse_duration(&args.ival1)?;
    let ival2 = parse_duration(&args.ival2)?;
    let run_for = args.duration.as_deref().map(parse_duration).transpose()?;

    let frames = args
        .data
        .iter()
        .map(|hex| parse_hex(hex).and_then(|data| build_frame(can_id, &data, args.fd, false)))
        .collect::<CliResult<Vec<Frame>>>()?;
    let nframes = frames.len();
    let task = CyclicTask::new(can_id, frames)
        .map_err(|err| frame_error("invalid cyclic task", err))?
        .with_count(args.count)
        .with_intervals(ival1, ival2);

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    // Print whatever the kernel sends back on this socket. The task is set up
    // without TX_COUNTEVT, so a healthy run stays silent here.
    let handler = move |message: &BcmMessage<'_>| print_notification(message, format);
    let mut connector = Connector::open(ConnectorConfig::new(interface), handler)
        .map_err(|err| session_error("connect failed", err))?;

    let (on_complete, done) = completion();
    connector
        .setup_cyclic(task, on_complete)
        .map_err(|err| session_error("setup failed", err))?;
    let bytes = wait_completion(&done, timeout, "setup failed")?;
    print_completion(
        &CompletionOutput {
            interface,
            opcode: Opcode::TxSetup.name(),
            can_id: format_can_id(can_id),
            fd: args.fd,
            frames: nframes,
            bytes,
        },
        format,
    );

    info!(can_id = %format_can_id(can_id), "cyclic task running");
    wait_until_stopped(&running, run_for);

    let (on_complete, done) = completion();
    connector
        .delete_cyclic(can_id, args.fd, on_complete)
        .map_err(|err| session_error("delete failed", err))?;
    let bytes = wait_completion(&done, timeout, "delete failed")?;
    print_completion(
        &CompletionOutput {
            interface,
            opcode: Opcode::TxDelete.name(),
            can_id: format_can_id(can_id),
            fd: args.fd,
            frames: 0,
            bytes,
        },
        format,
    );

    connector.stop();
    Ok(SUCCESS)
}

fn wait_until_stopped(running: &AtomicBool, run_for: Option<Duration>) {
    let start = Instant::now();
    while running.load(Ordering::SeqCst) {
        if run_for.is_some_and(|limit| start.elapsed() >= limit) {
            break;
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_honours_duration() {
        let running = AtomicBool::new(true);
        let start = Instant::now();
        wait_until_stopped(&running, Some(Duration::from_millis(120)));
        assert!(start.elapsed() >= Duration::from_millis(120));
    }

    #[test]
    fn wait_returns_when_flag_cleared() {
        let running = AtomicBool::new(false);
        let start = Instant::now();
        wait_until_stopped(&running, None);
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
