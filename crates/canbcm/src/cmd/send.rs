use canbcm_frame::{BcmRequest, Opcode};
use canbcm_session::{Connector, ConnectorConfig, LogHandler};

use crate::cmd::parse::{build_frame, parse_can_id, parse_hex, parse_timeout};
use crate::cmd::{completion, wait_completion, SendArgs};
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::output::{format_can_id, print_completion, CompletionOutput, OutputFormat};

pub fn run(args: SendArgs, interface: &str, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_timeout(&args.timeout)?;
    let can_id = parse_can_id(&args.id, args.extended)?;
    let data = parse_hex(&args.data)?;
    let frame = build_frame(can_id, &data, args.fd, args.brs)?;

    let connector = Connector::open(ConnectorConfig::new(interface), LogHandler)
        .map_err(|err| session_error("connect failed", err))?;

    let (on_complete, done) = completion();
    connector
        .submit(&BcmRequest::Send(frame), on_complete)
        .map_err(|err| session_error("send failed", err))?;
    let bytes = wait_completion(&done, timeout, "send failed")?;

    print_completion(
        &CompletionOutput {
            interface,
            opcode: Opcode::TxSend.name(),
            can_id: format_can_id(can_id),
            fd: args.fd,
            frames: 1,
            bytes,
        },
        format,
    );
    Ok(SUCCESS)
}
