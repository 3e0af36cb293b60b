mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "canbcm", version, about = "Linux CAN broadcast manager client")]
struct Cli {
    /// CAN interface to use.
    #[arg(
        long,
        short = 'i',
        env = "CANBCM_INTERFACE",
        default_value = "vcan0",
        global = true
    )]
    interface: String,

    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, &cli.interface, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_send_subcommand() {
        let cli = Cli::try_parse_from([
            "canbcm", "-i", "can1", "send", "--id", "0x123", "--data", "DEADBEEF",
        ])
        .expect("send args should parse");

        assert_eq!(cli.interface, "can1");
        match cli.command {
            Command::Send(args) => {
                assert_eq!(args.id, "0x123");
                assert!(!args.fd);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn brs_requires_fd() {
        let err = Cli::try_parse_from(["canbcm", "send", "--id", "1", "--brs"])
            .expect_err("--brs without --fd should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn parses_cyclic_with_repeated_data() {
        let cli = Cli::try_parse_from([
            "canbcm", "cyclic", "--id", "0x567", "--fd", "--data", "11", "--data", "22",
            "--count", "3", "--ival1", "500us", "--ival2", "1s",
        ])
        .expect("cyclic args should parse");

        match cli.command {
            Command::Cyclic(args) => {
                assert_eq!(args.data, vec!["11", "22"]);
                assert_eq!(args.count, 3);
                assert!(args.duration.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn cyclic_requires_ival2() {
        let err = Cli::try_parse_from(["canbcm", "cyclic", "--id", "1", "--data", "00"])
            .expect_err("missing --ival2 should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn interface_flag_is_global() {
        let cli = Cli::try_parse_from(["canbcm", "send", "--id", "0x10", "--interface", "can2"])
            .expect("send args should parse");
        assert_eq!(cli.interface, "can2");
        assert!(matches!(cli.command, Command::Send(_)));
    }

    // BCM tasks belong to the socket that created them, so a separate
    // process cannot delete one; `cyclic` deletes its own task on exit.
    #[test]
    fn no_standalone_delete_subcommand() {
        let err = Cli::try_parse_from(["canbcm", "delete", "--id", "0x10"])
            .expect_err("delete is not a subcommand");
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidSubcommand);
    }
}
