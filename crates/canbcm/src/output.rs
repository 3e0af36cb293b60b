use std::io::IsTerminal;

use canbcm_frame::BcmMessage;
use clap::ValueEnum;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct InterfaceOutput<'a> {
    interface: &'a str,
    index: u32,
}

/// Result of one completed request.
#[derive(Serialize)]
pub struct CompletionOutput<'a> {
    pub interface: &'a str,
    pub opcode: &'static str,
    pub can_id: String,
    pub fd: bool,
    pub frames: usize,
    pub bytes: usize,
}

#[derive(Serialize)]
struct FrameOutput {
    can_id: String,
    len: usize,
    data: String,
}

#[derive(Serialize)]
struct NotificationOutput {
    opcode: &'static str,
    can_id: String,
    fd: bool,
    frames: Vec<FrameOutput>,
}

pub fn print_interface(interface: &str, index: u32, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&InterfaceOutput { interface, index }),
        OutputFormat::Pretty => println!("{interface}: index {index}"),
    }
}

pub fn print_completion(out: &CompletionOutput<'_>, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Pretty => println!(
            "{} {} on {}: {} bytes ({} frame{}{})",
            out.opcode,
            out.can_id,
            out.interface,
            out.bytes,
            out.frames,
            if out.frames == 1 { "" } else { "s" },
            if out.fd { ", fd" } else { "" }
        ),
    }
}

/// Print a notification received from the kernel. Runs on the worker.
pub fn print_notification(message: &BcmMessage<'_>, format: OutputFormat) {
    let frames: Vec<FrameOutput> = message
        .frames()
        .map(|frame| FrameOutput {
            can_id: format_can_id(frame.can_id()),
            len: frame.data().len(),
            data: hex(frame.data()),
        })
        .collect();

    match format {
        OutputFormat::Json => print_json(&NotificationOutput {
            opcode: message.opcode().name(),
            can_id: format_can_id(message.can_id()),
            fd: message.is_fd(),
            frames,
        }),
        OutputFormat::Pretty => {
            println!(
                "{} {} ({} frame{})",
                message.opcode(),
                format_can_id(message.can_id()),
                frames.len(),
                if frames.len() == 1 { "" } else { "s" }
            );
            for frame in frames {
                println!("  {} [{}] {}", frame.can_id, frame.len, frame.data);
            }
        }
    }
}

pub fn format_can_id(can_id: u32) -> String {
    format!("{can_id:#x}")
}

fn hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{b:02x}")).collect()
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}
