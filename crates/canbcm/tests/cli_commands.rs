#![cfg(all(target_os = "linux", feature = "cli"))]

use std::process::{Command, Output};

fn canbcm(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_canbcm"))
        .env_remove("CANBCM_INTERFACE")
        .arg("--log-level")
        .arg("error")
        .args(args)
        .output()
        .expect("canbcm should run")
}

fn vcan0_present() -> bool {
    std::path::Path::new("/sys/class/net/vcan0").exists()
}

#[test]
fn version_prints_package_version() {
    let output = canbcm(&["version"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        stdout.trim(),
        format!("canbcm {}", env!("CARGO_PKG_VERSION"))
    );
}

#[test]
fn resolve_loopback_emits_index() {
    let output = canbcm(&["--format", "json", "-i", "lo", "resolve"]);
    assert!(output.status.success());

    let payload: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("resolve should emit json");
    assert_eq!(payload["interface"], "lo");
    assert!(payload["index"].as_u64().is_some_and(|index| index > 0));
}

#[test]
fn unknown_interface_returns_69() {
    let output = canbcm(&["-i", "nosuchcan0", "resolve"]);
    assert_eq!(output.status.code(), Some(69));

    let output = canbcm(&["-i", "nosuchcan0", "send", "--id", "0x123", "--data", "00"]);
    assert_eq!(output.status.code(), Some(69));
}

#[test]
fn bad_arguments_return_64() {
    let output = canbcm(&["-i", "lo", "send", "--id", "nope"]);
    assert_eq!(output.status.code(), Some(64));

    let output = canbcm(&["-i", "lo", "send", "--id", "0x1", "--data", "xyz"]);
    assert_eq!(output.status.code(), Some(64));

    let output = canbcm(&[
        "-i", "lo", "cyclic", "--id", "0x1", "--data", "00", "--ival2", "soon",
    ]);
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn delete_is_not_a_subcommand() {
    let output = canbcm(&["-i", "lo", "delete", "--id", "0x10"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn oversized_payload_returns_60() {
    let output = canbcm(&["-i", "lo", "send", "--id", "0x1", "--data", "000102030405060708"]);
    assert_eq!(output.status.code(), Some(60));

    let output = canbcm(&["-i", "lo", "send", "--id", "0x800"]);
    assert_eq!(output.status.code(), Some(60));
}

#[test]
fn send_on_vcan0_reports_bytes() {
    if !vcan0_present() {
        eprintln!("vcan0 not present; skipping");
        return;
    }

    let output = canbcm(&[
        "--format", "json", "-i", "vcan0", "send", "--id", "0x123", "--data", "DEADBEEF",
    ]);
    assert!(output.status.success());
    let payload: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("send should emit json");
    assert_eq!(payload["opcode"], "TX_SEND");
    assert_eq!(payload["can_id"], "0x123");
    assert_eq!(
        payload["bytes"].as_u64(),
        Some((canbcm::frame::HEADER_SIZE + canbcm::frame::CLASSIC_FRAME_SIZE) as u64)
    );
}

#[test]
fn cyclic_on_vcan0_sets_up_and_deletes() {
    if !vcan0_present() {
        eprintln!("vcan0 not present; skipping");
        return;
    }

    let output = canbcm(&[
        "--format", "json", "-i", "vcan0", "cyclic", "--id", "0x567", "--fd", "--data",
        "11111111111111111111111111111111", "--count", "3", "--ival1", "500us", "--ival2",
        "1s", "--duration", "200ms",
    ]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let opcodes: Vec<String> = stdout
        .lines()
        .filter_map(|line| serde_json::from_str::<serde_json::Value>(line).ok())
        .filter(|value| value.get("bytes").is_some())
        .filter_map(|value| value["opcode"].as_str().map(str::to_string))
        .collect();
    assert_eq!(opcodes, vec!["TX_SETUP", "TX_DELETE"]);
}
