// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let mut dir = std::env::temp_dir();
    dir.push("bootemu-tests");
    dir.push(format!("{}-{}", prefix, nonce));
    std::fs::create_dir_all(&dir).expect("Failed to create temp dir");
    dir
}

fn flag(retained: &Path, action: &str) -> Output {
    Command::new(env!("CARGO_BIN_EXE_bootemu"))
        .args(["flag", "--retained", retained.to_str().unwrap(), action])
        .output()
        .expect("Failed to execute command")
}

fn shown(retained: &Path) -> String {
    let output = flag(retained, "show");
    assert!(output.status.success());
    String::from_utf8(output.stdout).unwrap().trim().to_string()
}

fn boot(fw: &Path, retained: &Path, extra: &[&str]) -> serde_json::Value {
    let result = retained.with_file_name("result.json");
    let mut args = vec![
        "--firmware",
        fw.to_str().unwrap(),
        "--retained",
        retained.to_str().unwrap(),
        "--max-polls",
        "3",
        "--output",
        result.to_str().unwrap(),
    ];
    args.extend_from_slice(extra);
    let output = Command::new(env!("CARGO_BIN_EXE_bootemu"))
        .args(&args)
        .output()
        .expect("Failed to execute command");
    assert_eq!(output.status.code(), Some(0));
    serde_json::from_str(&std::fs::read_to_string(result).unwrap()).unwrap()
}

#[test]
fn test_flag_show_defaults_to_unset() {
    let dir = temp_dir("flag-default");
    assert_eq!(shown(&dir.join("retained.json")), "0x00000000");
}

#[test]
fn test_flag_set_and_clear() {
    let dir = temp_dir("flag-set");
    let retained = dir.join("retained.json");

    assert!(flag(&retained, "set").status.success());
    assert_eq!(shown(&retained), "0x0fc35a96");

    assert!(flag(&retained, "clear").status.success());
    assert_eq!(shown(&retained), "0x00000000");
}

#[test]
fn test_flag_survives_between_runs() {
    let dir = temp_dir("flag-runs");
    let retained = dir.join("retained.json");
    let fw = dir.join("firmware.bin");
    std::fs::write(&fw, [0u8; 64]).unwrap();

    assert!(flag(&retained, "set").status.success());

    // Flag set in a previous process keeps this boot in the bootloader,
    // which consumes it.
    let json = boot(&fw, &retained, &[]);
    assert_eq!(json["outcome"]["end"]["type"], "resident");
    assert_eq!(json["boot_count"], 1);
    assert_eq!(shown(&retained), "0x00000000");

    // Next run boots firmware.
    let json = boot(&fw, &retained, &[]);
    assert_eq!(json["outcome"]["end"]["type"], "transferred");
    assert_eq!(json["boot_count"], 2);
}

#[test]
fn test_power_cycle_drops_retained_flag() {
    let dir = temp_dir("flag-power");
    let retained = dir.join("retained.json");
    let fw = dir.join("firmware.bin");
    std::fs::write(&fw, [0u8; 64]).unwrap();

    assert!(flag(&retained, "set").status.success());
    let json = boot(&fw, &retained, &["--power-cycle"]);
    assert_eq!(json["flag_before"], 0);
    assert_eq!(json["outcome"]["end"]["type"], "transferred");
}

#[test]
fn test_unwritable_retained_state_fails_the_run() {
    let dir = temp_dir("flag-unwritable");
    let fw = dir.join("firmware.bin");
    std::fs::write(&fw, [0u8; 64]).unwrap();
    // Parent of the retained file is a regular file
    let retained = fw.join("retained.json");
    let result = dir.join("result.json");

    let output = Command::new(env!("CARGO_BIN_EXE_bootemu"))
        .args([
            "--firmware",
            fw.to_str().unwrap(),
            "--stay",
            "--max-polls",
            "3",
            "--retained",
            retained.to_str().unwrap(),
            "--output",
            result.to_str().unwrap(),
        ])
        .output()
        .expect("Failed to execute command");
    assert_eq!(output.status.code(), Some(3));

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&result).unwrap()).unwrap();
    assert_eq!(json["status"], "fault");
    assert_eq!(json["outcome"]["end"]["type"], "resident");
    assert!(json["message"]
        .as_str()
        .unwrap()
        .contains("Failed to create directory"));
}
