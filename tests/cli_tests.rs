use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::tempdir;

fn run(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_dup-sieve"))
        .args(["--no-progress", "--threads", "1"])
        .args(args)
        .output()
        .expect("failed to run dup-sieve")
}

fn arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[test]
fn malformed_size_exits_with_failure() {
    let dir = tempdir().unwrap();
    let output = run(&["--min-size", "12kb", &arg(dir.path())]);
    assert_eq!(output.status.code(), Some(1));
    assert!(!String::from_utf8_lossy(&output.stdout).contains("duplicate files in"));
}

#[test]
fn missing_input_only_warns() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.bin"), [4u8; 300]).unwrap();
    fs::write(dir.path().join("b.bin"), [4u8; 300]).unwrap();

    let output = run(&[
        "--min-size",
        "0",
        &arg(dir.path()),
        &arg(&dir.path().join("missing.bin")),
    ]);
    assert_eq!(output.status.code(), Some(0));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("1 duplicate files in 1 groups"), "{stdout}");
    assert!(stdout.contains("(300 bytes)"));
    assert!(String::from_utf8_lossy(&output.stderr).contains("missing.bin"));
}

#[test]
fn glob_without_matches_only_warns() {
    let dir = tempdir().unwrap();
    let output = run(&["--min-size", "0", &arg(&dir.path().join("*.nothing"))]);
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("No duplicate files found!"));
    assert!(stdout.contains("0 duplicate files in 0 groups"));
}

#[test]
fn json_report_is_machine_readable() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.bin"), [9u8; 2000]).unwrap();
    fs::write(dir.path().join("b.bin"), [9u8; 2000]).unwrap();

    let output = run(&["--json", "--min-size", "1KB", "--max-size", "5KB", &arg(dir.path())]);
    assert_eq!(output.status.code(), Some(0));
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["reclaimable_bytes"], 2000);
    assert_eq!(value["groups"].as_array().unwrap().len(), 1);
}
