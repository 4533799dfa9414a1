//! Integration test: the `rtapi_sim` binary.
//!
//! Validates: configuration problems are reported on the log before the
//! process exits non-zero; a missing file falls back to defaults.

use std::io::Write;
use std::process::{Command, Output};

fn rtapi_sim(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_rtapi_sim"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("spawn rtapi_sim")
}

fn log_of(out: &Output) -> String {
    let mut text = String::from_utf8_lossy(&out.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&out.stderr));
    text
}

fn config_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn malformed_config_is_reported() {
    let file = config_file("invalid toml {{{{");
    let path = file.path().to_str().unwrap();
    let out = rtapi_sim(&["--config", path, "--ticks", "3", "--local-shmem"]);

    assert_eq!(out.status.code(), Some(1));
    assert!(log_of(&out).contains("rtapi_sim failed"), "{}", log_of(&out));
}

#[test]
fn invalid_base_period_is_reported() {
    let file = config_file("[scheduler]\nbase_period_ns = 1\n");
    let path = file.path().to_str().unwrap();
    let out = rtapi_sim(&["--config", path, "--ticks", "3", "--local-shmem"]);

    assert_eq!(out.status.code(), Some(1));
    assert!(log_of(&out).contains("validation failed"), "{}", log_of(&out));
}

#[test]
fn missing_config_runs_with_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");
    let out = rtapi_sim(&["--config", path.to_str().unwrap(), "--ticks", "3", "--local-shmem"]);

    assert!(out.status.success(), "{}", log_of(&out));
    let log = log_of(&out);
    assert!(log.contains("not found, using built-in defaults"), "{log}");
    assert!(log.contains("Ran 3 ticks"), "{log}");
}
