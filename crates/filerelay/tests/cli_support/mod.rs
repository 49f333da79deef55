#![allow(dead_code)]

use std::path::Path;
use std::process::{Command, Output};

pub fn run_cli(args: &[&str], home: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_filerelay"))
        .args(args)
        .env("FILERELAY_HOME", home)
        .env_remove("FILERELAY_CONFIG")
        .env_remove("FILERELAY_REMOTE_PASSWORD")
        .env_remove("FILERELAY_ACCESS_KEY")
        .env_remove("FILERELAY_SECRET_KEY")
        .env("RUST_LOG", "error")
        .output()
        .expect("run filerelay binary")
}

pub fn assert_cli_success(output: &Output, args: &[&str]) {
    assert!(
        output.status.success(),
        "filerelay {:?} failed\nstdout:\n{}\nstderr:\n{}",
        args,
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

pub fn run_cli_json(args: &[&str], home: &Path) -> serde_json::Value {
    let output = run_cli(args, home);
    assert_cli_success(&output, args);
    serde_json::from_slice(&output.stdout).expect("parse JSON output")
}
