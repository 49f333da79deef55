mod cli_support;

use cli_support::{run_cli, run_cli_json};
use std::fs;
use tempfile::TempDir;

const SETTINGS: &str = r#"
[remote]
host = "sftp.example.com"
username = "relay"
password = "do-not-print"
directory = "/inbound"
archive_directory = "/inbound/archive"
archive_retention_days = 14

[record_store]
url = "https://records.example.com"
access_key = "ak"
secret_key = "sk"

[[rules]]
name = "fuze"
file_pattern = "^PROJ-"
record_type = "Project"
search = "equal(P_FUZE_ID,:fuze_id)"
attachment_field = "P_REPORT"

[[rules.params]]
name = "fuze_id"
pattern = '\d+'
"#;

#[test]
fn test_check_json_reports_validated_settings() {
    let home = TempDir::new().expect("create temp home");
    let config = home.path().join("filerelay.toml");
    fs::write(&config, SETTINGS).expect("write settings");
    let config_arg = config.to_string_lossy().to_string();

    let value = run_cli_json(&["--config", &config_arg, "check", "--json"], home.path());

    assert_eq!(value["remote"]["host"], "sftp.example.com");
    assert_eq!(value["remote"]["port"], 22);
    assert_eq!(value["pipeline"]["layout"]["live"], "/inbound/");
    assert_eq!(value["pipeline"]["retention_days"], 14);
    assert_eq!(value["pipeline"]["rules"][0]["params"][0]["pattern"], "\\d+");
    assert!(!value.to_string().contains("do-not-print"));
}

#[test]
fn test_check_rejects_undeclared_placeholder() {
    let home = TempDir::new().expect("create temp home");
    let config = home.path().join("filerelay.toml");
    fs::write(&config, SETTINGS.replace(":fuze_id", ":site")).expect("write settings");
    let config_arg = config.to_string_lossy().to_string();

    let output = run_cli(&["--config", &config_arg, "check"], home.path());

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Invalid settings file"), "{}", stderr);
    assert!(stderr.contains(":site"), "{}", stderr);
}

#[test]
fn test_missing_settings_file_as_json_error() {
    let home = TempDir::new().expect("create temp home");
    let missing = home.path().join("nope.toml");
    let missing_arg = missing.to_string_lossy().to_string();

    let output = run_cli(&["--config", &missing_arg, "run", "--json"], home.path());

    assert_eq!(output.status.code(), Some(1));
    let value: serde_json::Value =
        serde_json::from_slice(&output.stderr).expect("parse JSON error");
    assert!(value["error"].as_str().unwrap().contains("Settings file not found"));
    assert!(value["suggestions"].as_array().is_some_and(|s| !s.is_empty()));
}
