//! `filerelay check`: validate the settings file and show the rules.
//!
//! Never touches the network.

use super::load_settings;
use super::output::print_table;
use anyhow::{Context, Result};
use filerelay::{MatchRule, RelaySettings};
use serde_json::json;
use std::path::PathBuf;

#[derive(Debug)]
pub struct CheckArgs {
    pub config: PathBuf,
    pub json: bool,
}

pub fn run(args: CheckArgs) -> Result<()> {
    let settings = load_settings(&args.config)?;

    if args.json {
        let rendered = serde_json::to_string_pretty(&check_json(&settings))
            .context("Failed to serialize settings")?;
        println!("{}", rendered);
        return Ok(());
    }

    let pipeline = &settings.pipeline;
    println!("Settings OK: {}", args.config.display());
    println!(
        "Remote: {}@{} live={} archive={}",
        settings.sftp.username,
        settings.sftp.address(),
        pipeline.layout.live,
        pipeline.layout.archive
    );
    match pipeline.retention_days {
        Some(days) => println!("Retention: {} day(s)", days),
        None => println!("Retention: disabled"),
    }
    println!("Record store: {}", settings.record_store.url);
    print_table(
        &["RULE", "PATTERN", "RECORD TYPE", "SEARCH", "PARAMS", "FIELD"],
        pipeline.rules.iter().map(rule_row).collect(),
    );
    Ok(())
}

fn rule_row(rule: &MatchRule) -> Vec<String> {
    let params = rule
        .params
        .iter()
        .map(|p| format!(":{} = /{}/[{}]", p.name, p.pattern.as_str(), p.group))
        .collect::<Vec<_>>()
        .join("\n");
    vec![
        rule.name.clone(),
        rule.file_pattern.as_str().to_string(),
        rule.record_type.clone(),
        rule.search.clone(),
        params,
        rule.attachment_field.clone(),
    ]
}

/// Settings without secrets.
fn check_json(settings: &RelaySettings) -> serde_json::Value {
    let auth = if settings.sftp.private_key.is_some() {
        "private_key"
    } else {
        "password"
    };
    json!({
        "remote": {
            "host": settings.sftp.host,
            "port": settings.sftp.port,
            "username": settings.sftp.username,
            "auth": auth,
        },
        "record_store": { "url": settings.record_store.url },
        "pipeline": settings.pipeline,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SETTINGS: &str = r#"
[remote]
host = "sftp.example.com"
username = "relay"
password = "secret-password"
directory = "/in"
archive_directory = "/in/archive"

[record_store]
url = "records.example.com"
access_key = "ak"
secret_key = "secret-key"

[[rules]]
name = "fuze"
file_pattern = "^PROJ-"
record_type = "Project"
search = "equal(FUZE_ID,:id)"
attachment_field = "P_FILE"

[[rules.params]]
name = "id"
pattern = '\d+'
"#;

    #[test]
    fn test_check_json_has_no_secrets() {
        let settings = RelaySettings::from_toml_str(SETTINGS, |_| None).unwrap();
        let rendered = check_json(&settings).to_string();
        assert!(!rendered.contains("secret-password"));
        assert!(!rendered.contains("secret-key"));
        assert!(rendered.contains("equal(FUZE_ID,:id)"));
        assert!(rendered.contains("\"live\":\"/in/\""));
    }

    #[test]
    fn test_rule_row() {
        let settings = RelaySettings::from_toml_str(SETTINGS, |_| None).unwrap();
        let row = rule_row(&settings.pipeline.rules[0]);
        assert_eq!(row[4], r":id = /\d+/[0]");
    }
}
