//! Settings for a filerelay run
//!
//! The settings file is TOML. It is deserialized into raw structs and then
//! validated into the immutable types the pipeline uses: regexes are compiled,
//! placeholders are cross-checked against the search template, and directory
//! prefixes are normalised to end with `/`.
//!
//! ```toml
//! scratch_dir = "."
//!
//! [remote]
//! host = "sftp.example.com"
//! username = "relay"
//! password = "..."
//! directory = "/inbound/"
//! archive_directory = "/inbound/archive/"
//! archive_retention_days = 30
//!
//! [record_store]
//! url = "https://records.example.com"
//! access_key = "..."
//! secret_key = "..."
//!
//! [[rules]]
//! name = "fuze-reports"
//! file_pattern = "^PROJ-"
//! record_type = "Project"
//! search = "equal(P_PROJECT_STATUS,Active) and equal(P_FUZE_ID,:fuze_id)"
//! attachment_field = "P_REPORT_FILE"
//!
//! [[rules.params]]
//! name = "fuze_id"
//! pattern = "\\d+_"
//! strip = "_"
//! ```

use filerelay_records::RecordStoreSettings;
use filerelay_remote::{normalize_dir, SftpSettings};
use regex::Regex;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::relay::query::template_placeholders;

pub const DEFAULT_SFTP_PORT: u16 = 22;

/// Environment variables that override secrets from the settings file.
pub const ENV_REMOTE_PASSWORD: &str = "FILERELAY_REMOTE_PASSWORD";
pub const ENV_ACCESS_KEY: &str = "FILERELAY_ACCESS_KEY";
pub const ENV_SECRET_KEY: &str = "FILERELAY_SECRET_KEY";

/// Configuration error
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Rule '{rule}': invalid pattern '{pattern}': {source}")]
    Pattern {
        rule: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Rule '{rule}': {message}")]
    Rule { rule: String, message: String },

    #[error("Invalid setting '{key}': {message}")]
    Setting { key: &'static str, message: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

// ============================================================================
// Raw (file) representation
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSettings {
    #[serde(default)]
    scratch_dir: Option<PathBuf>,
    remote: RawRemote,
    record_store: RawRecordStore,
    #[serde(default)]
    rules: Vec<RawRule>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRemote {
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    username: String,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    private_key: Option<PathBuf>,
    directory: String,
    archive_directory: String,
    #[serde(default)]
    archive_retention_days: Option<u32>,
}

fn default_port() -> u16 {
    DEFAULT_SFTP_PORT
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRecordStore {
    url: String,
    #[serde(default)]
    access_key: String,
    #[serde(default)]
    secret_key: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRule {
    name: String,
    file_pattern: String,
    record_type: String,
    search: String,
    attachment_field: String,
    #[serde(default)]
    fields: Vec<String>,
    #[serde(default)]
    params: Vec<RawParam>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawParam {
    name: String,
    pattern: String,
    #[serde(default)]
    group: usize,
    #[serde(default)]
    strip: Option<String>,
}

// ============================================================================
// Validated representation
// ============================================================================

fn serialize_regex<S: Serializer>(regex: &Regex, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(regex.as_str())
}

/// How to pull one named value out of a file name.
#[derive(Debug, Clone, Serialize)]
pub struct ParamSpec {
    /// Placeholder name, referenced as `:name` in the search template.
    pub name: String,
    #[serde(serialize_with = "serialize_regex")]
    pub pattern: Regex,
    /// Capture group to take; 0 is the whole match.
    pub group: usize,
    /// Literal removed (first occurrence) from the extracted text.
    pub strip: Option<String>,
}

/// A filename pattern bound to a record type, search template and file field.
#[derive(Debug, Clone, Serialize)]
pub struct MatchRule {
    pub name: String,
    #[serde(serialize_with = "serialize_regex")]
    pub file_pattern: Regex,
    pub record_type: String,
    /// Search-condition template with `:placeholder` tokens.
    pub search: String,
    pub params: Vec<ParamSpec>,
    pub attachment_field: String,
    /// Explicit projection; empty means "the fields the search references".
    pub fields: Vec<String>,
}

impl MatchRule {
    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }
}

/// Live and archive directory prefixes on the remote side.
#[derive(Debug, Clone, Serialize)]
pub struct DirLayout {
    pub live: String,
    pub archive: String,
}

/// Everything the reconciliation pipeline needs, minus credentials.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineConfig {
    pub layout: DirLayout,
    pub rules: Vec<MatchRule>,
    pub retention_days: Option<u32>,
    /// Where transient local copies are written.
    pub scratch_dir: PathBuf,
}

/// Fully validated settings for one run.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub sftp: SftpSettings,
    pub record_store: RecordStoreSettings,
    pub pipeline: PipelineConfig,
}

impl RelaySettings {
    /// Load settings from a TOML file, applying secret overrides from the
    /// process environment.
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    pub fn load_with_env(path: &Path, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content, env).map_err(|err| match err {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    pub fn from_toml_str(content: &str, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let raw: RawSettings = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        validate(raw, env)
    }
}

fn non_empty(key: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ConfigError::Setting {
            key,
            message: "must not be empty".to_string(),
        });
    }
    Ok(())
}

fn validate(raw: RawSettings, env: impl Fn(&str) -> Option<String>) -> Result<RelaySettings> {
    let remote = raw.remote;
    non_empty("remote.host", &remote.host)?;
    non_empty("remote.username", &remote.username)?;
    non_empty("remote.directory", &remote.directory)?;
    non_empty("remote.archive_directory", &remote.archive_directory)?;

    let password = env(ENV_REMOTE_PASSWORD).or(remote.password);
    if password.is_none() && remote.private_key.is_none() {
        return Err(ConfigError::Setting {
            key: "remote.password",
            message: "either password or private_key is required".to_string(),
        });
    }
    if remote.archive_retention_days == Some(0) {
        return Err(ConfigError::Setting {
            key: "remote.archive_retention_days",
            message: "must be at least 1 (omit it to disable the sweep)".to_string(),
        });
    }

    let layout = DirLayout {
        live: normalize_dir(&remote.directory),
        archive: normalize_dir(&remote.archive_directory),
    };
    if layout.live == layout.archive {
        return Err(ConfigError::Setting {
            key: "remote.archive_directory",
            message: "must differ from remote.directory".to_string(),
        });
    }

    let store = raw.record_store;
    non_empty("record_store.url", &store.url)?;
    let access_key = env(ENV_ACCESS_KEY).unwrap_or(store.access_key);
    let secret_key = env(ENV_SECRET_KEY).unwrap_or(store.secret_key);
    non_empty("record_store.access_key", &access_key)?;
    non_empty("record_store.secret_key", &secret_key)?;

    if raw.rules.is_empty() {
        return Err(ConfigError::Setting {
            key: "rules",
            message: "at least one rule is required".to_string(),
        });
    }
    let mut names = HashSet::new();
    let mut rules = Vec::with_capacity(raw.rules.len());
    for raw_rule in raw.rules {
        if !names.insert(raw_rule.name.clone()) {
            return Err(ConfigError::Rule {
                rule: raw_rule.name,
                message: "duplicate rule name".to_string(),
            });
        }
        rules.push(validate_rule(raw_rule)?);
    }

    Ok(RelaySettings {
        sftp: SftpSettings {
            host: remote.host,
            port: remote.port,
            username: remote.username,
            password,
            private_key: remote.private_key,
        },
        record_store: RecordStoreSettings {
            url: store.url,
            access_key,
            secret_key,
        },
        pipeline: PipelineConfig {
            layout,
            rules,
            retention_days: remote.archive_retention_days,
            scratch_dir: raw.scratch_dir.unwrap_or_else(|| PathBuf::from(".")),
        },
    })
}

fn compile(rule: &str, pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|source| ConfigError::Pattern {
        rule: rule.to_string(),
        pattern: pattern.to_string(),
        source,
    })
}

fn validate_rule(raw: RawRule) -> Result<MatchRule> {
    let rule_err = |message: String| ConfigError::Rule {
        rule: raw.name.clone(),
        message,
    };

    for (key, value) in [
        ("record_type", &raw.record_type),
        ("search", &raw.search),
        ("attachment_field", &raw.attachment_field),
    ] {
        if value.trim().is_empty() {
            return Err(rule_err(format!("{} must not be empty", key)));
        }
    }

    let file_pattern = compile(&raw.name, &raw.file_pattern)?;

    let mut params = Vec::with_capacity(raw.params.len());
    let mut seen = HashSet::new();
    for raw_param in &raw.params {
        if !seen.insert(raw_param.name.as_str()) {
            return Err(rule_err(format!("duplicate param '{}'", raw_param.name)));
        }
        let pattern = compile(&raw.name, &raw_param.pattern)?;
        // captures_len counts group 0
        if raw_param.group >= pattern.captures_len() {
            return Err(rule_err(format!(
                "param '{}' uses group {} but '{}' has {} capture group(s)",
                raw_param.name,
                raw_param.group,
                raw_param.pattern,
                pattern.captures_len() - 1
            )));
        }
        params.push(ParamSpec {
            name: raw_param.name.clone(),
            pattern,
            group: raw_param.group,
            strip: raw_param.strip.clone().filter(|s| !s.is_empty()),
        });
    }

    for placeholder in template_placeholders(&raw.search) {
        if !seen.contains(placeholder.as_str()) {
            return Err(rule_err(format!(
                "search references ':{}' but no param with that name is declared",
                placeholder
            )));
        }
    }

    Ok(MatchRule {
        name: raw.name,
        file_pattern,
        record_type: raw.record_type,
        search: raw.search,
        params,
        attachment_field: raw.attachment_field,
        fields: raw.fields,
    })
}
