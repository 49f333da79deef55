//! Helpful error types for CLI commands
//!
//! Every error includes:
//! - What went wrong
//! - Context about the situation
//! - Suggestions for how to fix it

use filerelay::{ConfigError, RelayError};
use std::fmt;
use std::path::Path;

/// An error with helpful context and suggestions
#[derive(Debug)]
pub struct HelpfulError {
    pub message: String,
    pub context: Option<String>,
    pub suggestions: Vec<String>,
}

impl HelpfulError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
            suggestions: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_suggestions(mut self, suggestions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.suggestions.extend(suggestions.into_iter().map(|s| s.into()));
        self
    }

    // === Common error constructors ===

    /// Settings file is missing
    pub fn config_not_found(path: &Path) -> Self {
        Self::new(format!("Settings file not found: {}", path.display()))
            .with_context("filerelay reads its remote, record store and rules from a TOML file")
            .with_suggestions([
                format!("TRY: Check that the file exists: ls -la {}", path.display()),
                "TRY: Pass the file explicitly: filerelay --config /path/to/filerelay.toml run".to_string(),
                "TRY: Or set FILERELAY_CONFIG".to_string(),
            ])
    }

    /// Settings file exists but does not validate
    pub fn invalid_config(path: &Path, err: &ConfigError) -> Self {
        let base = Self::new(format!("Invalid settings file: {}", path.display()))
            .with_context(err.to_string());
        match err {
            ConfigError::Pattern { .. } => base.with_suggestions([
                "TRY: Patterns are Rust regexes; escape backslashes in basic TOML strings or use '...'",
            ]),
            ConfigError::Rule { .. } => base.with_suggestions([
                "TRY: Every :placeholder in a search template needs a [[rules.params]] entry",
                "TRY: Validate your changes with: filerelay check",
            ]),
            ConfigError::Setting { key, .. } if key.starts_with("record_store") => base.with_suggestions([
                "TRY: Secrets can come from FILERELAY_ACCESS_KEY and FILERELAY_SECRET_KEY",
            ]),
            ConfigError::Setting { key, .. } if key.starts_with("remote") => base.with_suggestions([
                "TRY: The password can come from FILERELAY_REMOTE_PASSWORD",
                "TRY: Or set remote.private_key to a key file",
            ]),
            _ => base.with_suggestion("TRY: Validate your changes with: filerelay check"),
        }
    }

    /// A batch run failed
    pub fn run_failed(err: &RelayError) -> Self {
        let base = Self::new(err.message()).with_context(err.description());
        match err {
            RelayError::Connection { .. } => base.with_suggestions([
                "TRY: Check remote.host, remote.port and the credentials",
                "TRY: Verify the server is reachable: ssh -p PORT USER@HOST",
            ]),
            RelayError::Query { .. } => base.with_suggestions([
                "TRY: Inspect the predicates without transferring: filerelay run --dry-run",
                "TRY: Check the rule's search template and params",
            ]),
            RelayError::Upload { .. } => base.with_suggestion(
                "TRY: The file was left in the live directory; fix the record and re-run",
            ),
            _ => base,
        }
    }
}

impl fmt::Display for HelpfulError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ERROR: {}", self.message)?;

        if let Some(ctx) = &self.context {
            writeln!(f, "CONTEXT: {}", ctx)?;
        }

        if !self.suggestions.is_empty() {
            writeln!(f)?;
            for suggestion in &self.suggestions {
                writeln!(f, "  {}", suggestion)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for HelpfulError {}

/// Print an error as a JSON object on stderr.
pub fn print_json_error(err: &anyhow::Error) {
    let value = match err.downcast_ref::<HelpfulError>() {
        Some(helpful) => serde_json::json!({
            "error": helpful.message,
            "context": helpful.context,
            "suggestions": helpful.suggestions,
        }),
        None => serde_json::json!({
            "error": err.to_string(),
            "causes": err.chain().skip(1).map(|c| c.to_string()).collect::<Vec<_>>(),
        }),
    };
    eprintln!("{}", value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use filerelay::RelaySettings;

    #[test]
    fn test_helpful_error_display() {
        let err = HelpfulError::new("Something failed")
            .with_context("While reconciling")
            .with_suggestion("TRY: again");
        let output = err.to_string();
        assert!(output.contains("ERROR: Something failed"));
        assert!(output.contains("CONTEXT: While reconciling"));
        assert!(output.contains("  TRY: again"));
    }

    #[test]
    fn test_config_not_found() {
        let err = HelpfulError::config_not_found(Path::new("/etc/filerelay.toml"));
        assert!(err.message.contains("/etc/filerelay.toml"));
        assert!(err.suggestions.iter().any(|s| s.contains("FILERELAY_CONFIG")));
    }

    #[test]
    fn test_invalid_config_suggests_env_for_secrets() {
        let content = r#"
[remote]
host = "h"
username = "u"
password = "p"
directory = "/in"
archive_directory = "/arc"

[record_store]
url = "records.example.com"

[[rules]]
name = "r"
file_pattern = "x"
record_type = "T"
search = "equal(A,1)"
attachment_field = "F"
"#;
        let err = RelaySettings::from_toml_str(content, |_| None).unwrap_err();
        let helpful = HelpfulError::invalid_config(Path::new("f.toml"), &err);
        assert!(helpful.suggestions.iter().any(|s| s.contains("FILERELAY_ACCESS_KEY")));
    }
}
