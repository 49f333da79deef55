//! Error types for the relay pipeline
//!
//! Every variant except `RetentionItem` aborts the batch. Each carries a human
//! message (what was being done, to which file) and the underlying
//! description from the collaborator.

use super::types::RunSummary;
use filerelay_records::{describe_issues, RecordId, StoreIssue};
use filerelay_remote::RemoteError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Failed to connect: {source}")]
    Connection {
        #[source]
        source: RemoteError,
    },

    #[error("Failed to list {directory}: {source}")]
    Listing {
        directory: String,
        #[source]
        source: RemoteError,
    },

    #[error("Failed to download the file \"{file}\": {source}")]
    Download {
        file: String,
        #[source]
        source: RemoteError,
    },

    #[error(
        "Failed to get {record_type} records for \"{predicate}\": {}",
        describe_issues(.issues)
    )]
    Query {
        record_type: String,
        predicate: String,
        issues: Vec<StoreIssue>,
    },

    #[error(
        "Failed to upload the file \"{file}\" for record {record_id}: {}",
        describe_issues(.issues)
    )]
    Upload {
        file: String,
        record_id: RecordId,
        /// Records that already received the file before this one failed.
        uploaded_before: usize,
        issues: Vec<StoreIssue>,
    },

    #[error("Failed to move the file \"{file}\" from {from} to {to}: {source}")]
    Archive {
        file: String,
        from: String,
        to: String,
        #[source]
        source: RemoteError,
    },

    #[error("Failed to purge archived file \"{file}\": {source}")]
    RetentionItem {
        file: String,
        #[source]
        source: RemoteError,
    },
}

impl RelayError {
    /// Short statement of what failed, without the collaborator detail.
    pub fn message(&self) -> String {
        match self {
            RelayError::Connection { .. } => "Failed to connect".to_string(),
            RelayError::Listing { directory, .. } => format!("Failed to list {}", directory),
            RelayError::Download { file, .. } => format!("Failed to download the file \"{}\"", file),
            RelayError::Query {
                record_type,
                predicate,
                ..
            } => format!("Failed to get {} records for \"{}\"", record_type, predicate),
            RelayError::Upload { file, record_id, .. } => {
                format!("Failed to upload the file \"{}\" for record {}", file, record_id)
            }
            RelayError::Archive { file, from, to, .. } => {
                format!("Failed to move the file \"{}\" from {} to {}", file, from, to)
            }
            RelayError::RetentionItem { file, .. } => {
                format!("Failed to purge archived file \"{}\"", file)
            }
        }
    }

    /// The underlying error as reported by the transport or record store.
    pub fn description(&self) -> String {
        match self {
            RelayError::Connection { source }
            | RelayError::Listing { source, .. }
            | RelayError::Download { source, .. }
            | RelayError::Archive { source, .. }
            | RelayError::RetentionItem { source, .. } => source.to_string(),
            RelayError::Query { issues, .. } | RelayError::Upload { issues, .. } => {
                describe_issues(issues)
            }
        }
    }

    /// Whether this error ends the batch.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, RelayError::RetentionItem { .. })
    }

    /// Name of the file the error concerns, if any.
    pub fn file(&self) -> Option<&str> {
        match self {
            RelayError::Download { file, .. }
            | RelayError::Upload { file, .. }
            | RelayError::Archive { file, .. }
            | RelayError::RetentionItem { file, .. } => Some(file),
            _ => None,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, RelayError>;

/// A batch that stopped on a fatal error, with the outcomes recorded so far.
#[derive(Error, Debug)]
#[error("Run aborted after {} file(s)", .summary.files.len())]
pub struct RunAborted {
    pub summary: RunSummary,
    #[source]
    pub error: RelayError,
}

#[cfg(test)]
mod tests {
    use super::*;
    use filerelay_remote::RemoteOp;

    #[test]
    fn test_message_and_description_split() {
        let err = RelayError::Archive {
            file: "a.csv".to_string(),
            from: "/in/a.csv".to_string(),
            to: "/archive/a.csv".to_string(),
            source: RemoteError::other(RemoteOp::Rename, "/in/a.csv", "permission denied"),
        };
        assert_eq!(err.message(), "Failed to move the file \"a.csv\" from /in/a.csv to /archive/a.csv");
        assert_eq!(err.description(), "rename of '/in/a.csv' failed: permission denied");
        assert!(err.to_string().starts_with(&err.message()));
        assert_eq!(err.file(), Some("a.csv"));
    }

    #[test]
    fn test_only_retention_items_are_isolated() {
        let item = RelayError::RetentionItem {
            file: "old.csv".to_string(),
            source: RemoteError::NotFound("old.csv".to_string()),
        };
        assert!(!item.is_fatal());

        let query = RelayError::Query {
            record_type: "Project".to_string(),
            predicate: "equal(ID,)".to_string(),
            issues: vec![StoreIssue::with_status(400, "Invalid search")],
        };
        assert!(query.is_fatal());
        assert_eq!(query.description(), "[400] Invalid search");
        assert!(query.to_string().contains("[400] Invalid search"));
    }
}
