//! Filerelay Records - the record store contract.
//!
//! The record store reports failures through an accumulated error list rather
//! than by failing the call: every operation returns a [`StoreReply`] and the
//! caller inspects [`StoreReply::errors`] after each call.

pub mod http;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

pub use http::{HttpRecordStore, RecordStoreSettings};

/// Record identifier assigned by the store.
pub type RecordId = i64;

/// A record returned by a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalRecord {
    pub record_type: String,
    pub id: RecordId,
    /// Projected field values. Null values are omitted.
    pub fields: BTreeMap<String, String>,
}

impl ExternalRecord {
    pub fn new(record_type: impl Into<String>, id: RecordId) -> Self {
        Self {
            record_type: record_type.into(),
            id,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// One error reported by the record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreIssue {
    /// HTTP status, when the store answered at all.
    pub status: Option<u16>,
    pub message: String,
}

impl StoreIssue {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }
}

impl fmt::Display for StoreIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "[{}] {}", status, self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Reply from a record store call: the data (if any) plus every error the
/// store accumulated while serving it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreReply<T> {
    pub data: Option<T>,
    pub errors: Vec<StoreIssue>,
}

impl<T> StoreReply<T> {
    pub fn ok(data: T) -> Self {
        Self {
            data: Some(data),
            errors: Vec::new(),
        }
    }

    pub fn failed(errors: Vec<StoreIssue>) -> Self {
        Self { data: None, errors }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Render an error list the way it is logged and surfaced to the caller.
pub fn describe_issues(issues: &[StoreIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Query and attachment operations against the system of record.
pub trait RecordStore {
    /// Run a search predicate and return the projected fields of each match.
    fn query(
        &self,
        record_type: &str,
        predicate: &str,
        fields: &[String],
    ) -> StoreReply<Vec<ExternalRecord>>;

    /// Attach a local file to a record's file field.
    fn attach_file(
        &self,
        record_type: &str,
        record_id: RecordId,
        field: &str,
        local_path: &Path,
    ) -> StoreReply<()>;
}

impl<T: RecordStore + ?Sized> RecordStore for &T {
    fn query(
        &self,
        record_type: &str,
        predicate: &str,
        fields: &[String],
    ) -> StoreReply<Vec<ExternalRecord>> {
        (**self).query(record_type, predicate, fields)
    }

    fn attach_file(
        &self,
        record_type: &str,
        record_id: RecordId,
        field: &str,
        local_path: &Path,
    ) -> StoreReply<()> {
        (**self).attach_file(record_type, record_id, field, local_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_issues() {
        let issues = vec![
            StoreIssue::with_status(400, "Invalid search"),
            StoreIssue::new("connection reset"),
        ];
        assert_eq!(describe_issues(&issues), "[400] Invalid search; connection reset");
    }

    #[test]
    fn test_reply_flags() {
        let ok: StoreReply<()> = StoreReply::ok(());
        assert!(!ok.has_errors());
        let failed: StoreReply<()> = StoreReply::failed(vec![StoreIssue::new("boom")]);
        assert!(failed.has_errors());
        assert!(failed.data.is_none());
    }

    #[test]
    fn test_record_field_lookup() {
        let record = ExternalRecord::new("Project", 7).with_field("FUZE_ID", "00123");
        assert_eq!(record.field("FUZE_ID"), Some("00123"));
        assert_eq!(record.field("MISSING"), None);
    }
}
