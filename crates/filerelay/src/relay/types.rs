//! Outcome types reported by a batch run.

use filerelay_records::RecordId;
use serde::Serialize;
use std::fmt;

/// What happened to one listed file. Exactly one per file per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferOutcome {
    /// No record survived resolution; the remote file is left in place.
    SkippedNoMatch,
    /// Attached to every resolved record and moved to the archive.
    UploadedAndArchived,
    /// An upload failed after zero or more succeeded; the file stays live.
    UploadedPartialFailure,
    /// The download reported success but no local copy appeared.
    DownloadedButNotFound,
}

impl TransferOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferOutcome::SkippedNoMatch => "skipped_no_match",
            TransferOutcome::UploadedAndArchived => "uploaded_and_archived",
            TransferOutcome::UploadedPartialFailure => "uploaded_partial_failure",
            TransferOutcome::DownloadedButNotFound => "downloaded_but_not_found",
        }
    }

    /// Whether the file left the live directory.
    pub fn is_archived(&self) -> bool {
        matches!(self, TransferOutcome::UploadedAndArchived)
    }
}

impl fmt::Display for TransferOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-file line of the run summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileReport {
    pub file_name: String,
    pub rule: String,
    pub predicate: String,
    pub record_ids: Vec<RecordId>,
    /// `None` for dry runs, where nothing is transferred.
    pub outcome: Option<TransferOutcome>,
}

/// Result of one batch pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub dry_run: bool,
    pub files: Vec<FileReport>,
    /// Archive entries purged (or, for dry runs, that would be purged).
    pub purged: Vec<String>,
    pub purge_failures: usize,
}

impl RunSummary {
    pub fn count(&self, outcome: TransferOutcome) -> usize {
        self.files
            .iter()
            .filter(|f| f.outcome == Some(outcome))
            .count()
    }

    pub fn outcome_of(&self, file_name: &str) -> Option<TransferOutcome> {
        self.files
            .iter()
            .find(|f| f.file_name == file_name)
            .and_then(|f| f.outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_serializes_snake_case() {
        let json = serde_json::to_string(&TransferOutcome::UploadedAndArchived).unwrap();
        assert_eq!(json, "\"uploaded_and_archived\"");
        assert_eq!(TransferOutcome::SkippedNoMatch.to_string(), "skipped_no_match");
    }

    #[test]
    fn test_summary_counts() {
        let report = |name: &str, outcome| FileReport {
            file_name: name.to_string(),
            rule: "r".to_string(),
            predicate: String::new(),
            record_ids: Vec::new(),
            outcome: Some(outcome),
        };
        let summary = RunSummary {
            files: vec![
                report("a", TransferOutcome::UploadedAndArchived),
                report("b", TransferOutcome::SkippedNoMatch),
                report("c", TransferOutcome::UploadedAndArchived),
            ],
            ..RunSummary::default()
        };
        assert_eq!(summary.count(TransferOutcome::UploadedAndArchived), 2);
        assert_eq!(summary.outcome_of("b"), Some(TransferOutcome::SkippedNoMatch));
        assert_eq!(summary.outcome_of("z"), None);
        assert!(TransferOutcome::UploadedAndArchived.is_archived());
    }
}
