//! Per-file transfer: download, attach to every record, archive.
//!
//! ```text
//! download ──▶ local copy present? ──no──▶ DownloadedButNotFound
//!                    │ yes
//!                    ▼
//!          attach to r1, r2, ... ──any fails──▶ Upload error (file stays live)
//!                    │ all ok
//!                    ▼
//!     delete stale archive entry, rename live ──▶ archive
//! ```
//!
//! The local copy is removed on every path out of [`TransferOrchestrator::transfer`],
//! including errors.

use super::error::{RelayError, Result};
use super::types::TransferOutcome;
use crate::config::{DirLayout, MatchRule};
use filerelay_records::{ExternalRecord, RecordStore};
use filerelay_remote::{join_remote, RemoteError, RemoteFs};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Scratch-directory copy of a remote file, removed on drop.
struct LocalCopy {
    path: PathBuf,
}

impl LocalCopy {
    fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn is_present(&self) -> bool {
        self.path.is_file()
    }
}

impl Drop for LocalCopy {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Local file \"{}\" has been deleted", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to delete local file \"{}\": {}", self.path.display(), e),
        }
    }
}

/// Moves matched files from the live directory into records and the archive.
pub struct TransferOrchestrator<'a, R, S> {
    remote: R,
    store: S,
    layout: &'a DirLayout,
    scratch_dir: &'a Path,
}

impl<'a, R: RemoteFs, S: RecordStore> TransferOrchestrator<'a, R, S> {
    pub fn new(remote: R, store: S, layout: &'a DirLayout, scratch_dir: &'a Path) -> Self {
        Self {
            remote,
            store,
            layout,
            scratch_dir,
        }
    }

    /// Transfer one live file to `records`, in order.
    ///
    /// With no records the file is left where it is and nothing is
    /// downloaded.
    pub fn transfer(
        &self,
        rule: &MatchRule,
        file_name: &str,
        records: &[ExternalRecord],
    ) -> Result<TransferOutcome> {
        if records.is_empty() {
            info!("No {} records found for the file \"{}\"", rule.record_type, file_name);
            return Ok(TransferOutcome::SkippedNoMatch);
        }

        let remote_path = join_remote(&self.layout.live, file_name);
        let local = LocalCopy::new(self.scratch_dir.join(file_name));

        self.remote
            .download(&remote_path, local.path())
            .map_err(|source| RelayError::Download {
                file: file_name.to_string(),
                source,
            })?;
        debug!("File \"{}\" has been downloaded", file_name);

        if !local.is_present() {
            warn!("File \"{}\" has not been downloaded", file_name);
            return Ok(TransferOutcome::DownloadedButNotFound);
        }

        for (uploaded, record) in records.iter().enumerate() {
            let reply = self.store.attach_file(
                &rule.record_type,
                record.id,
                &rule.attachment_field,
                local.path(),
            );
            if reply.has_errors() {
                return Err(RelayError::Upload {
                    file: file_name.to_string(),
                    record_id: record.id,
                    uploaded_before: uploaded,
                    issues: reply.errors,
                });
            }
            debug!(
                "File \"{}\" attached to {} {} ({})",
                file_name, rule.record_type, record.id, rule.attachment_field
            );
        }

        self.archive(file_name)?;
        info!("File \"{}\" has been uploaded and moved to the archive", file_name);
        Ok(TransferOutcome::UploadedAndArchived)
    }

    /// Move a live file into the archive, replacing a same-named entry.
    pub fn archive(&self, file_name: &str) -> Result<()> {
        let from = join_remote(&self.layout.live, file_name);
        let to = join_remote(&self.layout.archive, file_name);
        let archive_err = |source: RemoteError| RelayError::Archive {
            file: file_name.to_string(),
            from: from.clone(),
            to: to.clone(),
            source,
        };

        if self.remote.exists(&to).map_err(archive_err)? {
            let outcome = self.remote.delete(&to).map_err(archive_err)?;
            if outcome.was_deleted() {
                debug!("Replaced archived file \"{}\"", to);
            }
        }
        self.remote.rename(&from, &to).map_err(archive_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filerelay_remote::RemoteOp;
    use filerelay_test_utils::{MemoryRecordStore, MemoryRemote};
    use regex::Regex;
    use tempfile::TempDir;

    fn layout() -> DirLayout {
        DirLayout {
            live: "/in/".to_string(),
            archive: "/in/archive/".to_string(),
        }
    }

    fn rule() -> MatchRule {
        MatchRule {
            name: "r".to_string(),
            file_pattern: Regex::new("^a_").unwrap(),
            record_type: "Project".to_string(),
            search: "equal(ID,1)".to_string(),
            params: Vec::new(),
            attachment_field: "P_FILE".to_string(),
            fields: Vec::new(),
        }
    }

    fn records(ids: &[i64]) -> Vec<ExternalRecord> {
        ids.iter().map(|id| ExternalRecord::new("Project", *id)).collect()
    }

    #[test]
    fn test_uploads_in_order_then_archives() {
        let scratch = TempDir::new().unwrap();
        let remote = MemoryRemote::new();
        remote.add_file("/in/a_1.csv", b"payload");
        let store = MemoryRecordStore::new();
        let layout = layout();

        let orchestrator = TransferOrchestrator::new(&remote, &store, &layout, scratch.path());
        let outcome = orchestrator
            .transfer(&rule(), "a_1.csv", &records(&[11, 12, 13]))
            .unwrap();

        assert_eq!(outcome, TransferOutcome::UploadedAndArchived);
        assert_eq!(store.uploaded_record_ids(), vec![11, 12, 13]);
        assert!(store.uploads().iter().all(|u| u.content == b"payload" && u.field == "P_FILE"));
        assert!(!remote.has_file("/in/a_1.csv"));
        assert!(remote.has_file("/in/archive/a_1.csv"));
        assert!(!scratch.path().join("a_1.csv").exists());
    }

    #[test]
    fn test_no_records_touches_nothing() {
        let scratch = TempDir::new().unwrap();
        let remote = MemoryRemote::new();
        remote.add_file("/in/a_1.csv", b"payload");
        let store = MemoryRecordStore::new();
        let layout = layout();

        let orchestrator = TransferOrchestrator::new(&remote, &store, &layout, scratch.path());
        let outcome = orchestrator.transfer(&rule(), "a_1.csv", &[]).unwrap();

        assert_eq!(outcome, TransferOutcome::SkippedNoMatch);
        assert!(remote.downloads().is_empty());
        assert!(remote.renames().is_empty());
        assert!(store.uploads().is_empty());
        assert!(remote.has_file("/in/a_1.csv"));
    }

    #[test]
    fn test_upload_failure_leaves_file_live_and_cleans_up() {
        let scratch = TempDir::new().unwrap();
        let remote = MemoryRemote::new();
        remote.add_file("/in/a_1.csv", b"payload");
        let store = MemoryRecordStore::new();
        store.fail_upload_for(12);
        let layout = layout();

        let orchestrator = TransferOrchestrator::new(&remote, &store, &layout, scratch.path());
        let err = orchestrator
            .transfer(&rule(), "a_1.csv", &records(&[11, 12, 13]))
            .unwrap_err();

        match err {
            RelayError::Upload {
                record_id,
                uploaded_before,
                ..
            } => {
                assert_eq!(record_id, 12);
                assert_eq!(uploaded_before, 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(store.uploaded_record_ids(), vec![11, 12]);
        assert!(remote.has_file("/in/a_1.csv"));
        assert!(remote.renames().is_empty());
        assert!(!scratch.path().join("a_1.csv").exists());
    }

    #[test]
    fn test_archive_replaces_stale_entry() {
        let scratch = TempDir::new().unwrap();
        let remote = MemoryRemote::new();
        remote.add_file("/in/a_1.csv", b"new");
        remote.add_file("/in/archive/a_1.csv", b"old");
        let store = MemoryRecordStore::new();
        let layout = layout();

        let orchestrator = TransferOrchestrator::new(&remote, &store, &layout, scratch.path());
        orchestrator
            .transfer(&rule(), "a_1.csv", &records(&[1]))
            .unwrap();

        assert_eq!(remote.deletes(), vec!["/in/archive/a_1.csv"]);
        assert_eq!(remote.file_content("/in/archive/a_1.csv").unwrap(), b"new");
        assert!(!remote.has_file("/in/a_1.csv"));
    }

    #[test]
    fn test_archive_entry_gone_before_delete_still_moves_file() {
        let scratch = TempDir::new().unwrap();
        let remote = MemoryRemote::new();
        remote.add_file("/in/a_1.csv", b"new");
        remote.add_file("/in/archive/a_1.csv", b"old");
        remote.vanish_before_delete("/in/archive/a_1.csv");
        let store = MemoryRecordStore::new();
        let layout = layout();

        let orchestrator = TransferOrchestrator::new(&remote, &store, &layout, scratch.path());
        let outcome = orchestrator
            .transfer(&rule(), "a_1.csv", &records(&[1]))
            .unwrap();

        assert_eq!(outcome, TransferOutcome::UploadedAndArchived);
        assert_eq!(remote.deletes(), vec!["/in/archive/a_1.csv"]);
        assert_eq!(
            remote.renames(),
            vec![("/in/a_1.csv".to_string(), "/in/archive/a_1.csv".to_string())]
        );
        assert_eq!(remote.file_content("/in/archive/a_1.csv").unwrap(), b"new");
        assert!(!remote.has_file("/in/a_1.csv"));
    }

    #[test]
    fn test_download_without_local_file() {
        let scratch = TempDir::new().unwrap();
        let remote = MemoryRemote::new();
        remote.add_file("/in/a_1.csv", b"payload");
        remote.download_leaves_no_file("/in/a_1.csv");
        let store = MemoryRecordStore::new();
        let layout = layout();

        let orchestrator = TransferOrchestrator::new(&remote, &store, &layout, scratch.path());
        let outcome = orchestrator
            .transfer(&rule(), "a_1.csv", &records(&[1]))
            .unwrap();

        assert_eq!(outcome, TransferOutcome::DownloadedButNotFound);
        assert!(store.uploads().is_empty());
        assert!(remote.has_file("/in/a_1.csv"));
    }

    #[test]
    fn test_download_and_archive_errors_name_the_file() {
        let scratch = TempDir::new().unwrap();
        let remote = MemoryRemote::new();
        remote.add_file("/in/a_1.csv", b"1");
        remote.add_file("/in/a_2.csv", b"2");
        remote.fail_on(RemoteOp::Download, "/in/a_1.csv");
        remote.fail_on(RemoteOp::Rename, "/in/a_2.csv");
        let store = MemoryRecordStore::new();
        let layout = layout();
        let orchestrator = TransferOrchestrator::new(&remote, &store, &layout, scratch.path());

        let err = orchestrator
            .transfer(&rule(), "a_1.csv", &records(&[1]))
            .unwrap_err();
        assert!(matches!(err, RelayError::Download { ref file, .. } if file == "a_1.csv"));

        let err = orchestrator
            .transfer(&rule(), "a_2.csv", &records(&[1]))
            .unwrap_err();
        assert!(matches!(err, RelayError::Archive { ref to, .. } if to == "/in/archive/a_2.csv"));
        assert!(!scratch.path().join("a_2.csv").exists());
    }
}
