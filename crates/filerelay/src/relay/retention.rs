//! Age-based purge of the archive directory.

use super::error::RelayError;
use chrono::{DateTime, Duration, Utc};
use filerelay_remote::{join_remote, DeleteOutcome, RemoteError, RemoteFs};
use tracing::{debug, error, info};

/// What one sweep found and did.
#[derive(Debug, Default)]
pub struct SweepReport {
    /// Files older than the cutoff, in listing order.
    pub candidates: Vec<String>,
    pub deleted: Vec<String>,
    /// Per-item failures; none of them stopped the sweep.
    pub failures: Vec<RelayError>,
}

/// True when the cutoff (`now - retention_days`) is strictly after `modified`.
/// `now` is supplied by the caller; a batch run passes its start time.
pub fn is_expired(modified: DateTime<Utc>, retention_days: u32, now: DateTime<Utc>) -> bool {
    match now.checked_sub_signed(Duration::days(i64::from(retention_days))) {
        Some(cutoff) => cutoff > modified,
        None => false,
    }
}

/// Find archive entries past retention. Directories are skipped; entries
/// that cannot be inspected are logged and reported as failures.
pub fn find_expired<R: RemoteFs>(
    remote: &R,
    archive_dir: &str,
    listing: &[String],
    retention_days: Option<u32>,
    now: DateTime<Utc>,
) -> SweepReport {
    let mut report = SweepReport::default();
    let Some(days) = retention_days else {
        return report;
    };

    for name in listing {
        let path = join_remote(archive_dir, name);
        let inspected = remote.is_directory(&path).and_then(|is_dir| {
            if is_dir {
                Ok(None)
            } else {
                remote.modified_time(&path).map(Some)
            }
        });
        match inspected {
            Ok(Some(modified)) if is_expired(modified, days, now) => {
                report.candidates.push(name.clone())
            }
            Ok(_) => {}
            Err(source) => record_failure(&mut report.failures, name, source),
        }
    }
    report
}

fn record_failure(failures: &mut Vec<RelayError>, name: &str, source: RemoteError) {
    let failure = RelayError::RetentionItem {
        file: name.to_string(),
        source,
    };
    error!("{} | {}", failure.message(), failure.description());
    failures.push(failure);
}

/// Delete archive entries older than `retention_days`.
///
/// No-op when retention is not configured. One failed entry never stops the
/// rest of the sweep.
pub fn sweep<R: RemoteFs>(
    remote: &R,
    archive_dir: &str,
    listing: &[String],
    retention_days: Option<u32>,
    now: DateTime<Utc>,
) -> SweepReport {
    let mut report = find_expired(remote, archive_dir, listing, retention_days, now);
    if retention_days.is_none() {
        return report;
    }
    info!("{} files to purge found in {}", report.candidates.len(), archive_dir);

    for name in &report.candidates {
        let path = join_remote(archive_dir, name);
        match remote.delete(&path) {
            Ok(DeleteOutcome::Deleted) => {
                debug!("Archived file \"{}\" has been deleted", name);
                report.deleted.push(name.clone());
            }
            Ok(DeleteOutcome::AlreadyAbsent) => {
                debug!("Archived file \"{}\" was already gone", name)
            }
            Err(source) => record_failure(&mut report.failures, name, source),
        }
    }
    report
}
