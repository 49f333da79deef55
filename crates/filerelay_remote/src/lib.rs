//! Filerelay Remote - the remote filesystem contract.
//!
//! The reconciliation pipeline only talks to the remote side through
//! [`RemoteConnector`] and [`RemoteFs`]. The production implementation is an
//! SFTP session ([`sftp::SftpConnector`]); tests use the in-memory fake from
//! `filerelay_test_utils`.
//!
//! Paths are plain strings: configured directory prefixes concatenated with
//! bare file names (see [`join_remote`]).

pub mod error;
pub mod sftp;

use chrono::{DateTime, Utc};
use std::path::Path;

pub use error::{RemoteError, RemoteOp, Result};
pub use sftp::{SftpConnector, SftpSession, SftpSettings};

/// Result of a best-effort delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    AlreadyAbsent,
}

impl DeleteOutcome {
    pub fn was_deleted(self) -> bool {
        matches!(self, DeleteOutcome::Deleted)
    }
}

/// Opens a session against the remote filesystem.
pub trait RemoteConnector {
    type Session: RemoteFs;

    /// Connect and authenticate. The session is released when dropped.
    fn connect(&self) -> Result<Self::Session>;
}

/// Blocking operations over one open remote session.
pub trait RemoteFs {
    /// Bare entry names of a directory, in server order. `.` and `..` are not
    /// included.
    fn list_directory(&self, path: &str) -> Result<Vec<String>>;

    fn is_directory(&self, path: &str) -> Result<bool>;

    /// Copy a remote file to `local_path`, preserving its modification time.
    fn download(&self, remote_path: &str, local_path: &Path) -> Result<()>;

    fn rename(&self, old_path: &str, new_path: &str) -> Result<()>;

    /// Delete a file; a missing file is reported as `AlreadyAbsent`.
    fn delete(&self, path: &str) -> Result<DeleteOutcome>;

    fn exists(&self, path: &str) -> Result<bool>;

    fn modified_time(&self, path: &str) -> Result<DateTime<Utc>>;
}

impl<T: RemoteFs + ?Sized> RemoteFs for &T {
    fn list_directory(&self, path: &str) -> Result<Vec<String>> {
        (**self).list_directory(path)
    }

    fn is_directory(&self, path: &str) -> Result<bool> {
        (**self).is_directory(path)
    }

    fn download(&self, remote_path: &str, local_path: &Path) -> Result<()> {
        (**self).download(remote_path, local_path)
    }

    fn rename(&self, old_path: &str, new_path: &str) -> Result<()> {
        (**self).rename(old_path, new_path)
    }

    fn delete(&self, path: &str) -> Result<DeleteOutcome> {
        (**self).delete(path)
    }

    fn exists(&self, path: &str) -> Result<bool> {
        (**self).exists(path)
    }

    fn modified_time(&self, path: &str) -> Result<DateTime<Utc>> {
        (**self).modified_time(path)
    }
}

/// Concatenate a directory prefix with a bare file name.
///
/// Prefixes are normalised to end with `/` at configuration load, so this is
/// plain concatenation; a missing separator is still tolerated.
pub fn join_remote(dir: &str, name: &str) -> String {
    if dir.is_empty() || dir.ends_with('/') {
        format!("{}{}", dir, name)
    } else {
        format!("{}/{}", dir, name)
    }
}

/// Normalise a directory prefix so it ends with exactly one `/`.
pub fn normalize_dir(dir: &str) -> String {
    let trimmed = dir.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    format!("{}/", trimmed.trim_end_matches('/'))
}
