//! Error types for remote filesystem operations

use std::fmt;
use std::io;
use thiserror::Error;

/// The remote operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOp {
    Connect,
    List,
    Stat,
    Download,
    Rename,
    Delete,
}

impl fmt::Display for RemoteOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RemoteOp::Connect => "connect",
            RemoteOp::List => "list",
            RemoteOp::Stat => "stat",
            RemoteOp::Download => "download",
            RemoteOp::Rename => "rename",
            RemoteOp::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Remote filesystem error
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("SSH error during {op} of '{target}': {source}")]
    Ssh {
        op: RemoteOp,
        target: String,
        #[source]
        source: ssh2::Error,
    },

    #[error("IO error during {op} of '{target}': {source}")]
    Io {
        op: RemoteOp,
        target: String,
        #[source]
        source: io::Error,
    },

    #[error("Authentication failed for '{user}': {reason}")]
    Auth { user: String, reason: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{op} of '{target}' failed: {message}")]
    Other {
        op: RemoteOp,
        target: String,
        message: String,
    },
}

impl RemoteError {
    pub fn ssh(op: RemoteOp, target: impl Into<String>, source: ssh2::Error) -> Self {
        RemoteError::Ssh {
            op,
            target: target.into(),
            source,
        }
    }

    pub fn io(op: RemoteOp, target: impl Into<String>, source: io::Error) -> Self {
        RemoteError::Io {
            op,
            target: target.into(),
            source,
        }
    }

    pub fn other(op: RemoteOp, target: impl Into<String>, message: impl Into<String>) -> Self {
        RemoteError::Other {
            op,
            target: target.into(),
            message: message.into(),
        }
    }

    /// True when the server reported that the path does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            RemoteError::NotFound(_) => true,
            RemoteError::Ssh { source, .. } => is_sftp_no_such_file(source),
            RemoteError::Io { source, .. } => source.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// LIBSSH2_FX_NO_SUCH_FILE
const SFTP_NO_SUCH_FILE: i32 = 2;

pub(crate) fn is_sftp_no_such_file(err: &ssh2::Error) -> bool {
    matches!(err.code(), ssh2::ErrorCode::SFTP(SFTP_NO_SUCH_FILE))
}

/// Result type alias
pub type Result<T> = std::result::Result<T, RemoteError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_detection() {
        assert!(RemoteError::NotFound("/in/a.csv".to_string()).is_not_found());
        let io_missing = RemoteError::io(
            RemoteOp::Download,
            "/in/a.csv",
            io::Error::new(io::ErrorKind::NotFound, "gone"),
        );
        assert!(io_missing.is_not_found());
        let other = RemoteError::other(RemoteOp::Rename, "/in/a.csv", "permission denied");
        assert!(!other.is_not_found());
    }

    #[test]
    fn test_display_names_operation_and_target() {
        let err = RemoteError::other(RemoteOp::Rename, "/in/a.csv", "permission denied");
        assert_eq!(err.to_string(), "rename of '/in/a.csv' failed: permission denied");
    }
}
