//! SFTP session over `ssh2`.
//!
//! One [`SftpSession`] is opened per run and reused for every call; dropping
//! it disconnects the SSH session.

use crate::error::{is_sftp_no_such_file, RemoteError, RemoteOp, Result};
use crate::{DeleteOutcome, RemoteConnector, RemoteFs};
use chrono::{DateTime, TimeZone, Utc};
use filetime::FileTime;
use ssh2::{Session, Sftp};
use std::fs::File;
use std::io;
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Connection settings for the SFTP server.
#[derive(Debug, Clone)]
pub struct SftpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: Option<String>,
    pub private_key: Option<PathBuf>,
}

impl SftpSettings {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Opens authenticated SFTP sessions.
#[derive(Debug, Clone)]
pub struct SftpConnector {
    settings: SftpSettings,
}

impl SftpConnector {
    pub fn new(settings: SftpSettings) -> Self {
        Self { settings }
    }

    fn authenticate(&self, session: &Session) -> Result<()> {
        let user = &self.settings.username;
        let mut auth_errs: Vec<String> = Vec::new();

        if let Some(password) = &self.settings.password {
            if let Err(e) = session.userauth_password(user, password) {
                auth_errs.push(format!("password: {}", e));
            }
        }

        if !session.authenticated() {
            if let Some(key) = &self.settings.private_key {
                if let Err(e) = session.userauth_pubkey_file(user, None, key, None) {
                    auth_errs.push(format!("key {}: {}", key.display(), e));
                }
            }
        }

        if !session.authenticated() && self.settings.password.is_none() {
            if let Err(e) = session.userauth_agent(user) {
                auth_errs.push(format!("agent: {}", e));
            }
        }

        if !session.authenticated() {
            let reason = if auth_errs.is_empty() {
                "no credentials accepted".to_string()
            } else {
                auth_errs.join("; ")
            };
            return Err(RemoteError::Auth {
                user: user.clone(),
                reason,
            });
        }
        Ok(())
    }
}

impl RemoteConnector for SftpConnector {
    type Session = SftpSession;

    fn connect(&self) -> Result<SftpSession> {
        let addr = self.settings.address();
        debug!("Connecting to SFTP server {}", addr);

        let tcp = TcpStream::connect(&addr).map_err(|e| RemoteError::io(RemoteOp::Connect, &addr, e))?;
        let mut session = Session::new().map_err(|e| RemoteError::ssh(RemoteOp::Connect, &addr, e))?;
        session.set_tcp_stream(tcp);
        session
            .handshake()
            .map_err(|e| RemoteError::ssh(RemoteOp::Connect, &addr, e))?;

        self.authenticate(&session)?;

        let sftp = session
            .sftp()
            .map_err(|e| RemoteError::ssh(RemoteOp::Connect, &addr, e))?;

        debug!("SFTP session open on {}", addr);
        Ok(SftpSession { session, sftp })
    }
}

/// An open SFTP session.
pub struct SftpSession {
    session: Session,
    sftp: Sftp,
}

impl Drop for SftpSession {
    fn drop(&mut self) {
        if let Err(e) = self.session.disconnect(None, "filerelay run complete", None) {
            warn!("Failed to close SFTP session cleanly: {}", e);
        }
    }
}

impl RemoteFs for SftpSession {
    fn list_directory(&self, path: &str) -> Result<Vec<String>> {
        let entries = self
            .sftp
            .readdir(Path::new(path))
            .map_err(|e| RemoteError::ssh(RemoteOp::List, path, e))?;

        Ok(entries
            .into_iter()
            .filter_map(|(entry, _)| {
                entry
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
            })
            .collect())
    }

    fn is_directory(&self, path: &str) -> Result<bool> {
        let stat = self
            .sftp
            .stat(Path::new(path))
            .map_err(|e| RemoteError::ssh(RemoteOp::Stat, path, e))?;
        Ok(stat.is_dir())
    }

    fn download(&self, remote_path: &str, local_path: &Path) -> Result<()> {
        let mut remote = self
            .sftp
            .open(Path::new(remote_path))
            .map_err(|e| RemoteError::ssh(RemoteOp::Download, remote_path, e))?;
        let mtime = remote.stat().ok().and_then(|s| s.mtime);

        let mut local =
            File::create(local_path).map_err(|e| RemoteError::io(RemoteOp::Download, remote_path, e))?;
        io::copy(&mut remote, &mut local)
            .map_err(|e| RemoteError::io(RemoteOp::Download, remote_path, e))?;
        drop(local);

        if let Some(mtime) = mtime {
            filetime::set_file_mtime(local_path, FileTime::from_unix_time(mtime as i64, 0))
                .map_err(|e| RemoteError::io(RemoteOp::Download, remote_path, e))?;
        }
        Ok(())
    }

    fn rename(&self, old_path: &str, new_path: &str) -> Result<()> {
        self.sftp
            .rename(Path::new(old_path), Path::new(new_path), None)
            .map_err(|e| RemoteError::ssh(RemoteOp::Rename, old_path, e))
    }

    fn delete(&self, path: &str) -> Result<DeleteOutcome> {
        match self.sftp.unlink(Path::new(path)) {
            Ok(()) => Ok(DeleteOutcome::Deleted),
            Err(e) if is_sftp_no_such_file(&e) => Ok(DeleteOutcome::AlreadyAbsent),
            Err(e) => Err(RemoteError::ssh(RemoteOp::Delete, path, e)),
        }
    }

    fn exists(&self, path: &str) -> Result<bool> {
        match self.sftp.stat(Path::new(path)) {
            Ok(_) => Ok(true),
            Err(e) if is_sftp_no_such_file(&e) => Ok(false),
            Err(e) => Err(RemoteError::ssh(RemoteOp::Stat, path, e)),
        }
    }

    fn modified_time(&self, path: &str) -> Result<DateTime<Utc>> {
        let stat = self
            .sftp
            .stat(Path::new(path))
            .map_err(|e| RemoteError::ssh(RemoteOp::Stat, path, e))?;
        let mtime = stat
            .mtime
            .ok_or_else(|| RemoteError::other(RemoteOp::Stat, path, "server did not report mtime"))?;
        Utc.timestamp_opt(mtime as i64, 0)
            .single()
            .ok_or_else(|| RemoteError::other(RemoteOp::Stat, path, format!("invalid mtime {}", mtime)))
    }
}
