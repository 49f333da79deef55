//! In-memory remote filesystem.

use chrono::{DateTime, Utc};
use filerelay_remote::{
    DeleteOutcome, RemoteConnector, RemoteError, RemoteFs, RemoteOp, Result,
};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// A call made against the fake, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    Connect,
    List(String),
    IsDirectory(String),
    Download(String),
    Rename(String, String),
    Delete(String),
    Exists(String),
    Stat(String),
}

#[derive(Debug, Clone)]
enum EntryKind {
    File { content: Vec<u8>, modified: DateTime<Utc> },
    Dir,
}

#[derive(Debug, Clone)]
struct Entry {
    path: String,
    kind: EntryKind,
}

#[derive(Debug, Default)]
struct RemoteState {
    entries: Vec<Entry>,
    calls: Vec<RemoteCall>,
    failures: Vec<(RemoteOp, String)>,
    fail_connect: bool,
    /// Downloads that report success without writing a local file.
    silent_downloads: Vec<String>,
    /// Entries removed by someone else just before our delete reaches them.
    vanishing: Vec<String>,
    open_sessions: usize,
    closed_sessions: usize,
}

impl RemoteState {
    fn position(&self, path: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.path == path)
    }

    fn check_failure(&self, op: RemoteOp, path: &str) -> Result<()> {
        if self.failures.iter().any(|(o, p)| *o == op && p == path) {
            return Err(RemoteError::other(op, path, "injected failure"));
        }
        Ok(())
    }
}

/// Shared in-memory remote filesystem. Clones share state.
///
/// `rename` refuses to overwrite an existing target, like SFTPv3 servers do.
#[derive(Debug, Clone, Default)]
pub struct MemoryRemote {
    state: Arc<Mutex<RemoteState>>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RemoteState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Add a file with the current time as modification time.
    pub fn add_file(&self, path: &str, content: &[u8]) {
        self.add_file_with_mtime(path, content, Utc::now());
    }

    pub fn add_file_with_mtime(&self, path: &str, content: &[u8], modified: DateTime<Utc>) {
        let mut state = self.lock();
        let kind = EntryKind::File {
            content: content.to_vec(),
            modified,
        };
        match state.position(path) {
            Some(idx) => state.entries[idx].kind = kind,
            None => state.entries.push(Entry {
                path: path.to_string(),
                kind,
            }),
        }
    }

    pub fn add_dir(&self, path: &str) {
        let mut state = self.lock();
        let path = path.trim_end_matches('/').to_string();
        if state.position(&path).is_none() {
            state.entries.push(Entry {
                path,
                kind: EntryKind::Dir,
            });
        }
    }

    /// Make every `op` on `path` fail.
    pub fn fail_on(&self, op: RemoteOp, path: &str) {
        self.lock().failures.push((op, path.to_string()));
    }

    pub fn fail_connect(&self) {
        self.lock().fail_connect = true;
    }

    /// Make a download of `path` succeed without producing a local file.
    pub fn download_leaves_no_file(&self, path: &str) {
        self.lock().silent_downloads.push(path.to_string());
    }

    /// Make a delete of `path` find it already gone. The entry still
    /// disappears, as if removed between an `exists` check and the delete.
    pub fn vanish_before_delete(&self, path: &str) {
        self.lock().vanishing.push(path.to_string());
    }

    pub fn has_file(&self, path: &str) -> bool {
        let state = self.lock();
        state
            .entries
            .iter()
            .any(|e| e.path == path && matches!(e.kind, EntryKind::File { .. }))
    }

    pub fn file_content(&self, path: &str) -> Option<Vec<u8>> {
        let state = self.lock();
        state.entries.iter().find(|e| e.path == path).and_then(|e| match &e.kind {
            EntryKind::File { content, .. } => Some(content.clone()),
            EntryKind::Dir => None,
        })
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn downloads(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                RemoteCall::Download(path) => Some(path),
                _ => None,
            })
            .collect()
    }

    pub fn renames(&self) -> Vec<(String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                RemoteCall::Rename(from, to) => Some((from, to)),
                _ => None,
            })
            .collect()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                RemoteCall::Delete(path) => Some(path),
                _ => None,
            })
            .collect()
    }

    /// (opened, closed) session counts.
    pub fn session_counts(&self) -> (usize, usize) {
        let state = self.lock();
        (state.open_sessions, state.closed_sessions)
    }
}

impl RemoteFs for MemoryRemote {
    fn list_directory(&self, path: &str) -> Result<Vec<String>> {
        let mut state = self.lock();
        state.calls.push(RemoteCall::List(path.to_string()));
        state.check_failure(RemoteOp::List, path)?;

        let prefix = format!("{}/", path.trim_end_matches('/'));
        if state.position(path.trim_end_matches('/')).is_none()
            && !state.entries.iter().any(|e| e.path.starts_with(&prefix))
        {
            return Err(RemoteError::NotFound(path.to_string()));
        }

        Ok(state
            .entries
            .iter()
            .filter_map(|e| e.path.strip_prefix(&prefix))
            .filter(|rest| !rest.is_empty() && !rest.contains('/'))
            .map(str::to_string)
            .collect())
    }

    fn is_directory(&self, path: &str) -> Result<bool> {
        let mut state = self.lock();
        state.calls.push(RemoteCall::IsDirectory(path.to_string()));
        state.check_failure(RemoteOp::Stat, path)?;
        let path = path.trim_end_matches('/');
        match state.entries.iter().find(|e| e.path == path) {
            Some(entry) => Ok(matches!(entry.kind, EntryKind::Dir)),
            None => Err(RemoteError::NotFound(path.to_string())),
        }
    }

    fn download(&self, remote_path: &str, local_path: &Path) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(RemoteCall::Download(remote_path.to_string()));
        state.check_failure(RemoteOp::Download, remote_path)?;

        let content = match state.entries.iter().find(|e| e.path == remote_path) {
            Some(Entry {
                kind: EntryKind::File { content, .. },
                ..
            }) => content.clone(),
            _ => return Err(RemoteError::NotFound(remote_path.to_string())),
        };
        if state.silent_downloads.iter().any(|p| p == remote_path) {
            return Ok(());
        }
        std::fs::write(local_path, content)
            .map_err(|e| RemoteError::io(RemoteOp::Download, remote_path, e))
    }

    fn rename(&self, old_path: &str, new_path: &str) -> Result<()> {
        let mut state = self.lock();
        state
            .calls
            .push(RemoteCall::Rename(old_path.to_string(), new_path.to_string()));
        state.check_failure(RemoteOp::Rename, old_path)?;

        if state.position(new_path).is_some() {
            return Err(RemoteError::other(
                RemoteOp::Rename,
                old_path,
                format!("target already exists: {}", new_path),
            ));
        }
        match state.position(old_path) {
            Some(idx) => {
                state.entries[idx].path = new_path.to_string();
                Ok(())
            }
            None => Err(RemoteError::NotFound(old_path.to_string())),
        }
    }

    fn delete(&self, path: &str) -> Result<DeleteOutcome> {
        let mut state = self.lock();
        state.calls.push(RemoteCall::Delete(path.to_string()));
        state.check_failure(RemoteOp::Delete, path)?;
        let vanished = state.vanishing.iter().any(|p| p == path);
        match state.position(path) {
            Some(idx) => {
                state.entries.remove(idx);
                if vanished {
                    Ok(DeleteOutcome::AlreadyAbsent)
                } else {
                    Ok(DeleteOutcome::Deleted)
                }
            }
            None => Ok(DeleteOutcome::AlreadyAbsent),
        }
    }

    fn exists(&self, path: &str) -> Result<bool> {
        let mut state = self.lock();
        state.calls.push(RemoteCall::Exists(path.to_string()));
        state.check_failure(RemoteOp::Stat, path)?;
        Ok(state.position(path).is_some())
    }

    fn modified_time(&self, path: &str) -> Result<DateTime<Utc>> {
        let mut state = self.lock();
        state.calls.push(RemoteCall::Stat(path.to_string()));
        state.check_failure(RemoteOp::Stat, path)?;
        match state.entries.iter().find(|e| e.path == path) {
            Some(Entry {
                kind: EntryKind::File { modified, .. },
                ..
            }) => Ok(*modified),
            Some(_) => Err(RemoteError::other(RemoteOp::Stat, path, "not a file")),
            None => Err(RemoteError::NotFound(path.to_string())),
        }
    }
}

/// Session handed out by [`MemoryRemote::connect`]; counts as closed on drop.
#[derive(Debug)]
pub struct MemorySession {
    remote: MemoryRemote,
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        self.remote.lock().closed_sessions += 1;
    }
}

impl RemoteConnector for MemoryRemote {
    type Session = MemorySession;

    fn connect(&self) -> Result<MemorySession> {
        let mut state = self.lock();
        state.calls.push(RemoteCall::Connect);
        if state.fail_connect {
            return Err(RemoteError::other(RemoteOp::Connect, "memory", "connection refused"));
        }
        state.open_sessions += 1;
        drop(state);
        Ok(MemorySession {
            remote: self.clone(),
        })
    }
}

impl RemoteFs for MemorySession {
    fn list_directory(&self, path: &str) -> Result<Vec<String>> {
        self.remote.list_directory(path)
    }

    fn is_directory(&self, path: &str) -> Result<bool> {
        self.remote.is_directory(path)
    }

    fn download(&self, remote_path: &str, local_path: &Path) -> Result<()> {
        self.remote.download(remote_path, local_path)
    }

    fn rename(&self, old_path: &str, new_path: &str) -> Result<()> {
        self.remote.rename(old_path, new_path)
    }

    fn delete(&self, path: &str) -> Result<DeleteOutcome> {
        self.remote.delete(path)
    }

    fn exists(&self, path: &str) -> Result<bool> {
        self.remote.exists(path)
    }

    fn modified_time(&self, path: &str) -> Result<DateTime<Utc>> {
        self.remote.modified_time(path)
    }
}
