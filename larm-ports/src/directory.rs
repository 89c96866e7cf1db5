//! ## larm-ports::directory
//! **Alert storage on a filesystem**
//!
//! Layout under the root directory:
//!
//! ```text
//! session
//! alerts/<escaped session id>_<alert id>/alert
//! alerts/<escaped session id>_<alert id>/<entry id>_header
//! alerts/<escaped session id>_<alert id>/<entry id>_<chunk index>
//! ```
//!
//! Session ids keep ASCII letters, digits and `.`; any other byte is written
//! as `-` followed by its two hex digits, so distinct ids never share a
//! directory.
//!
//! An alert directory handed out by `next_alert` is removed when the next
//! alert is requested.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use larm_core::{PortError, StoragePort};
use larm_entry::{Entry, EntryKind};
use tracing::{debug, warn};

const ALERTS_DIR: &str = "alerts";
const ALERT_FILE: &str = "alert";
const SESSION_FILE: &str = "session";

#[derive(Debug)]
pub struct DirectoryStorage {
    root: PathBuf,
    replayed: Option<PathBuf>,
    pending: VecDeque<PathBuf>,
}

impl DirectoryStorage {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, PortError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join(ALERTS_DIR))?;
        Ok(Self {
            root,
            replayed: None,
            pending: VecDeque::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn alert_dir(&self, entry: &Entry<'_>) -> PathBuf {
        let session = escape_session(entry.session_id());
        self.root
            .join(ALERTS_DIR)
            .join(format!("{}_{}", session, entry.alert_id()))
    }

    /// Alert directories, oldest session name first, then by alert id.
    fn alert_dirs(&self) -> Result<Vec<PathBuf>, PortError> {
        let mut dirs: Vec<(String, u32, PathBuf)> = Vec::new();
        for dir in fs::read_dir(self.root.join(ALERTS_DIR))? {
            let path = dir?.path();
            if !path.join(ALERT_FILE).is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some((session, alert_id)) = name.rsplit_once('_') else {
                continue;
            };
            let Ok(alert_id) = alert_id.parse::<u32>() else {
                continue;
            };
            dirs.push((session.to_owned(), alert_id, path));
        }
        dirs.sort();
        Ok(dirs.into_iter().map(|(_, _, path)| path).collect())
    }

    fn forget_replayed(&mut self) {
        self.pending.clear();
        if let Some(dir) = self.replayed.take() {
            if let Err(err) = fs::remove_dir_all(&dir) {
                warn!(dir = %dir.display(), error = %err, "Could not remove replayed alert");
            }
        }
    }
}

/// Payload files in entry order, header before chunks.
fn payload_files(dir: &Path) -> Result<VecDeque<PathBuf>, PortError> {
    let mut files: Vec<(u16, u16, PathBuf)> = Vec::new();
    for file in fs::read_dir(dir)? {
        let path = file?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some((entry_id, part)) = name.split_once('_') else {
            continue;
        };
        let Ok(entry_id) = entry_id.parse::<u16>() else {
            continue;
        };
        let order = match part {
            "header" => 0,
            chunk => match chunk.parse::<u16>() {
                Ok(index) => index,
                Err(_) => continue,
            },
        };
        files.push((entry_id, order, path));
    }
    files.sort();
    Ok(files.into_iter().map(|(_, _, path)| path).collect())
}

fn escape_session(session_id: &[u8]) -> String {
    let mut out = String::with_capacity(session_id.len());
    for &b in session_id {
        if b.is_ascii_alphanumeric() || b == b'.' {
            out.push(char::from(b));
        } else {
            out.push('-');
            out.push_str(&hex::encode([b]));
        }
    }
    out
}

fn read_into(path: &Path, buf: &mut [u8]) -> Result<Option<usize>, PortError> {
    let data = fs::read(path)?;
    let dst = buf
        .get_mut(..data.len())
        .ok_or(PortError::Rejected("buffer too small"))?;
    dst.copy_from_slice(&data);
    Ok(Some(data.len()))
}

impl StoragePort for DirectoryStorage {
    fn store_alert(&mut self, entry: &Entry<'_>, _overwrite: bool) -> Result<(), PortError> {
        let dir = self.alert_dir(entry);
        fs::create_dir_all(&dir)?;
        fs::write(dir.join(ALERT_FILE), entry.as_bytes())?;
        debug!(dir = %dir.display(), "Alert stored");
        Ok(())
    }

    fn store_payload(&mut self, entry: &Entry<'_>, _overwrite: bool) -> Result<(), PortError> {
        let dir = self.alert_dir(entry);
        if !dir.is_dir() {
            return Err(PortError::Rejected("payload without a stored alert"));
        }
        let name = match entry.kind() {
            EntryKind::PayloadHeader => format!("{}_header", entry.entry_id()),
            _ => format!("{}_{}", entry.entry_id(), entry.chunk_index()),
        };
        fs::write(dir.join(name), entry.as_bytes())?;
        Ok(())
    }

    fn next_alert(&mut self, buf: &mut [u8]) -> Result<Option<usize>, PortError> {
        self.forget_replayed();
        let Some(dir) = self.alert_dirs()?.into_iter().next() else {
            return Ok(None);
        };
        let read = read_into(&dir.join(ALERT_FILE), buf)?;
        self.pending = payload_files(&dir)?;
        self.replayed = Some(dir);
        Ok(read)
    }

    fn next_payload(
        &mut self,
        _session_id: &[u8],
        _alert_id: u32,
        buf: &mut [u8],
    ) -> Result<Option<usize>, PortError> {
        match self.pending.pop_front() {
            Some(path) => read_into(&path, buf),
            None => Ok(None),
        }
    }

    fn store_session(&mut self, record: &[u8]) -> Result<(), PortError> {
        fs::write(self.root.join(SESSION_FILE), record)?;
        Ok(())
    }

    fn load_session(&mut self, buf: &mut [u8]) -> Result<Option<usize>, PortError> {
        let path = self.root.join(SESSION_FILE);
        if !path.is_file() {
            return Ok(None);
        }
        read_into(&path, buf)
    }
}
