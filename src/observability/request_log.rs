//! Raw request/response logging.
//!
//! # Responsibilities
//! - Append one JSON line per request/response pair
//! - Rotate the file after a fixed number of entries
//! - Survive `close()`: a later write reopens the file in append mode
//!
//! # Design Decisions
//! - Shared through `Arc`; handlers keep the instance they were bound to
//! - Rotated files are renamed `<path>.1`, `<path>.2`, ... in order
//! - Opening an existing log continues it: its lines count toward the
//!   current file and numbering resumes after the highest `<path>.N`
//! - Write failures are logged and dropped; request handling never fails
//!   because of the request log

use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

/// One logged request/response pair.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestLogEntry<'a> {
    pub timestamp_ms: u64,
    pub connection_id: u64,
    pub peer: &'a str,
    pub verb: &'a str,
    pub resource: &'a str,
    pub request: String,
    pub status: u16,
    pub response: String,
}

impl<'a> RequestLogEntry<'a> {
    pub fn now(
        connection_id: u64,
        peer: &'a str,
        verb: &'a str,
        resource: &'a str,
        request: &[u8],
        status: u16,
        response: &[u8],
    ) -> Self {
        Self {
            timestamp_ms: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64,
            connection_id,
            peer,
            verb,
            resource,
            request: String::from_utf8_lossy(request).into_owned(),
            status,
            response: String::from_utf8_lossy(response).into_owned(),
        }
    }
}

/// Rotating, count-bounded request log.
#[derive(Debug)]
pub struct RequestLogger {
    path: PathBuf,
    rotation_count: usize,
    state: Mutex<LogState>,
}

#[derive(Debug)]
struct LogState {
    writer: Option<BufWriter<File>>,
    /// Entries in the current file.
    entries: usize,
    /// Files rotated out so far.
    rotations: u64,
    total: u64,
}

impl RequestLogger {
    /// Open (or create) the log at `path`, rotating every `rotation_count` entries.
    pub fn new(path: impl Into<PathBuf>, rotation_count: usize) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let entries = count_lines(&path)?;
        let rotations = highest_rotation(&path)?;
        let writer = open_append(&path)?;

        tracing::info!(
            path = %path.display(),
            rotation_count,
            existing_entries = entries,
            rotations,
            "Request logging started"
        );
        Ok(Self {
            path,
            rotation_count: rotation_count.max(1),
            state: Mutex::new(LogState {
                writer: Some(writer),
                entries,
                rotations,
                total: 0,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rotation_count(&self) -> usize {
        self.rotation_count
    }

    /// Total entries written by this logger.
    pub fn entries_written(&self) -> u64 {
        self.lock().total
    }

    /// Append an entry, rotating first if the current file is full.
    pub fn log(&self, entry: &RequestLogEntry<'_>) -> io::Result<()> {
        let line = serde_json::to_string(entry)?;
        let mut state = self.lock();

        if state.entries >= self.rotation_count {
            self.rotate(&mut state)?;
        }
        if state.writer.is_none() {
            state.writer = Some(open_append(&self.path)?);
        }
        if let Some(writer) = state.writer.as_mut() {
            writer.write_all(line.as_bytes())?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }
        state.entries += 1;
        state.total += 1;
        Ok(())
    }

    /// Flush and close the current file.
    pub fn close(&self) {
        let mut state = self.lock();
        if let Some(mut writer) = state.writer.take() {
            if let Err(e) = writer.flush() {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to flush request log");
            }
        }
        tracing::info!(path = %self.path.display(), entries = state.total, "Request log closed");
    }

    fn rotate(&self, state: &mut LogState) -> io::Result<()> {
        if let Some(mut writer) = state.writer.take() {
            writer.flush()?;
        }
        state.rotations += 1;
        let rotated = rotated_path(&self.path, state.rotations);
        fs::rename(&self.path, &rotated)?;
        state.writer = Some(open_append(&self.path)?);
        state.entries = 0;

        tracing::debug!(rotated = %rotated.display(), "Request log rotated");
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LogState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for RequestLogger {
    fn drop(&mut self) {
        if let Some(writer) = self.state.get_mut().unwrap_or_else(PoisonError::into_inner).writer.as_mut() {
            let _ = writer.flush();
        }
    }
}

/// Path a file is renamed to on its `n`th rotation.
pub fn rotated_path(path: &Path, n: u64) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".{}", n));
    PathBuf::from(name)
}

/// Lines already in `path`; zero when it does not exist.
fn count_lines(path: &Path) -> io::Result<usize> {
    match File::open(path) {
        Ok(file) => Ok(BufReader::new(file).split(b'\n').count()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(e),
    }
}

/// Highest `n` for which `<path>.n` exists; zero when none does.
fn highest_rotation(path: &Path) -> io::Result<u64> {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return Ok(0);
    };
    let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(dir) => dir.to_path_buf(),
        None => PathBuf::from("."),
    };
    let prefix = format!("{}.", name);

    let mut highest = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let n = entry
            .file_name()
            .to_str()
            .and_then(|f| f.strip_prefix(&prefix))
            .and_then(|suffix| suffix.parse::<u64>().ok());
        if let Some(n) = n {
            highest = highest.max(n);
        }
    }
    Ok(highest)
}

fn open_append(path: &Path) -> io::Result<BufWriter<File>> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(BufWriter::new(file))
}
