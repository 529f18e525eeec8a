use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

/// Errors from reading the watched log file.
///
/// All of these are transient: the caller keeps the cursor and retries
/// on the next poll.
#[derive(Error, Debug)]
pub enum TailError {
    #[error("Failed to read log file: {0}")]
    Io(#[from] io::Error),
}

/// Result of a single poll of the watched file.
#[derive(Debug, Default)]
pub struct TailPoll {
    /// Complete lines appended since the previous poll, in order.
    pub lines: Vec<String>,
    /// True when the file shrank below the stored cursor and the tailer
    /// reset to offset 0 (rotation or truncation).
    pub rotated: bool,
}

/// Incrementally reads a growing text file.
///
/// On construction the cursor starts at end-of-file so that historical
/// content is never replayed; only lines appended afterwards are
/// returned. A missing file is not an error, it just yields nothing
/// until the watched application creates it.
pub struct LogTailer {
    path: PathBuf,
    cursor: u64,
    last_known_size: u64,
    // Unterminated trailing bytes held back until their newline arrives
    pending: String,
}

impl LogTailer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        if size > 0 {
            debug!(path = %path.display(), offset = size, "Tailing from end of existing log");
        }
        Self {
            path,
            cursor: size,
            last_known_size: size,
            pending: String::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current byte offset into the watched file.
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Read lines appended since the previous call.
    ///
    /// Never reprocesses a line it already returned. If the observed
    /// file size is smaller than the cursor the file was rotated or
    /// truncated; the tailer resets to offset 0 and reads the new
    /// content from its start. Invalid UTF-8 is replaced, never fatal.
    pub fn poll(&mut self) -> Result<TailPoll, TailError> {
        let metadata = match std::fs::metadata(&self.path) {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(TailPoll::default()),
            Err(e) => return Err(TailError::Io(e)),
        };

        let size = metadata.len();
        let mut rotated = false;
        if size < self.cursor {
            warn!(
                path = %self.path.display(),
                cursor = self.cursor,
                size,
                "Log file shrank below read offset, treating as rotation"
            );
            self.cursor = 0;
            self.pending.clear();
            rotated = true;
        }
        self.last_known_size = size;

        if size == self.cursor {
            return Ok(TailPoll {
                lines: Vec::new(),
                rotated,
            });
        }

        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(self.cursor))?;

        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        self.cursor += buf.len() as u64;

        self.pending.push_str(&String::from_utf8_lossy(&buf));

        let mut lines = Vec::new();
        while let Some(idx) = self.pending.find('\n') {
            let line: String = self.pending.drain(..=idx).collect();
            lines.push(line.trim_end_matches(['\r', '\n']).to_string());
        }

        Ok(TailPoll { lines, rotated })
    }
}

/// Probe the platform-conventional locations for the watched
/// application's output log.
///
/// Used when no explicit path is configured. Returns the first
/// candidate that exists.
pub fn discover_log_path() -> Option<PathBuf> {
    let mut candidates: Vec<PathBuf> = Vec::new();

    // Windows: %APPDATA%\..\LocalLow\VRChat\VRChat\output_log.txt
    if let Ok(appdata) = std::env::var("APPDATA") {
        if let Some(parent) = Path::new(&appdata).parent() {
            candidates.push(
                parent
                    .join("LocalLow")
                    .join("VRChat")
                    .join("VRChat")
                    .join("output_log.txt"),
            );
        }
    }

    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join("AppData/LocalLow/VRChat/VRChat/output_log.txt"));
        candidates.push(home.join(".config/VRChat/VRChat/output_log.txt"));
    }

    candidates.into_iter().find(|p| p.exists())
}
