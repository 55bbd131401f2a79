//! Incremental log reader
//!
//! Follows a text log file across polls, returning only the lines appended
//! since the previous read. A trailing line without a newline is left in the
//! file and picked up once a later append completes it. A file that shrank
//! (rotation, truncation) is re-read from the beginning.

use std::fs::File;
use std::io;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

/// Tail-follow state for one log file
#[derive(Debug)]
pub struct LogTail {
    path: PathBuf,
    offset: Option<u64>,
}

impl LogTail {
    pub fn new(path: PathBuf) -> Self {
        Self { path, offset: None }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read all complete lines appended since the previous call.
    ///
    /// On the first call, `from_start` selects whether the whole existing
    /// file is consumed or only appends after the current end.
    pub fn read_new_lines(&mut self, from_start: bool) -> io::Result<Vec<String>> {
        let mut file = File::open(&self.path)?;
        let len = file.metadata()?.len();

        let pos = match self.offset {
            None => {
                if from_start {
                    0
                } else {
                    len
                }
            }
            Some(offset) if offset > len => {
                debug!(path = ?self.path, offset, len, "log file shrank, rereading from start");
                0
            }
            Some(offset) => offset,
        };

        if pos >= len {
            self.offset = Some(pos);
            return Ok(Vec::new());
        }

        file.seek(SeekFrom::Start(pos))?;
        let mut buf = Vec::with_capacity((len - pos) as usize);
        file.read_to_end(&mut buf)?;

        // Consume only up to the last line boundary; an unterminated tail
        // stays in the file for the next read.
        let consumed = match buf.iter().rposition(|&b| b == b'\n') {
            Some(idx) => idx + 1,
            None => 0,
        };

        let mut lines = Vec::new();
        if consumed > 0 {
            for raw in buf[..consumed - 1].split(|&b| b == b'\n') {
                let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
                lines.push(String::from_utf8_lossy(raw).into_owned());
            }
        }

        self.offset = Some(pos + consumed as u64);
        trace!(path = ?self.path, lines = lines.len(), offset = pos + consumed as u64, "log tail read");
        Ok(lines)
    }
}
