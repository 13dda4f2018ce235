use std::path::{Path, PathBuf};

/// Maximum number of trailing bytes of the last consumed line retained in a
/// [`PositionRecord`], per spec.
pub const MAX_LAST_LINE_BYTES: usize = 255;

/// A durable snapshot of where a [`crate::Reader`] should resume from.
///
/// `offset` is the byte at which the *next* read begins within whichever
/// physical segment it refers to; `log_path` is always the logical base
/// path, never a `.N`-suffixed rotated segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionRecord {
    pub offset: u64,
    pub inode: Option<u64>,
    pub last_line: Option<Vec<u8>>,
    pub log_path: PathBuf,
    pub commit_time: Option<u64>,
}

impl PositionRecord {
    pub fn new(offset: u64, log_path: impl Into<PathBuf>) -> Self {
        PositionRecord {
            offset,
            inode: None,
            last_line: None,
            log_path: log_path.into(),
            commit_time: None,
        }
    }

    /// Truncate `last_line` on the left to at most [`MAX_LAST_LINE_BYTES`].
    pub fn with_last_line(mut self, mut line: Vec<u8>) -> Self {
        if line.len() > MAX_LAST_LINE_BYTES {
            let start = line.len() - MAX_LAST_LINE_BYTES;
            line.drain(..start);
        }
        self.last_line = Some(line);
        self
    }

    pub fn with_inode(mut self, inode: u64) -> Self {
        self.inode = Some(inode);
        self
    }

    pub fn with_commit_time(mut self, commit_time: u64) -> Self {
        self.commit_time = Some(commit_time);
        self
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }
}
