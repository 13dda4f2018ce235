mod recovery;

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;

use crate::config::{End, ReaderConfig, Start};
use crate::cursor::{Cursor, CursorStore, FileCursor};
use crate::error::{FilterError, ReaderError};
use crate::position::PositionRecord;
use crate::segment::{last_segment_index, segment_path};

/// A caller-owned per-line transform. Errors propagate to the caller of
/// [`Reader::read`] unchanged. The underlying line has already been
/// consumed from the segment by the time the filter runs, so the next call
/// to `read()` returns the line after it, not a retry of the same one.
pub type Filter = Box<dyn FnMut(String) -> Result<String, FilterError> + Send>;

/// Open-handle owner, line reader, rotation detector, and lag computer
/// (C6). One `Reader` exclusively owns its cursor and file handle.
pub struct Reader {
    log_path: PathBuf,
    segment_index: u64,
    last_segment_index: u64,
    handle: Option<File>,
    inode: Option<u64>,
    last_line: Vec<u8>,
    eof_limit: Option<u64>,
    cursor: Cursor,
    check_inode: bool,
    check_lastline: bool,
    end: End,
    filter: Option<Filter>,
    stdin_mode: bool,
    stdin_offset: u64,
    stdin_pending: Vec<u8>,
}

impl Reader {
    /// Construct a `Reader` per §4.2: resolve the cursor, reconcile it
    /// against the on-disk log via rotation-recovery (or start fresh per
    /// `start`), and snapshot `eof_limit` when `end = fixed`.
    #[tracing::instrument(level = "debug", skip(config))]
    pub fn new(mut config: ReaderConfig) -> Result<Self, ReaderError> {
        config.validate()?;

        let mut cursor = resolve_cursor(&mut config)?;
        let stored = cursor.read()?;

        let log_path = config
            .log
            .clone()
            .or_else(|| stored.as_ref().map(|p| p.log_path.clone()))
            .ok_or_else(|| ReaderError::config("no log path supplied and cursor has none stored"))?;

        if let Some(stored) = &stored {
            if config.check_log
                && config.log.is_some()
                && stored.log_path != log_path
                && !stored.log_path.as_os_str().is_empty()
            {
                return Err(ReaderError::LogfileMismatch {
                    expected: stored.log_path.display().to_string(),
                    found: log_path.display().to_string(),
                });
            }
        }

        if log_path.as_os_str() == "-" {
            return Ok(Reader {
                log_path,
                segment_index: 0,
                last_segment_index: 0,
                handle: None,
                inode: None,
                last_line: Vec::new(),
                eof_limit: None,
                cursor,
                check_inode: config.check_inode,
                check_lastline: config.check_lastline,
                end: config.end,
                filter: None,
                stdin_mode: true,
                stdin_offset: 0,
                stdin_pending: Vec::new(),
            });
        }

        let last_index = last_segment_index(&log_path);
        let eof_limit = if matches!(config.end, End::Fixed) {
            Some(active_file_size(&log_path))
        } else {
            None
        };

        let mut reader = Reader {
            log_path: log_path.clone(),
            segment_index: 0,
            last_segment_index: last_index,
            handle: None,
            inode: None,
            last_line: Vec::new(),
            eof_limit,
            cursor,
            check_inode: config.check_inode,
            check_lastline: config.check_lastline,
            end: config.end,
            filter: None,
            stdin_mode: false,
            stdin_offset: 0,
            stdin_pending: Vec::new(),
        };

        match stored {
            Some(p) => match recovery::recover(
                &log_path,
                last_index,
                &p,
                config.check_inode,
                config.check_lastline,
                config.end,
            ) {
                Ok(recovered) => {
                    reader.segment_index = recovered.segment_index;
                    reader.inode = recovered.inode;
                    reader.last_line = p.last_line.clone().unwrap_or_default();
                    reader.handle = Some(recovered.file);
                }
                Err(ReaderError::PositionLost { .. }) if config.autofix_cursor => {
                    reader.cursor.clean()?;
                    reader.start_fresh(config.start)?;
                }
                Err(e) => return Err(e),
            },
            None => reader.start_fresh(config.start)?,
        }

        Ok(reader)
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    fn start_fresh(&mut self, start: Start) -> Result<(), ReaderError> {
        match start {
            Start::Begin => {
                self.segment_index = 0;
                self.open_current_segment()?;
            }
            Start::End => {
                self.segment_index = 0;
                self.open_current_segment()?;
                if let Some(file) = self.handle.as_mut() {
                    recovery::seek_to_last_line_boundary(file)?;
                }
            }
            Start::First => {
                self.segment_index = self.last_segment_index;
                self.open_current_segment()?;
            }
        }
        Ok(())
    }

    /// Opens `segment_index`. A segment that does not yet exist is not an
    /// error here (the active file may not have been created yet, or this
    /// is a rotated index that was never written) — the reader simply has
    /// no handle until one later appears.
    fn open_current_segment(&mut self) -> Result<(), ReaderError> {
        let path = segment_path(&self.log_path, self.segment_index);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.handle = None;
                self.inode = None;
                return Ok(());
            }
            Err(e) => return Err(ReaderError::from_io_error(e, "opening log segment")),
        };
        self.inode = if self.check_inode {
            Some(recovery::inode_of(&file)?)
        } else {
            None
        };
        self.handle = Some(file);
        Ok(())
    }

    /// Next complete line (terminator included), or `None` if nothing more
    /// is currently available (§4.2 `read()`). A filter error is
    /// propagated after the underlying line has already been consumed, so
    /// a subsequent `read()` moves on to the following line.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn read(&mut self) -> Result<Option<String>, ReaderError> {
        let raw = if self.stdin_mode {
            self.read_stdin_line()
        } else {
            self.read_file_line()?
        };

        let Some(raw) = raw else {
            return Ok(None);
        };

        self.last_line = raw.clone();
        let text = String::from_utf8_lossy(&raw).into_owned();

        match &mut self.filter {
            Some(filter) => filter(text).map(Some).map_err(ReaderError::from),
            None => Ok(Some(text)),
        }
    }

    fn read_file_line(&mut self) -> Result<Option<Vec<u8>>, ReaderError> {
        loop {
            let Some(file) = self.handle.as_mut() else {
                return Ok(None);
            };

            if matches!(self.end, End::Fixed) && self.segment_index == 0 {
                let pos = file
                    .stream_position()
                    .map_err(|e| ReaderError::from_io_error(e, "reading current offset"))?;
                if let Some(limit) = self.eof_limit {
                    if pos >= limit {
                        return Ok(None);
                    }
                }
            }

            let start = file
                .stream_position()
                .map_err(|e| ReaderError::from_io_error(e, "reading current offset"))?;
            let mut buf = Vec::new();
            let bytes_read = read_until_newline(file, &mut buf)
                .map_err(|e| ReaderError::from_io_error(e, "reading log segment"))?;

            if bytes_read == 0 {
                if self.walk_to_next_newer_segment()? {
                    continue;
                }
                return Ok(None);
            }

            if buf.last() == Some(&b'\n') {
                return Ok(Some(buf));
            }

            // Partial trailing bytes. Treat as a real record only when this
            // segment is known not to grow further.
            if self.is_last_non_empty_segment()? {
                file.seek(SeekFrom::Start(start))
                    .map_err(|e| ReaderError::from_io_error(e, "seeking back incomplete line"))?;
                return Ok(None);
            }
            return Ok(Some(buf));
        }
    }

    fn is_last_non_empty_segment(&self) -> Result<bool, ReaderError> {
        if self.segment_index == 0 {
            return Ok(true);
        }
        let newer = segment_path(&self.log_path, self.segment_index - 1);
        let size = std::fs::metadata(&newer).map(|m| m.len()).unwrap_or(0);
        Ok(size == 0)
    }

    /// Walk to the next-newer segment on EOF (§4.6), re-opening it fresh
    /// rather than trusting a stale handle across a possible rename that
    /// happened concurrently with the read (the conservative re-validation
    /// the open design question in spec §9 calls for).
    fn walk_to_next_newer_segment(&mut self) -> Result<bool, ReaderError> {
        if self.segment_index == 0 {
            return Ok(false);
        }
        self.segment_index -= 1;
        self.open_current_segment()?;
        self.last_segment_index = self.last_segment_index.max(last_segment_index(&self.log_path));
        Ok(true)
    }

    fn read_stdin_line(&mut self) -> Option<Vec<u8>> {
        loop {
            if let Some(pos) = self.stdin_pending.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = self.stdin_pending.drain(..=pos).collect();
                self.stdin_offset += line.len() as u64;
                return Some(line);
            }

            let mut chunk = [0u8; 4096];
            let Ok(n) = std::io::stdin().read(&mut chunk) else {
                return None;
            };
            if n == 0 {
                if self.stdin_pending.is_empty() {
                    return None;
                }
                let line = std::mem::take(&mut self.stdin_pending);
                self.stdin_offset += line.len() as u64;
                return Some(line);
            }
            self.stdin_pending.extend_from_slice(&chunk[..n]);
        }
    }

    /// Snapshot the current position (§4.2 `position()`).
    pub fn position(&self) -> PositionRecord {
        if self.stdin_mode {
            return PositionRecord::new(self.stdin_offset, self.log_path.clone())
                .with_last_line(self.last_line.clone());
        }

        let offset = match &self.handle {
            Some(file) => {
                let mut file_ref = file.try_clone().ok();
                file_ref
                    .as_mut()
                    .and_then(|f| f.stream_position().ok())
                    .unwrap_or(0)
            }
            None => 0,
        };

        let mut record = PositionRecord::new(offset, self.log_path.clone());
        if self.check_inode {
            if let Some(inode) = self.inode {
                record = record.with_inode(inode);
            }
        }
        if self.check_lastline && !self.last_line.is_empty() {
            record = record.with_last_line(self.last_line.clone());
        }
        record
    }

    /// Persist `p` (default: [`Reader::position`]) via the cursor.
    /// Does nothing if `p` was defaulted from a reader with no offset to
    /// commit (i.e. no handle was ever opened); a caller-supplied `p` is
    /// always delegated to the cursor, regardless of the reader's own
    /// handle state.
    #[tracing::instrument(level = "debug", skip(self, p))]
    pub fn commit(&mut self, p: Option<PositionRecord>) -> Result<(), ReaderError> {
        let p = match p {
            Some(p) => p,
            None => {
                if !self.stdin_mode && self.handle.is_none() {
                    return Ok(());
                }
                self.position()
            }
        };
        self.cursor.commit(p)
    }

    /// Discard the newest committed position (§4.3).
    pub fn rollback(&mut self) -> Result<bool, ReaderError> {
        self.cursor.rollback()
    }

    /// Bytes between the current position and the end of the newest data
    /// visible to the reader (§4.2 `lag()`).
    pub fn lag(&self) -> Result<u64, ReaderError> {
        if self.stdin_mode {
            return Err(ReaderError::LagUnavailable);
        }
        let Some(file) = &self.handle else {
            return Err(ReaderError::LagUnavailable);
        };

        let mut total = 0u64;
        for index in 0..=self.segment_index {
            let path = segment_path(&self.log_path, index);
            total += std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        }

        let mut file_ref = file.try_clone().map_err(|e| ReaderError::from_io_error(e, "cloning handle for lag"))?;
        let offset = file_ref
            .stream_position()
            .map_err(|e| ReaderError::from_io_error(e, "reading current offset"))?;

        Ok(total.saturating_sub(offset))
    }

    /// Index of the segment currently being read (0 = active file).
    pub fn log_number(&self) -> u64 {
        self.segment_index
    }

    /// Physical path of the segment currently being read.
    pub fn log_name(&self) -> PathBuf {
        segment_path(&self.log_path, self.segment_index)
    }
}

fn resolve_cursor(config: &mut ReaderConfig) -> Result<Cursor, ReaderError> {
    if let Some(cursor) = config.cursor.take() {
        return Ok(cursor);
    }

    if let Some(path) = &config.pos {
        if path.as_os_str() == "-" {
            return Ok(Cursor::Null(crate::cursor::NullCursor::new()));
        }
        let rollback_period = (config.rollback_period > 0).then_some(config.rollback_period);
        let cursor = FileCursor::open(path, rollback_period, config.lock)?;
        return Ok(Cursor::File(cursor));
    }

    // `validate()` guarantees exactly one of `pos`/`cursor` is present.
    Err(ReaderError::config(
        "internal: resolve_cursor called without pos or cursor set",
    ))
}

fn active_file_size(log_path: &std::path::Path) -> u64 {
    std::fs::metadata(log_path).map(|m| m.len()).unwrap_or(0)
}

/// Read bytes up to and including the next `\n`, or until EOF. Returns the
/// number of bytes appended to `buf`.
fn read_until_newline(file: &mut File, buf: &mut Vec<u8>) -> std::io::Result<usize> {
    let mut total = 0;
    let mut byte = [0u8; 1];
    loop {
        let n = file.read(&mut byte)?;
        if n == 0 {
            break;
        }
        buf.push(byte[0]);
        total += 1;
        if byte[0] == b'\n' {
            break;
        }
    }
    Ok(total)
}
