use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use fs4::fs_std::FileExt;

use crate::error::ReaderError;
use crate::position::{MAX_LAST_LINE_BYTES, PositionRecord};

use super::CursorStore;

/// Advisory locking behavior for a [`FileCursor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    None,
    Blocking,
    Nonblocking,
}

/// A cursor backend that persists position records to a text file,
/// replacing it atomically (temp-file-then-rename) on every commit.
///
/// Supports a bounded rollback window: when `rollback_period` is set, up to
/// three records are retained (the newest, plus up to one aged within the
/// window and one aged beyond it) so that [`FileCursor::rollback`] can step
/// back through progressively older checkpoints.
pub struct FileCursor {
    path: PathBuf,
    rollback_period: Option<u64>,
    records: Vec<PositionRecord>,
    _lock_file: Option<File>,
}

impl FileCursor {
    /// Open (or prepare to create) a file cursor at `path`.
    ///
    /// Reads any existing content immediately so that [`CursorStore::read`]
    /// is cheap; acquires the advisory lock per `lock` before doing so.
    #[tracing::instrument(level = "debug", skip(path), fields(path = %path.as_ref().display()))]
    pub fn open(
        path: impl AsRef<Path>,
        rollback_period: Option<u64>,
        lock: LockMode,
    ) -> Result<Self, ReaderError> {
        let path = path.as_ref().to_path_buf();
        let lock_file = acquire_lock(&path, lock)?;

        let records = if path.exists() {
            let content = fs::read_to_string(&path)
                .map_err(|e| ReaderError::from_io_error(e, "reading cursor file"))?;
            if content.trim().is_empty() {
                Vec::new()
            } else {
                parse_records(&content, &path)?
            }
        } else {
            Vec::new()
        };

        Ok(FileCursor {
            path,
            rollback_period,
            records,
            _lock_file: lock_file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_records(&self) -> Result<(), ReaderError> {
        let content = serialize_records(&self.records);
        atomic_write(&self.path, &content)
    }
}

fn acquire_lock(path: &Path, mode: LockMode) -> Result<Option<File>, ReaderError> {
    if mode == LockMode::None {
        return Ok(None);
    }

    let lock_path = lock_path_for(path);
    let lock_file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&lock_path)
        .map_err(|e| ReaderError::from_io_error(e, "opening cursor lock file"))?;

    match mode {
        LockMode::Blocking => {
            lock_file
                .lock_exclusive()
                .map_err(|e| ReaderError::from_io_error(e, "acquiring cursor lock"))?;
        }
        LockMode::Nonblocking => {
            let acquired = lock_file
                .try_lock_exclusive()
                .map_err(|e| ReaderError::from_io_error(e, "acquiring cursor lock"))?;
            if !acquired {
                return Err(ReaderError::LockBusy {
                    path: lock_path.display().to_string(),
                });
            }
        }
        LockMode::None => unreachable!(),
    }

    Ok(Some(lock_file))
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn lock_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

impl CursorStore for FileCursor {
    fn read(&self) -> Result<Option<PositionRecord>, ReaderError> {
        Ok(self.records.first().cloned())
    }

    #[tracing::instrument(level = "debug", skip(self, p), fields(offset = p.offset))]
    fn commit(&mut self, mut p: PositionRecord) -> Result<(), ReaderError> {
        // `committime` is present iff rollback is active (§4.3); the caller
        // (typically `Reader::position`) has no reason to know or care
        // about the cursor's rollback configuration, so we stamp it here.
        if self.rollback_period.is_some() && p.commit_time.is_none() {
            p.commit_time = Some(now_unix());
        }
        self.records = apply_rollback_window(&self.records, p, self.rollback_period);
        self.write_records()
    }

    fn rollback(&mut self) -> Result<bool, ReaderError> {
        if self.path.exists() {
            let content = fs::read_to_string(&self.path)
                .map_err(|e| ReaderError::from_io_error(e, "reading cursor file"))?;
            if !content.trim().is_empty() {
                self.records = parse_records(&content, &self.path)?;
            }
        }

        if self.records.len() < 2 {
            return Ok(false);
        }

        self.records.remove(0);
        self.write_records()?;
        Ok(true)
    }

    fn clean(&mut self) -> Result<(), ReaderError> {
        self.records.clear();
        if self.path.exists() {
            fs::remove_file(&self.path)
                .map_err(|e| ReaderError::from_io_error(e, "removing cursor file"))?;
        }
        Ok(())
    }
}

/// The five-case rollback-window retention policy (spec §4.3).
fn apply_rollback_window(
    existing: &[PositionRecord],
    p: PositionRecord,
    rollback_period: Option<u64>,
) -> Vec<PositionRecord> {
    let Some(period) = rollback_period.filter(|p| *p > 0) else {
        return vec![p];
    };

    let t = p.commit_time.unwrap_or(0);
    let age = |r: &PositionRecord| t.saturating_sub(r.commit_time.unwrap_or(t));

    if existing.is_empty() {
        return vec![p];
    }

    let r0 = &existing[0];
    if age(r0) > period {
        return vec![p, r0.clone()];
    }

    if existing.len() == 1 {
        return vec![p, r0.clone()];
    }

    let r1 = &existing[1];
    if age(r1) <= period {
        let mut new_records = vec![p];
        new_records.extend(existing[1..].iter().cloned());
        new_records
    } else {
        vec![p, r0.clone(), r1.clone()]
    }
}

// ================================================================================================
// TEXT SERIALIZATION FORMAT
// ================================================================================================

const RECORD_SEPARATOR: &str = "###";

fn serialize_records(records: &[PositionRecord]) -> String {
    let mut out = String::new();
    for (i, r) in records.iter().enumerate() {
        if i > 0 {
            out.push_str(RECORD_SEPARATOR);
            out.push('\n');
        }
        out.push_str(&serialize_record(r));
    }
    out
}

fn serialize_record(r: &PositionRecord) -> String {
    let mut out = String::new();
    out.push_str(&format!("logfile: {}\n", r.log_path.display()));
    out.push_str(&format!("position: {}\n", r.offset));
    if let Some(inode) = r.inode {
        out.push_str(&format!("inode: {inode}\n"));
    }
    if let Some(last_line) = &r.last_line {
        out.push_str(&format!("lastline: {}\n", escape_last_line(last_line)));
    }
    if let Some(commit_time) = r.commit_time {
        out.push_str(&format!("committime: {commit_time}\n"));
    }
    out
}

/// Escape embedded newlines/backslashes so the field stays on one line; the
/// cursor file format is line-oriented and `last_line` may itself end in a
/// `\n` (it includes the terminator of the line it was captured from).
fn escape_last_line(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}

fn unescape_last_line(text: &str) -> Vec<u8> {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('r') => out.push('\r'),
                Some('\\') => out.push('\\'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(ch);
        }
    }
    out.into_bytes()
}

fn parse_records(content: &str, path: &Path) -> Result<Vec<PositionRecord>, ReaderError> {
    let blocks: Vec<&str> = content.split(RECORD_SEPARATOR).collect();
    let mut records = Vec::with_capacity(blocks.len());
    for block in blocks {
        if block.trim().is_empty() {
            continue;
        }
        records.push(parse_record(block, path)?);
    }
    if records.is_empty() {
        return Err(ReaderError::CursorMissing {
            path: path.display().to_string(),
        });
    }
    Ok(records)
}

fn parse_record(block: &str, path: &Path) -> Result<PositionRecord, ReaderError> {
    let corrupt = |reason: &str| ReaderError::CursorCorrupt {
        path: path.display().to_string(),
        reason: reason.to_string(),
    };

    let mut log_path: Option<String> = None;
    let mut position: Option<u64> = None;
    let mut inode: Option<u64> = None;
    let mut last_line: Option<Vec<u8>> = None;
    let mut commit_time: Option<u64> = None;

    for line in block.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let Some((key, rest)) = line.split_once(':') else {
            return Err(corrupt(&format!("malformed line: {line:?}")));
        };

        match key {
            "logfile" => {
                if log_path.is_some() {
                    return Err(corrupt("duplicate logfile field"));
                }
                log_path = Some(rest.strip_prefix(' ').unwrap_or(rest).to_string());
            }
            "position" => {
                if position.is_some() {
                    return Err(corrupt("duplicate position field"));
                }
                position = Some(
                    rest.trim_start()
                        .parse::<u64>()
                        .map_err(|_| corrupt(&format!("invalid position value: {rest:?}")))?,
                );
            }
            "inode" => {
                if inode.is_some() {
                    return Err(corrupt("duplicate inode field"));
                }
                inode = Some(
                    rest.trim_start()
                        .parse::<u64>()
                        .map_err(|_| corrupt(&format!("invalid inode value: {rest:?}")))?,
                );
            }
            "lastline" => {
                if last_line.is_some() {
                    return Err(corrupt("duplicate lastline field"));
                }
                let value = rest.strip_prefix(' ').unwrap_or(rest);
                let bytes = unescape_last_line(value);
                let bytes = if bytes.len() > MAX_LAST_LINE_BYTES {
                    bytes[bytes.len() - MAX_LAST_LINE_BYTES..].to_vec()
                } else {
                    bytes
                };
                last_line = Some(bytes);
            }
            "committime" => {
                if commit_time.is_some() {
                    return Err(corrupt("duplicate committime field"));
                }
                commit_time = Some(
                    rest.trim_start()
                        .parse::<u64>()
                        .map_err(|_| corrupt(&format!("invalid committime value: {rest:?}")))?,
                );
            }
            other => return Err(corrupt(&format!("unknown field: {other:?}"))),
        }
    }

    let offset = position.ok_or_else(|| corrupt("missing position field"))?;
    let log_path = log_path.unwrap_or_default();

    Ok(PositionRecord {
        offset,
        inode,
        last_line,
        log_path: PathBuf::from(log_path),
        commit_time,
    })
}

fn atomic_write(path: &Path, content: &str) -> Result<(), ReaderError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_path = dir.join(format!(".{file_name}.tmp"));

    {
        let mut tmp_file = File::create(&tmp_path)
            .map_err(|e| ReaderError::from_io_error(e, "creating cursor temp file"))?;
        tmp_file
            .write_all(content.as_bytes())
            .map_err(|e| ReaderError::from_io_error(e, "writing cursor temp file"))?;
        tmp_file
            .sync_all()
            .map_err(|e| ReaderError::from_io_error(e, "syncing cursor temp file"))?;
    }

    set_permissions_0644(&tmp_path)?;

    fs::rename(&tmp_path, path)
        .map_err(|e| ReaderError::from_io_error(e, "renaming cursor temp file into place"))?;

    Ok(())
}

#[cfg(unix)]
fn set_permissions_0644(path: &Path) -> Result<(), ReaderError> {
    use std::os::unix::fs::PermissionsExt;
    let perms = fs::Permissions::from_mode(0o644);
    fs::set_permissions(path, perms)
        .map_err(|e| ReaderError::from_io_error(e, "setting cursor file permissions"))
}

#[cfg(not(unix))]
fn set_permissions_0644(_path: &Path) -> Result<(), ReaderError> {
    Ok(())
}
