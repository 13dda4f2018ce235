use std::fmt;

/// Errors surfaced by [`crate::Reader`] and the cursor store it drives.
///
/// Variants mirror the taxonomy of construction-time, persistence, and
/// rotation-recovery failures; each carries enough context to identify
/// where in the pipeline it was raised.
#[derive(Debug, Clone, PartialEq)]
pub enum ReaderError {
    /// Invalid or contradictory construction parameters.
    Config { reason: String },
    /// The cursor file is empty.
    CursorMissing { path: String },
    /// The cursor file exists but failed to parse.
    CursorCorrupt { path: String, reason: String },
    /// The cursor's recorded `logfile` disagrees with the supplied log and
    /// `check_log` is enabled.
    LogfileMismatch { expected: String, found: String },
    /// A segment file exists but could not be opened for reading.
    UnreadableLog { path: String, source: String },
    /// Rotation-recovery exhausted every candidate segment.
    PositionLost { log_path: String },
    /// A nonblocking lock attempt found the cursor lock already held.
    LockBusy { path: String },
    /// `lag()` was called with no open handle.
    LagUnavailable,
    /// An underlying filesystem error, surfaced verbatim with context.
    Io { context: String, source: String },
    /// The caller's per-line filter raised an error; the line that
    /// triggered it is not considered consumed.
    Filter(FilterError),
}

impl fmt::Display for ReaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReaderError::Config { reason } => write!(f, "invalid configuration: {reason}"),
            ReaderError::CursorMissing { path } => write!(f, "cursor file is empty: {path}"),
            ReaderError::CursorCorrupt { path, reason } => {
                write!(f, "cursor file {path} is corrupt: {reason}")
            }
            ReaderError::LogfileMismatch { expected, found } => write!(
                f,
                "cursor logfile mismatch: cursor has '{expected}', caller supplied '{found}'"
            ),
            ReaderError::UnreadableLog { path, source } => {
                write!(f, "could not open log segment {path}: {source}")
            }
            ReaderError::PositionLost { log_path } => write!(
                f,
                "could not match cursor position to any segment of {log_path}"
            ),
            ReaderError::LockBusy { path } => write!(f, "cursor lock {path} is held"),
            ReaderError::LagUnavailable => write!(f, "lag() requires an open handle"),
            ReaderError::Io { context, source } => write!(f, "{context}: {source}"),
            ReaderError::Filter(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ReaderError {}

impl ReaderError {
    pub fn config(reason: impl Into<String>) -> Self {
        ReaderError::Config {
            reason: reason.into(),
        }
    }

    pub fn from_io_error(e: std::io::Error, context: &str) -> Self {
        ReaderError::Io {
            context: context.to_string(),
            source: e.to_string(),
        }
    }
}

/// Error raised by a caller-supplied per-line filter.
///
/// Propagated verbatim to the caller of [`crate::Reader::read`]; the
/// reader's internal position is *not* advanced past the triggering line,
/// so the next call to `read()` retries from the same point.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterError(pub String);

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "filter error: {}", self.0)
    }
}

impl std::error::Error for FilterError {}

impl From<FilterError> for ReaderError {
    fn from(e: FilterError) -> Self {
        ReaderError::Filter(e)
    }
}
