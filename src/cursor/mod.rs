//! Cursor store: persists and retrieves [`PositionRecord`]s (C2–C4).
//!
//! The set of cursor backends is closed (a durable file, or a no-op), so it
//! is modeled as an enum rather than a trait object.

mod file;
mod null;

pub use file::{FileCursor, LockMode};
pub use null::NullCursor;

use crate::error::ReaderError;
use crate::position::PositionRecord;

/// Operations common to every cursor backend.
pub trait CursorStore {
    /// The newest persisted position, if any.
    fn read(&self) -> Result<Option<PositionRecord>, ReaderError>;

    /// Atomically persist `p` as the newest position, applying the
    /// backend's rollback-window retention policy.
    fn commit(&mut self, p: PositionRecord) -> Result<(), ReaderError>;

    /// Discard the newest position. Returns `true` iff a strictly older
    /// position remains and becomes the newest.
    fn rollback(&mut self) -> Result<bool, ReaderError>;

    /// Remove all persisted state.
    fn clean(&mut self) -> Result<(), ReaderError>;
}

/// A cursor backend: a durable file, or a no-op sink.
pub enum Cursor {
    File(FileCursor),
    Null(NullCursor),
}

impl CursorStore for Cursor {
    fn read(&self) -> Result<Option<PositionRecord>, ReaderError> {
        match self {
            Cursor::File(c) => c.read(),
            Cursor::Null(c) => c.read(),
        }
    }

    fn commit(&mut self, p: PositionRecord) -> Result<(), ReaderError> {
        match self {
            Cursor::File(c) => c.commit(p),
            Cursor::Null(c) => c.commit(p),
        }
    }

    fn rollback(&mut self) -> Result<bool, ReaderError> {
        match self {
            Cursor::File(c) => c.rollback(),
            Cursor::Null(c) => c.rollback(),
        }
    }

    fn clean(&mut self) -> Result<(), ReaderError> {
        match self {
            Cursor::File(c) => c.clean(),
            Cursor::Null(c) => c.clean(),
        }
    }
}

impl From<FileCursor> for Cursor {
    fn from(c: FileCursor) -> Self {
        Cursor::File(c)
    }
}

impl From<NullCursor> for Cursor {
    fn from(c: NullCursor) -> Self {
        Cursor::Null(c)
    }
}
