use crate::error::ReaderError;
use crate::position::PositionRecord;

use super::CursorStore;

/// A cursor backend used when persistence is disabled (`pos = "-"`).
///
/// Every operation succeeds as a no-op; `read` always returns `None`, so a
/// `Reader` built on a `NullCursor` always starts fresh per its `start`
/// policy.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCursor;

impl NullCursor {
    pub fn new() -> Self {
        NullCursor
    }
}

impl CursorStore for NullCursor {
    fn read(&self) -> Result<Option<PositionRecord>, ReaderError> {
        Ok(None)
    }

    fn commit(&mut self, _p: PositionRecord) -> Result<(), ReaderError> {
        Ok(())
    }

    fn rollback(&mut self) -> Result<bool, ReaderError> {
        Ok(false)
    }

    fn clean(&mut self) -> Result<(), ReaderError> {
        Ok(())
    }
}
