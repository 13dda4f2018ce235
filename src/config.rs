use std::path::PathBuf;

use crate::cursor::LockMode;
use crate::error::ReaderError;

/// Where the reader starts when the cursor has no stored position (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Start {
    Begin,
    End,
    First,
}

/// Whether `read()` follows appends past open-time EOF of the active
/// segment (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum End {
    Fixed,
    Future,
}

/// Construction parameters for a [`crate::Reader`] (C8, the ambient
/// configuration layer feeding the reader's exhaustive validation).
///
/// Either `log` or `pos`/`cursor` (but not both of the latter) must be
/// supplied; see [`ReaderConfig::validate`] for the complete rule set.
/// `cursor` takes an already-constructed [`crate::cursor::Cursor`] (for
/// callers who want a custom lock mode or a pre-seeded `NullCursor`); `pos`
/// is a plain path the reader builds a [`crate::cursor::FileCursor`] from.
pub struct ReaderConfig {
    pub log: Option<PathBuf>,
    pub pos: Option<PathBuf>,
    pub cursor: Option<crate::cursor::Cursor>,
    pub start: Start,
    pub end: End,
    pub lock: LockMode,
    pub check_inode: bool,
    pub check_lastline: bool,
    pub check_log: bool,
    pub autofix_cursor: bool,
    pub rollback_period: u64,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        ReaderConfig {
            log: None,
            pos: None,
            cursor: None,
            start: Start::Begin,
            end: End::Fixed,
            lock: LockMode::None,
            check_inode: true,
            check_lastline: true,
            check_log: true,
            autofix_cursor: false,
            rollback_period: 0,
        }
    }
}

impl ReaderConfig {
    pub fn builder() -> ReaderConfigBuilder {
        ReaderConfigBuilder::default()
    }

    /// Validate the combination of fields per §4.2's construction rules.
    ///
    /// Checked in this order: check-flag combination, then position-source
    /// mutual exclusion/presence, then the `pos = "-"` + no-log rule.
    pub fn validate(&self) -> Result<(), ReaderError> {
        if !self.check_inode && !self.check_lastline {
            return Err(ReaderError::config(
                "at least one of check_inode or check_lastline must be enabled",
            ));
        }

        if self.pos.is_some() && self.cursor.is_some() {
            return Err(ReaderError::config(
                "pos and cursor are mutually exclusive",
            ));
        }

        if self.pos.is_none() && self.cursor.is_none() {
            return Err(ReaderError::config(
                "exactly one of pos or cursor must be supplied",
            ));
        }

        match self.pos.as_deref().map(|p| p.as_os_str()) {
            Some(os) if os == "-" && self.log.is_none() => {
                return Err(ReaderError::config(
                    "pos = \"-\" requires an explicit log path",
                ));
            }
            _ => {}
        }

        if let Some(pos) = &self.pos {
            if pos.as_os_str() != "-" && !pos.exists() && self.log.is_none() {
                return Err(ReaderError::config(
                    "position file does not exist and no log was supplied",
                ));
            }
        }

        Ok(())
    }
}

/// Builder mirroring the teacher's fluent construction style; produces a
/// validated [`ReaderConfig`].
#[derive(Default)]
pub struct ReaderConfigBuilder {
    config: ReaderConfig,
}

impl ReaderConfigBuilder {
    pub fn log(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.log = Some(path.into());
        self
    }

    pub fn pos(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pos = Some(path.into());
        self
    }

    pub fn cursor(mut self, cursor: impl Into<crate::cursor::Cursor>) -> Self {
        self.config.cursor = Some(cursor.into());
        self
    }

    pub fn start(mut self, start: Start) -> Self {
        self.config.start = start;
        self
    }

    pub fn end(mut self, end: End) -> Self {
        self.config.end = end;
        self
    }

    pub fn lock(mut self, lock: LockMode) -> Self {
        self.config.lock = lock;
        self
    }

    pub fn check_inode(mut self, enabled: bool) -> Self {
        self.config.check_inode = enabled;
        self
    }

    pub fn check_lastline(mut self, enabled: bool) -> Self {
        self.config.check_lastline = enabled;
        self
    }

    pub fn check_log(mut self, enabled: bool) -> Self {
        self.config.check_log = enabled;
        self
    }

    pub fn autofix_cursor(mut self, enabled: bool) -> Self {
        self.config.autofix_cursor = enabled;
        self
    }

    pub fn rollback_period(mut self, seconds: u64) -> Self {
        self.config.rollback_period = seconds;
        self
    }

    pub fn build(self) -> Result<ReaderConfig, ReaderError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
