//! Resumable, rotation-aware sequential reading of text log files.
//!
//! A [`Reader`] locates the correct physical segment of a logical log
//! (`log`, `log.1`, `log.2`, …), reads newline-terminated records from it,
//! and periodically commits its progress to a durable [`cursor::Cursor`].
//! On restart it transparently resumes from that cursor even if the log has
//! been rotated underneath it, using the inode and/or trailing-bytes
//! identity checks in the rotation-recovery protocol to locate the segment
//! the cursor refers to.
//!
//! ```no_run
//! use rotail::{ReaderConfig, Reader};
//!
//! # fn main() -> Result<(), rotail::ReaderError> {
//! let config = ReaderConfig::builder()
//!     .log("/var/log/app.log")
//!     .pos("/var/lib/app/app.log.pos")
//!     .build()?;
//! let mut reader = Reader::new(config)?;
//! while let Some(line) = reader.read()? {
//!     print!("{line}");
//! }
//! reader.commit(None)?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod cursor;
pub mod error;
pub mod position;
pub mod reader;
pub mod segment;
pub mod telemetry;

pub use config::{End, ReaderConfig, ReaderConfigBuilder, Start};
pub use cursor::{Cursor, CursorStore, FileCursor, LockMode, NullCursor};
pub use error::{FilterError, ReaderError};
pub use position::PositionRecord;
pub use reader::{Filter, Reader};
