use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{TempDir, tempdir};

/// An isolated scratch directory holding one logical log (`app.log`) and
/// its cursor (`app.log.pos`), cleaned up on drop.
pub struct LogDir {
    dir: TempDir,
}

impl LogDir {
    pub fn new() -> Self {
        LogDir {
            dir: tempdir().expect("failed to create temp dir"),
        }
    }

    pub fn log_path(&self) -> PathBuf {
        self.dir.path().join("app.log")
    }

    pub fn pos_path(&self) -> PathBuf {
        self.dir.path().join("app.log.pos")
    }

    pub fn segment(&self, index: u64) -> PathBuf {
        if index == 0 {
            self.log_path()
        } else {
            self.dir.path().join(format!("app.log.{index}"))
        }
    }

    pub fn write_log(&self, content: &[u8]) {
        write_file(&self.log_path(), content);
    }

    pub fn append_log(&self, content: &[u8]) {
        append_file(&self.log_path(), content);
    }

    pub fn write_segment(&self, index: u64, content: &[u8]) {
        write_file(&self.segment(index), content);
    }

    pub fn append_log_segment(&self, index: u64, content: &[u8]) {
        append_file(&self.segment(index), content);
    }

    /// Rename `app.log` to `app.log.1` and leave a fresh empty `app.log`
    /// in its place, as a log rotator would.
    pub fn rotate(&self) {
        fs::rename(self.log_path(), self.segment(1)).expect("rotate rename failed");
        write_file(&self.log_path(), b"");
    }
}

impl Default for LogDir {
    fn default() -> Self {
        Self::new()
    }
}

pub fn write_file(path: &Path, content: &[u8]) {
    let mut f = fs::File::create(path).expect("create failed");
    f.write_all(content).expect("write failed");
}

pub fn append_file(path: &Path, content: &[u8]) {
    let mut f = OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .expect("append-open failed");
    f.write_all(content).expect("append-write failed");
}

pub fn read_to_string(path: &Path) -> String {
    fs::read_to_string(path).expect("read failed")
}
