use std::fs;
use std::path::{Path, PathBuf};

/// Physical filename for logical segment `index` of `log_path`.
///
/// Index 0 is the active file (`log_path` itself); index `k > 0` is the
/// rotated file `log_path.k`. Larger indices are older.
pub fn segment_path(log_path: &Path, index: u64) -> PathBuf {
    if index == 0 {
        log_path.to_path_buf()
    } else {
        let mut name = log_path.as_os_str().to_owned();
        name.push(format!(".{index}"));
        PathBuf::from(name)
    }
}

/// Largest `k` such that `log_path.k` exists on disk, per §4.1: a file
/// whose suffix after the final `.` is not purely decimal digits is not a
/// rotated segment and is ignored. Returns 0 if no rotated segment exists.
pub fn last_segment_index(log_path: &Path) -> u64 {
    let dir = log_path.parent().unwrap_or_else(|| Path::new("."));
    let Some(base_name) = log_path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
        return 0;
    };
    let prefix = format!("{base_name}.");

    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };

    let mut max_index = 0u64;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        let Some(suffix) = name.strip_prefix(&prefix) else {
            continue;
        };
        if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
            continue;
        }
        if let Ok(index) = suffix.parse::<u64>() {
            max_index = max_index.max(index);
        }
    }
    max_index
}
