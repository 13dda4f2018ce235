use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::config::End;
use crate::error::ReaderError;
use crate::position::{MAX_LAST_LINE_BYTES, PositionRecord};
use crate::segment::segment_path;

#[cfg(unix)]
pub fn inode_of(file: &File) -> Result<u64, ReaderError> {
    use std::os::unix::fs::MetadataExt;
    let metadata = file
        .metadata()
        .map_err(|e| ReaderError::from_io_error(e, "reading segment metadata"))?;
    Ok(metadata.ino())
}

#[cfg(not(unix))]
pub fn inode_of(_file: &File) -> Result<u64, ReaderError> {
    Ok(0)
}

/// Opens `log_path`'s segment `index`, distinguishing "does not exist" from
/// a genuine I/O failure (§4.4 step 1).
pub fn open_segment(log_path: &Path, index: u64) -> Result<Option<File>, ReaderError> {
    let path = segment_path(log_path, index);
    match File::open(&path) {
        Ok(file) => Ok(Some(file)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(ReaderError::UnreadableLog {
            path: path.display().to_string(),
            source: e.to_string(),
        }),
    }
}

/// The result of successfully matching a persisted position to a physical
/// segment (§4.4).
pub struct Recovered {
    pub segment_index: u64,
    pub file: File,
    pub inode: Option<u64>,
}

/// The seven-step rotation-recovery protocol: scan candidate segments from
/// the active file outward until one matches `p`'s recorded identity, or
/// fail with `PositionLost`.
pub fn recover(
    log_path: &Path,
    last_segment_index: u64,
    p: &PositionRecord,
    check_inode: bool,
    check_lastline: bool,
    end: End,
) -> Result<Recovered, ReaderError> {
    for segment_index in 0..=last_segment_index {
        let Some(mut file) = open_segment(log_path, segment_index)? else {
            continue;
        };

        let size = file
            .metadata()
            .map_err(|e| ReaderError::from_io_error(e, "reading segment metadata"))?
            .len();

        if size < p.offset {
            continue;
        }
        if size == 0 && segment_index == 0 && matches!(end, End::Fixed) {
            continue;
        }

        file.seek(SeekFrom::Start(p.offset))
            .map_err(|e| ReaderError::from_io_error(e, "seeking to candidate position"))?;

        let inode = if check_inode {
            Some(inode_of(&file)?)
        } else {
            None
        };
        // Step 5: only a gate when both the check is enabled and the record
        // actually carries an inode; otherwise fall through unconditionally.
        if check_inode {
            if let Some(expected) = p.inode {
                if Some(expected) != inode {
                    continue;
                }
            }
        }

        // Step 6: same fall-through rule for the last-line signature.
        if check_lastline {
            if let Some(expected) = &p.last_line {
                let actual = last_line_at(log_path, segment_index, p.offset)?;
                if !actual.ends_with(expected.as_slice()) {
                    continue;
                }
            }
        }

        return walk_forward_if_exhausted(log_path, segment_index, file, inode, check_inode);
    }

    Err(ReaderError::PositionLost {
        log_path: log_path.display().to_string(),
    })
}

/// Step 7, "defence in depth": a logrotate can land between the time a
/// position was committed and the time we recover it, leaving the matched
/// candidate already fully consumed. When that candidate isn't the active
/// segment, walk forward toward segment 0 until one has unread bytes (or we
/// run out of newer segments to try), so the next `read()` call doesn't
/// spuriously return `None`.
fn walk_forward_if_exhausted(
    log_path: &Path,
    mut segment_index: u64,
    mut file: File,
    mut inode: Option<u64>,
    check_inode: bool,
) -> Result<Recovered, ReaderError> {
    loop {
        let tell = file
            .stream_position()
            .map_err(|e| ReaderError::from_io_error(e, "reading candidate offset"))?;
        let size = file
            .metadata()
            .map_err(|e| ReaderError::from_io_error(e, "reading segment metadata"))?
            .len();

        if segment_index == 0 || tell < size {
            break;
        }

        let Some(next_file) = open_segment(log_path, segment_index - 1)? else {
            break;
        };
        segment_index -= 1;
        file = next_file;
        inode = if check_inode {
            Some(inode_of(&file)?)
        } else {
            None
        };
    }

    Ok(Recovered {
        segment_index,
        file,
        inode,
    })
}

/// Extract up to [`MAX_LAST_LINE_BYTES`] bytes ending at `offset` of segment
/// `segment_index`, reaching into the next-older segment's tail when
/// `offset` is 0 (§4.5). Applies uniformly regardless of `segment_index`:
/// segment 0 at offset 0 still consults segment 1's tail.
pub fn last_line_at(
    log_path: &Path,
    segment_index: u64,
    offset: u64,
) -> Result<Vec<u8>, ReaderError> {
    if offset == 0 {
        let older_index = segment_index + 1;
        let Some(mut file) = open_segment(log_path, older_index)? else {
            return Ok(Vec::new());
        };
        let size = file
            .metadata()
            .map_err(|e| ReaderError::from_io_error(e, "reading segment metadata"))?
            .len();
        return read_trailing_bytes(&mut file, size);
    }

    let Some(mut file) = open_segment(log_path, segment_index)? else {
        return Ok(Vec::new());
    };
    read_trailing_bytes(&mut file, offset)
}

fn read_trailing_bytes(file: &mut File, end_offset: u64) -> Result<Vec<u8>, ReaderError> {
    let window = (MAX_LAST_LINE_BYTES + 1) as u64;
    let read_len = window.min(end_offset);
    let start = end_offset - read_len;

    file.seek(SeekFrom::Start(start))
        .map_err(|e| ReaderError::from_io_error(e, "seeking for last-line extraction"))?;

    let mut buf = vec![0u8; read_len as usize];
    file.read_exact(&mut buf)
        .map_err(|e| ReaderError::from_io_error(e, "reading last-line extraction window"))?;

    if buf.len() > MAX_LAST_LINE_BYTES {
        let start = buf.len() - MAX_LAST_LINE_BYTES;
        buf.drain(..start);
    }
    Ok(buf)
}

/// Scan backward from EOF to the byte after the last `\n`, for `start = end`
/// placement (§4.5). Returns 0 if the file contains no newline.
pub fn seek_to_last_line_boundary(file: &mut File) -> Result<u64, ReaderError> {
    let size = file
        .metadata()
        .map_err(|e| ReaderError::from_io_error(e, "reading segment metadata"))?
        .len();

    const CHUNK: u64 = 4096;
    let mut pos = size;
    let mut buf = Vec::new();

    while pos > 0 {
        let read_len = CHUNK.min(pos);
        let start = pos - read_len;
        file.seek(SeekFrom::Start(start))
            .map_err(|e| ReaderError::from_io_error(e, "seeking during boundary scan"))?;
        let mut chunk = vec![0u8; read_len as usize];
        file.read_exact(&mut chunk)
            .map_err(|e| ReaderError::from_io_error(e, "reading during boundary scan"))?;

        if let Some(rel) = chunk.iter().rposition(|&b| b == b'\n') {
            let boundary = start + rel as u64 + 1;
            file.seek(SeekFrom::Start(boundary))
                .map_err(|e| ReaderError::from_io_error(e, "seeking to line boundary"))?;
            return Ok(boundary);
        }

        buf = chunk;
        pos = start;
        let _ = &buf;
    }

    file.seek(SeekFrom::Start(0))
        .map_err(|e| ReaderError::from_io_error(e, "seeking to start"))?;
    Ok(0)
}
