//! The six concrete end-to-end scenarios from spec §8, one test each.

use rotail::{CursorStore, End, FileCursor, LockMode, PositionRecord, Reader, ReaderConfig, Start};

use super::test_utilities::LogDir;

fn reader_for(dir: &LogDir) -> Reader {
    let config = ReaderConfig::builder()
        .log(dir.log_path())
        .pos(dir.pos_path())
        .build()
        .unwrap();
    Reader::new(config).unwrap()
}

#[test]
fn scenario_1_basic_read_and_commit() {
    let dir = LogDir::new();
    dir.write_log(b"a\nb\n");

    let mut reader = reader_for(&dir);
    assert_eq!(reader.read().unwrap().as_deref(), Some("a\n"));
    reader.commit(None).unwrap();
    drop(reader);

    let mut reader = reader_for(&dir);
    assert_eq!(reader.read().unwrap().as_deref(), Some("b\n"));
    assert_eq!(reader.read().unwrap(), None);
}

#[test]
fn scenario_2_rotation_without_loss() {
    let dir = LogDir::new();
    dir.write_log(b"a\nb\n");

    let mut reader = reader_for(&dir);
    assert_eq!(reader.read().unwrap().as_deref(), Some("a\n"));
    reader.commit(None).unwrap();
    drop(reader);

    dir.rotate();
    dir.append_log(b"c\n");

    let mut reader = reader_for(&dir);
    assert_eq!(reader.read().unwrap().as_deref(), Some("b\n"));
    assert_eq!(reader.read().unwrap().as_deref(), Some("c\n"));
    assert_eq!(reader.read().unwrap(), None);
}

#[test]
fn scenario_3_late_update_to_rotated_segment() {
    let dir = LogDir::new();
    dir.write_log(b"a\nb\n");

    let mut reader = reader_for(&dir);
    assert_eq!(reader.read().unwrap().as_deref(), Some("a\n"));
    reader.commit(None).unwrap();
    drop(reader);

    dir.rotate();
    // Append to the rotated segment while the active segment is still empty.
    dir.append_log_segment(1, b"c\n");

    let mut reader = reader_for(&dir);
    assert_eq!(reader.read().unwrap().as_deref(), Some("b\n"));
    assert_eq!(reader.read().unwrap().as_deref(), Some("c\n"));
    assert_eq!(reader.read().unwrap(), None);
}

#[test]
fn scenario_4_incomplete_trailing_line() {
    let dir = LogDir::new();
    dir.write_log(b"ab");

    let mut reader = reader_for(&dir);
    assert_eq!(reader.read().unwrap(), None);

    dir.append_log(b"c\n");
    assert_eq!(reader.read().unwrap().as_deref(), Some("abc\n"));
}

#[test]
fn scenario_5_rollback_window() {
    let dir = LogDir::new();
    dir.write_log(b"x".repeat(100).as_slice());

    let config = ReaderConfig::builder()
        .log(dir.log_path())
        .pos(dir.pos_path())
        .rollback_period(5)
        .build()
        .unwrap();
    let mut reader = Reader::new(config).unwrap();

    let at = |offset: u64, t: u64| {
        PositionRecord::new(offset, dir.log_path()).with_commit_time(t)
    };

    reader.commit(Some(at(20, 0))).unwrap();
    reader.commit(Some(at(30, 1))).unwrap();
    reader.commit(Some(at(80, 6))).unwrap();
    reader.commit(Some(at(90, 7))).unwrap();

    let stored_offset = || {
        FileCursor::open(dir.pos_path(), Some(5), LockMode::None)
            .unwrap()
            .read()
            .unwrap()
            .unwrap()
            .offset
    };

    assert!(reader.rollback().unwrap());
    assert_eq!(stored_offset(), 80);

    assert!(reader.rollback().unwrap());
    assert_eq!(stored_offset(), 30);

    assert!(!reader.rollback().unwrap());
    assert_eq!(stored_offset(), 30);
}

#[test]
fn scenario_6_unknown_rotation_fails_with_position_lost() {
    let dir = LogDir::new();
    dir.write_log(b"a\nb\n");

    let mut reader = reader_for(&dir);
    assert_eq!(reader.read().unwrap().as_deref(), Some("a\n"));
    reader.commit(None).unwrap();
    drop(reader);

    // Simulate two generations of rotation at once: the segment the cursor
    // refers to ends up as app.log.2, with two freshly-created, differently
    // identified files taking app.log and app.log.1.
    std::fs::rename(dir.log_path(), dir.segment(2)).unwrap();
    dir.write_log(b"d\n");
    dir.write_segment(1, b"c\n");

    // Delete the segment the stored cursor actually points at.
    std::fs::remove_file(dir.segment(2)).unwrap();

    let config = ReaderConfig::builder()
        .log(dir.log_path())
        .pos(dir.pos_path())
        .end(End::Fixed)
        .start(Start::Begin)
        .build()
        .unwrap();
    let err = Reader::new(config).unwrap_err();
    assert!(matches!(err, rotail::ReaderError::PositionLost { .. }));
}
