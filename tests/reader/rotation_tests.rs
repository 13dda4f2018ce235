//! Rotation-specific behavior beyond the headline scenarios in scenarios.rs:
//! lock contention, config validation edge cases, and the `check_log`
//! mismatch guard.

use rotail::{LockMode, Reader, ReaderConfig, ReaderError};
use test_log::test;

use super::test_utilities::LogDir;

#[test]
fn autofix_cursor_restarts_fresh_after_position_lost() {
    let dir = LogDir::new();
    dir.write_log(b"a\nb\n");

    let config = ReaderConfig::builder()
        .log(dir.log_path())
        .pos(dir.pos_path())
        .build()
        .unwrap();
    let mut reader = Reader::new(config).unwrap();
    reader.read().unwrap();
    reader.commit(None).unwrap();
    drop(reader);

    // Rotate away the segment the cursor refers to entirely, with no
    // inode-preserving rename: a completely fresh file takes its place.
    std::fs::remove_file(dir.log_path()).unwrap();
    dir.write_log(b"c\nd\n");

    let config = ReaderConfig::builder()
        .log(dir.log_path())
        .pos(dir.pos_path())
        .autofix_cursor(true)
        .build()
        .unwrap();
    let mut reader = Reader::new(config).unwrap();
    // autofix_cursor falls through to start = begin on PositionLost.
    assert_eq!(reader.read().unwrap().as_deref(), Some("c\n"));
}

#[test]
fn without_autofix_position_lost_is_fatal() {
    let dir = LogDir::new();
    dir.write_log(b"a\nb\n");

    let config = ReaderConfig::builder()
        .log(dir.log_path())
        .pos(dir.pos_path())
        .build()
        .unwrap();
    let mut reader = Reader::new(config).unwrap();
    reader.read().unwrap();
    reader.commit(None).unwrap();
    drop(reader);

    std::fs::remove_file(dir.log_path()).unwrap();
    dir.write_log(b"c\nd\n");

    let config = ReaderConfig::builder()
        .log(dir.log_path())
        .pos(dir.pos_path())
        .autofix_cursor(false)
        .build()
        .unwrap();
    let err = Reader::new(config).unwrap_err();
    assert!(matches!(err, ReaderError::PositionLost { .. }));
}

#[test]
fn check_log_rejects_a_cursor_recorded_against_a_different_log() {
    let dir = LogDir::new();
    dir.write_log(b"a\n");

    let config = ReaderConfig::builder()
        .log(dir.log_path())
        .pos(dir.pos_path())
        .build()
        .unwrap();
    let mut reader = Reader::new(config).unwrap();
    reader.read().unwrap();
    reader.commit(None).unwrap();
    drop(reader);

    let other_log = dir.segment(99); // just a distinct path, never written
    let config = ReaderConfig::builder()
        .log(other_log)
        .pos(dir.pos_path())
        .check_log(true)
        .build()
        .unwrap();
    let err = Reader::new(config).unwrap_err();
    assert!(matches!(err, ReaderError::LogfileMismatch { .. }));
}

#[test]
fn check_log_disabled_ignores_the_mismatch() {
    let dir = LogDir::new();
    dir.write_log(b"a\n");

    let config = ReaderConfig::builder()
        .log(dir.log_path())
        .pos(dir.pos_path())
        .build()
        .unwrap();
    let mut reader = Reader::new(config).unwrap();
    reader.read().unwrap();
    reader.commit(None).unwrap();
    drop(reader);

    let dir2 = LogDir::new();
    dir2.write_log(b"x\n");
    let config = ReaderConfig::builder()
        .log(dir2.log_path())
        .pos(dir.pos_path())
        .check_log(false)
        .build()
        .unwrap();
    // With check_log off the mismatch is silently accepted; rotation
    // recovery then runs against dir2's log and fails to find a match,
    // which is a different, expected failure mode than LogfileMismatch.
    let err = Reader::new(config).unwrap_err();
    assert!(matches!(err, ReaderError::PositionLost { .. }));
}

#[test]
fn cursor_lock_blocks_a_second_reader_in_nonblocking_mode() {
    let dir = LogDir::new();
    dir.write_log(b"a\n");

    let config = ReaderConfig::builder()
        .log(dir.log_path())
        .pos(dir.pos_path())
        .lock(LockMode::Blocking)
        .build()
        .unwrap();
    let _first = Reader::new(config).unwrap();

    let config2 = ReaderConfig::builder()
        .log(dir.log_path())
        .pos(dir.pos_path())
        .lock(LockMode::Nonblocking)
        .build()
        .unwrap();
    let err = Reader::new(config2).unwrap_err();
    assert!(matches!(err, ReaderError::LockBusy { .. }));
}

#[test]
fn config_rejects_both_pos_and_cursor() {
    use rotail::NullCursor;
    let err = ReaderConfig::builder()
        .log("app.log")
        .pos("app.log.pos")
        .cursor(NullCursor::new())
        .build()
        .unwrap_err();
    assert!(matches!(err, ReaderError::Config { .. }));
}
