//! Integration tests for the storage service
//!
//! These tests drive entities end to end through the sink contract:
//! - Positional edits over committed content
//! - Commit visibility
//! - Removal while a session is open
//! - Wire-decoded commands

use byte_store::ByteStore;
use core_types::{ErrorKind, FsError};
use parking_lot::Mutex;
use serde_json::json;
use services_storage::{EntityStore, MemorySink, SharedEntityStore, Sink, WriteChunk, WriteCommand};
use std::sync::Arc;

fn shared_store() -> SharedEntityStore {
    Arc::new(Mutex::new(EntityStore::new()))
}

#[test]
fn test_edit_session_workflow() {
    let store = shared_store();
    let id = store.lock().create("report.txt", ByteStore::from("Hello, world"), true);

    let mut sink = MemorySink::open(Arc::clone(&store), id, true).unwrap();
    sink.write(WriteCommand::seek(7).into()).unwrap();
    sink.write("Rust!".into()).unwrap();
    sink.write(WriteCommand::truncate(12).into()).unwrap();

    // Nothing is visible before close
    assert_eq!(store.lock().content(id).unwrap(), &b"Hello, world"[..]);

    sink.close().unwrap();
    assert_eq!(store.lock().content(id).unwrap(), &b"Hello, Rust!"[..]);
}

#[test]
fn test_wire_commands_through_sink() {
    let store = shared_store();
    let id = store.lock().create("data.bin", ByteStore::new(), true);
    let mut sink = MemorySink::open(Arc::clone(&store), id, false).unwrap();

    let commands = [
        json!({"type": "write", "data": "abcdef"}),
        json!({"type": "write", "position": 8, "data": [0x7a]}),
        json!({"type": "seek", "position": 1}),
        json!({"type": "write", "data": "B"}),
    ];
    for command in &commands {
        let command = WriteCommand::from_wire(command).unwrap();
        sink.write(WriteChunk::Command(command)).unwrap();
    }
    sink.close().unwrap();

    assert_eq!(
        store.lock().content(id).unwrap().to_vec(),
        b"aBcdef\0\0z".to_vec()
    );
}

#[test]
fn test_failed_command_leaves_session_usable() {
    let store = shared_store();
    let id = store.lock().create("a", ByteStore::from("abc"), true);
    let mut sink = MemorySink::open(Arc::clone(&store), id, true).unwrap();

    let err = sink.write(WriteCommand::seek(10).into()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert_eq!(sink.session().map(|s| s.cursor()), Some(0));

    sink.write(WriteCommand::write_at(3, "d").into()).unwrap();
    sink.close().unwrap();
    assert_eq!(store.lock().content(id).unwrap(), &b"abcd"[..]);
}

#[test]
fn test_remove_during_session() {
    let store = shared_store();
    let id = store.lock().create("tmp", ByteStore::from("old"), true);
    let mut sink = MemorySink::open(Arc::clone(&store), id, true).unwrap();
    sink.write("new".into()).unwrap();

    store.lock().remove(id).unwrap();

    assert_eq!(sink.close().unwrap_err(), FsError::NotFound);
    assert_eq!(store.lock().content(id).unwrap_err(), FsError::NotFound);
    assert_eq!(
        MemorySink::open(Arc::clone(&store), id, true).err(),
        Some(FsError::NotFound)
    );
}

#[test]
fn test_second_sink_refused_until_first_finishes() {
    let store = shared_store();
    let id = store.lock().create("a", ByteStore::new(), true);

    let mut first = MemorySink::open(Arc::clone(&store), id, true).unwrap();
    let err = MemorySink::open(Arc::clone(&store), id, true).err();
    assert_eq!(err, Some(FsError::InvalidModification));

    first.abort("replaced").unwrap();
    let mut second = MemorySink::open(Arc::clone(&store), id, true).unwrap();
    second.write("ok".into()).unwrap();
    second.close().unwrap();
    assert_eq!(store.lock().content(id).unwrap(), &b"ok"[..]);
}

#[test]
fn test_reader_snapshot_survives_commit() {
    let store = shared_store();
    let id = store.lock().create("a", ByteStore::from("version-1"), true);
    let before = store.lock().content(id).unwrap();

    let mut sink = MemorySink::open(Arc::clone(&store), id, false).unwrap();
    sink.write("version-2".into()).unwrap();
    sink.close().unwrap();

    assert_eq!(before, &b"version-1"[..]);
    assert_eq!(store.lock().content(id).unwrap(), &b"version-2"[..]);
}

#[test]
fn test_large_sequential_writes_stay_bounded() {
    let store = shared_store();
    let id = store.lock().create("big", ByteStore::new(), true);
    let mut sink = MemorySink::open(Arc::clone(&store), id, false).unwrap();

    for i in 0..2_000u32 {
        sink.write(i.to_le_bytes().to_vec().into()).unwrap();
    }
    let segments = sink.session().map(|s| s.working_content().segment_count());
    assert!(segments.unwrap_or(0) <= byte_store::MAX_SEGMENTS);

    sink.close().unwrap();
    let content = store.lock().content(id).unwrap().to_vec();
    assert_eq!(content.len(), 8_000);
    assert_eq!(&content[4..8], &1u32.to_le_bytes());
}
