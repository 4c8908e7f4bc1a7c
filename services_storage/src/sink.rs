//! Chunk sinks
//!
//! [`Sink`] is the contract every writable target implements: the in-memory
//! sink below commits into an [`EntityStore`], the delivery sinks in the
//! transfer service forward bytes to a download consumer.

use crate::command::WriteChunk;
use crate::commit::{EditSession, EntityStore};
use core_types::{EntityId, FsError, FsResult};
use parking_lot::Mutex;
use std::sync::Arc;

const SINK_CLOSED_MESSAGE: &str = "Cannot write to a CLOSED writable stream";

/// Entity store shared between the handles of one process
pub type SharedEntityStore = Arc<Mutex<EntityStore>>;

/// Destination for written chunks
pub trait Sink: Send {
    /// Applies or forwards one chunk
    fn write(&mut self, chunk: WriteChunk) -> FsResult<()>;

    /// Commits / finalizes everything written so far
    fn close(&mut self) -> FsResult<()>;

    /// Discards everything written so far and reports `reason` to whoever
    /// waits on the outcome
    fn abort(&mut self, reason: &str) -> FsResult<()>;
}

/// Sink that edits an entity and commits on close
pub struct MemorySink {
    store: SharedEntityStore,
    session: Option<EditSession>,
}

impl MemorySink {
    /// Opens an edit session on `entity` and wraps it
    pub fn open(
        store: SharedEntityStore,
        entity: EntityId,
        keep_existing_data: bool,
    ) -> FsResult<Self> {
        let session = store.lock().open_session(entity, keep_existing_data)?;
        Ok(Self {
            store,
            session: Some(session),
        })
    }

    /// The open session, until the sink is closed or aborted
    pub fn session(&self) -> Option<&EditSession> {
        self.session.as_ref()
    }

    fn take_session(&mut self) -> FsResult<EditSession> {
        self.session
            .take()
            .ok_or_else(|| FsError::invalid_state(SINK_CLOSED_MESSAGE))
    }
}

impl Sink for MemorySink {
    fn write(&mut self, chunk: WriteChunk) -> FsResult<()> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| FsError::invalid_state(SINK_CLOSED_MESSAGE))?;
        session.apply(chunk)
    }

    fn close(&mut self) -> FsResult<()> {
        let session = self.take_session()?;
        let commit = self.store.lock().close(session)?;
        commit.notify();
        Ok(())
    }

    fn abort(&mut self, reason: &str) -> FsResult<()> {
        let session = self.take_session()?;
        self.store.lock().abort(session, reason);
        Ok(())
    }
}

impl Drop for MemorySink {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            self.store.lock().abort(session, "sink dropped without close");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::WriteCommand;
    use crate::commit::CommitEvent;
    use byte_store::ByteStore;
    use core_types::ErrorKind;

    fn shared() -> SharedEntityStore {
        Arc::new(Mutex::new(EntityStore::new()))
    }

    #[test]
    fn test_memory_sink_commits_on_close() {
        let store = shared();
        let id = store.lock().create("a.txt", ByteStore::from("0123456789"), true);

        let mut sink = MemorySink::open(Arc::clone(&store), id, true).unwrap();
        sink.write(WriteCommand::write_at(3, "BB").into()).unwrap();
        assert_eq!(store.lock().content(id).unwrap(), &b"0123456789"[..]);

        sink.close().unwrap();
        assert_eq!(store.lock().content(id).unwrap(), &b"012BB56789"[..]);
    }

    #[test]
    fn test_write_after_close_fails() {
        let store = shared();
        let id = store.lock().create("a", ByteStore::new(), true);
        let mut sink = MemorySink::open(Arc::clone(&store), id, false).unwrap();
        sink.close().unwrap();

        let err = sink.write("late".into()).unwrap_err();
        assert_eq!(err.to_string(), SINK_CLOSED_MESSAGE);
        assert!(sink.close().is_err());
    }

    #[test]
    fn test_dropped_sink_releases_session() {
        let store = shared();
        let id = store.lock().create("a", ByteStore::from("x"), true);
        {
            let mut sink = MemorySink::open(Arc::clone(&store), id, true).unwrap();
            sink.write("discarded".into()).unwrap();
        }
        assert!(store.lock().active_session(id).is_none());
        assert_eq!(store.lock().content(id).unwrap(), &b"x"[..]);
        assert!(MemorySink::open(store, id, true).is_ok());
    }

    #[test]
    fn test_close_observer_can_read_back_the_store() {
        let store = shared();
        let id = store.lock().create("a", ByteStore::from("old"), true);
        let read_back = Arc::new(Mutex::new(None));
        let observer_store = Arc::clone(&store);
        let slot = Arc::clone(&read_back);
        store
            .lock()
            .set_close_observer(
                id,
                Arc::new(move |event: &CommitEvent| {
                    *slot.lock() = Some(observer_store.lock().content(event.entity));
                }),
            )
            .unwrap();

        let mut sink = MemorySink::open(Arc::clone(&store), id, false).unwrap();
        sink.write("new".into()).unwrap();
        sink.close().unwrap();

        let seen = read_back.lock().take().unwrap().unwrap();
        assert_eq!(seen, &b"new"[..]);
    }

    #[test]
    fn test_oversized_write_leaves_sink_usable() {
        let store = shared();
        let id = store.lock().create("a", ByteStore::new(), true);
        let mut sink = MemorySink::open(Arc::clone(&store), id, false).unwrap();

        let err = sink.write(WriteCommand::write_at(i64::MAX - 1, "x").into()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::QuotaExceeded);
        sink.write("fine".into()).unwrap();
        sink.close().unwrap();
        assert_eq!(store.lock().content(id).unwrap(), &b"fine"[..]);
    }

    #[test]
    fn test_abort_keeps_committed_content() {
        let store = shared();
        let id = store.lock().create("a", ByteStore::from("safe"), true);
        let mut sink = MemorySink::open(Arc::clone(&store), id, true).unwrap();
        sink.write(WriteCommand::truncate(0).into()).unwrap();
        sink.abort("cancelled").unwrap();
        assert_eq!(store.lock().content(id).unwrap(), &b"safe"[..]);
    }
}
