//! In-memory file handles

use crate::handle::{FileHandle, RemoveOptions, WritableOptions};
use byte_store::ByteStore;
use core_types::{EntityId, FsResult};
use log::debug;
use parking_lot::Mutex;
use services_storage::{CloseObserver, EntityStore, MemorySink, SharedEntityStore, Sink};
use std::sync::Arc;

/// Handle to an entity held in a shared [`EntityStore`]
///
/// Cloned handles refer to the same entry.
#[derive(Clone)]
pub struct MemoryFileHandle {
    store: SharedEntityStore,
    id: EntityId,
    name: String,
    writable: bool,
}

impl MemoryFileHandle {
    /// Creates a new entity in `store` and returns a handle to it
    pub fn create(
        store: SharedEntityStore,
        name: impl Into<String>,
        content: ByteStore,
        writable: bool,
    ) -> Self {
        let name = name.into();
        let id = store.lock().create(name.clone(), content, writable);
        Self {
            store,
            id,
            name,
            writable,
        }
    }

    /// Wraps existing content in a handle backed by its own store
    pub fn from_content(name: impl Into<String>, content: ByteStore, writable: bool) -> Self {
        Self::create(Arc::new(Mutex::new(EntityStore::new())), name, content, writable)
    }

    /// Returns a handle to an entity already in `store`
    pub fn open(store: SharedEntityStore, id: EntityId) -> FsResult<Self> {
        let (name, writable) = {
            let guard = store.lock();
            (guard.name(id)?.to_string(), guard.is_writable(id)?)
        };
        Ok(Self {
            store,
            id,
            name,
            writable,
        })
    }

    pub fn store(&self) -> &SharedEntityStore {
        &self.store
    }

    /// Registers the callback run after each commit to this entry
    pub fn on_close(&self, observer: CloseObserver) -> FsResult<()> {
        self.store.lock().set_close_observer(self.id, observer)
    }
}

impl FileHandle for MemoryFileHandle {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_writable(&self) -> bool {
        self.writable
    }

    fn is_readable(&self) -> bool {
        true
    }

    fn entry_id(&self) -> EntityId {
        self.id
    }

    fn get_content(&self) -> FsResult<ByteStore> {
        self.store.lock().content(self.id)
    }

    fn remove(&self, options: RemoveOptions) -> FsResult<()> {
        debug!(
            "event=handle_remove entity={} recursive={}",
            self.id, options.recursive
        );
        self.store.lock().remove(self.id)
    }

    fn create_writable(&self, options: WritableOptions) -> FsResult<Box<dyn Sink>> {
        let sink = MemorySink::open(Arc::clone(&self.store), self.id, options.keep_existing_data)?;
        Ok(Box::new(sink))
    }
}
