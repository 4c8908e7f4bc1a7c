//! Entities and the commit protocol
//!
//! An entity's committed content changes only when an edit session closes.
//! Until then readers see the pre-edit snapshot; afterwards they see the
//! session's whole working snapshot. Removing an entity makes it inert:
//! reads, new sessions and pending commits all fail with NotFound.

use crate::command::WriteChunk;
use crate::editor::{ByteRangeEditor, DEFAULT_MAX_SIZE};
use byte_store::ByteStore;
use core_types::{EntityId, FsError, FsResult, SessionId};
use log::{info, warn};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Notification delivered to a close observer after a commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitEvent {
    pub entity: EntityId,
    pub name: String,
    /// Final committed length in bytes
    pub size: usize,
    /// The content that was just committed
    pub content: ByteStore,
}

/// Outcome of an aborted session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbortOutcome {
    pub entity: EntityId,
    pub session: SessionId,
    pub reason: String,
}

/// Callback run after each successful commit
pub type CloseObserver = Arc<dyn Fn(&CommitEvent) + Send + Sync>;

/// A commit that has been applied but not yet announced
///
/// The store hands this back instead of running the close observer itself,
/// so the observer runs once the caller has let go of the store and may read
/// the entity again.
#[must_use = "the close observer only runs from `Commit::notify`"]
pub struct Commit {
    event: CommitEvent,
    observer: Option<CloseObserver>,
}

impl Commit {
    pub fn event(&self) -> &CommitEvent {
        &self.event
    }

    /// Runs the close observer, if any, and returns the event
    pub fn notify(self) -> CommitEvent {
        if let Some(observer) = &self.observer {
            observer(&self.event);
        }
        self.event
    }
}

impl fmt::Debug for Commit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Commit")
            .field("event", &self.event)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

/// An open edit over one entity
///
/// Owned by the caller until it is handed back to [`EntityStore::close`] or
/// [`EntityStore::abort`], which consume it.
#[derive(Debug)]
pub struct EditSession {
    id: SessionId,
    entity: EntityId,
    editor: ByteRangeEditor,
}

impl EditSession {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn entity(&self) -> EntityId {
        self.entity
    }

    pub fn cursor(&self) -> usize {
        self.editor.cursor()
    }

    pub fn size(&self) -> usize {
        self.editor.size()
    }

    /// Working snapshot (not visible to readers of the entity)
    pub fn working_content(&self) -> &ByteStore {
        self.editor.content()
    }

    pub fn write(&mut self, data: impl Into<ByteStore>, position: Option<usize>) -> FsResult<()> {
        self.editor.write(data.into(), position)
    }

    pub fn seek(&mut self, position: usize) -> FsResult<()> {
        self.editor.seek(position)
    }

    pub fn truncate(&mut self, size: usize) -> FsResult<()> {
        self.editor.truncate(size)
    }

    pub fn apply(&mut self, chunk: WriteChunk) -> FsResult<()> {
        self.editor.apply(chunk)
    }
}

struct Entity {
    name: String,
    content: Option<ByteStore>,
    writable: bool,
    deleted: bool,
    active_session: Option<SessionId>,
    observer: Option<CloseObserver>,
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("name", &self.name)
            .field("content", &self.content)
            .field("writable", &self.writable)
            .field("deleted", &self.deleted)
            .field("active_session", &self.active_session)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

/// Owner of every entity and its committed content
#[derive(Debug)]
pub struct EntityStore {
    entities: HashMap<EntityId, Entity>,
    max_content_size: usize,
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::with_max_content_size(DEFAULT_MAX_SIZE)
    }
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store whose edit sessions refuse to grow content past
    /// `max_content_size` bytes
    pub fn with_max_content_size(max_content_size: usize) -> Self {
        Self {
            entities: HashMap::new(),
            max_content_size,
        }
    }

    pub fn max_content_size(&self) -> usize {
        self.max_content_size
    }

    /// Materializes a new entity with `content` as its committed value
    pub fn create(
        &mut self,
        name: impl Into<String>,
        content: ByteStore,
        writable: bool,
    ) -> EntityId {
        let id = EntityId::new();
        self.entities.insert(
            id,
            Entity {
                name: name.into(),
                content: Some(content),
                writable,
                deleted: false,
                active_session: None,
                observer: None,
            },
        );
        id
    }

    fn entity(&self, id: EntityId) -> FsResult<&Entity> {
        self.entities.get(&id).ok_or(FsError::NotFound)
    }

    fn entity_mut(&mut self, id: EntityId) -> FsResult<&mut Entity> {
        self.entities.get_mut(&id).ok_or(FsError::NotFound)
    }

    /// Returns the entity's name; stays readable after removal
    pub fn name(&self, id: EntityId) -> FsResult<&str> {
        self.entity(id).map(|entity| entity.name.as_str())
    }

    pub fn is_writable(&self, id: EntityId) -> FsResult<bool> {
        self.entity(id).map(|entity| entity.writable)
    }

    pub fn is_deleted(&self, id: EntityId) -> bool {
        self.entities.get(&id).map_or(true, |entity| entity.deleted)
    }

    pub fn active_session(&self, id: EntityId) -> Option<SessionId> {
        self.entities.get(&id).and_then(|entity| entity.active_session)
    }

    /// Returns the committed content
    pub fn content(&self, id: EntityId) -> FsResult<ByteStore> {
        let entity = self.entity(id)?;
        if entity.deleted {
            return Err(FsError::NotFound);
        }
        entity.content.clone().ok_or(FsError::NotFound)
    }

    /// Registers the callback run after each commit, replacing any previous one
    pub fn set_close_observer(&mut self, id: EntityId, observer: CloseObserver) -> FsResult<()> {
        let entity = self.entity_mut(id)?;
        if entity.deleted {
            return Err(FsError::NotFound);
        }
        entity.observer = Some(observer);
        Ok(())
    }

    /// Opens the entity's single edit session.
    ///
    /// The working snapshot starts as the committed content when
    /// `keep_existing_data` is set, and empty otherwise.
    pub fn open_session(
        &mut self,
        id: EntityId,
        keep_existing_data: bool,
    ) -> FsResult<EditSession> {
        let max_size = self.max_content_size;
        let entity = self.entity_mut(id)?;
        if !entity.writable {
            return Err(FsError::PermissionDenied);
        }
        if entity.deleted {
            return Err(FsError::NotFound);
        }
        if entity.active_session.is_some() {
            return Err(FsError::InvalidModification);
        }

        let initial = if keep_existing_data {
            entity.content.clone().unwrap_or_default()
        } else {
            ByteStore::new()
        };
        let session = EditSession {
            id: SessionId::new(),
            entity: id,
            editor: ByteRangeEditor::with_max_size(initial, max_size),
        };
        entity.active_session = Some(session.id);

        info!(
            "event=session_open entity={} session={} keep_existing={}",
            id, session.id, keep_existing_data
        );
        Ok(session)
    }

    /// Commits the session's working snapshot as the entity's content.
    ///
    /// Fails NotFound, committing nothing, if the entity was removed in the
    /// meantime. The returned [`Commit`] carries the close observer; call
    /// [`Commit::notify`] once the store is no longer borrowed.
    pub fn close(&mut self, session: EditSession) -> FsResult<Commit> {
        let entity = self.entity_mut(session.entity)?;
        if entity.active_session != Some(session.id) {
            return Err(FsError::invalid_state("edit session is not active"));
        }
        entity.active_session = None;

        if entity.deleted {
            warn!(
                "event=session_commit_rejected entity={} session={} reason=removed",
                session.entity, session.id
            );
            return Err(FsError::NotFound);
        }

        let content = session.editor.into_content();
        let event = CommitEvent {
            entity: session.entity,
            name: entity.name.clone(),
            size: content.len(),
            content: content.clone(),
        };
        entity.content = Some(content);

        info!(
            "event=session_commit entity={} session={} size={}",
            event.entity, session.id, event.size
        );
        Ok(Commit {
            event,
            observer: entity.observer.clone(),
        })
    }

    /// Discards the session's working snapshot.
    pub fn abort(&mut self, session: EditSession, reason: &str) -> AbortOutcome {
        if let Some(entity) = self.entities.get_mut(&session.entity) {
            if entity.active_session == Some(session.id) {
                entity.active_session = None;
            }
        }
        warn!(
            "event=session_abort entity={} session={} reason={}",
            session.entity, session.id, reason
        );
        AbortOutcome {
            entity: session.entity,
            session: session.id,
            reason: reason.to_string(),
        }
    }

    /// Marks the entity deleted and drops its committed content.
    ///
    /// Removing an already removed entity is a no-op.
    pub fn remove(&mut self, id: EntityId) -> FsResult<()> {
        let entity = self.entity_mut(id)?;
        if !entity.deleted {
            entity.deleted = true;
            entity.content = None;
            entity.observer = None;
            info!("event=entity_remove entity={}", id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::WriteCommand;
    use core_types::ErrorKind;
    use parking_lot::Mutex;

    #[test]
    fn test_commit_replaces_content_atomically() {
        let mut store = EntityStore::new();
        let id = store.create("notes.txt", ByteStore::from("before"), true);

        let mut session = store.open_session(id, true).unwrap();
        session.write("AFTER!", Some(0)).unwrap();
        assert_eq!(store.content(id).unwrap(), &b"before"[..]);

        let event = store.close(session).unwrap().notify();
        assert_eq!(event.size, 6);
        assert_eq!(store.content(id).unwrap(), &b"AFTER!"[..]);
        assert!(store.active_session(id).is_none());
    }

    #[test]
    fn test_session_without_existing_data_starts_empty() {
        let mut store = EntityStore::new();
        let id = store.create("a", ByteStore::from("old"), true);
        let session = store.open_session(id, false).unwrap();
        assert_eq!(session.size(), 0);
        store.close(session).unwrap().notify();
        assert!(store.content(id).unwrap().is_empty());
    }

    #[test]
    fn test_single_active_session() {
        let mut store = EntityStore::new();
        let id = store.create("a", ByteStore::new(), true);
        let first = store.open_session(id, true).unwrap();

        let err = store.open_session(id, true).unwrap_err();
        assert_eq!(err, FsError::InvalidModification);

        store.abort(first, "done");
        let second = store.open_session(id, true).unwrap();
        store.close(second).unwrap().notify();
        assert!(store.open_session(id, true).is_ok());
    }

    #[test]
    fn test_abort_discards_working_content() {
        let mut store = EntityStore::new();
        let id = store.create("a", ByteStore::from("keep"), true);
        let mut session = store.open_session(id, true).unwrap();
        session.truncate(0).unwrap();
        let session_id = session.id();

        let outcome = store.abort(session, "user cancelled");
        assert_eq!(outcome.session, session_id);
        assert_eq!(outcome.reason, "user cancelled");
        assert_eq!(store.content(id).unwrap(), &b"keep"[..]);
    }

    #[test]
    fn test_close_after_remove_fails_not_found() {
        let mut store = EntityStore::new();
        let id = store.create("a", ByteStore::from("x"), true);
        let mut session = store.open_session(id, true).unwrap();
        session.write("changed", Some(0)).unwrap();

        store.remove(id).unwrap();
        assert_eq!(store.close(session).unwrap_err(), FsError::NotFound);
        assert_eq!(store.content(id).unwrap_err(), FsError::NotFound);
    }

    #[test]
    fn test_removed_entity_is_inert() {
        let mut store = EntityStore::new();
        let id = store.create("gone.bin", ByteStore::from("data"), true);
        store.remove(id).unwrap();
        store.remove(id).unwrap();

        assert!(store.is_deleted(id));
        assert_eq!(store.content(id).unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(store.open_session(id, true).unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(store.name(id).unwrap(), "gone.bin");
    }

    #[test]
    fn test_read_only_entity_refuses_sessions() {
        let mut store = EntityStore::new();
        let id = store.create("picked.txt", ByteStore::from("ro"), false);
        assert_eq!(store.open_session(id, true).unwrap_err(), FsError::PermissionDenied);
    }

    #[test]
    fn test_unknown_entity_is_not_found() {
        let mut store = EntityStore::new();
        let id = EntityId::new();
        assert_eq!(store.content(id).unwrap_err(), FsError::NotFound);
        assert_eq!(store.open_session(id, true).unwrap_err(), FsError::NotFound);
        assert_eq!(store.remove(id).unwrap_err(), FsError::NotFound);
    }

    #[test]
    fn test_close_observer_sees_final_size() {
        let mut store = EntityStore::new();
        let id = store.create("log", ByteStore::new(), true);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        store
            .set_close_observer(
                id,
                Arc::new(move |event: &CommitEvent| sink.lock().push(event.clone())),
            )
            .unwrap();

        let mut session = store.open_session(id, true).unwrap();
        session.apply(WriteCommand::write_at(4, "abc").into()).unwrap();
        let commit = store.close(session).unwrap();
        assert!(seen.lock().is_empty());
        commit.notify();

        let events = seen.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].size, 7);
        assert_eq!(events[0].name, "log");
        assert_eq!(events[0].content, &b"\0\0\0\0abc"[..]);
    }

    #[test]
    fn test_store_limit_applies_to_sessions() {
        let mut store = EntityStore::with_max_content_size(4);
        let id = store.create("small", ByteStore::from("ab"), true);
        let mut session = store.open_session(id, true).unwrap();

        let err = session.write("vwxyz", None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::QuotaExceeded);
        session.write("wxyz", None).unwrap();
        store.close(session).unwrap().notify();
        assert_eq!(store.content(id).unwrap(), &b"wxyz"[..]);
    }

    #[test]
    fn test_session_from_other_store_is_rejected() {
        let mut store = EntityStore::new();
        let mut other = EntityStore::new();
        let other_id = other.create("b", ByteStore::new(), true);
        let foreign = other.open_session(other_id, true).unwrap();

        assert_eq!(store.close(foreign).unwrap_err(), FsError::NotFound);
    }
}
