//! # Storage Service
//!
//! This crate implements virtual random-access files on top of immutable
//! byte stores.
//!
//! ## Philosophy
//!
//! - **Snapshots, not buffers**: Content is a [`ByteStore`] value. An edit
//!   never changes a snapshot in place; it builds the next one from slices
//!   of the previous one.
//! - **Commit is the only visible change**: Readers see the committed
//!   content until an edit session closes, and then only the whole result.
//! - **One session per entity**: A second concurrent session is refused
//!   rather than allowed to interleave.
//!
//! ## Design
//!
//! - **ByteRangeEditor**: write / seek / truncate over a working snapshot
//! - **EditSession**: an editor bound to the entity it will commit into
//! - **EntityStore**: entities, their committed content and the commit protocol
//! - **Sink**: chunk-level contract shared with the delivery pipeline
//!
//! [`ByteStore`]: byte_store::ByteStore

pub mod command;
pub mod commit;
pub mod editor;
pub mod sink;

pub use command::{WriteChunk, WriteCommand, WriteData};
pub use commit::{AbortOutcome, CloseObserver, Commit, CommitEvent, EditSession, EntityStore};
pub use editor::{ByteRangeEditor, DEFAULT_MAX_SIZE};
pub use sink::{MemorySink, SharedEntityStore, Sink};
