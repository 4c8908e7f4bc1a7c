//! # File Handles
//!
//! This crate exposes the handle contract callers program against: named
//! file entries that can be read, removed and opened for writing.
//!
//! ## Philosophy
//!
//! - **Handles hold no state**: Content and lifecycle live in the entity
//!   store or the transfer service; a handle only knows how to reach them.
//! - **Identity is the entry**: Two handles are the same entry when they
//!   point at the same entity, however they were obtained.
//!
//! ## Handles
//!
//! - [`MemoryFileHandle`]: a readable, optionally writable entry in a shared
//!   entity store
//! - [`DownloadFileHandle`]: a write-only entry whose writables become
//!   downloads
//! - [`WritableFileStream`]: the stream surface over any sink

pub mod download;
pub mod handle;
pub mod memory;
pub mod stream;

pub use download::{DownloadFileHandle, DEFAULT_DOWNLOAD_NAME};
pub use handle::{FileHandle, RemoveOptions, WritableOptions};
pub use memory::MemoryFileHandle;
pub use stream::WritableFileStream;
