//! # Core Types
//!
//! This crate defines the fundamental types shared by every other crate in
//! the workspace.
//!
//! ## Philosophy
//!
//! - **Explicit over implicit**: Entities and sessions are addressed by typed
//!   identifiers that cannot be confused with each other.
//! - **One error vocabulary**: Every operation reports failures through the
//!   same closed set of [`ErrorKind`]s.
//! - **Results, not panics**: Invalid input is reported through [`FsResult`].
//!
//! ## Key Types
//!
//! - [`EntityId`]: Unique identifier for a logical file
//! - [`SessionId`]: Unique identifier for an edit session
//! - [`FsError`]: The error taxonomy with its message templates
//! - [`EntryKind`], [`PermissionMode`], [`PermissionState`]: handle vocabulary

pub mod entry;
pub mod error;
pub mod ids;

pub use entry::{EntryKind, PermissionMode, PermissionState};
pub use error::{ErrorKind, FsError, FsResult};
pub use ids::{EntityId, SessionId};
