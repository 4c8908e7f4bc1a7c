//! The file handle contract

use crate::stream::WritableFileStream;
use byte_store::ByteStore;
use core_types::{EntityId, EntryKind, FsResult, PermissionMode, PermissionState};
use serde::{Deserialize, Serialize};
use services_storage::Sink;

/// Options for [`FileHandle::create_writable`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WritableOptions {
    /// Start from the committed content instead of an empty file
    pub keep_existing_data: bool,
    /// Declared total size, announced to download consumers
    pub size: Option<u64>,
}

/// Options for [`FileHandle::remove`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoveOptions {
    pub recursive: bool,
}

/// A handle to one file entry
///
/// Handles are thin: all state lives in the entity store or the transfer
/// service behind them.
pub trait FileHandle: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> EntryKind {
        EntryKind::File
    }

    fn is_writable(&self) -> bool;

    fn is_readable(&self) -> bool;

    /// Identity of the entry behind this handle
    fn entry_id(&self) -> EntityId;

    /// Returns the committed content
    fn get_content(&self) -> FsResult<ByteStore>;

    /// Removes the entry; later reads and edits fail NotFound
    fn remove(&self, options: RemoveOptions) -> FsResult<()>;

    /// Opens a sink for a new edit
    fn create_writable(&self, options: WritableOptions) -> FsResult<Box<dyn Sink>>;

    /// Like [`create_writable`](Self::create_writable), wrapped in a stream
    fn create_writable_stream(&self, options: WritableOptions) -> FsResult<WritableFileStream> {
        self.create_writable(options).map(WritableFileStream::new)
    }

    fn is_same_entry(&self, other: &dyn FileHandle) -> bool {
        self.kind() == other.kind() && self.entry_id() == other.entry_id()
    }

    fn query_permission(&self, mode: PermissionMode) -> PermissionState {
        PermissionState::for_mode(mode, self.is_writable())
    }

    fn request_permission(&self, mode: PermissionMode) -> PermissionState {
        self.query_permission(mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writable_options_wire_shape() {
        let options: WritableOptions =
            serde_json::from_str(r#"{"keepExistingData": true, "size": 12}"#).unwrap();
        assert_eq!(
            options,
            WritableOptions {
                keep_existing_data: true,
                size: Some(12)
            }
        );
        assert_eq!(
            serde_json::from_str::<WritableOptions>("{}").unwrap(),
            WritableOptions::default()
        );
    }
}
