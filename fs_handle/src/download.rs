//! Write-only handles that deliver to the host's save action

use crate::handle::{FileHandle, RemoveOptions, WritableOptions};
use byte_store::ByteStore;
use core_types::{EntityId, FsError, FsResult};
use log::debug;
use services_storage::Sink;
use services_transfer::TransferOrchestrator;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Name used when the caller does not suggest one
pub const DEFAULT_DOWNLOAD_NAME: &str = "unknown";

/// Handle whose writes become a download
///
/// The content is never readable back; every writable opened on it
/// starts a new transfer through the orchestrator.
pub struct DownloadFileHandle {
    id: EntityId,
    name: String,
    orchestrator: Arc<TransferOrchestrator>,
    deleted: AtomicBool,
}

impl DownloadFileHandle {
    pub fn new(suggested_name: Option<&str>, orchestrator: Arc<TransferOrchestrator>) -> Self {
        Self {
            id: EntityId::new(),
            name: suggested_name.unwrap_or(DEFAULT_DOWNLOAD_NAME).to_string(),
            orchestrator,
            deleted: AtomicBool::new(false),
        }
    }

    pub fn orchestrator(&self) -> &TransferOrchestrator {
        &self.orchestrator
    }
}

impl FileHandle for DownloadFileHandle {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_writable(&self) -> bool {
        true
    }

    fn is_readable(&self) -> bool {
        false
    }

    fn entry_id(&self) -> EntityId {
        self.id
    }

    fn get_content(&self) -> FsResult<ByteStore> {
        Err(FsError::NotFound)
    }

    fn remove(&self, _options: RemoveOptions) -> FsResult<()> {
        self.deleted.store(true, Ordering::SeqCst);
        debug!("event=download_handle_remove entity={}", self.id);
        Ok(())
    }

    fn create_writable(&self, options: WritableOptions) -> FsResult<Box<dyn Sink>> {
        if self.deleted.load(Ordering::SeqCst) {
            return Err(FsError::NotFound);
        }
        self.orchestrator.open(&self.name, options.size)
    }
}
