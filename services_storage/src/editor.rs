//! Positional editing over an immutable byte store
//!
//! The editor holds a working snapshot and a cursor. Every operation that
//! changes content builds a new snapshot from slices of the old one; the
//! old snapshot is never touched, so anything still holding it keeps
//! seeing the pre-edit bytes.
//!
//! Invariant: `0 <= cursor <= size` after every operation.

use crate::command::{WriteChunk, WriteCommand};
use byte_store::ByteStore;
use core_types::{FsError, FsResult};

/// Largest content an editor grows to unless configured otherwise
pub const DEFAULT_MAX_SIZE: usize = 1 << 30;

/// Write / seek / truncate engine over a [`ByteStore`]
#[derive(Debug, Clone)]
pub struct ByteRangeEditor {
    content: ByteStore,
    cursor: usize,
    max_size: usize,
}

impl Default for ByteRangeEditor {
    fn default() -> Self {
        Self::new(ByteStore::new())
    }
}

impl ByteRangeEditor {
    /// Creates an editor over `content` with the cursor at 0
    pub fn new(content: ByteStore) -> Self {
        Self::with_max_size(content, DEFAULT_MAX_SIZE)
    }

    /// Creates an editor that refuses to grow content past `max_size` bytes
    pub fn with_max_size(content: ByteStore, max_size: usize) -> Self {
        Self {
            content,
            cursor: 0,
            max_size,
        }
    }

    pub fn content(&self) -> &ByteStore {
        &self.content
    }

    pub fn into_content(self) -> ByteStore {
        self.content
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn size(&self) -> usize {
        self.content.len()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Fails when growing the content to `requested` bytes would pass the
    /// limit. Shrinking or staying within the current size always passes.
    fn check_growth(&self, requested: u64) -> FsResult<()> {
        let limit = self.max_size as u64;
        if requested > self.content.len() as u64 && requested > limit {
            return Err(FsError::QuotaExceeded { requested, limit });
        }
        Ok(())
    }

    /// Writes `data`, at `position` if given, otherwise at the cursor.
    ///
    /// A position past the end zero-fills the gap first. Bytes under the
    /// written range are replaced; content past it is kept. Fails with
    /// QuotaExceeded, changing nothing, when the write would end past
    /// [`max_size`](Self::max_size).
    pub fn write(&mut self, data: ByteStore, position: Option<usize>) -> FsResult<()> {
        let start = position.unwrap_or(self.cursor);
        self.check_growth((start as u64).saturating_add(data.len() as u64))?;

        if start > self.content.len() {
            self.content = self.content.zero_extended(start);
        }
        let end = start + data.len();
        let head = self.content.slice(0, start);
        let tail = self.content.slice(end, self.content.len());
        self.content = ByteStore::concat([head, data, tail]);
        self.cursor = end;
        Ok(())
    }

    /// Moves the cursor. Positions past the end fail with InvalidState.
    pub fn seek(&mut self, position: usize) -> FsResult<()> {
        if position > self.content.len() {
            return Err(FsError::seek_failed());
        }
        self.cursor = position;
        Ok(())
    }

    /// Cuts or zero-pads the content to `size` and clamps the cursor.
    pub fn truncate(&mut self, size: usize) -> FsResult<()> {
        self.check_growth(size as u64)?;
        self.content = if size < self.content.len() {
            self.content.slice(0, size)
        } else {
            self.content.zero_extended(size)
        };
        self.cursor = self.cursor.min(size);
        Ok(())
    }

    /// Applies one sink chunk.
    ///
    /// Validation happens before any state changes, so a rejected command
    /// leaves content and cursor exactly as they were.
    pub fn apply(&mut self, chunk: WriteChunk) -> FsResult<()> {
        match chunk {
            WriteChunk::Data(data) => self.write(data.into_store(), None),
            WriteChunk::Command(WriteCommand::Write { position, data }) => {
                let data =
                    data.ok_or_else(|| FsError::malformed("write requires a data argument"))?;
                let position = position.and_then(|p| usize::try_from(p).ok());
                self.write(data.into_store(), position)
            }
            WriteChunk::Command(WriteCommand::Seek { position }) => {
                let position = usize::try_from(position).map_err(|_| FsError::seek_failed())?;
                self.seek(position)
            }
            WriteChunk::Command(WriteCommand::Truncate { size }) => {
                let size = usize::try_from(size)
                    .map_err(|_| FsError::malformed("truncate requires a size argument"))?;
                self.truncate(size)
            }
        }
    }
}
