//! Writable file streams
//!
//! A thin front over a [`Sink`] with the familiar `write` / `seek` /
//! `truncate` / `close` surface. Once closed or aborted the stream refuses
//! further writes itself, without consulting the sink.

use core_types::{FsError, FsResult};
use services_storage::{Sink, WriteChunk, WriteCommand};

const STREAM_CLOSED_MESSAGE: &str = "Cannot write to a CLOSED writable stream";

/// Write-side stream opened on a file handle
pub struct WritableFileStream {
    sink: Box<dyn Sink>,
    closed: bool,
}

impl WritableFileStream {
    pub fn new(sink: Box<dyn Sink>) -> Self {
        Self {
            sink,
            closed: false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Writes data at the cursor, or runs a command
    pub fn write(&mut self, chunk: impl Into<WriteChunk>) -> FsResult<()> {
        if self.closed {
            return Err(FsError::invalid_state(STREAM_CLOSED_MESSAGE));
        }
        self.sink.write(chunk.into())
    }

    pub fn seek(&mut self, position: i64) -> FsResult<()> {
        self.write(WriteCommand::seek(position))
    }

    pub fn truncate(&mut self, size: i64) -> FsResult<()> {
        self.write(WriteCommand::truncate(size))
    }

    /// Commits everything written. The stream is closed even if the commit
    /// fails.
    pub fn close(&mut self) -> FsResult<()> {
        if self.closed {
            return Err(FsError::invalid_state(STREAM_CLOSED_MESSAGE));
        }
        self.closed = true;
        self.sink.close()
    }

    /// Discards everything written
    pub fn abort(&mut self, reason: &str) -> FsResult<()> {
        if self.closed {
            return Err(FsError::invalid_state(STREAM_CLOSED_MESSAGE));
        }
        self.closed = true;
        self.sink.abort(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::{FileHandle, WritableOptions};
    use crate::memory::MemoryFileHandle;
    use byte_store::ByteStore;
    use core_types::ErrorKind;

    fn stream_on(content: &str) -> (MemoryFileHandle, WritableFileStream) {
        let handle = MemoryFileHandle::from_content("f", ByteStore::from(content), true);
        let stream = handle
            .create_writable_stream(WritableOptions {
                keep_existing_data: true,
                size: None,
            })
            .unwrap();
        (handle, stream)
    }

    #[test]
    fn test_seek_then_write() {
        let (handle, mut stream) = stream_on("0123456789");
        stream.seek(4).unwrap();
        stream.write("ab").unwrap();
        stream.truncate(8).unwrap();
        stream.close().unwrap();
        assert_eq!(handle.get_content().unwrap(), &b"0123ab67"[..]);
    }

    #[test]
    fn test_write_after_close_is_rejected() {
        let (_handle, mut stream) = stream_on("");
        stream.close().unwrap();
        let err = stream.write("late").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert_eq!(err.to_string(), "Cannot write to a CLOSED writable stream");
        assert!(stream.close().is_err());
    }

    #[test]
    fn test_abort_keeps_old_content() {
        let (handle, mut stream) = stream_on("stable");
        stream.truncate(0).unwrap();
        stream.abort("changed my mind").unwrap();
        assert!(stream.is_closed());
        assert_eq!(handle.get_content().unwrap(), &b"stable"[..]);
    }

    #[test]
    fn test_negative_seek_fails_invalid_state() {
        let (_handle, mut stream) = stream_on("abc");
        assert_eq!(stream.seek(-1).unwrap_err().kind(), ErrorKind::InvalidState);
        assert_eq!(stream.seek(4).unwrap_err().kind(), ErrorKind::InvalidState);
        assert!(stream.seek(3).is_ok());
    }
}
