//! Chunk normalization for downloads
//!
//! Download sinks only move raw binary. Text is encoded as UTF-8 and byte
//! aggregates are pumped one segment at a time, so a large aggregate never
//! has to be flattened before it is sent.

use bytes::Bytes;
use core_types::{FsError, FsResult};
use services_storage::{WriteChunk, WriteCommand, WriteData};

/// Extracts the payload of a chunk written to a download sink.
///
/// Downloads are append-only: seek, truncate and positioned writes are
/// refused with InvalidModification.
pub fn download_payload(chunk: WriteChunk) -> FsResult<WriteData> {
    match chunk {
        WriteChunk::Data(data) => Ok(data),
        WriteChunk::Command(WriteCommand::Write { position, data }) => {
            let data = data.ok_or_else(|| FsError::malformed("write requires a data argument"))?;
            match position {
                None => Ok(data),
                Some(_) => Err(FsError::InvalidModification),
            }
        }
        WriteChunk::Command(WriteCommand::Seek { .. })
        | WriteChunk::Command(WriteCommand::Truncate { .. }) => Err(FsError::InvalidModification),
    }
}

/// Iterator over the binary pieces of one payload
#[derive(Debug)]
pub struct Normalized {
    pieces: std::vec::IntoIter<Bytes>,
}

impl Iterator for Normalized {
    type Item = Bytes;

    fn next(&mut self) -> Option<Bytes> {
        self.pieces.next()
    }
}

/// Splits `data` into non-empty binary pieces, in order
pub fn normalize(data: WriteData) -> Normalized {
    let mut pieces: Vec<Bytes> = match data {
        WriteData::Bytes(bytes) => vec![bytes],
        WriteData::Text(text) => vec![Bytes::from(text.into_bytes())],
        WriteData::Store(store) => store.segments().cloned().collect(),
    };
    pieces.retain(|piece| !piece.is_empty());
    Normalized {
        pieces: pieces.into_iter(),
    }
}
