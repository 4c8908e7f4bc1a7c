//! Write chunks and commands
//!
//! A sink accepts raw binary, text, an opaque byte aggregate, or a tagged
//! command. Commands arrive either from typed callers or as the JSON wire
//! shape `{"type": "write" | "seek" | "truncate", ...}`.

use byte_store::ByteStore;
use bytes::Bytes;
use core_types::{FsError, FsResult};
use serde_json::{Map, Value};

/// Payload of a data write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteData {
    /// Raw binary
    Bytes(Bytes),
    /// UTF-8 text
    Text(String),
    /// Opaque byte aggregate, possibly made of many segments
    Store(ByteStore),
}

impl WriteData {
    pub fn len(&self) -> usize {
        match self {
            WriteData::Bytes(bytes) => bytes.len(),
            WriteData::Text(text) => text.len(),
            WriteData::Store(store) => store.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Converts the payload into a byte store without copying binary input
    pub fn into_store(self) -> ByteStore {
        match self {
            WriteData::Bytes(bytes) => ByteStore::from(bytes),
            WriteData::Text(text) => ByteStore::from(text),
            WriteData::Store(store) => store,
        }
    }
}

impl From<Bytes> for WriteData {
    fn from(bytes: Bytes) -> Self {
        WriteData::Bytes(bytes)
    }
}

impl From<Vec<u8>> for WriteData {
    fn from(data: Vec<u8>) -> Self {
        WriteData::Bytes(Bytes::from(data))
    }
}

impl From<&[u8]> for WriteData {
    fn from(data: &[u8]) -> Self {
        WriteData::Bytes(Bytes::copy_from_slice(data))
    }
}

impl From<String> for WriteData {
    fn from(text: String) -> Self {
        WriteData::Text(text)
    }
}

impl From<&str> for WriteData {
    fn from(text: &str) -> Self {
        WriteData::Text(text.to_string())
    }
}

impl From<ByteStore> for WriteData {
    fn from(store: ByteStore) -> Self {
        WriteData::Store(store)
    }
}

/// Tagged write command
///
/// Positions and sizes are signed so that out-of-range input from callers
/// reaches the editor and is rejected there instead of being coerced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteCommand {
    Write {
        position: Option<i64>,
        data: Option<WriteData>,
    },
    Seek {
        position: i64,
    },
    Truncate {
        size: i64,
    },
}

impl WriteCommand {
    pub fn write(data: impl Into<WriteData>) -> Self {
        WriteCommand::Write {
            position: None,
            data: Some(data.into()),
        }
    }

    pub fn write_at(position: i64, data: impl Into<WriteData>) -> Self {
        WriteCommand::Write {
            position: Some(position),
            data: Some(data.into()),
        }
    }

    pub fn seek(position: i64) -> Self {
        WriteCommand::Seek { position }
    }

    pub fn truncate(size: i64) -> Self {
        WriteCommand::Truncate { size }
    }

    /// Decodes the JSON wire shape of a command.
    ///
    /// A `write` position that is not a non-negative integer is dropped and
    /// the write happens at the cursor. `seek` needs an integer position
    /// (a negative one is passed on and rejected by the editor); `truncate`
    /// needs a non-negative integer size. `data` is a string or an array
    /// of byte values.
    pub fn from_wire(value: &Value) -> FsResult<Self> {
        let fields = value
            .as_object()
            .ok_or_else(|| FsError::malformed("command must be an object"))?;

        match fields.get("type").and_then(Value::as_str) {
            Some("write") => {
                let position = fields
                    .get("position")
                    .and_then(integer)
                    .filter(|position| *position >= 0);
                let data = decode_data(fields)?;
                Ok(WriteCommand::Write { position, data })
            }
            Some("seek") => {
                let position = fields
                    .get("position")
                    .and_then(integer)
                    .ok_or_else(|| FsError::malformed("seek requires a position argument"))?;
                Ok(WriteCommand::Seek { position })
            }
            Some("truncate") => {
                let size = fields
                    .get("size")
                    .and_then(integer)
                    .filter(|size| *size >= 0)
                    .ok_or_else(|| FsError::malformed("truncate requires a size argument"))?;
                Ok(WriteCommand::Truncate { size })
            }
            Some(other) => Err(FsError::malformed(format!(
                "unknown command type '{}'",
                other
            ))),
            None => Err(FsError::malformed("command requires a type")),
        }
    }
}

/// Integral JSON number, accepting floats with no fractional part
fn integer(value: &Value) -> Option<i64> {
    if let Some(int) = value.as_i64() {
        return Some(int);
    }
    let float = value.as_f64()?;
    if float.fract() == 0.0 && float >= i64::MIN as f64 && float <= i64::MAX as f64 {
        Some(float as i64)
    } else {
        None
    }
}

fn decode_data(fields: &Map<String, Value>) -> FsResult<Option<WriteData>> {
    match fields.get("data") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(WriteData::Text(text.clone()))),
        Some(Value::Array(items)) => {
            let bytes = items
                .iter()
                .map(|item| {
                    item.as_u64()
                        .and_then(|b| u8::try_from(b).ok())
                        .ok_or_else(|| FsError::malformed("data bytes must be integers 0-255"))
                })
                .collect::<FsResult<Vec<u8>>>()?;
            Ok(Some(WriteData::from(bytes)))
        }
        Some(_) => Err(FsError::malformed("data must be a string or a byte array")),
    }
}

/// One item written to a sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteChunk {
    Data(WriteData),
    Command(WriteCommand),
}

impl From<WriteData> for WriteChunk {
    fn from(data: WriteData) -> Self {
        WriteChunk::Data(data)
    }
}

impl From<WriteCommand> for WriteChunk {
    fn from(command: WriteCommand) -> Self {
        WriteChunk::Command(command)
    }
}

impl From<Bytes> for WriteChunk {
    fn from(bytes: Bytes) -> Self {
        WriteChunk::Data(WriteData::Bytes(bytes))
    }
}

impl From<Vec<u8>> for WriteChunk {
    fn from(data: Vec<u8>) -> Self {
        WriteChunk::Data(WriteData::from(data))
    }
}

impl From<&[u8]> for WriteChunk {
    fn from(data: &[u8]) -> Self {
        WriteChunk::Data(WriteData::from(data))
    }
}

impl From<String> for WriteChunk {
    fn from(text: String) -> Self {
        WriteChunk::Data(WriteData::Text(text))
    }
}

impl From<&str> for WriteChunk {
    fn from(text: &str) -> Self {
        WriteChunk::Data(WriteData::from(text))
    }
}

impl From<ByteStore> for WriteChunk {
    fn from(store: ByteStore) -> Self {
        WriteChunk::Data(WriteData::Store(store))
    }
}
