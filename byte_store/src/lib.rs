//! # Byte Store
//!
//! Immutable byte sequences with cheap slicing and concatenation.
//!
//! ## Philosophy
//!
//! - **Values, not buffers**: A [`ByteStore`] never changes after it is built.
//!   Editing produces a new store; older snapshots stay valid.
//! - **Views, not copies**: A store is a list of reference-counted
//!   [`Bytes`] segments. Slicing narrows segment views, concatenation
//!   appends segment handles, and zero fill points into a shared static page.
//! - **Flatten on demand**: Only [`ByteStore::to_bytes`] and
//!   [`ByteStore::to_vec`] materialize contiguous memory.

use bytes::{Bytes, BytesMut};
use std::fmt;

/// Size of the shared zero page used for padding
const ZERO_PAGE_LEN: usize = 64 * 1024;

static ZERO_PAGE: [u8; ZERO_PAGE_LEN] = [0; ZERO_PAGE_LEN];

/// Segment count above which a concatenation is flattened into one segment
///
/// Every positional write splits the store into head/data/tail, so a long
/// edit session would otherwise grow the segment list without bound.
pub const MAX_SEGMENTS: usize = 512;

/// Immutable sequence of bytes
#[derive(Clone, Default)]
pub struct ByteStore {
    segments: Vec<Bytes>,
    len: usize,
}

impl ByteStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `len` zero bytes
    pub fn zeroed(len: usize) -> Self {
        let mut segments = Vec::with_capacity(len.div_ceil(ZERO_PAGE_LEN));
        let mut remaining = len;
        while remaining > 0 {
            let take = remaining.min(ZERO_PAGE_LEN);
            segments.push(Bytes::from_static(&ZERO_PAGE[..take]));
            remaining -= take;
        }
        Self { segments, len }
    }

    /// Creates a store from a static byte slice without copying
    pub fn from_static(data: &'static [u8]) -> Self {
        Self::from(Bytes::from_static(data))
    }

    /// Returns the number of bytes in the store
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the bytes in `[start, end)` as a new store.
    ///
    /// Bounds are clamped the way blob slicing clamps them: `end` is capped at
    /// the length and `start` at `end`, so out-of-range requests yield a
    /// shorter (possibly empty) store instead of failing.
    pub fn slice(&self, start: usize, end: usize) -> ByteStore {
        let end = end.min(self.len);
        let start = start.min(end);
        if start == 0 && end == self.len {
            return self.clone();
        }

        let mut segments = Vec::new();
        let mut offset = 0;
        for segment in &self.segments {
            let seg_start = offset;
            let seg_end = offset + segment.len();
            offset = seg_end;

            if seg_end <= start {
                continue;
            }
            if seg_start >= end {
                break;
            }

            let from = start.saturating_sub(seg_start);
            let to = end.min(seg_end) - seg_start;
            segments.push(segment.slice(from..to));
        }

        Self {
            segments,
            len: end - start,
        }
    }

    /// Joins `parts` in order into a new store
    pub fn concat<I>(parts: I) -> ByteStore
    where
        I: IntoIterator<Item = ByteStore>,
    {
        let mut segments = Vec::new();
        let mut len = 0;
        for part in parts {
            len += part.len;
            segments.extend(part.segments);
        }

        let store = Self { segments, len };
        if store.segments.len() > MAX_SEGMENTS {
            ByteStore::from(store.to_bytes())
        } else {
            store
        }
    }

    /// Returns a store with `len - self.len()` zero bytes appended, or `self`
    /// unchanged when it is already at least `len` long.
    pub fn zero_extended(&self, len: usize) -> ByteStore {
        if len <= self.len {
            return self.clone();
        }
        ByteStore::concat([self.clone(), ByteStore::zeroed(len - self.len)])
    }

    /// Iterates over the underlying segments in order
    pub fn segments(&self) -> impl Iterator<Item = &Bytes> {
        self.segments.iter()
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Returns the content as one contiguous buffer.
    ///
    /// A single-segment store is returned without copying.
    pub fn to_bytes(&self) -> Bytes {
        match self.segments.as_slice() {
            [] => Bytes::new(),
            [only] => only.clone(),
            many => {
                let mut buf = BytesMut::with_capacity(self.len);
                for segment in many {
                    buf.extend_from_slice(segment);
                }
                buf.freeze()
            }
        }
    }

    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len);
        for segment in &self.segments {
            out.extend_from_slice(segment);
        }
        out
    }
}

impl From<Bytes> for ByteStore {
    fn from(bytes: Bytes) -> Self {
        let len = bytes.len();
        let segments = if len == 0 { Vec::new() } else { vec![bytes] };
        Self { segments, len }
    }
}

impl From<Vec<u8>> for ByteStore {
    fn from(data: Vec<u8>) -> Self {
        Self::from(Bytes::from(data))
    }
}

impl From<&[u8]> for ByteStore {
    fn from(data: &[u8]) -> Self {
        Self::from(Bytes::copy_from_slice(data))
    }
}

impl From<String> for ByteStore {
    fn from(text: String) -> Self {
        Self::from(Bytes::from(text))
    }
}

impl From<&str> for ByteStore {
    fn from(text: &str) -> Self {
        Self::from(text.as_bytes())
    }
}

impl PartialEq for ByteStore {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len
            && self
                .segments
                .iter()
                .flat_map(|s| s.iter())
                .eq(other.segments.iter().flat_map(|s| s.iter()))
    }
}

impl Eq for ByteStore {}

impl PartialEq<[u8]> for ByteStore {
    fn eq(&self, other: &[u8]) -> bool {
        self.len == other.len()
            && self
                .segments
                .iter()
                .flat_map(|s| s.iter())
                .eq(other.iter())
    }
}

impl PartialEq<&[u8]> for ByteStore {
    fn eq(&self, other: &&[u8]) -> bool {
        *self == **other
    }
}

impl fmt::Debug for ByteStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteStore")
            .field("len", &self.len)
            .field("segments", &self.segments.len())
            .finish()
    }
}
