//! Download response headers and RFC 5987 file names

use serde::{Deserialize, Serialize};

/// Percent-encodes a file name for `filename*=UTF-8''...` and URL paths.
///
/// Alphanumerics and `-_.!~` pass through; every other UTF-8 byte becomes
/// `%XX`. `'`, `(`, `)` and `*` are escaped too, since RFC 5987 reserves them.
pub fn encode_filename(name: &str) -> String {
    let mut encoded = String::with_capacity(name.len());
    for byte in name.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b'!' | b'~') {
            encoded.push(char::from(byte));
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }
    encoded
}

/// Reverses [`encode_filename`]. Returns None on a malformed escape or
/// a result that is not UTF-8.
pub fn decode_filename(encoded: &str) -> Option<String> {
    let raw = encoded.as_bytes();
    let mut decoded = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'%' {
            let hex = encoded.get(i + 1..i + 3)?;
            if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
                return None;
            }
            decoded.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            decoded.push(raw[i]);
            i += 1;
        }
    }
    String::from_utf8(decoded).ok()
}

/// Headers the delegate attaches to a streamed download response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseHeaders {
    #[serde(rename = "content-disposition")]
    pub content_disposition: String,
    #[serde(rename = "content-type")]
    pub content_type: String,
    #[serde(
        rename = "content-length",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub content_length: Option<u64>,
}

impl ResponseHeaders {
    /// Builds the attachment headers for `file_name`.
    ///
    /// A declared size of zero is treated like no size at all.
    pub fn attachment(file_name: &str, content_type: &str, size: Option<u64>) -> Self {
        Self {
            content_disposition: format!(
                "attachment; filename*=UTF-8''{}",
                encode_filename(file_name)
            ),
            content_type: content_type.to_string(),
            content_length: size.filter(|size| *size > 0),
        }
    }
}
