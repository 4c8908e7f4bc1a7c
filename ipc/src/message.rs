//! Channel protocol messages
//!
//! Both directions share one tagged union. The producer sends `WRITE`,
//! `ABORT` and `CLOSE`; the consumer sends `PULL` (a credit grant) and
//! `ERROR`.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A protocol message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum ChannelMessage {
    /// Producer -> consumer: one chunk of raw bytes
    Write { chunk: Bytes },
    /// Consumer -> producer: one credit
    Pull,
    /// Consumer -> producer: the consumer gave up
    Error { reason: String },
    /// Producer -> consumer: the producer gave up
    Abort { reason: String },
    /// Producer -> consumer: no more chunks
    Close,
}

/// Tag of a [`ChannelMessage`], without its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageTag {
    Write,
    Pull,
    Error,
    Abort,
    Close,
}

impl ChannelMessage {
    pub fn tag(&self) -> MessageTag {
        match self {
            ChannelMessage::Write { .. } => MessageTag::Write,
            ChannelMessage::Pull => MessageTag::Pull,
            ChannelMessage::Error { .. } => MessageTag::Error,
            ChannelMessage::Abort { .. } => MessageTag::Abort,
            ChannelMessage::Close => MessageTag::Close,
        }
    }
}

impl fmt::Display for MessageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageTag::Write => "WRITE",
            MessageTag::Pull => "PULL",
            MessageTag::Error => "ERROR",
            MessageTag::Abort => "ABORT",
            MessageTag::Close => "CLOSE",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_tags() {
        let json = serde_json::to_value(&ChannelMessage::Pull).unwrap();
        assert_eq!(json["type"], "PULL");

        let json = serde_json::to_value(&ChannelMessage::Error {
            reason: "disk full".to_string(),
        })
        .unwrap();
        assert_eq!(json["type"], "ERROR");
        assert_eq!(json["reason"], "disk full");
    }

    #[test]
    fn test_decode_abort() {
        let msg: ChannelMessage =
            serde_json::from_str(r#"{"type":"ABORT","reason":"cancelled"}"#).unwrap();
        assert_eq!(
            msg,
            ChannelMessage::Abort {
                reason: "cancelled".to_string()
            }
        );
        assert_eq!(msg.tag().to_string(), "ABORT");
    }
}
