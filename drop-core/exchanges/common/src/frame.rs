//! Framing on the direct channel.
//!
//! The channel carries two kinds of messages and tells them apart by its own
//! representation, never by an in-band marker:
//! - text messages hold JSON-encoded [`ControlFrame`]s (`meta` / `end`);
//! - binary messages hold raw chunk bytes with no length prefix, the channel
//!   delivering each one whole.

use serde::{Deserialize, Serialize};

/// Description of the file whose chunks follow.
///
/// Sent by the sender right before the first chunk of a file; the receiver
/// uses it to allocate reconstruction state and drive progress reporting.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
    /// Display name, unique among the sender's in-flight transfers.
    pub name: String,
    /// Declared total byte length.
    pub size: u64,
    /// Optional MIME type, `mime` on the wire.
    #[serde(
        rename = "mime",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub mime_type: Option<String>,
}

/// Structured control message, tagged by `type` on the wire.
///
/// ```
/// use roomdropx_common::{ControlFrame, FileMeta};
///
/// let meta = ControlFrame::Meta(FileMeta {
///     name: "x.bin".into(),
///     size: 3,
///     mime_type: None,
/// });
/// assert_eq!(
///     meta.to_json().unwrap(),
///     r#"{"type":"meta","name":"x.bin","size":3}"#
/// );
/// assert_eq!(ControlFrame::End.to_json().unwrap(), r#"{"type":"end"}"#);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlFrame {
    Meta(FileMeta),
    End,
}

impl ControlFrame {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Encodes the control frame as a text frame.
    pub fn to_frame(&self) -> serde_json::Result<Frame> {
        Ok(Frame::Text(self.to_json()?))
    }
}

/// A single message as the direct channel represents it natively.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

impl Frame {
    /// Number of payload bytes the frame occupies in the channel buffer.
    pub fn len(&self) -> usize {
        match self {
            Frame::Text(text) => text.len(),
            Frame::Binary(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, Frame::Binary(_))
    }
}
