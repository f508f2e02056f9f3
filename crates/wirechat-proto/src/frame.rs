//! Frame types and line encoders.
//!
//! A wire line is either chat text or one of three file-transfer control
//! frames. Control frames are single-line JSON objects discriminated by a
//! `"type"` field:
//!
//! ```text
//! {"type":"[FILE_START]","name":"report.pdf","size":20000}
//! {"type":"[FILE_DATA]","data":"<base64>"}
//! {"type":"[FILE_END]"}
//! ```
//!
//! Chat lines are raw UTF-8 with no JSON wrapping:
//!
//! ```text
//! alice: hello
//! ```
//!
//! # Invariants
//!
//! - A frame's serialized form contains no embedded unescaped `\n`. JSON
//!   string escaping guarantees this for names; chunk payloads are base64.
//! - Chat text is not escaped at all. Keeping newlines out of it is the
//!   caller's responsibility (interactive input is line-based, so this
//!   holds in practice).

use base64::{Engine as _, prelude::BASE64_STANDARD};
use serde::{Deserialize, Serialize};

use crate::errors::{ProtocolError, Result};

/// A file-transfer control frame.
///
/// Serialized as an internally-tagged JSON object; the tag values are the
/// literal bracketed markers used on the wire. The enum replaces ad-hoc
/// object construction so every recognized `type` is matched exhaustively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ControlFrame {
    /// Announces a file transfer: original file name and total size in
    /// bytes. Sent exactly once, before any data.
    #[serde(rename = "[FILE_START]")]
    FileStart {
        /// Base name of the file being offered.
        name: String,
        /// Total decoded size in bytes.
        size: u64,
    },

    /// One chunk of file data, base64-encoded.
    #[serde(rename = "[FILE_DATA]")]
    FileChunk {
        /// Base64 encoding of the raw chunk bytes.
        data: String,
    },

    /// Marks the end of the transfer. Carries no fields.
    #[serde(rename = "[FILE_END]")]
    FileEnd,
}

impl ControlFrame {
    /// Build a `FileChunk` frame from raw bytes.
    #[must_use]
    pub fn chunk(data: &[u8]) -> Self {
        ControlFrame::FileChunk { data: BASE64_STANDARD.encode(data) }
    }

    /// Serialize this frame as a single JSON line terminated by `\n`.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::Encode` if JSON serialization fails (practically
    ///   unreachable for these shapes).
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut line = serde_json::to_string(self).map_err(ProtocolError::Encode)?;
        line.push('\n');
        Ok(line.into_bytes())
    }

    /// Decode a `FileChunk` payload back into raw bytes.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::ChunkPayload` if `data` is not valid base64.
    pub fn decode_chunk_payload(data: &str) -> Result<Vec<u8>> {
        Ok(BASE64_STANDARD.decode(data)?)
    }
}

/// Classification of one decoded inbound line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedLine {
    /// Plain chat text, trailing newlines stripped.
    ///
    /// May span what were several wire lines: once a line fails to classify
    /// as a control frame, the decoder hands over everything it has
    /// buffered as one chat message (see [`crate::StreamDecoder`]).
    Chat(String),

    /// A structurally complete control frame.
    Control(ControlFrame),
}

/// Encode a chat line as `"{sender}: {text}\n"` UTF-8 bytes.
///
/// No escaping is performed on `text`; it must not contain `\n`.
#[must_use]
pub fn encode_chat(sender: &str, text: &str) -> Vec<u8> {
    format!("{sender}: {text}\n").into_bytes()
}
