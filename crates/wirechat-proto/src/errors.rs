//! Error types for the wire codec.
//!
//! Protocol errors never terminate a session: the session layer reports
//! them, aborts the transfer they belong to (if any), and keeps reading.

use thiserror::Error;

/// Result alias for codec operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while encoding or decoding wire lines.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A line on the wire was not valid UTF-8. The offending line is
    /// dropped; the stream continues.
    #[error("line is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// A `[FILE_DATA]` payload failed base64 decoding.
    #[error("chunk payload is not valid base64: {0}")]
    ChunkPayload(#[from] base64::DecodeError),

    /// A control frame failed JSON serialization.
    ///
    /// Practically unreachable for the frame shapes this crate defines;
    /// kept explicit so encoding never panics.
    #[error("control frame encoding failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// A line carried a recognized control discriminator but did not parse
    /// as a complete frame (missing or mistyped fields).
    #[error("malformed control frame: {reason}")]
    MalformedControl {
        /// Parser diagnostic for the failed field.
        reason: String,
    },
}
