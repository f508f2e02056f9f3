//! Incremental line decoder over a shared byte stream.
//!
//! Bytes arrive in arbitrary-sized reads; the decoder accumulates them and
//! splits on `\n`. Each complete line is classified:
//!
//! 1. Parses as a JSON object with a recognized `"type"` → control frame.
//! 2. Recognized `"type"` but missing/mistyped fields → error (the session
//!    aborts the transfer it belongs to; the stream continues).
//! 3. Anything else → chat. The chat case hands over the **entire**
//!    remaining accumulator as one message, trailing newlines stripped,
//!    and clears the buffer.
//!
//! Rule 3 mirrors the wire behavior this protocol was built around: chat
//! bursts that land in a single read collapse into one displayed message.
//! Control frames, which are what actually carry data, are unaffected by
//! read-boundary placement.

use serde_json::Value;

use crate::{
    errors::ProtocolError,
    frame::{ControlFrame, DecodedLine},
};

/// Outcome of classifying a single candidate line.
enum Classified {
    Control(ControlFrame),
    Malformed(String),
    Chat,
}

fn classify(line: &str) -> Classified {
    let Ok(value) = serde_json::from_str::<Value>(line) else {
        return Classified::Chat;
    };

    // Unknown or absent discriminators are chat, not errors: a user can
    // legitimately type a line of JSON.
    let recognized = matches!(
        value.get("type").and_then(Value::as_str),
        Some("[FILE_START]" | "[FILE_DATA]" | "[FILE_END]")
    );
    if !recognized {
        return Classified::Chat;
    }

    match serde_json::from_value::<ControlFrame>(value) {
        Ok(frame) => Classified::Control(frame),
        Err(e) => Classified::Malformed(e.to_string()),
    }
}

/// Incremental decoder for the inbound byte stream.
///
/// The accumulator buffer is the only inbound state the codec holds; it
/// persists across [`feed`](Self::feed) calls within one session.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    buffer: Vec<u8>,
}

impl StreamDecoder {
    /// Create a decoder with an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append freshly received bytes to the accumulator.
    pub fn feed(&mut self, incoming: &[u8]) {
        self.buffer.extend_from_slice(incoming);
    }

    /// Bytes currently buffered (complete and partial lines).
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Decode the next line, if a complete one is buffered.
    ///
    /// Returns `None` when no `\n` is buffered yet. Errors consume the
    /// offending bytes, so callers can keep draining after reporting them.
    pub fn next_line(&mut self) -> Option<Result<DecodedLine, ProtocolError>> {
        let newline = self.buffer.iter().position(|&b| b == b'\n')?;

        let text = match std::str::from_utf8(&self.buffer[..newline]) {
            Ok(text) => text,
            Err(e) => {
                self.buffer.drain(..=newline);
                return Some(Err(ProtocolError::InvalidUtf8(e)));
            },
        };

        match classify(text) {
            Classified::Control(frame) => {
                self.buffer.drain(..=newline);
                Some(Ok(DecodedLine::Control(frame)))
            },
            Classified::Malformed(reason) => {
                self.buffer.drain(..=newline);
                Some(Err(ProtocolError::MalformedControl { reason }))
            },
            Classified::Chat => {
                // The whole accumulator, not just this line, becomes one
                // chat message. Partial trailing data is included.
                let mut taken = std::mem::take(&mut self.buffer);
                while taken.last() == Some(&b'\n') {
                    taken.pop();
                }
                match String::from_utf8(taken) {
                    Ok(text) => Some(Ok(DecodedLine::Chat(text))),
                    Err(e) => Some(Err(ProtocolError::InvalidUtf8(e.utf8_error()))),
                }
            },
        }
    }
}
