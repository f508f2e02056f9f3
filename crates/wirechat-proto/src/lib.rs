//! Wire framing for the wirechat line protocol.
//!
//! Everything on the wire is a newline-terminated line. A line is either a
//! **control frame** (a single-line JSON object with a recognized `"type"`
//! discriminator, used for file transfer) or **chat text** (raw UTF-8 with a
//! `<sender>: ` prefix). The two kinds share one byte stream; telling them
//! apart is this crate's whole job.
//!
//! # Components
//!
//! - [`ControlFrame`]: tagged union of the file-transfer frames
//! - [`DecodedLine`]: classification result for one inbound line
//! - [`StreamDecoder`]: incremental line splitter/classifier over a byte
//!   accumulator
//! - [`encode_chat`]: chat-line encoder
//!
//! No I/O happens here. The decoder holds no state besides its accumulator
//! buffer, which persists across feeds within one session.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod decoder;
mod errors;
mod frame;

pub use decoder::StreamDecoder;
pub use errors::ProtocolError;
pub use frame::{ControlFrame, DecodedLine, encode_chat};

/// Default decoded chunk size in bytes for outbound file transfer
/// (pre-base64).
pub const DEFAULT_CHUNK_SIZE: usize = 8192;
