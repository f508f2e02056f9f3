//! Client
//!
//! Action-based state machines for a wirechat session, plus the TCP
//! transport that feeds them.
//!
//! # Architecture
//!
//! The protocol logic is Sans-IO: [`Session`] consumes [`SessionEvent`]s
//! and returns [`SessionAction`]s for the caller to execute. The session
//! owns the [`Transfers`] machine for in-band file transfer. The
//! [`transport`] module is a thin I/O layer that turns a TCP socket into a
//! decoded-line channel and a byte sink; it holds no protocol state.
//!
//! # Components
//!
//! - [`Session`]: connection-lifecycle and dispatch state machine
//! - [`Transfers`]: inbound/outbound file transfer state machine
//! - [`SessionEvent`] / [`SessionAction`]: the caller contract
//! - [`transport::Connection`]: connected TCP transport handle

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod error;
mod event;
mod session;
mod transfer;
pub mod transport;

pub use error::{ClientError, FileError, TransportError};
pub use event::{DisplayKind, SessionAction, SessionEvent};
pub use session::{Session, SessionState};
pub use transfer::{
    AcceptOutcome, ChunkOutcome, Direction, EndOutcome, OutboundTransfer, StartOutcome, Transfers,
    probe_file, spawn_file_reader,
};
