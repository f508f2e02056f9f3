//! Session events and actions.
//!
//! The session is a pure state machine: the runtime feeds it
//! [`SessionEvent`]s (decoded wire lines, user input, prompt answers, file
//! reader results) and executes the [`SessionAction`]s it returns (socket
//! writes, display, prompts, file writes). All I/O stays with the caller.

use std::path::PathBuf;

use wirechat_proto::{DecodedLine, ProtocolError};

use crate::transfer::Direction;

/// Events the runtime feeds into the session.
#[derive(Debug)]
pub enum SessionEvent {
    /// The transport finished connecting.
    Connected,

    /// The transport closed (peer disconnect, fatal I/O error, or our own
    /// shutdown completing).
    ConnectionClosed,

    /// The user submitted one input line (command or chat).
    InputSubmitted(String),

    /// A decoded line arrived from the wire.
    LineReceived(DecodedLine),

    /// The decoder rejected an inbound line.
    ProtocolFailed(ProtocolError),

    /// Answer to [`SessionAction::AskAcceptFile`].
    FileAcceptDecision(bool),

    /// Answer to [`SessionAction::AskSavePath`].
    SavePathDecision(PathBuf),

    /// A send source was validated; name and size are known.
    OutboundFileOpened {
        /// Base name announced to the peer.
        name: String,
        /// Total size in bytes.
        size: u64,
    },

    /// The file reader produced one raw chunk.
    OutboundChunkRead(Vec<u8>),

    /// The file reader reached end of file.
    OutboundFileDrained,

    /// The file reader failed; the send is abandoned.
    OutboundReadFailed(String),
}

/// How a [`SessionAction::Display`] line should be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayKind {
    /// A message from another user; rendered with a timestamp.
    PeerChat,
    /// Local echo of our own message; rendered with a timestamp, dimmed.
    OwnEcho,
    /// Neutral status information.
    Info,
    /// Positive outcome.
    Success,
    /// Actionable error.
    Error,
    /// Command help text.
    Help,
}

/// Actions the session produces for the runtime to execute.
#[derive(Debug, PartialEq)]
pub enum SessionAction {
    /// Write these bytes to the connection.
    SendBytes(Vec<u8>),

    /// Show a line to the user.
    Display {
        /// Rendering category.
        kind: DisplayKind,
        /// Text to show.
        text: String,
    },

    /// Ring the notification bell (fire-and-forget; failures ignored).
    Bell,

    /// Clear the screen and reprint the session header.
    ClearScreen,

    /// Ask the user for the path of the file to send; answer arrives as
    /// [`SessionEvent::OutboundFileOpened`] after validation (or an error
    /// display if the path is bad).
    PromptFilePath,

    /// Ask the user to accept or reject an incoming file; answer arrives
    /// as [`SessionEvent::FileAcceptDecision`].
    AskAcceptFile {
        /// Offered file name.
        name: String,
        /// Announced size in bytes.
        size: u64,
    },

    /// Ask the user where to save a completed transfer; answer arrives as
    /// [`SessionEvent::SavePathDecision`].
    AskSavePath {
        /// Original file name.
        name: String,
        /// Suggested destination.
        default: PathBuf,
    },

    /// Persist a completed transfer, creating intermediate directories.
    SaveFile {
        /// Chosen destination.
        path: PathBuf,
        /// Assembled file contents.
        data: Vec<u8>,
    },

    /// Update the transfer progress readout.
    Progress {
        /// Which transfer direction moved.
        direction: Direction,
        /// Percentage complete, in `0.0..=100.0`.
        percent: f64,
    },

    /// Close the connection (leave announcement, then teardown).
    Close,
}
