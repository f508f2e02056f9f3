//! Error types for the client.
//!
//! Strongly-typed errors split by layer: transport failures (connect, send,
//! receive), file I/O failures (send source, save destination), and the
//! codec's [`ProtocolError`] re-surfaced at the session boundary.
//!
//! The policy is isolation: per-frame and per-transfer errors are reported
//! and contained; only an unrecoverable transport failure (or an explicit
//! user exit) ends the session.

use std::{io, path::PathBuf};

use thiserror::Error;
use wirechat_proto::ProtocolError;

/// Failures on the TCP transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Establishing the connection failed.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        /// Address we tried to reach.
        addr: String,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },

    /// A send was attempted after the connection closed.
    #[error("connection is closed")]
    Closed,

    /// Socket-level I/O failure after establishment.
    #[error("connection I/O failed: {0}")]
    Io(#[from] io::Error),
}

/// Failures touching the local filesystem during a transfer.
///
/// These never affect the live connection: the send or save is abandoned
/// and the session keeps running.
#[derive(Debug, Error)]
pub enum FileError {
    /// The source path for a send does not exist.
    #[error("file not found: {}", path.display())]
    NotFound {
        /// Path the user asked to send.
        path: PathBuf,
    },

    /// Reading the source or writing the destination failed.
    #[error("{}: {source}", path.display())]
    Io {
        /// Path involved in the failed operation.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

impl FileError {
    /// Wrap an I/O error, mapping `NotFound` to the dedicated variant.
    pub fn from_io(path: PathBuf, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            Self::NotFound { path }
        } else {
            Self::Io { path, source }
        }
    }
}

/// Top-level client error.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Wire codec failure.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Local file failure.
    #[error(transparent)]
    File(#[from] FileError),
}

impl ClientError {
    /// Returns true if this error ends the session.
    ///
    /// Only transport failures are fatal. Protocol errors abort the frame
    /// or transfer they belong to, file errors abandon the one operation;
    /// both leave the connection running.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_are_fatal() {
        let err = ClientError::from(TransportError::Closed);
        assert!(err.is_fatal());
    }

    #[test]
    fn protocol_and_file_errors_are_isolated() {
        let protocol = ClientError::from(ProtocolError::MalformedControl {
            reason: "missing field `size`".into(),
        });
        assert!(!protocol.is_fatal());

        let file = ClientError::from(FileError::NotFound { path: PathBuf::from("/tmp/nope") });
        assert!(!file.is_fatal());
    }

    #[test]
    fn missing_source_file_maps_to_not_found() {
        let io = io::Error::new(io::ErrorKind::NotFound, "no such file");
        let err = FileError::from_io(PathBuf::from("report.pdf"), io);
        assert!(matches!(err, FileError::NotFound { .. }));

        let io = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let err = FileError::from_io(PathBuf::from("report.pdf"), io);
        assert!(matches!(err, FileError::Io { .. }));
    }
}
