//! Transfer state machine.
//!
//! Tracks at most one outbound and one inbound file transfer, enforcing the
//! `FileStart → FileChunk* → FileEnd` sequence in each direction.
//!
//! # State machine (inbound)
//!
//! ```text
//! ┌──────┐ FileStart ┌─────────────┐ accept  ┌────────┐ FileEnd ┌──────────────┐
//! │ Idle │──────────>│ Negotiating │────────>│ Active │────────>│ AwaitingSave │
//! └──────┘           └─────────────┘         └────────┘         └──────────────┘
//!    ^                      │ reject             │ abort                │ saved
//!    └──────────────────────┴────────────────────┴──────────────────────┘
//! ```
//!
//! Chunks arriving while `Idle` are discarded silently: after a reject the
//! peer keeps sending (the protocol has no cancel message) and the discard
//! is the implicit consumption. Chunks arriving while `Negotiating` are
//! buffered provisionally, because the accept prompt no longer blocks the
//! receive path; they are kept on accept and dropped on reject.
//!
//! Outbound is a chunk planner: the caller streams raw chunks through
//! [`OutboundTransfer::chunk`] (reads happen in [`spawn_file_reader`] so the
//! input loop never blocks) and the planner produces the wire frames and
//! progress.
//!
//! All inbound chunks are held in memory until `FileEnd`; the save path is
//! only known then.

use std::path::{Path, PathBuf};

use tokio::{io::AsyncReadExt, sync::mpsc, task::JoinHandle};
use wirechat_proto::{ControlFrame, ProtocolError};

use crate::{error::FileError, event::SessionEvent};

/// Transfer direction, for progress reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// A file being received.
    Inbound,
    /// A file being sent.
    Outbound,
}

/// An outbound file transfer in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundTransfer {
    name: String,
    total_size: u64,
    bytes_sent: u64,
}

impl OutboundTransfer {
    /// File name announced to the peer.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bytes handed to the wire so far (pre-encoding).
    #[must_use]
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    /// Percentage of the file handed to the wire, in `0.0..=100.0`.
    #[must_use]
    pub fn progress(&self) -> f64 {
        if self.total_size == 0 {
            100.0
        } else {
            (self.bytes_sent as f64 / self.total_size as f64) * 100.0
        }
    }
}

/// An inbound file transfer being negotiated or received.
#[derive(Debug)]
struct InboundTransfer {
    name: String,
    expected_size: u64,
    chunks: Vec<Vec<u8>>,
    bytes_received: u64,
    /// `FileEnd` arrived before the accept decision did.
    ended: bool,
}

impl InboundTransfer {
    fn new(name: String, expected_size: u64) -> Self {
        Self { name, expected_size, chunks: Vec::new(), bytes_received: 0, ended: false }
    }

    fn push(&mut self, chunk: Vec<u8>) {
        self.bytes_received += chunk.len() as u64;
        self.chunks.push(chunk);
    }

    fn progress(&self) -> f64 {
        if self.expected_size == 0 {
            100.0
        } else {
            (self.bytes_received as f64 / self.expected_size as f64) * 100.0
        }
    }

    /// Concatenate buffered chunks in arrival order.
    fn assemble(self) -> Vec<u8> {
        let mut data = Vec::with_capacity(self.bytes_received as usize);
        for chunk in self.chunks {
            data.extend_from_slice(&chunk);
        }
        data
    }
}

#[derive(Debug, Default)]
enum InboundState {
    #[default]
    Idle,
    Negotiating(InboundTransfer),
    Active(InboundTransfer),
    AwaitingSave(InboundTransfer),
}

/// Outcome of an inbound `FileStart`.
#[derive(Debug, PartialEq, Eq)]
pub enum StartOutcome {
    /// The frame names the file this session is itself sending; ignored.
    SelfEcho,
    /// A fresh offer; the user must accept or reject.
    Offer {
        /// Offered file name.
        name: String,
        /// Announced size in bytes.
        size: u64,
    },
    /// An inbound transfer is already in progress; the offer is dropped.
    Busy {
        /// Name of the dropped offer.
        name: String,
    },
}

/// Outcome of an inbound `FileChunk`.
#[derive(Debug, PartialEq)]
pub enum ChunkOutcome {
    /// Chunk appended to the buffer.
    Stored {
        /// Bytes received so far.
        bytes_received: u64,
        /// Percentage of the announced size received, in `0.0..=100.0`.
        percent: f64,
    },
    /// No transfer is receiving; the chunk was consumed silently.
    Discarded,
}

/// Outcome of an inbound `FileEnd`.
#[derive(Debug, PartialEq, Eq)]
pub enum EndOutcome {
    /// Transfer complete; the user must choose where to save.
    SaveReady {
        /// Original file name.
        name: String,
        /// Suggested destination.
        default_path: PathBuf,
    },
    /// Nothing user-visible: no active transfer, a self-echo, or the
    /// accept decision is still pending.
    Ignored,
}

/// Outcome of the user's accept decision.
#[derive(Debug, PartialEq, Eq)]
pub enum AcceptOutcome {
    /// Receiving started.
    Receiving {
        /// File being received.
        name: String,
    },
    /// The whole file already arrived during negotiation; skip straight to
    /// the save prompt.
    SaveReady {
        /// Original file name.
        name: String,
        /// Suggested destination.
        default_path: PathBuf,
    },
    /// No offer was pending.
    NoOffer,
}

/// Both transfer directions.
///
/// Touched only from the session (single-writer); the file reader task
/// communicates through [`SessionEvent`]s instead of sharing this state.
#[derive(Debug, Default)]
pub struct Transfers {
    inbound: InboundState,
    outbound: Option<OutboundTransfer>,
}

impl Transfers {
    /// Create with both directions idle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The outbound transfer in flight, if any.
    #[must_use]
    pub fn outbound(&self) -> Option<&OutboundTransfer> {
        self.outbound.as_ref()
    }

    /// True if an inbound transfer is past negotiation and receiving data.
    #[must_use]
    pub fn inbound_active(&self) -> bool {
        matches!(self.inbound, InboundState::Active(_))
    }

    /// Begin an outbound transfer and produce its `FileStart` frame.
    ///
    /// Returns `None` if a send is already in flight: concurrent transfers
    /// in the same direction are rejected, not queued.
    pub fn begin_outbound(&mut self, name: impl Into<String>, size: u64) -> Option<ControlFrame> {
        if self.outbound.is_some() {
            return None;
        }
        let name = name.into();
        let frame = ControlFrame::FileStart { name: name.clone(), size };
        self.outbound = Some(OutboundTransfer { name, total_size: size, bytes_sent: 0 });
        Some(frame)
    }

    /// Turn a raw chunk into its wire frame, advancing progress.
    ///
    /// Returns `None` if no outbound transfer is in flight (a stale reader
    /// task after an abort).
    pub fn outbound_chunk(&mut self, data: &[u8]) -> Option<(ControlFrame, f64)> {
        let transfer = self.outbound.as_mut()?;
        transfer.bytes_sent += data.len() as u64;
        Some((ControlFrame::chunk(data), transfer.progress()))
    }

    /// Complete the outbound transfer, producing `FileEnd`.
    ///
    /// Returns the frame and the finished file's name, or `None` if no
    /// transfer was in flight.
    pub fn finish_outbound(&mut self) -> Option<(ControlFrame, String)> {
        self.outbound.take().map(|t| (ControlFrame::FileEnd, t.name))
    }

    /// Drop the outbound transfer after a read failure.
    ///
    /// Returns the aborted file's name, if a transfer was in flight.
    pub fn abort_outbound(&mut self) -> Option<String> {
        self.outbound.take().map(|t| t.name)
    }

    /// Handle an inbound `FileStart`.
    pub fn on_file_start(&mut self, name: String, size: u64) -> StartOutcome {
        if self.outbound.as_ref().is_some_and(|o| o.name == name) {
            return StartOutcome::SelfEcho;
        }
        match self.inbound {
            InboundState::Idle => {
                self.inbound = InboundState::Negotiating(InboundTransfer::new(name.clone(), size));
                StartOutcome::Offer { name, size }
            },
            // Keep the in-flight transfer; the overlapping offer loses.
            _ => StartOutcome::Busy { name },
        }
    }

    /// Handle an inbound `FileChunk`.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::ChunkPayload` if the payload is not valid base64.
    ///   The caller should abort the inbound transfer.
    pub fn on_file_chunk(&mut self, data: &str) -> Result<ChunkOutcome, ProtocolError> {
        let transfer = match &mut self.inbound {
            InboundState::Active(t) | InboundState::Negotiating(t) => t,
            InboundState::Idle | InboundState::AwaitingSave(_) => {
                return Ok(ChunkOutcome::Discarded);
            },
        };

        let chunk = ControlFrame::decode_chunk_payload(data)?;
        transfer.push(chunk);
        Ok(ChunkOutcome::Stored {
            bytes_received: transfer.bytes_received,
            percent: transfer.progress(),
        })
    }

    /// Handle an inbound `FileEnd`.
    pub fn on_file_end(&mut self) -> EndOutcome {
        match std::mem::take(&mut self.inbound) {
            InboundState::Active(transfer) => {
                // Late self-echo guard: a FileEnd for the file we are
                // ourselves sending must not produce a local write.
                if self.outbound.as_ref().is_some_and(|o| o.name == transfer.name) {
                    self.outbound = None;
                    return EndOutcome::Ignored;
                }
                let name = transfer.name.clone();
                let default_path = default_save_path(&name);
                self.inbound = InboundState::AwaitingSave(transfer);
                EndOutcome::SaveReady { name, default_path }
            },
            InboundState::Negotiating(mut transfer) => {
                // Sender finished before the user decided; remember it so
                // accept() can go straight to the save prompt.
                transfer.ended = true;
                self.inbound = InboundState::Negotiating(transfer);
                EndOutcome::Ignored
            },
            state @ (InboundState::Idle | InboundState::AwaitingSave(_)) => {
                self.inbound = state;
                EndOutcome::Ignored
            },
        }
    }

    /// The user accepted the pending offer.
    pub fn accept(&mut self) -> AcceptOutcome {
        match std::mem::take(&mut self.inbound) {
            InboundState::Negotiating(transfer) if transfer.ended => {
                let name = transfer.name.clone();
                let default_path = default_save_path(&name);
                self.inbound = InboundState::AwaitingSave(transfer);
                AcceptOutcome::SaveReady { name, default_path }
            },
            InboundState::Negotiating(transfer) => {
                let name = transfer.name.clone();
                self.inbound = InboundState::Active(transfer);
                AcceptOutcome::Receiving { name }
            },
            state => {
                self.inbound = state;
                AcceptOutcome::NoOffer
            },
        }
    }

    /// The user rejected the pending offer; buffered chunks are dropped and
    /// the remaining frames of this transfer will be consumed silently.
    pub fn reject(&mut self) {
        if matches!(self.inbound, InboundState::Negotiating(_)) {
            self.inbound = InboundState::Idle;
        }
    }

    /// Take the assembled file once a save path was chosen.
    ///
    /// Returns `None` if no completed transfer is waiting to be saved.
    pub fn take_completed(&mut self) -> Option<Vec<u8>> {
        match std::mem::take(&mut self.inbound) {
            InboundState::AwaitingSave(transfer) => Some(transfer.assemble()),
            state => {
                self.inbound = state;
                None
            },
        }
    }

    /// Abort the inbound transfer after a decode failure.
    ///
    /// Returns the aborted file's name, if a transfer was in progress.
    pub fn abort_inbound(&mut self) -> Option<String> {
        match std::mem::take(&mut self.inbound) {
            InboundState::Idle => None,
            InboundState::Negotiating(t) | InboundState::Active(t) | InboundState::AwaitingSave(t) => {
                Some(t.name)
            },
        }
    }
}

/// Suggested destination for a received file, mirroring the offer's name
/// into the current directory.
fn default_save_path(name: &str) -> PathBuf {
    PathBuf::from(format!("./{name}"))
}

/// Look up the metadata of a file the user wants to send.
///
/// # Errors
///
/// - `FileError::NotFound` if the path does not exist
/// - `FileError::Io` if metadata is unreadable or the path is not a
///   regular file
pub async fn probe_file(path: &Path) -> Result<(String, u64), FileError> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|source| FileError::from_io(path.to_path_buf(), source))?;

    if !metadata.is_file() {
        return Err(FileError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::other("not a regular file"),
        });
    }

    let name = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());

    Ok((name, metadata.len()))
}

/// Stream a file's chunks into the session's event queue.
///
/// Runs as a detached task so the interactive input loop keeps running
/// while a send is in flight. Chunks are full `chunk_size` reads except the
/// last; the session turns each one into a wire frame.
pub fn spawn_file_reader(
    path: PathBuf,
    chunk_size: usize,
    events: mpsc::Sender<SessionEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) => {
                let error = FileError::from_io(path, e);
                let _ = events.send(SessionEvent::OutboundReadFailed(error.to_string())).await;
                return;
            },
        };

        let mut buf = vec![0u8; chunk_size.max(1)];
        loop {
            // Fill the chunk completely; short reads happen on file I/O.
            let mut filled = 0;
            while filled < buf.len() {
                match file.read(&mut buf[filled..]).await {
                    Ok(0) => break,
                    Ok(n) => filled += n,
                    Err(e) => {
                        let error = FileError::from_io(path, e);
                        let _ = events
                            .send(SessionEvent::OutboundReadFailed(error.to_string()))
                            .await;
                        return;
                    },
                }
            }

            if filled == 0 {
                let _ = events.send(SessionEvent::OutboundFileDrained).await;
                return;
            }

            if events.send(SessionEvent::OutboundChunkRead(buf[..filled].to_vec())).await.is_err() {
                // Session is gone; nothing left to report to.
                return;
            }
        }
    })
}
