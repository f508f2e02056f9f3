//! Session controller state machine.
//!
//! Owns the conversational state of one connection: dispatches user input
//! (commands vs. chat), routes decoded wire lines (chat display vs. the
//! transfer machine), and tracks the connection lifecycle.
//!
//! # State machine
//!
//! ```text
//! ┌────────────┐ Connected ┌───────────┐  /exit   ┌─────────┐ closed ┌────────┐
//! │ Connecting │──────────>│ Connected │─────────>│ Closing │───────>│ Closed │
//! └────────────┘           └───────────┘          └─────────┘        └────────┘
//!                                │ peer disconnect / fatal I/O            ^
//!                                └────────────────────────────────────────┘
//! ```
//!
//! `Connected` is the only state that sends or receives. The machine is
//! pure: it consumes [`SessionEvent`]s and returns [`SessionAction`]s for
//! the runtime to execute, in the same action pattern as the transfer
//! machine it drives.

use wirechat_proto::{ControlFrame, DecodedLine, encode_chat};

use crate::{
    event::{DisplayKind, SessionAction, SessionEvent},
    transfer::{AcceptOutcome, ChunkOutcome, Direction, EndOutcome, StartOutcome, Transfers},
};

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Transport establishment in progress.
    Connecting,
    /// Live: sending and receiving are permitted.
    Connected,
    /// User requested exit; waiting for teardown to complete.
    Closing,
    /// Terminal. The connection is gone.
    Closed,
}

/// The fixed command table reachable with a leading `/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Help,
    File,
    Bell,
    Clear,
    Exit,
    Unknown,
}

/// Parse the first token of a slash-command, case-insensitively. Trailing
/// arguments are tolerated and ignored.
fn parse_command(line: &str) -> Command {
    let token = line.split_whitespace().next().unwrap_or(line);
    match token.to_ascii_lowercase().as_str() {
        "/help" => Command::Help,
        "/file" => Command::File,
        "/bell" => Command::Bell,
        "/clear" => Command::Clear,
        "/exit" => Command::Exit,
        _ => Command::Unknown,
    }
}

/// Session controller.
///
/// One per connection. All mutation happens on the runtime's event loop;
/// concurrent activities (the socket reader, the file reader) reach this
/// state only through [`SessionEvent`]s.
#[derive(Debug)]
pub struct Session {
    username: String,
    state: SessionState,
    bell_enabled: bool,
    transfers: Transfers,
}

impl Session {
    /// Create a session in [`SessionState::Connecting`].
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            state: SessionState::Connecting,
            bell_enabled: false,
            transfers: Transfers::new(),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Local username used for the chat prefix and echo suppression.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Whether the notification bell is on.
    #[must_use]
    pub fn bell_enabled(&self) -> bool {
        self.bell_enabled
    }

    /// True while an outbound file transfer is in flight.
    #[must_use]
    pub fn is_sending(&self) -> bool {
        self.transfers.outbound().is_some()
    }

    /// Process one event and return the actions to execute.
    pub fn handle(&mut self, event: SessionEvent) -> Vec<SessionAction> {
        match event {
            // Lifecycle events are valid in any state.
            SessionEvent::Connected => self.on_connected(),
            SessionEvent::ConnectionClosed => self.on_connection_closed(),

            // Everything else requires a live connection.
            event if self.state != SessionState::Connected => {
                tracing::warn!(state = ?self.state, ?event, "event ignored outside Connected");
                vec![]
            },

            SessionEvent::InputSubmitted(line) => self.on_input(&line),
            SessionEvent::LineReceived(line) => self.on_line(line),
            SessionEvent::ProtocolFailed(error) => self.on_protocol_failed(&error.to_string()),
            SessionEvent::FileAcceptDecision(accepted) => self.on_accept_decision(accepted),
            SessionEvent::SavePathDecision(path) => match self.transfers.take_completed() {
                Some(data) => vec![SessionAction::SaveFile { path, data }],
                None => {
                    tracing::warn!("save path chosen but no completed transfer is waiting");
                    vec![]
                },
            },
            SessionEvent::OutboundFileOpened { name, size } => self.on_outbound_opened(name, size),
            SessionEvent::OutboundChunkRead(data) => self.on_outbound_chunk(&data),
            SessionEvent::OutboundFileDrained => self.on_outbound_drained(),
            SessionEvent::OutboundReadFailed(reason) => self.on_outbound_failed(&reason),
        }
    }

    fn on_connected(&mut self) -> Vec<SessionAction> {
        if self.state != SessionState::Connecting {
            tracing::warn!(state = ?self.state, "spurious Connected event");
            return vec![];
        }
        self.state = SessionState::Connected;
        vec![display(DisplayKind::Success, "Connected!")]
    }

    fn on_connection_closed(&mut self) -> Vec<SessionAction> {
        match self.state {
            SessionState::Connected => {
                self.state = SessionState::Closed;
                vec![display(DisplayKind::Info, "Disconnected from server.")]
            },
            SessionState::Closing => {
                self.state = SessionState::Closed;
                vec![]
            },
            SessionState::Connecting | SessionState::Closed => {
                self.state = SessionState::Closed;
                tracing::debug!("connection closed before session was live");
                vec![]
            },
        }
    }

    /// Dispatch one line of user input: `/`-prefixed lines go through the
    /// command table, everything else is a chat message.
    fn on_input(&mut self, line: &str) -> Vec<SessionAction> {
        let line = line.trim();
        if line.is_empty() {
            return vec![];
        }

        if line.starts_with('/') {
            return self.on_command(line);
        }

        // Local echo is unconditional: we do not wait for the server to
        // relay our own message back.
        vec![
            SessionAction::SendBytes(encode_chat(&self.username, line)),
            display(DisplayKind::OwnEcho, format!("{}: {}", self.username, line)),
        ]
    }

    fn on_command(&mut self, line: &str) -> Vec<SessionAction> {
        match parse_command(line) {
            Command::Help => vec![display(DisplayKind::Help, self.help_text())],
            Command::File => {
                if self.transfers.outbound().is_some() {
                    vec![display(DisplayKind::Error, "A file send is already in progress.")]
                } else {
                    vec![SessionAction::PromptFilePath]
                }
            },
            Command::Bell => {
                self.bell_enabled = !self.bell_enabled;
                let status = if self.bell_enabled { "enabled" } else { "disabled" };
                vec![display(DisplayKind::Success, format!("Notification bell {status}."))]
            },
            Command::Clear => vec![SessionAction::ClearScreen],
            Command::Exit => {
                self.state = SessionState::Closing;
                vec![SessionAction::Close]
            },
            Command::Unknown => {
                vec![display(DisplayKind::Error, "Unknown command. Type /help for the list.")]
            },
        }
    }

    fn help_text(&self) -> String {
        let bell = if self.bell_enabled { "on" } else { "off" };
        format!(
            "Commands:\n  /help     - show this help\n  /file     - send a file\n  /bell     - toggle the notification bell (currently: {bell})\n  /clear    - clear the screen\n  /exit     - leave the chat"
        )
    }

    fn on_line(&mut self, line: DecodedLine) -> Vec<SessionAction> {
        match line {
            DecodedLine::Chat(text) => self.on_chat(text),
            DecodedLine::Control(frame) => self.on_control(frame),
        }
    }

    fn on_chat(&mut self, text: String) -> Vec<SessionAction> {
        // Prefix heuristic: a line starting with "{username}:" is assumed
        // to be the server's echo of our own message (already displayed by
        // local echo). This misclassifies chat that merely begins with the
        // same prefix; the wire carries no origin identifier to do better.
        if text.starts_with(&format!("{}:", self.username)) {
            tracing::trace!("suppressed echoed own message");
            return vec![];
        }

        let mut actions = vec![display(DisplayKind::PeerChat, text)];
        if self.bell_enabled {
            actions.push(SessionAction::Bell);
        }
        actions
    }

    fn on_control(&mut self, frame: ControlFrame) -> Vec<SessionAction> {
        match frame {
            ControlFrame::FileStart { name, size } => {
                match self.transfers.on_file_start(name, size) {
                    StartOutcome::SelfEcho => {
                        tracing::debug!("ignoring echoed FileStart for our own send");
                        vec![]
                    },
                    StartOutcome::Offer { name, size } => {
                        let mb = size as f64 / (1024.0 * 1024.0);
                        vec![
                            display(
                                DisplayKind::Info,
                                format!("Incoming file: {name} ({mb:.1} MB)"),
                            ),
                            SessionAction::AskAcceptFile { name, size },
                        ]
                    },
                    StartOutcome::Busy { name } => vec![display(
                        DisplayKind::Error,
                        format!("Ignoring file offer {name}: another transfer is in progress."),
                    )],
                }
            },
            ControlFrame::FileChunk { data } => match self.transfers.on_file_chunk(&data) {
                Ok(ChunkOutcome::Stored { percent, .. }) => {
                    vec![SessionAction::Progress { direction: Direction::Inbound, percent }]
                },
                Ok(ChunkOutcome::Discarded) => {
                    tracing::trace!("discarded chunk with no active transfer");
                    vec![]
                },
                Err(error) => self.on_protocol_failed(&error.to_string()),
            },
            ControlFrame::FileEnd => match self.transfers.on_file_end() {
                EndOutcome::SaveReady { name, default_path } => vec![
                    display(DisplayKind::Success, format!("File {name} received.")),
                    SessionAction::AskSavePath { name, default: default_path },
                ],
                EndOutcome::Ignored => vec![],
            },
        }
    }

    /// A frame failed to decode. The active inbound transfer (if any) is
    /// aborted; the receive loop keeps running either way.
    fn on_protocol_failed(&mut self, reason: &str) -> Vec<SessionAction> {
        match self.transfers.abort_inbound() {
            Some(name) => vec![display(
                DisplayKind::Error,
                format!("Receiving {name} failed: {reason}"),
            )],
            None => {
                tracing::warn!(%reason, "protocol error outside any transfer");
                vec![]
            },
        }
    }

    fn on_accept_decision(&mut self, accepted: bool) -> Vec<SessionAction> {
        if !accepted {
            self.transfers.reject();
            return vec![display(DisplayKind::Info, "File offer declined.")];
        }

        match self.transfers.accept() {
            AcceptOutcome::Receiving { name } => {
                vec![display(DisplayKind::Success, format!("Receiving file: {name}"))]
            },
            AcceptOutcome::SaveReady { name, default_path } => vec![
                display(DisplayKind::Success, format!("File {name} received.")),
                SessionAction::AskSavePath { name, default: default_path },
            ],
            AcceptOutcome::NoOffer => {
                tracing::warn!("accept decision with no pending offer");
                vec![]
            },
        }
    }

    fn on_outbound_opened(&mut self, name: String, size: u64) -> Vec<SessionAction> {
        let Some(frame) = self.transfers.begin_outbound(name.clone(), size) else {
            return vec![display(DisplayKind::Error, "A file send is already in progress.")];
        };

        match frame.encode() {
            Ok(bytes) => vec![
                SessionAction::SendBytes(bytes),
                display(DisplayKind::Info, format!("Sending file: {name}")),
            ],
            Err(error) => {
                self.transfers.abort_outbound();
                vec![display(DisplayKind::Error, format!("File send failed: {error}"))]
            },
        }
    }

    fn on_outbound_chunk(&mut self, data: &[u8]) -> Vec<SessionAction> {
        let Some((frame, percent)) = self.transfers.outbound_chunk(data) else {
            tracing::trace!("chunk from a stale reader task; send was aborted");
            return vec![];
        };

        match frame.encode() {
            Ok(bytes) => vec![
                SessionAction::SendBytes(bytes),
                SessionAction::Progress { direction: Direction::Outbound, percent },
            ],
            Err(error) => {
                self.transfers.abort_outbound();
                vec![display(DisplayKind::Error, format!("File send failed: {error}"))]
            },
        }
    }

    fn on_outbound_drained(&mut self) -> Vec<SessionAction> {
        let Some((frame, name)) = self.transfers.finish_outbound() else {
            return vec![];
        };

        match frame.encode() {
            Ok(bytes) => vec![
                SessionAction::SendBytes(bytes),
                display(DisplayKind::Success, format!("File {name} sent.")),
            ],
            Err(error) => {
                vec![display(DisplayKind::Error, format!("File send failed: {error}"))]
            },
        }
    }

    fn on_outbound_failed(&mut self, reason: &str) -> Vec<SessionAction> {
        match self.transfers.abort_outbound() {
            Some(name) => {
                vec![display(DisplayKind::Error, format!("Sending {name} failed: {reason}"))]
            },
            None => {
                tracing::warn!(%reason, "read failure with no outbound transfer");
                vec![]
            },
        }
    }
}

fn display(kind: DisplayKind, text: impl Into<String>) -> SessionAction {
    SessionAction::Display { kind, text: text.into() }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connected_session(username: &str) -> Session {
        let mut session = Session::new(username);
        session.handle(SessionEvent::Connected);
        assert_eq!(session.state(), SessionState::Connected);
        session
    }

    #[test]
    fn connect_transitions_and_greets() {
        let mut session = Session::new("alice");
        assert_eq!(session.state(), SessionState::Connecting);

        let actions = session.handle(SessionEvent::Connected);
        assert_eq!(session.state(), SessionState::Connected);
        assert!(matches!(
            actions.as_slice(),
            [SessionAction::Display { kind: DisplayKind::Success, .. }]
        ));
    }

    #[test]
    fn input_is_ignored_until_connected() {
        let mut session = Session::new("alice");
        assert!(session.handle(SessionEvent::InputSubmitted("hello".into())).is_empty());
    }

    #[test]
    fn chat_input_sends_and_echoes() {
        let mut session = connected_session("alice");
        let actions = session.handle(SessionEvent::InputSubmitted("hello".into()));

        assert_eq!(
            actions,
            vec![
                SessionAction::SendBytes(b"alice: hello\n".to_vec()),
                SessionAction::Display {
                    kind: DisplayKind::OwnEcho,
                    text: "alice: hello".into()
                },
            ]
        );
    }

    #[test]
    fn empty_input_is_a_no_op() {
        let mut session = connected_session("alice");
        assert!(session.handle(SessionEvent::InputSubmitted("   ".into())).is_empty());
    }

    #[test]
    fn own_echo_is_suppressed_by_prefix() {
        let mut session = connected_session("alice");
        let actions =
            session.handle(SessionEvent::LineReceived(DecodedLine::Chat("alice: hello".into())));
        assert!(actions.is_empty());
    }

    #[test]
    fn foreign_chat_is_displayed() {
        let mut session = connected_session("alice");
        let actions =
            session.handle(SessionEvent::LineReceived(DecodedLine::Chat("bob: hi".into())));

        assert_eq!(
            actions,
            vec![SessionAction::Display { kind: DisplayKind::PeerChat, text: "bob: hi".into() }]
        );
    }

    #[test]
    fn bell_rings_for_foreign_chat_when_enabled() {
        let mut session = connected_session("alice");
        session.handle(SessionEvent::InputSubmitted("/bell".into()));
        assert!(session.bell_enabled());

        let actions =
            session.handle(SessionEvent::LineReceived(DecodedLine::Chat("bob: hi".into())));
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[1], SessionAction::Bell);
    }

    #[test]
    fn commands_are_case_insensitive_and_ignore_arguments() {
        let mut session = connected_session("alice");

        let actions = session.handle(SessionEvent::InputSubmitted("/HELP now".into()));
        assert!(matches!(
            actions.as_slice(),
            [SessionAction::Display { kind: DisplayKind::Help, .. }]
        ));
    }

    #[test]
    fn unknown_command_hints_at_help() {
        let mut session = connected_session("alice");
        let actions = session.handle(SessionEvent::InputSubmitted("/frobnicate".into()));
        assert!(matches!(
            actions.as_slice(),
            [SessionAction::Display { kind: DisplayKind::Error, .. }]
        ));
    }

    #[test]
    fn exit_closes_and_stops_dispatch() {
        let mut session = connected_session("alice");

        let actions = session.handle(SessionEvent::InputSubmitted("/exit".into()));
        assert_eq!(actions, vec![SessionAction::Close]);
        assert_eq!(session.state(), SessionState::Closing);

        // Teardown completes.
        session.handle(SessionEvent::ConnectionClosed);
        assert_eq!(session.state(), SessionState::Closed);

        // Nothing is sent after Closing.
        assert!(session.handle(SessionEvent::InputSubmitted("hello".into())).is_empty());
    }

    #[test]
    fn peer_disconnect_reports_and_closes() {
        let mut session = connected_session("alice");
        let actions = session.handle(SessionEvent::ConnectionClosed);

        assert_eq!(session.state(), SessionState::Closed);
        assert!(matches!(
            actions.as_slice(),
            [SessionAction::Display { kind: DisplayKind::Info, .. }]
        ));
    }

    #[test]
    fn file_offer_prompts_for_acceptance() {
        let mut session = connected_session("alice");
        let actions = session.handle(SessionEvent::LineReceived(DecodedLine::Control(
            ControlFrame::FileStart { name: "notes.txt".into(), size: 4 },
        )));

        assert_eq!(actions.len(), 2);
        assert_eq!(actions[1], SessionAction::AskAcceptFile { name: "notes.txt".into(), size: 4 });
    }

    #[test]
    fn accepted_transfer_reassembles_and_saves() {
        let mut session = connected_session("alice");
        session.handle(SessionEvent::LineReceived(DecodedLine::Control(
            ControlFrame::FileStart { name: "notes.txt".into(), size: 4 },
        )));
        session.handle(SessionEvent::FileAcceptDecision(true));

        let chunk = ControlFrame::chunk(b"wire");
        let actions = session.handle(SessionEvent::LineReceived(DecodedLine::Control(chunk)));
        assert!(matches!(
            actions.as_slice(),
            [SessionAction::Progress { direction: Direction::Inbound, .. }]
        ));

        let actions =
            session.handle(SessionEvent::LineReceived(DecodedLine::Control(ControlFrame::FileEnd)));
        assert!(matches!(actions.as_slice(), [_, SessionAction::AskSavePath { .. }]));

        let actions = session.handle(SessionEvent::SavePathDecision("./notes.txt".into()));
        assert_eq!(
            actions,
            vec![SessionAction::SaveFile { path: "./notes.txt".into(), data: b"wire".to_vec() }]
        );
    }

    #[test]
    fn idle_chunk_produces_no_actions_and_no_write() {
        let mut session = connected_session("alice");
        let chunk = ControlFrame::chunk(b"stray");
        let actions = session.handle(SessionEvent::LineReceived(DecodedLine::Control(chunk)));
        assert!(actions.is_empty());

        let actions =
            session.handle(SessionEvent::LineReceived(DecodedLine::Control(ControlFrame::FileEnd)));
        assert!(actions.is_empty());
    }

    #[test]
    fn echoed_file_start_for_own_send_is_ignored() {
        let mut session = connected_session("alice");
        session.handle(SessionEvent::OutboundFileOpened { name: "report.pdf".into(), size: 9 });

        let actions = session.handle(SessionEvent::LineReceived(DecodedLine::Control(
            ControlFrame::FileStart { name: "report.pdf".into(), size: 9 },
        )));
        assert!(actions.is_empty());
    }

    #[test]
    fn file_command_rejected_while_sending() {
        let mut session = connected_session("alice");
        session.handle(SessionEvent::OutboundFileOpened { name: "a.bin".into(), size: 1 });

        let actions = session.handle(SessionEvent::InputSubmitted("/file".into()));
        assert!(matches!(
            actions.as_slice(),
            [SessionAction::Display { kind: DisplayKind::Error, .. }]
        ));
    }

    #[test]
    fn outbound_flow_emits_start_chunks_end() {
        let mut session = connected_session("alice");

        let actions =
            session.handle(SessionEvent::OutboundFileOpened { name: "a.bin".into(), size: 6 });
        assert!(matches!(actions.as_slice(), [SessionAction::SendBytes(_), _]));

        let actions = session.handle(SessionEvent::OutboundChunkRead(b"abc".to_vec()));
        assert!(matches!(
            actions.as_slice(),
            [
                SessionAction::SendBytes(_),
                SessionAction::Progress { direction: Direction::Outbound, .. }
            ]
        ));

        let actions = session.handle(SessionEvent::OutboundFileDrained);
        let [SessionAction::SendBytes(end), SessionAction::Display { .. }] = actions.as_slice()
        else {
            unreachable!("drained send must emit FileEnd, got {actions:?}");
        };
        assert_eq!(end, &ControlFrame::FileEnd.encode().unwrap());
    }

    #[test]
    fn read_failure_aborts_outbound() {
        let mut session = connected_session("alice");
        session.handle(SessionEvent::OutboundFileOpened { name: "a.bin".into(), size: 6 });

        let actions = session.handle(SessionEvent::OutboundReadFailed("disk on fire".into()));
        assert!(matches!(
            actions.as_slice(),
            [SessionAction::Display { kind: DisplayKind::Error, .. }]
        ));

        // A new send is possible afterwards.
        let actions = session.handle(SessionEvent::InputSubmitted("/file".into()));
        assert_eq!(actions, vec![SessionAction::PromptFilePath]);
    }

    #[test]
    fn malformed_frame_aborts_active_transfer_only() {
        let mut session = connected_session("alice");
        session.handle(SessionEvent::LineReceived(DecodedLine::Control(
            ControlFrame::FileStart { name: "x.bin".into(), size: 10 },
        )));
        session.handle(SessionEvent::FileAcceptDecision(true));

        let bad = ControlFrame::FileChunk { data: "!!! not base64 !!!".into() };
        let actions = session.handle(SessionEvent::LineReceived(DecodedLine::Control(bad)));
        assert!(matches!(
            actions.as_slice(),
            [SessionAction::Display { kind: DisplayKind::Error, .. }]
        ));

        // Session is still live and chatting.
        assert_eq!(session.state(), SessionState::Connected);
        let actions =
            session.handle(SessionEvent::LineReceived(DecodedLine::Chat("bob: still here".into())));
        assert_eq!(actions.len(), 1);
    }
}
