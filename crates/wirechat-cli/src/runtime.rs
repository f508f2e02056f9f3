//! Interactive runtime.
//!
//! The event loop that coordinates terminal I/O, the Session state
//! machine, the TCP transport, and the file reader task. Uses
//! `tokio::select!` to wait on user input, inbound wire lines, and
//! internal events concurrently; every state mutation happens here on one
//! task, so the session and transfer machines never see concurrent access.
//!
//! Prompts (accept a file? save where? which file to send?) are
//! line-driven: the session asks via an action, the runtime queues the
//! question, and the next input line answers it instead of being chat.

use std::{
    collections::VecDeque,
    io,
    path::{Path, PathBuf},
};

use tokio::{
    io::{BufReader, Lines, Stdin},
    sync::mpsc,
};
use wirechat_client::{
    DisplayKind, FileError, Session, SessionAction, SessionEvent, SessionState, probe_file,
    spawn_file_reader,
    transport::{self, Connection, TransportConfig},
};
use wirechat_proto::{DecodedLine, ProtocolError};

use crate::{display, notify};

/// Line reader over stdin, created once in `main` and threaded through so
/// prompts and chat input share one buffer.
pub type InputLines = Lines<BufReader<Stdin>>;

/// Everything the runtime needs to establish and drive a session.
#[derive(Debug)]
pub struct RunConfig {
    /// Server host.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Local username.
    pub username: String,
    /// Chunk size in bytes for file sends.
    pub chunk_size: usize,
}

/// A queued question whose answer arrives as the next input line.
enum Prompt {
    FilePath,
    Accept { name: String },
    SavePath { default: PathBuf },
}

impl Prompt {
    fn text(&self) -> String {
        match self {
            Prompt::FilePath => "File path: ".to_string(),
            Prompt::Accept { name } => format!("Accept {name}? (y/n): "),
            Prompt::SavePath { default } => format!("Save path [{}]: ", default.display()),
        }
    }
}

/// One iteration's wake-up reason.
enum Tick {
    Input(Option<String>),
    Wire(Option<Result<DecodedLine, ProtocolError>>),
    Internal(SessionEvent),
    Interrupt,
}

/// Connect (retrying on the user's say-so) and run the session to
/// completion.
///
/// # Errors
///
/// - `io::Error` only for stdin failures; connection problems are
///   reported and retried or end the session cleanly.
pub async fn run(config: RunConfig, mut stdin: InputLines) -> io::Result<()> {
    let connection = loop {
        display::show(
            DisplayKind::Info,
            &format!("Connecting to {}:{}...", config.host, config.port),
        );
        match transport::connect(
            &config.host,
            config.port,
            &config.username,
            TransportConfig::default(),
        )
        .await
        {
            Ok(connection) => break connection,
            Err(e) => {
                display::show(DisplayKind::Error, &format!("Connection failed: {e}"));
                if !confirm(&mut stdin, "Retry? (y/n): ").await? {
                    return Ok(());
                }
            },
        }
    };

    Runtime::new(config, connection).run(stdin).await
}

/// Ask a yes/no question on its own line.
async fn confirm(stdin: &mut InputLines, prompt: &str) -> io::Result<bool> {
    display::prompt(prompt);
    Ok(stdin.next_line().await?.is_some_and(|line| line.trim().eq_ignore_ascii_case("y")))
}

struct Runtime {
    session: Session,
    connection: Connection,
    events_tx: mpsc::Sender<SessionEvent>,
    events_rx: mpsc::Receiver<SessionEvent>,
    prompts: VecDeque<Prompt>,
    active_prompt: Option<Prompt>,
    chunk_size: usize,
    username: String,
}

impl Runtime {
    fn new(config: RunConfig, connection: Connection) -> Self {
        let (events_tx, events_rx) = mpsc::channel(64);
        Self {
            session: Session::new(config.username.clone()),
            connection,
            events_tx,
            events_rx,
            prompts: VecDeque::new(),
            active_prompt: None,
            chunk_size: config.chunk_size,
            username: config.username,
        }
    }

    async fn run(mut self, mut stdin: InputLines) -> io::Result<()> {
        display::clear_screen();
        display::header(&self.username);
        self.dispatch(SessionEvent::Connected).await;

        loop {
            let tick = tokio::select! {
                line = stdin.next_line() => Tick::Input(line?),
                inbound = self.connection.recv() => Tick::Wire(inbound),
                Some(event) = self.events_rx.recv() => Tick::Internal(event),
                _ = tokio::signal::ctrl_c() => Tick::Interrupt,
            };

            match tick {
                Tick::Input(Some(line)) => self.on_input_line(line).await,
                // EOF on stdin and Ctrl-C both behave like /exit.
                Tick::Input(None) | Tick::Interrupt => {
                    self.dispatch(SessionEvent::InputSubmitted("/exit".into())).await;
                },
                Tick::Wire(Some(Ok(line))) => {
                    self.dispatch(SessionEvent::LineReceived(line)).await;
                },
                Tick::Wire(Some(Err(error))) => {
                    tracing::warn!("inbound decode failed: {error}");
                    self.dispatch(SessionEvent::ProtocolFailed(error)).await;
                },
                Tick::Wire(None) => self.dispatch(SessionEvent::ConnectionClosed).await,
                Tick::Internal(event) => self.dispatch(event).await,
            }

            if self.session.state() == SessionState::Closed {
                display::show(DisplayKind::Info, "Bye!");
                return Ok(());
            }
        }
    }

    /// Route one input line: an active prompt consumes it, otherwise it is
    /// chat or a command.
    async fn on_input_line(&mut self, line: String) {
        match self.active_prompt.take() {
            Some(Prompt::FilePath) => {
                let raw = line.trim().trim_matches('"').to_string();
                self.start_file_send(&raw).await;
            },
            Some(Prompt::Accept { .. }) => {
                let accepted = line.trim().eq_ignore_ascii_case("y");
                self.dispatch(SessionEvent::FileAcceptDecision(accepted)).await;
            },
            Some(Prompt::SavePath { default }) => {
                let trimmed = line.trim();
                let path =
                    if trimmed.is_empty() { default } else { PathBuf::from(trimmed) };
                self.dispatch(SessionEvent::SavePathDecision(path)).await;
            },
            None => self.dispatch(SessionEvent::InputSubmitted(line)).await,
        }
        self.show_next_prompt();
    }

    /// Validate the send source and hand it to the session plus a detached
    /// reader task, keeping the input loop free while chunks stream out.
    async fn start_file_send(&mut self, raw: &str) {
        if raw.is_empty() {
            display::show(DisplayKind::Error, "No file path given.");
            return;
        }

        let path = PathBuf::from(raw);
        match probe_file(&path).await {
            Ok((name, size)) => {
                // Spawn the reader only if this open actually started a
                // transfer; a rejected duplicate must not stream chunks
                // into someone else's send.
                let was_sending = self.session.is_sending();
                self.dispatch(SessionEvent::OutboundFileOpened { name, size }).await;
                if !was_sending && self.session.is_sending() {
                    spawn_file_reader(path, self.chunk_size, self.events_tx.clone());
                }
            },
            Err(e) => display::show(DisplayKind::Error, &e.to_string()),
        }
    }

    async fn dispatch(&mut self, event: SessionEvent) {
        let actions = self.session.handle(event);
        self.execute(actions).await;
    }

    async fn execute(&mut self, actions: Vec<SessionAction>) {
        for action in actions {
            match action {
                SessionAction::SendBytes(bytes) => {
                    if let Err(e) = self.connection.send(bytes).await {
                        display::show(DisplayKind::Error, &format!("Send failed: {e}"));
                    }
                },
                SessionAction::Display { kind, text } => display::show(kind, &text),
                SessionAction::Bell => notify::bell(),
                SessionAction::ClearScreen => {
                    display::clear_screen();
                    display::header(&self.username);
                },
                SessionAction::PromptFilePath => self.prompts.push_back(Prompt::FilePath),
                SessionAction::AskAcceptFile { name, .. } => {
                    self.prompts.push_back(Prompt::Accept { name });
                },
                SessionAction::AskSavePath { default, .. } => {
                    self.prompts.push_back(Prompt::SavePath { default });
                },
                SessionAction::SaveFile { path, data } => save_file(&path, &data).await,
                SessionAction::Progress { direction, percent } => {
                    display::progress(direction, percent);
                },
                SessionAction::Close => self.connection.close().await,
            }
        }
        self.show_next_prompt();
    }

    fn show_next_prompt(&mut self) {
        if self.active_prompt.is_some() {
            return;
        }
        let Some(prompt) = self.prompts.pop_front() else {
            return;
        };
        display::prompt(&prompt.text());
        self.active_prompt = Some(prompt);
    }
}

/// Persist a completed transfer, creating intermediate directories.
async fn save_file(path: &Path, data: &[u8]) {
    match write_file(path, data).await {
        Ok(()) => {
            display::show(DisplayKind::Success, &format!("File saved to {}", path.display()));
        },
        Err(e) => display::show(DisplayKind::Error, &format!("Save failed: {e}")),
    }
}

async fn write_file(path: &Path, data: &[u8]) -> Result<(), FileError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| FileError::from_io(parent.to_path_buf(), e))?;
        }
    }
    tokio::fs::write(path, data).await.map_err(|e| FileError::from_io(path.to_path_buf(), e))
}
