//! Wirechat CLI entry point.
//!
//! Collects arguments, shows the welcome banner, runs the startup update
//! check, prompts for a username when one was not given, and hands control
//! to the runtime.

// The CLI talks to the user on stdout by design.
#![allow(clippy::print_stdout)]

mod display;
mod notify;
mod runtime;
mod update;

use std::io;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use wirechat_client::DisplayKind;

use crate::runtime::{InputLines, RunConfig};

/// Line-oriented chat client with in-band file transfer.
#[derive(Parser, Debug)]
#[command(name = "wirechat")]
#[command(about = "Command-line chat client with in-band file transfer")]
#[command(version)]
struct Args {
    /// Server host
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Server port
    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Username (prompted interactively when omitted)
    #[arg(short, long)]
    username: Option<String>,

    /// Chunk size in bytes for file sends (pre-encoding)
    #[arg(long, default_value_t = wirechat_proto::DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// URL returning the latest released version string; checked once at
    /// startup when given
    #[arg(long)]
    update_url: Option<String>,
}

#[tokio::main]
async fn main() -> io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    display::clear_screen();
    display::banner();
    report_version(args.update_url.as_deref()).await;

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let username = match args.username {
        Some(name) if !name.trim().is_empty() => name.trim().to_string(),
        _ => prompt_username(&mut stdin).await?,
    };

    let config = RunConfig {
        host: args.host,
        port: args.port,
        username,
        chunk_size: args.chunk_size.max(1),
    };
    runtime::run(config, stdin).await?;

    // tokio's stdin reader is a blocking task that would hold the runtime
    // open until the next keypress.
    std::process::exit(0);
}

/// Print the version line, comparing against the published version when an
/// update URL was configured.
async fn report_version(update_url: Option<&str>) {
    let current = update::CURRENT_VERSION;
    let Some(url) = update_url else {
        display::show(DisplayKind::Info, &format!("Version {current}"));
        return;
    };

    match update::fetch_latest(url).await {
        Some(latest) if latest == current => {
            display::show(DisplayKind::Success, &format!("Version {current} (up to date)"));
        },
        Some(latest) => display::show(
            DisplayKind::Info,
            &format!("Version {current}, latest: {latest} (update available!)"),
        ),
        None => display::show(
            DisplayKind::Info,
            &format!("Version {current} (unable to check for updates)"),
        ),
    }
}

/// Ask for a username until a non-empty one is typed.
async fn prompt_username(stdin: &mut InputLines) -> io::Result<String> {
    loop {
        display::prompt("Username: ");
        let Some(line) = stdin.next_line().await? else {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "no username provided"));
        };

        let name = line.trim();
        if name.is_empty() {
            display::show(DisplayKind::Error, "Username must not be empty!");
        } else {
            return Ok(name.to_string());
        }
    }
}
