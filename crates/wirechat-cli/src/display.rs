//! Terminal presentation helpers.
//!
//! ANSI coloring, `[HH:MM:SS]` timestamps for the message log, the welcome
//! banner, and the transfer progress readout. Everything here is a thin
//! wrapper over stdout; no session state lives in this module.

use std::io::Write;

use wirechat_client::{Direction, DisplayKind};

/// Wrap `text` in an ANSI SGR sequence.
fn paint(text: &str, code: &str) -> String {
    format!("\x1b[{code}m{text}\x1b[0m")
}

/// Local wall-clock time as `HH:MM:SS`.
fn timestamp() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}

/// Render one session line. Chat lines get a timestamp; status lines do
/// not.
pub fn show(kind: DisplayKind, text: &str) {
    let line = match kind {
        DisplayKind::PeerChat => paint(&format!("[{}] {text}", timestamp()), "1;37"),
        DisplayKind::OwnEcho => paint(&format!("[{}] {text}", timestamp()), "1;30"),
        DisplayKind::Info => paint(text, "1;33"),
        DisplayKind::Success => paint(text, "1;32"),
        DisplayKind::Error => paint(text, "1;31"),
        DisplayKind::Help => paint(text, "36"),
    };
    println!("{line}");
}

/// In-place progress readout, overwriting the current line.
pub fn progress(direction: Direction, percent: f64) {
    let label = match direction {
        Direction::Inbound => "Receiving",
        Direction::Outbound => "Sending",
    };
    print!("\r{label}: {percent:.1}%");
    let _ = std::io::stdout().flush();
    if percent >= 100.0 {
        println!();
    }
}

/// Print a prompt without a newline so the answer is typed on the same
/// line.
pub fn prompt(text: &str) {
    print!("{}", paint(text, "1;33"));
    let _ = std::io::stdout().flush();
}

/// Clear the screen and home the cursor.
pub fn clear_screen() {
    print!("\x1b[2J\x1b[H");
    let _ = std::io::stdout().flush();
}

/// Welcome banner shown once at startup.
pub fn banner() {
    let bar = "=".repeat(50);
    println!("{}", paint(&bar, "1;34"));
    println!("{}", paint("   wirechat (command-line client)", "1;34"));
    println!("{}", paint(&bar, "1;34"));
    println!();
    println!("{}", paint("Commands:", "1;36"));
    println!("{}", paint("  /help     - show help", "36"));
    println!("{}", paint("  /file     - send a file", "36"));
    println!("{}", paint("  /bell     - toggle the notification bell", "36"));
    println!("{}", paint("  /clear    - clear the screen", "36"));
    println!("{}", paint("  /exit     - leave the chat", "36"));
    println!();
    println!("{}", paint("Tip: type a message and press Enter to send.", "1;35"));
    println!();
}

/// Session header, printed after connecting and after `/clear`.
pub fn header(username: &str) {
    println!("{}", paint(&format!("Chat room - {username}"), "1;34"));
    println!("{}", paint("Type /help to list commands", "36"));
    println!("{}", "-".repeat(50));
}
