//! Notification sound.
//!
//! Fire-and-forget: a failed or unsupported sound player degrades to the
//! terminal bell, and every failure is ignored.

use std::io::Write;

/// Ring the notification bell.
pub fn bell() {
    if !platform_sound() {
        print!("\x07");
        let _ = std::io::stdout().flush();
    }
}

#[cfg(target_os = "macos")]
fn platform_sound() -> bool {
    std::process::Command::new("afplay")
        .arg("/System/Library/Sounds/Ping.aiff")
        .spawn()
        .is_ok()
}

#[cfg(target_os = "linux")]
fn platform_sound() -> bool {
    std::process::Command::new("paplay")
        .arg("/usr/share/sounds/freedesktop/stereo/message.oga")
        .spawn()
        .is_ok()
}

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
fn platform_sound() -> bool {
    false
}
