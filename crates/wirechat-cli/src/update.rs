//! Startup update check.
//!
//! Fetches a plain-text version string from a configured URL and compares
//! it to the build's own version. Unreachable or empty responses are not
//! errors; the check silently reports "unknown".

use std::time::Duration;

/// Version of this build, as compared against the published one.
pub const CURRENT_VERSION: &str = concat!("v", env!("CARGO_PKG_VERSION"));

/// Fetch the latest published version string.
///
/// Returns `None` if the URL is unreachable within 5 seconds or the body
/// is empty.
pub async fn fetch_latest(url: &str) -> Option<String> {
    let client = reqwest::Client::builder().timeout(Duration::from_secs(5)).build().ok()?;
    let body = client.get(url).send().await.ok()?.text().await.ok()?;
    let version = body.trim();
    if version.is_empty() { None } else { Some(version.to_string()) }
}
