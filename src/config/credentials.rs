//! Read-only API credential lookup.
//!
//! The credential is owned by the surrounding environment, not by this
//! application: it is read once at session-start time and never written,
//! cached or logged. Lookup order is the SIDECOACH_API_KEY environment
//! variable, then the first line of ~/.config/sidecoach/credentials.

use anyhow::anyhow;
use std::fs;
use std::path::PathBuf;

const API_KEY_ENV: &str = "SIDECOACH_API_KEY";

/// Looks up the API key for the assistant endpoint.
///
/// Returns `Ok(None)` when no credential is configured; the caller decides
/// whether that is an error (session start treats it as a precondition
/// failure).
///
/// # Errors
/// - If the credentials file exists but cannot be read
pub fn get_api_key() -> anyhow::Result<Option<String>> {
    if let Ok(key) = std::env::var(API_KEY_ENV) {
        let key = key.trim().to_string();
        if !key.is_empty() {
            return Ok(Some(key));
        }
    }

    let path = credentials_path()?;
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(&path)
        .map_err(|e| anyhow!("Failed to read credentials file {}: {e}", path.display()))?;

    let key = content.lines().next().unwrap_or("").trim().to_string();
    if key.is_empty() {
        Ok(None)
    } else {
        Ok(Some(key))
    }
}

/// Path of the credentials file next to the config file.
fn credentials_path() -> anyhow::Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow!("Could not determine home directory"))?;
    Ok(home.join(".config").join("sidecoach").join("credentials"))
}
