//! Configuration management for sidecoach.
//!
//! This module handles loading and saving application configuration from TOML files,
//! and read-only lookup of the API credential. Configuration is stored in the
//! user's config directory; the credential is read from the environment or a
//! restricted file and is never written by this application.

pub mod credentials;
pub mod file;

pub use credentials::get_api_key;
pub use file::{get_config_path, AudioMode, ImageQuality, SessionPreferences, SidecoachConfig};
