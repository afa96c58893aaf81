//! Application command handlers for sidecoach.
//!
//! This module organizes command handling into separate submodules, each responsible for a specific
//! application command.
//!
//! # Commands
//! - `run`: Start an assist session (the default command)
//! - `transcripts`: Print transcripts of previous sessions
//! - `config`: Open configuration file in user's preferred editor
//! - `list_devices`: List available audio input devices
//! - `logs`: Display recent log entries

pub mod config;
pub mod list_devices;
pub mod logs;
pub mod run;
pub mod transcripts;

pub use config::handle_config;
pub use list_devices::handle_list_devices;
pub use logs::handle_logs;
pub use run::handle_run;
pub use transcripts::handle_transcripts;
