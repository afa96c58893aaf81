//! Session lifecycle, response history and transcript persistence.

pub mod controller;
pub mod handle;
pub mod history;
pub mod storage;

pub use controller::{SessionController, StartRequest};
pub use handle::{SessionCommand, SessionHandle};
pub use storage::TranscriptStore;
