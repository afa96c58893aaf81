//! Manual trigger handle for a running session.
//!
//! External trigger surfaces (the CLI input loop, a hotkey binding) get a
//! cloneable handle instead of reaching into shared state. Commands travel
//! over a channel into the session run loop; every call is independent and
//! safe to repeat.

use tokio::sync::mpsc;

/// A manual trigger routed into the session loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    /// Capture and send one screen snapshot
    CaptureScreenshot,
    /// Send a user text message to the assistant
    SendText(String),
    /// Move the response cursor for browsing
    MoveCursor(usize),
    /// End the session
    Stop,
}

/// Cloneable trigger surface for one session.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
}

impl SessionHandle {
    /// Creates a handle and the receiver the session loop drains.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SessionCommand>) {
        let (commands, rx) = mpsc::unbounded_channel();
        (Self { commands }, rx)
    }

    /// Requests a manual screenshot. Best-effort: silently dropped when the
    /// session loop is gone.
    pub fn capture_screenshot(&self) {
        let _ = self.commands.send(SessionCommand::CaptureScreenshot);
    }

    /// Sends a text message to the assistant.
    pub fn send_text(&self, text: impl Into<String>) {
        let _ = self.commands.send(SessionCommand::SendText(text.into()));
    }

    /// Moves the response history cursor.
    pub fn move_cursor(&self, index: usize) {
        let _ = self.commands.send(SessionCommand::MoveCursor(index));
    }

    /// Asks the session loop to stop. Idempotent.
    pub fn stop(&self) {
        let _ = self.commands.send(SessionCommand::Stop);
    }
}
