//! Transport boundary to the remote assistant session.
//!
//! The capture core only ever talks to this trait: it pushes audio chunks,
//! screen frames and text requests out, and receives response/status events
//! back over a channel. Every send returns an explicit result; a failed send
//! is the caller's to log and drop, never to retry.

pub mod http;

use crate::media::chunker::AudioChunk;
use crate::media::screen::FrameSnapshot;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors surfaced by transport calls.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Session initialization refused: {0}")]
    InitializationRefused(String),

    #[error("No active transport session")]
    NoSession,

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Unexpected response: {0}")]
    BadResponse(String),
}

/// Events emitted by the transport while a session is live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The assistant produced a new response
    ResponseNew(String),
    /// The assistant revised its latest response
    ResponseUpdate(String),
    /// Transient status text for the shell
    StatusUpdate(String),
}

/// Sender half for transport events, handed to the transport at construction.
pub type EventSender = mpsc::UnboundedSender<TransportEvent>;

/// Receiver half, consumed by the session run loop.
pub type EventReceiver = mpsc::UnboundedReceiver<TransportEvent>;

/// Creates the event channel shared by a transport and its session.
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// The request side of the transport boundary.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Opens the remote session with the given assistant profile, response
    /// language and custom prompt.
    ///
    /// # Errors
    /// - If the remote endpoint refuses the session
    async fn initialize_session(
        &self,
        profile: &str,
        language: &str,
        custom_prompt: &str,
    ) -> Result<(), TransportError>;

    /// Relays one audio chunk. Fire-and-forget from the pipeline's point of
    /// view; the chunk is consumed either way.
    async fn send_audio_chunk(&self, chunk: AudioChunk) -> Result<(), TransportError>;

    /// Relays one compressed screen frame with its instruction prompt.
    async fn send_frame(&self, snapshot: FrameSnapshot) -> Result<(), TransportError>;

    /// Relays a user text message.
    async fn send_text(&self, text: &str) -> Result<(), TransportError>;

    /// Closes the remote session. Best-effort, idempotent.
    async fn close_session(&self);
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::media::chunker::ChunkSource;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// What a fake transport has been asked to send.
    #[derive(Debug, Clone, PartialEq)]
    pub enum Sent {
        Init(String, String),
        Audio(ChunkSource, usize),
        Frame(f32),
        Text(String),
        Close,
    }

    /// Recording transport for tests. Optionally fails every send.
    #[derive(Default)]
    pub struct FakeTransport {
        pub sent: Mutex<Vec<Sent>>,
        pub fail_sends: AtomicBool,
        pub fail_init: AtomicBool,
    }

    impl FakeTransport {
        pub fn sent(&self) -> Vec<Sent> {
            self.sent.lock().unwrap().clone()
        }

        fn push(&self, item: Sent) {
            self.sent.lock().unwrap().push(item);
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn initialize_session(
            &self,
            profile: &str,
            language: &str,
            _custom_prompt: &str,
        ) -> Result<(), TransportError> {
            if self.fail_init.load(Ordering::SeqCst) {
                return Err(TransportError::InitializationRefused("fake".into()));
            }
            self.push(Sent::Init(profile.to_string(), language.to_string()));
            Ok(())
        }

        async fn send_audio_chunk(&self, chunk: AudioChunk) -> Result<(), TransportError> {
            if self.fail_sends.load(Ordering::SeqCst) {
                return Err(TransportError::RequestFailed("fake".into()));
            }
            self.push(Sent::Audio(chunk.source, chunk.sample_count()));
            Ok(())
        }

        async fn send_frame(&self, snapshot: FrameSnapshot) -> Result<(), TransportError> {
            if self.fail_sends.load(Ordering::SeqCst) {
                return Err(TransportError::RequestFailed("fake".into()));
            }
            self.push(Sent::Frame(snapshot.quality));
            Ok(())
        }

        async fn send_text(&self, text: &str) -> Result<(), TransportError> {
            if self.fail_sends.load(Ordering::SeqCst) {
                return Err(TransportError::RequestFailed("fake".into()));
            }
            self.push(Sent::Text(text.to_string()));
            Ok(())
        }

        async fn close_session(&self) {
            self.push(Sent::Close);
        }
    }
}
