//! HTTP transport to the assistant session endpoint.
//!
//! Talks JSON over HTTPS with bearer token authentication. A session is
//! opened once with the profile/language/prompt, after which audio chunks,
//! screen frames and text messages are posted against the session id. The
//! endpoint answers media posts with optional response text, which is
//! surfaced to the session loop as response events.

use super::{EventSender, Transport, TransportError, TransportEvent};
use crate::media::chunker::AudioChunk;
use crate::media::pcm;
use crate::media::screen::FrameSnapshot;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Request body for opening a session.
#[derive(Debug, Serialize)]
struct InitRequest<'a> {
    profile: &'a str,
    custom_prompt: &'a str,
}

/// Response to a session open request.
#[derive(Debug, Deserialize)]
struct InitResponse {
    session_id: String,
}

/// Media/text post body. Audio and image payloads travel base64-encoded.
#[derive(Debug, Serialize)]
struct ContentRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mime_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    prompt: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
}

/// Response to a media/text post. `text` is present when the assistant has
/// something to say; `partial` marks a revision of its latest response.
#[derive(Debug, Deserialize)]
struct ContentResponse {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    partial: bool,
}

/// Reqwest-backed implementation of the transport boundary.
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    language: Mutex<String>,
    session_id: Mutex<Option<String>>,
    events: EventSender,
}

impl HttpTransport {
    pub fn new(endpoint: &str, api_key: &str, events: EventSender) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            language: Mutex::new(String::new()),
            session_id: Mutex::new(None),
            events,
        }
    }

    fn session_url(&self, leaf: &str) -> Result<String, TransportError> {
        let session_id = self
            .session_id
            .lock()
            .unwrap()
            .clone()
            .ok_or(TransportError::NoSession)?;
        let language = self.language.lock().unwrap().clone();
        Ok(format!(
            "{}/sessions/{}/{}?lang={}",
            self.endpoint,
            session_id,
            leaf,
            urlencoding::encode(&language)
        ))
    }

    fn emit(&self, event: TransportEvent) {
        // The receiver only goes away when the session loop already ended
        let _ = self.events.send(event);
    }

    /// Posts content and forwards any response text as an event.
    async fn post_content(
        &self,
        leaf: &str,
        body: ContentRequest<'_>,
    ) -> Result<(), TransportError> {
        let url = self.session_url(leaf)?;

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    TransportError::RequestFailed(
                        "Failed to connect to the assistant endpoint. Check your internet connection."
                            .to_string(),
                    )
                } else if e.is_timeout() {
                    TransportError::RequestFailed(
                        "Request to the assistant endpoint timed out.".to_string(),
                    )
                } else {
                    TransportError::RequestFailed(format!("Network error: {e}"))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(TransportError::RequestFailed(format!(
                "Assistant endpoint error (status {status}): {error_body}"
            )));
        }

        let content: ContentResponse = response
            .json()
            .await
            .map_err(|e| TransportError::BadResponse(format!("Failed to parse response: {e}")))?;

        if let Some(text) = content.text {
            if content.partial {
                self.emit(TransportEvent::ResponseUpdate(text));
            } else {
                self.emit(TransportEvent::ResponseNew(text));
            }
        }

        Ok(())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn initialize_session(
        &self,
        profile: &str,
        language: &str,
        custom_prompt: &str,
    ) -> Result<(), TransportError> {
        let url = format!("{}/sessions", self.endpoint);

        tracing::debug!(
            "Opening assistant session: url={url} profile={profile} language={language}"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&InitRequest {
                profile,
                custom_prompt,
            })
            .send()
            .await
            .map_err(|e| TransportError::InitializationRefused(format!("Network error: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let human_readable = match status.as_u16() {
                401 => "API key is invalid or expired.".to_string(),
                403 => "This API key is not permitted to open assistant sessions.".to_string(),
                429 => "Too many sessions. You've hit the API rate limit.".to_string(),
                500..=504 => "The assistant endpoint is experiencing issues.".to_string(),
                _ => format!("Assistant endpoint refused the session (status {status})"),
            };
            return Err(TransportError::InitializationRefused(human_readable));
        }

        let init: InitResponse = response
            .json()
            .await
            .map_err(|e| TransportError::BadResponse(format!("Failed to parse response: {e}")))?;

        *self.language.lock().unwrap() = language.to_string();
        *self.session_id.lock().unwrap() = Some(init.session_id);

        self.emit(TransportEvent::StatusUpdate("Session ready".to_string()));
        Ok(())
    }

    async fn send_audio_chunk(&self, chunk: AudioChunk) -> Result<(), TransportError> {
        let leaf = match chunk.source {
            crate::media::ChunkSource::System => "audio",
            crate::media::ChunkSource::Mic => "mic-audio",
        };
        self.post_content(
            leaf,
            ContentRequest {
                data: Some(pcm::encode_for_transport(&chunk.data)),
                mime_type: Some(chunk.mime),
                prompt: None,
                text: None,
            },
        )
        .await
    }

    async fn send_frame(&self, snapshot: FrameSnapshot) -> Result<(), TransportError> {
        self.post_content(
            "image",
            ContentRequest {
                data: Some(pcm::encode_for_transport(&snapshot.jpeg)),
                mime_type: Some("image/jpeg"),
                prompt: Some(snapshot.prompt),
                text: None,
            },
        )
        .await
    }

    async fn send_text(&self, text: &str) -> Result<(), TransportError> {
        self.post_content(
            "text",
            ContentRequest {
                data: None,
                mime_type: None,
                prompt: None,
                text: Some(text),
            },
        )
        .await
    }

    async fn close_session(&self) {
        let session_id = self.session_id.lock().unwrap().take();
        let Some(session_id) = session_id else {
            return;
        };

        let url = format!("{}/sessions/{}", self.endpoint, session_id);
        match self.client.delete(&url).bearer_auth(&self.api_key).send().await {
            Ok(response) if !response.status().is_success() => {
                tracing::warn!("Session close returned status {}", response.status());
            }
            Ok(_) => tracing::debug!("Assistant session closed"),
            Err(e) => tracing::warn!("Session close failed: {e}"),
        }
    }
}
