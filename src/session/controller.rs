//! Session state machine.
//!
//! The controller is the only entry and exit point for a capture session. It
//! gates every media operation on the session state, owns the media handles
//! exclusively, and threads transport events back into the response history.
//! A session walks Idle -> Starting -> Active -> Stopping -> Idle; stop is
//! always safe to call and teardown always completes, even when start failed
//! partway.

use crate::config::{AudioMode, ImageQuality, SessionPreferences};
use crate::media::acquire::{AcquireError, MediaAcquirer};
use crate::media::chunker::ChunkSource;
use crate::media::pipeline::AudioPipeline;
use crate::media::screen::FrameCapturer;
use crate::media::strategy::{strategy_for, AcquiredMedia, Platform};
use crate::session::history::ResponseHistory;
use crate::transport::{Transport, TransportError, TransportEvent};
use chrono::{DateTime, Local};
use std::sync::Arc;
use thiserror::Error;

/// Lifecycle state of the capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Starting,
    Active,
    Stopping,
}

/// Why a session start was refused. Precondition failures reject the
/// transition before any hardware is touched.
#[derive(Debug, Error)]
pub enum StartError {
    #[error("No API key configured. Set SIDECOACH_API_KEY or ~/.config/sidecoach/credentials.")]
    MissingCredential,

    #[error("A session is already running")]
    AlreadyRunning,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Acquisition(#[from] AcquireError),
}

/// Everything `start` needs, read from preferences and the credential store
/// at call time.
#[derive(Debug, Clone)]
pub struct StartRequest {
    pub api_key: String,
    pub profile: String,
    pub language: String,
    pub custom_prompt: String,
    pub audio_mode: AudioMode,
    pub image_quality: ImageQuality,
}

impl StartRequest {
    pub fn from_preferences(api_key: String, prefs: &SessionPreferences) -> Self {
        Self {
            api_key,
            profile: prefs.profile.clone(),
            language: prefs.language.clone(),
            custom_prompt: prefs.custom_prompt.clone(),
            audio_mode: prefs.audio_mode,
            image_quality: prefs.image_quality,
        }
    }
}

/// The live unit of work: exclusively-owned media handles plus metadata.
/// Exactly one exists at a time, created on start and destroyed on stop.
struct CaptureSession {
    frames: FrameCapturer,
    system_pipeline: Option<AudioPipeline>,
    mic_pipeline: Option<AudioPipeline>,
    loopback_helper_active: bool,
    started_at: DateTime<Local>,
}

/// Orchestrates capture sessions against a transport and an acquirer.
pub struct SessionController {
    state: SessionState,
    platform: Platform,
    transport: Arc<dyn Transport>,
    acquirer: Arc<dyn MediaAcquirer>,
    session: Option<CaptureSession>,
    history: ResponseHistory,
    status: String,
}

impl SessionController {
    pub fn new(
        transport: Arc<dyn Transport>,
        acquirer: Arc<dyn MediaAcquirer>,
        platform: Platform,
    ) -> Self {
        Self {
            state: SessionState::Idle,
            platform,
            transport,
            acquirer,
            session: None,
            history: ResponseHistory::new(),
            status: String::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn history(&self) -> &ResponseHistory {
        &self.history
    }

    /// Transient status text for the shell.
    pub fn status(&self) -> &str {
        &self.status
    }

    /// When the current session went active.
    pub fn started_at(&self) -> Option<DateTime<Local>> {
        self.session.as_ref().map(|s| s.started_at)
    }

    /// Starts a new capture session.
    ///
    /// # Errors
    /// - [`StartError::MissingCredential`] when the API key is empty (nothing
    ///   is touched, state stays `Idle`)
    /// - [`StartError::AlreadyRunning`] when a session is starting or active
    /// - Transport/acquisition failures per platform policy; every partially
    ///   opened resource is released before the controller returns to `Idle`
    pub async fn start(&mut self, request: StartRequest) -> Result<(), StartError> {
        if self.state != SessionState::Idle {
            return Err(StartError::AlreadyRunning);
        }
        if request.api_key.trim().is_empty() {
            return Err(StartError::MissingCredential);
        }

        self.state = SessionState::Starting;
        tracing::info!(
            "Starting session: profile={} language={} audio_mode={}",
            request.profile,
            request.language,
            request.audio_mode
        );

        match self.bring_up(&request).await {
            Ok(session) => {
                self.history.clear();
                self.status.clear();
                self.session = Some(session);
                self.state = SessionState::Active;
                tracing::info!("Session active");
                Ok(())
            }
            Err(e) => {
                tracing::error!("Session start failed: {e}");
                self.state = SessionState::Idle;
                Err(e)
            }
        }
    }

    /// Opens the transport session and media sources, starting pipelines as
    /// sources come up. On any fatal error the already-opened pieces are
    /// released before the error surfaces.
    async fn bring_up(&mut self, request: &StartRequest) -> Result<CaptureSession, StartError> {
        self.transport
            .initialize_session(&request.profile, &request.language, &request.custom_prompt)
            .await?;

        let strategy = strategy_for(self.platform);
        let media = match strategy.acquire(self.acquirer.as_ref(), request.audio_mode) {
            Ok(media) => media,
            Err(e) => {
                self.transport.close_session().await;
                return Err(e.into());
            }
        };

        match self.start_pipelines(media, request.image_quality) {
            Ok(session) => Ok(session),
            Err(e) => {
                self.transport.close_session().await;
                Err(e.into())
            }
        }
    }

    fn start_pipelines(
        &self,
        media: AcquiredMedia,
        image_quality: ImageQuality,
    ) -> Result<CaptureSession, AcquireError> {
        let AcquiredMedia {
            video,
            system_audio,
            microphone,
            loopback_helper_active,
        } = media;

        let mut session = CaptureSession {
            frames: FrameCapturer::new(video, image_quality),
            system_pipeline: None,
            mic_pipeline: None,
            loopback_helper_active,
            started_at: Local::now(),
        };

        if let Some(source) = system_audio {
            match AudioPipeline::start(source, ChunkSource::System, Arc::clone(&self.transport)) {
                Ok(pipeline) => session.system_pipeline = Some(pipeline),
                Err(e) if self.platform == Platform::Linux => {
                    // Same degradation contract as the acquisition phase: a
                    // refused system leg leaves a video-only session
                    tracing::warn!(
                        "System audio stream failed to start ({e}), continuing video-only"
                    );
                }
                Err(e) => {
                    self.release(&mut session);
                    return Err(e);
                }
            }
        }

        if let Some(source) = microphone {
            match AudioPipeline::start(source, ChunkSource::Mic, Arc::clone(&self.transport)) {
                Ok(pipeline) => session.mic_pipeline = Some(pipeline),
                Err(e) => {
                    tracing::warn!("Microphone pipeline failed to start, continuing without it: {e}");
                }
            }
        }

        Ok(session)
    }

    /// Stops the session. Idempotent: safe to call from any state, a no-op
    /// when already idle. Teardown is best-effort and always completes the
    /// transition back to `Idle`; in-flight dispatches are left to finish on
    /// their own.
    pub async fn stop(&mut self) {
        if matches!(self.state, SessionState::Idle | SessionState::Stopping) {
            return;
        }

        self.state = SessionState::Stopping;
        tracing::info!("Stopping session");

        if let Some(mut session) = self.session.take() {
            self.release(&mut session);
        }
        self.transport.close_session().await;

        self.state = SessionState::Idle;
        tracing::info!("Session stopped");
    }

    /// Releases every media handle a session holds. Each release is
    /// independent so one failure never strands the others.
    fn release(&self, session: &mut CaptureSession) {
        if let Some(mut pipeline) = session.system_pipeline.take() {
            pipeline.stop();
        }
        if let Some(mut pipeline) = session.mic_pipeline.take() {
            pipeline.stop();
        }
        session.frames.stop();
        if session.loopback_helper_active {
            self.acquirer.stop_system_loopback();
            session.loopback_helper_active = false;
        }
    }

    /// Sends a user text message. Only routed while active; a dispatch
    /// failure becomes transient status text, never an error and never a
    /// state change.
    pub async fn send_text(&mut self, text: &str) {
        if self.state != SessionState::Active {
            tracing::debug!("Ignoring text message outside an active session");
            return;
        }

        match self.transport.send_text(text).await {
            Ok(()) => self.status = "Message sent...".to_string(),
            Err(e) => {
                tracing::error!("Failed to send message: {e}");
                self.status = "Error sending message".to_string();
            }
        }
    }

    /// Captures and dispatches one screen snapshot. Best-effort: skipped
    /// when the sink is not ready, logged when dispatch fails.
    pub async fn capture_screenshot(&mut self) {
        if self.state != SessionState::Active {
            tracing::debug!("Ignoring screenshot trigger outside an active session");
            return;
        }

        if let Some(session) = self.session.as_mut() {
            session.frames.capture_and_send(&self.transport).await;
        }
    }

    /// Moves the response cursor for browsing. Never mutates the entries.
    pub fn move_cursor(&mut self, index: usize) {
        self.history.move_cursor(index);
    }

    /// Applies one transport event to the history/status.
    pub fn apply_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::ResponseNew(text) => self.history.append(text),
            TransportEvent::ResponseUpdate(text) => self.history.replace_last(text),
            TransportEvent::StatusUpdate(text) => self.status = text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::strategy::testing::FakeAcquirer;
    use crate::transport::testing::{FakeTransport, Sent};
    use std::sync::atomic::Ordering;

    fn request(api_key: &str, mode: AudioMode) -> StartRequest {
        StartRequest {
            api_key: api_key.to_string(),
            profile: "interview".to_string(),
            language: "en-US".to_string(),
            custom_prompt: String::new(),
            audio_mode: mode,
            image_quality: ImageQuality::Medium,
        }
    }

    fn controller(
        transport: &Arc<FakeTransport>,
        acquirer: FakeAcquirer,
        platform: Platform,
    ) -> SessionController {
        SessionController::new(
            Arc::clone(transport) as Arc<dyn Transport>,
            Arc::new(acquirer),
            platform,
        )
    }

    #[tokio::test]
    async fn empty_credential_is_rejected_before_hardware() {
        let transport = Arc::new(FakeTransport::default());
        let acquirer = FakeAcquirer::default();
        let mut controller = controller(&transport, acquirer, Platform::Other);

        let result = controller.start(request("", AudioMode::Both)).await;
        assert!(matches!(result, Err(StartError::MissingCredential)));
        assert_eq!(controller.state(), SessionState::Idle);
        // Neither the transport nor any media source was touched
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn successful_start_reaches_active() {
        let transport = Arc::new(FakeTransport::default());
        let mut controller =
            controller(&transport, FakeAcquirer::default(), Platform::Other);

        controller
            .start(request("key", AudioMode::Both))
            .await
            .unwrap();
        assert_eq!(controller.state(), SessionState::Active);
        assert!(controller.started_at().is_some());
        assert_eq!(
            transport.sent(),
            vec![Sent::Init("interview".into(), "en-US".into())]
        );
    }

    #[tokio::test]
    async fn second_start_is_rejected_while_active() {
        let transport = Arc::new(FakeTransport::default());
        let mut controller =
            controller(&transport, FakeAcquirer::default(), Platform::Other);

        controller
            .start(request("key", AudioMode::SpeakerOnly))
            .await
            .unwrap();
        let started_at = controller.started_at();

        let result = controller.start(request("key", AudioMode::Both)).await;
        assert!(matches!(result, Err(StartError::AlreadyRunning)));
        assert_eq!(controller.state(), SessionState::Active);
        // The first session is untouched by the rejected call
        assert_eq!(controller.started_at(), started_at);
    }

    #[tokio::test]
    async fn transport_refusal_returns_to_idle() {
        let transport = Arc::new(FakeTransport::default());
        transport.fail_init.store(true, Ordering::SeqCst);
        let mut controller =
            controller(&transport, FakeAcquirer::default(), Platform::Other);

        let result = controller.start(request("key", AudioMode::Both)).await;
        assert!(matches!(result, Err(StartError::Transport(_))));
        assert_eq!(controller.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn fatal_acquisition_closes_transport_session() {
        let transport = Arc::new(FakeTransport::default());
        let acquirer = FakeAcquirer {
            fail_combined_display: true,
            ..Default::default()
        };
        let mut controller = controller(&transport, acquirer, Platform::Other);

        let result = controller.start(request("key", AudioMode::Both)).await;
        assert!(matches!(result, Err(StartError::Acquisition(_))));
        assert_eq!(controller.state(), SessionState::Idle);
        assert!(transport.sent().contains(&Sent::Close));
    }

    #[tokio::test]
    async fn linux_fallback_reaches_active_with_mic_only() {
        let transport = Arc::new(FakeTransport::default());
        let acquirer = FakeAcquirer {
            fail_combined_display: true,
            ..Default::default()
        };
        let mut controller = controller(&transport, acquirer, Platform::Linux);

        controller
            .start(request("key", AudioMode::Both))
            .await
            .unwrap();
        assert_eq!(controller.state(), SessionState::Active);
        let session = controller.session.as_ref().unwrap();
        assert!(session.system_pipeline.is_none());
        assert!(session.mic_pipeline.is_some());
    }

    #[tokio::test]
    async fn linux_system_stream_failure_degrades_to_video_only() {
        // The degradation contract covers the whole system leg: a monitor
        // device that is discovered but refuses its stream leaves a
        // video-only session with the mic leg intact
        let transport = Arc::new(FakeTransport::default());
        let acquirer = FakeAcquirer {
            break_system_audio: true,
            ..Default::default()
        };
        let mut controller = controller(&transport, acquirer, Platform::Linux);

        controller
            .start(request("key", AudioMode::Both))
            .await
            .unwrap();
        assert_eq!(controller.state(), SessionState::Active);
        let session = controller.session.as_ref().unwrap();
        assert!(session.system_pipeline.is_none());
        assert!(session.mic_pipeline.is_some());
    }

    #[tokio::test]
    async fn default_platform_system_stream_failure_is_fatal() {
        let transport = Arc::new(FakeTransport::default());
        let acquirer = FakeAcquirer {
            break_system_audio: true,
            ..Default::default()
        };
        let mut controller = controller(&transport, acquirer, Platform::Other);

        let result = controller.start(request("key", AudioMode::Both)).await;
        assert!(matches!(result, Err(StartError::Acquisition(_))));
        assert_eq!(controller.state(), SessionState::Idle);
        assert!(transport.sent().contains(&Sent::Close));
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let transport = Arc::new(FakeTransport::default());
        let mut controller =
            controller(&transport, FakeAcquirer::default(), Platform::Other);

        // Stop while idle is a no-op
        controller.stop().await;
        assert_eq!(controller.state(), SessionState::Idle);
        assert!(transport.sent().is_empty());

        controller
            .start(request("key", AudioMode::SpeakerOnly))
            .await
            .unwrap();
        controller.stop().await;
        assert_eq!(controller.state(), SessionState::Idle);
        assert!(controller.started_at().is_none());

        // Session is fully reusable after stop
        controller
            .start(request("key", AudioMode::SpeakerOnly))
            .await
            .unwrap();
        assert_eq!(controller.state(), SessionState::Active);
    }

    #[tokio::test]
    async fn macos_stop_releases_loopback_helper() {
        let transport = Arc::new(FakeTransport::default());
        let acquirer = Arc::new(FakeAcquirer::default());
        let mut controller = SessionController::new(
            Arc::clone(&transport) as Arc<dyn Transport>,
            Arc::clone(&acquirer) as Arc<dyn MediaAcquirer>,
            Platform::MacOs,
        );

        controller
            .start(request("key", AudioMode::SpeakerOnly))
            .await
            .unwrap();
        controller.stop().await;
        assert!(acquirer.calls().contains(&"loopback stop".to_string()));
    }

    #[tokio::test]
    async fn send_text_failure_surfaces_as_status_only() {
        let transport = Arc::new(FakeTransport::default());
        let mut controller =
            controller(&transport, FakeAcquirer::default(), Platform::Other);

        controller
            .start(request("key", AudioMode::SpeakerOnly))
            .await
            .unwrap();

        transport.fail_sends.store(true, Ordering::SeqCst);
        controller.send_text("are you there?").await;
        assert_eq!(controller.state(), SessionState::Active);
        assert_eq!(controller.status(), "Error sending message");

        transport.fail_sends.store(false, Ordering::SeqCst);
        controller.send_text("hello").await;
        assert_eq!(controller.status(), "Message sent...");
    }

    #[tokio::test]
    async fn send_text_outside_active_session_is_ignored() {
        let transport = Arc::new(FakeTransport::default());
        let mut controller =
            controller(&transport, FakeAcquirer::default(), Platform::Other);

        controller.send_text("hello?").await;
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn screenshot_routes_to_transport_while_active() {
        let transport = Arc::new(FakeTransport::default());
        let mut controller =
            controller(&transport, FakeAcquirer::default(), Platform::Other);

        controller
            .start(request("key", AudioMode::SpeakerOnly))
            .await
            .unwrap();
        controller.capture_screenshot().await;

        assert!(transport
            .sent()
            .iter()
            .any(|s| matches!(s, Sent::Frame(q) if *q == 0.7)));
    }

    #[tokio::test]
    async fn events_feed_history_and_status() {
        let transport = Arc::new(FakeTransport::default());
        let mut controller =
            controller(&transport, FakeAcquirer::default(), Platform::Other);

        controller.apply_event(TransportEvent::ResponseNew("first".into()));
        controller.apply_event(TransportEvent::ResponseUpdate("first, revised".into()));
        controller.apply_event(TransportEvent::StatusUpdate("Listening".into()));

        assert_eq!(controller.history().current(), Some("first, revised"));
        assert_eq!(controller.history().len(), 1);
        assert_eq!(controller.status(), "Listening");
    }

    #[tokio::test]
    async fn new_session_clears_previous_history() {
        let transport = Arc::new(FakeTransport::default());
        let mut controller =
            controller(&transport, FakeAcquirer::default(), Platform::Other);

        controller.apply_event(TransportEvent::ResponseNew("stale".into()));
        controller
            .start(request("key", AudioMode::SpeakerOnly))
            .await
            .unwrap();
        assert!(controller.history().is_empty());
    }
}
