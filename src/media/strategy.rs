//! Per-platform audio acquisition policy.
//!
//! Each platform gets system audio into the session differently: macOS needs
//! an out-of-band loopback helper next to a video-only display capture, Linux
//! tries combined display+audio capture and degrades to video-only, everything
//! else opens combined capture with processing enabled and fails hard if it
//! cannot. The microphone leg is independent on all platforms and never aborts
//! an otherwise-successful start.

use crate::config::AudioMode;
use crate::media::acquire::{AcquireError, AudioParams, AudioSource, MediaAcquirer};
use crate::media::screen::ScreenSource;

/// Host platform tag, read once at acquisition time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    Linux,
    Other,
}

impl Platform {
    /// The platform this binary was built for.
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Self::MacOs
        } else if cfg!(target_os = "linux") {
            Self::Linux
        } else {
            Self::Other
        }
    }
}

/// Everything a successful acquisition produced. Ownership passes to the
/// session, which is the only component allowed to release these handles.
pub struct AcquiredMedia {
    pub video: Box<dyn ScreenSource>,
    pub system_audio: Option<Box<dyn AudioSource>>,
    pub microphone: Option<Box<dyn AudioSource>>,
    /// True when the macOS loopback helper was started and must be stopped
    /// at teardown.
    pub loopback_helper_active: bool,
}

/// Opens the media sources for one session according to platform policy.
pub trait AcquisitionStrategy: Send + Sync {
    /// Runs the acquisition plan against `acquirer`.
    ///
    /// # Errors
    /// - If a source this platform treats as fatal cannot be opened
    fn acquire(
        &self,
        acquirer: &dyn MediaAcquirer,
        mode: AudioMode,
    ) -> Result<AcquiredMedia, AcquireError>;
}

/// Selects the strategy for a platform. Called once at session start.
pub fn strategy_for(platform: Platform) -> Box<dyn AcquisitionStrategy> {
    match platform {
        Platform::MacOs => Box::new(MacOsStrategy),
        Platform::Linux => Box::new(LinuxStrategy),
        Platform::Other => Box::new(DefaultStrategy),
    }
}

/// macOS: system audio comes from the OS-level loopback helper, display
/// capture is video-only. Helper failure fails the whole start; there is no
/// partial session.
pub struct MacOsStrategy;

impl AcquisitionStrategy for MacOsStrategy {
    fn acquire(
        &self,
        acquirer: &dyn MediaAcquirer,
        mode: AudioMode,
    ) -> Result<AcquiredMedia, AcquireError> {
        acquirer.start_system_loopback()?;

        let display = match acquirer.open_display(None) {
            Ok(display) => display,
            Err(e) => {
                // No partial session: undo the helper before surfacing
                acquirer.stop_system_loopback();
                return Err(e);
            }
        };

        Ok(AcquiredMedia {
            video: display.video,
            system_audio: display.audio,
            microphone: open_microphone_leg(acquirer, mode),
            loopback_helper_active: true,
        })
    }
}

/// Linux: combined display+audio capture with processing disabled, falling
/// back to video-only when the audio leg is refused. The session proceeds
/// either way.
pub struct LinuxStrategy;

impl AcquisitionStrategy for LinuxStrategy {
    fn acquire(
        &self,
        acquirer: &dyn MediaAcquirer,
        mode: AudioMode,
    ) -> Result<AcquiredMedia, AcquireError> {
        let display = match acquirer.open_display(Some(&AudioParams::raw())) {
            Ok(display) => display,
            Err(e) => {
                tracing::warn!("Combined display+audio capture failed ({e}), retrying video-only");
                acquirer.open_display(None)?
            }
        };

        Ok(AcquiredMedia {
            video: display.video,
            system_audio: display.audio,
            microphone: open_microphone_leg(acquirer, mode),
            loopback_helper_active: false,
        })
    }
}

/// Default (Windows and anything else): combined display+audio capture with
/// echo cancellation, noise suppression and auto gain enabled. Failure is
/// fatal for the session start.
pub struct DefaultStrategy;

impl AcquisitionStrategy for DefaultStrategy {
    fn acquire(
        &self,
        acquirer: &dyn MediaAcquirer,
        mode: AudioMode,
    ) -> Result<AcquiredMedia, AcquireError> {
        let display = acquirer.open_display(Some(&AudioParams::processed()))?;

        Ok(AcquiredMedia {
            video: display.video,
            system_audio: display.audio,
            microphone: open_microphone_leg(acquirer, mode),
            loopback_helper_active: false,
        })
    }
}

/// Opens the microphone when the audio mode asks for it. Microphone failure
/// is logged and swallowed on every platform; the two audio legs fail
/// independently.
fn open_microphone_leg(
    acquirer: &dyn MediaAcquirer,
    mode: AudioMode,
) -> Option<Box<dyn AudioSource>> {
    if !mode.wants_microphone() {
        return None;
    }

    match acquirer.open_microphone(&AudioParams::processed()) {
        Ok(source) => Some(source),
        Err(e) => {
            tracing::warn!("Microphone unavailable, continuing without it: {e}");
            None
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::media::acquire::{DisplayCapture, SampleSink};
    use crate::media::screen::testing::FakeScreenSource;
    use std::sync::{Arc, Mutex};

    /// Hands sample slices to whatever sink a started fake source holds.
    #[derive(Clone, Default)]
    pub struct FeedHandle {
        sink: Arc<Mutex<Option<SampleSink>>>,
    }

    impl FeedHandle {
        pub fn feed(&self, samples: &[f32]) {
            if let Some(sink) = self.sink.lock().unwrap().as_mut() {
                sink(samples);
            }
        }

        pub fn is_started(&self) -> bool {
            self.sink.lock().unwrap().is_some()
        }
    }

    /// Audio source whose samples are pushed by the test through a
    /// [`FeedHandle`].
    pub struct FakeAudioSource {
        sink: Arc<Mutex<Option<SampleSink>>>,
    }

    impl FakeAudioSource {
        pub fn new() -> (Self, FeedHandle) {
            let handle = FeedHandle::default();
            (
                Self {
                    sink: Arc::clone(&handle.sink),
                },
                handle,
            )
        }
    }

    impl AudioSource for FakeAudioSource {
        fn start(&mut self, sink: SampleSink) -> Result<(), AcquireError> {
            *self.sink.lock().unwrap() = Some(sink);
            Ok(())
        }

        fn stop(&mut self) {
            self.sink.lock().unwrap().take();
        }
    }

    /// Audio source that refuses to start, for stream-level failure paths.
    pub struct BrokenAudioSource;

    impl AudioSource for BrokenAudioSource {
        fn start(&mut self, _sink: SampleSink) -> Result<(), AcquireError> {
            Err(AcquireError::StreamCreationFailed(
                "stream refused".to_string(),
            ))
        }

        fn stop(&mut self) {}
    }

    /// Scripted acquirer recording every call it receives.
    #[derive(Default)]
    pub struct FakeAcquirer {
        pub fail_combined_display: bool,
        pub fail_video_only: bool,
        pub fail_microphone: bool,
        pub fail_loopback: bool,
        /// Hand out a system audio source whose `start` fails
        pub break_system_audio: bool,
        pub calls: Mutex<Vec<String>>,
    }

    impl FakeAcquirer {
        fn record(&self, call: &str) {
            self.calls.lock().unwrap().push(call.to_string());
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl MediaAcquirer for FakeAcquirer {
        fn open_display(
            &self,
            audio: Option<&AudioParams>,
        ) -> Result<DisplayCapture, AcquireError> {
            match audio {
                Some(params) => {
                    self.record(&format!(
                        "display+audio ec={} ns={} agc={}",
                        params.echo_cancellation,
                        params.noise_suppression,
                        params.auto_gain_control
                    ));
                    if self.fail_combined_display {
                        return Err(AcquireError::StreamCreationFailed(
                            "combined capture refused".into(),
                        ));
                    }
                    let audio: Box<dyn AudioSource> = if self.break_system_audio {
                        Box::new(BrokenAudioSource)
                    } else {
                        let (source, _) = FakeAudioSource::new();
                        Box::new(source)
                    };
                    Ok(DisplayCapture {
                        video: Box::new(FakeScreenSource::ready(1920, 1080)),
                        audio: Some(audio),
                    })
                }
                None => {
                    self.record("display video-only");
                    if self.fail_video_only {
                        return Err(AcquireError::DisplayUnavailable);
                    }
                    Ok(DisplayCapture {
                        video: Box::new(FakeScreenSource::ready(1920, 1080)),
                        audio: None,
                    })
                }
            }
        }

        fn open_microphone(
            &self,
            _params: &AudioParams,
        ) -> Result<Box<dyn AudioSource>, AcquireError> {
            self.record("microphone");
            if self.fail_microphone {
                return Err(AcquireError::DeviceNotFound("fake mic".into()));
            }
            let (source, _) = FakeAudioSource::new();
            Ok(Box::new(source))
        }

        fn start_system_loopback(&self) -> Result<(), AcquireError> {
            self.record("loopback start");
            if self.fail_loopback {
                return Err(AcquireError::LoopbackHelperFailed("helper missing".into()));
            }
            Ok(())
        }

        fn stop_system_loopback(&self) {
            self.record("loopback stop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::FakeAcquirer;
    use super::*;

    #[test]
    fn current_platform_is_deterministic() {
        assert_eq!(Platform::current(), Platform::current());
    }

    #[test]
    fn macos_opens_helper_then_video_only() {
        let acquirer = FakeAcquirer::default();
        let media = MacOsStrategy
            .acquire(&acquirer, AudioMode::SpeakerOnly)
            .unwrap();
        assert!(media.loopback_helper_active);
        assert!(media.system_audio.is_none());
        assert!(media.microphone.is_none());
        assert_eq!(acquirer.calls(), vec!["loopback start", "display video-only"]);
    }

    #[test]
    fn macos_helper_failure_is_fatal() {
        let acquirer = FakeAcquirer {
            fail_loopback: true,
            ..Default::default()
        };
        let result = MacOsStrategy.acquire(&acquirer, AudioMode::Both);
        assert!(result.is_err());
        // Nothing else was touched after the helper refused
        assert_eq!(acquirer.calls(), vec!["loopback start"]);
    }

    #[test]
    fn macos_display_failure_stops_helper() {
        let acquirer = FakeAcquirer {
            fail_video_only: true,
            ..Default::default()
        };
        assert!(MacOsStrategy.acquire(&acquirer, AudioMode::SpeakerOnly).is_err());
        assert_eq!(
            acquirer.calls(),
            vec!["loopback start", "display video-only", "loopback stop"]
        );
    }

    #[test]
    fn linux_requests_unprocessed_combined_capture() {
        let acquirer = FakeAcquirer::default();
        let media = LinuxStrategy
            .acquire(&acquirer, AudioMode::SpeakerOnly)
            .unwrap();
        assert!(media.system_audio.is_some());
        assert_eq!(
            acquirer.calls(),
            vec!["display+audio ec=false ns=false agc=false"]
        );
    }

    #[test]
    fn linux_falls_back_to_video_only() {
        let acquirer = FakeAcquirer {
            fail_combined_display: true,
            ..Default::default()
        };
        let media = LinuxStrategy
            .acquire(&acquirer, AudioMode::SpeakerOnly)
            .unwrap();
        assert!(media.system_audio.is_none());
        assert_eq!(
            acquirer.calls(),
            vec![
                "display+audio ec=false ns=false agc=false",
                "display video-only"
            ]
        );
    }

    #[test]
    fn linux_fallback_still_opens_microphone() {
        // System audio degrading must not couple into the mic leg
        let acquirer = FakeAcquirer {
            fail_combined_display: true,
            ..Default::default()
        };
        let media = LinuxStrategy.acquire(&acquirer, AudioMode::Both).unwrap();
        assert!(media.system_audio.is_none());
        assert!(media.microphone.is_some());
    }

    #[test]
    fn default_platform_requests_processed_capture() {
        let acquirer = FakeAcquirer::default();
        let media = DefaultStrategy
            .acquire(&acquirer, AudioMode::Both)
            .unwrap();
        assert!(media.system_audio.is_some());
        assert!(media.microphone.is_some());
        assert_eq!(
            acquirer.calls(),
            vec!["display+audio ec=true ns=true agc=true", "microphone"]
        );
    }

    #[test]
    fn default_platform_combined_failure_is_fatal() {
        let acquirer = FakeAcquirer {
            fail_combined_display: true,
            ..Default::default()
        };
        assert!(DefaultStrategy.acquire(&acquirer, AudioMode::Both).is_err());
    }

    #[test]
    fn microphone_failure_never_aborts_start() {
        let acquirer = FakeAcquirer {
            fail_microphone: true,
            ..Default::default()
        };
        let media = DefaultStrategy.acquire(&acquirer, AudioMode::Both).unwrap();
        assert!(media.system_audio.is_some());
        assert!(media.microphone.is_none());
    }

    #[test]
    fn mic_only_mode_skips_mic_when_not_requested() {
        let acquirer = FakeAcquirer::default();
        let media = DefaultStrategy
            .acquire(&acquirer, AudioMode::SpeakerOnly)
            .unwrap();
        assert!(media.microphone.is_none());
        assert!(!acquirer.calls().contains(&"microphone".to_string()));
    }

    #[test]
    fn strategy_for_covers_all_platforms() {
        for platform in [Platform::MacOs, Platform::Linux, Platform::Other] {
            let _ = strategy_for(platform);
        }
    }
}
