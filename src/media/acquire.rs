//! Acquisition boundary: traits fronting the OS media layer.
//!
//! The platform strategies (see `strategy`) drive a [`MediaAcquirer`] to open
//! display and audio sources without knowing how those sources are produced.
//! Production code wires in the cpal-backed acquirer; tests use scripted
//! fakes.

use crate::media::screen::ScreenSource;
use thiserror::Error;

/// Errors raised while opening or starting a media source.
#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("No display capture source available")]
    DisplayUnavailable,

    #[error("Audio input device not found: {0}")]
    DeviceNotFound(String),

    #[error("System audio loopback helper failed: {0}")]
    LoopbackHelperFailed(String),

    #[error("Failed to create capture stream: {0}")]
    StreamCreationFailed(String),

    #[error("Device configuration failed: {0}")]
    ConfigurationFailed(String),
}

/// Parameters for opening one audio leg. Sample rate and channel count are
/// fixed project-wide (24 kHz mono); the processing flags vary per platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioParams {
    pub sample_rate: u32,
    pub channels: u16,
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
}

impl AudioParams {
    /// Params with all processing flags enabled (microphone, default-platform
    /// system audio).
    pub fn processed() -> Self {
        Self {
            sample_rate: crate::media::SAMPLE_RATE,
            channels: 1,
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
        }
    }

    /// Params with all processing flags disabled (Linux system audio, where
    /// processing a loopback signal would degrade it).
    pub fn raw() -> Self {
        Self {
            echo_cancellation: false,
            noise_suppression: false,
            auto_gain_control: false,
            ..Self::processed()
        }
    }
}

/// Receives float sample slices on the source's callback thread.
pub type SampleSink = Box<dyn FnMut(&[f32]) + Send + 'static>;

/// A live audio source delivering mono float samples via callback.
///
/// Implementations must invoke the sink only between `start` and `stop`, and
/// must never block the callback on downstream work.
pub trait AudioSource: Send {
    /// Begins delivery of samples into `sink`.
    ///
    /// # Errors
    /// - If the underlying stream cannot be created or started
    fn start(&mut self, sink: SampleSink) -> Result<(), AcquireError>;

    /// Stops delivery and releases the underlying stream. Must be idempotent.
    fn stop(&mut self);
}

/// An opened display capture: the video handle plus the system audio source
/// when combined capture was requested and granted.
pub struct DisplayCapture {
    pub video: Box<dyn ScreenSource>,
    pub audio: Option<Box<dyn AudioSource>>,
}

/// Boundary to the OS media layer.
///
/// One implementation per embedding; the acquisition strategies decide what
/// to request and how to react to failures, this trait only opens things.
pub trait MediaAcquirer: Send + Sync {
    /// Opens the display capture source, with combined system audio when
    /// `audio` is given.
    ///
    /// # Errors
    /// - If the display source is unavailable
    /// - If combined audio was requested but cannot be opened
    fn open_display(&self, audio: Option<&AudioParams>) -> Result<DisplayCapture, AcquireError>;

    /// Opens the microphone as an independent audio source.
    ///
    /// # Errors
    /// - If the configured device is missing or cannot be configured
    fn open_microphone(&self, params: &AudioParams) -> Result<Box<dyn AudioSource>, AcquireError>;

    /// Activates the out-of-band OS-level audio loopback helper (macOS).
    ///
    /// # Errors
    /// - If the helper cannot be started
    fn start_system_loopback(&self) -> Result<(), AcquireError>;

    /// Deactivates the loopback helper. Best-effort, safe to call when the
    /// helper never started.
    fn stop_system_loopback(&self);
}
