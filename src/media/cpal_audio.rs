//! cpal-backed media acquirer.
//!
//! Implements the audio legs of the acquisition boundary: the microphone is
//! opened from a configured device (by name, index or system default), system
//! audio comes from a loopback/monitor capture device, and the macOS path
//! drives an external loopback helper process. Each opened source runs its
//! cpal stream on a dedicated thread so the source handle stays movable
//! across tasks; the stream callback downmixes to mono and forwards float
//! samples to the pipeline sink.

use crate::media::acquire::{
    AcquireError, AudioParams, AudioSource, DisplayCapture, MediaAcquirer, SampleSink,
};
use crate::media::screen::{DetachedScreenSource, ScreenSource};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::process::{Child, Command};
use std::sync::mpsc;
use std::sync::Mutex;
use std::thread::JoinHandle;

#[cfg(target_os = "linux")]
use std::fs::OpenOptions;
#[cfg(target_os = "linux")]
use std::os::unix::io::AsRawFd;

/// Input device name fragments that identify a system audio loopback source
/// (PulseAudio/PipeWire monitors, Windows Stereo Mix, macOS virtual devices).
const LOOPBACK_NAME_HINTS: &[&str] = &[
    "monitor",
    "loopback",
    "stereo mix",
    "blackhole",
    "soundflower",
];

/// Produces the screen video handle for a display capture. Supplied by the
/// embedding; audio-only deployments run without one.
pub type ScreenBackend = Box<dyn Fn() -> Result<Box<dyn ScreenSource>, AcquireError> + Send + Sync>;

/// Acquirer backed by cpal for audio and an optional screen backend for video.
pub struct CpalAcquirer {
    mic_device: String,
    loopback_helper: Option<String>,
    screen_backend: Option<ScreenBackend>,
    helper: Mutex<Option<Child>>,
}

impl CpalAcquirer {
    /// Creates an acquirer using `mic_device` ("default", a device name or a
    /// numeric index) for the microphone leg.
    pub fn new(mic_device: &str) -> Self {
        Self {
            mic_device: mic_device.to_string(),
            loopback_helper: None,
            screen_backend: None,
            helper: Mutex::new(None),
        }
    }

    /// Sets the external loopback helper command used on macOS.
    pub fn with_loopback_helper(mut self, helper: Option<String>) -> Self {
        self.loopback_helper = helper;
        self
    }

    /// Sets the screen frame backend. Without one the video sink never
    /// reaches readiness and screenshot triggers are silently skipped.
    pub fn with_screen_backend(mut self, backend: ScreenBackend) -> Self {
        self.screen_backend = Some(backend);
        self
    }

    fn open_video(&self) -> Result<Box<dyn ScreenSource>, AcquireError> {
        match &self.screen_backend {
            Some(backend) => backend(),
            None => {
                tracing::debug!("No screen backend configured, screenshots will be skipped");
                Ok(Box::new(DetachedScreenSource))
            }
        }
    }
}

impl MediaAcquirer for CpalAcquirer {
    fn open_display(&self, audio: Option<&AudioParams>) -> Result<DisplayCapture, AcquireError> {
        let audio = match audio {
            Some(params) => {
                tracing::debug!(
                    "Opening system audio: ec={} ns={} agc={}",
                    params.echo_cancellation,
                    params.noise_suppression,
                    params.auto_gain_control
                );
                let device_spec = find_loopback_device_name()?;
                Some(Box::new(CpalAudioSource::new(device_spec, *params)) as Box<dyn AudioSource>)
            }
            None => None,
        };

        Ok(DisplayCapture {
            video: self.open_video()?,
            audio,
        })
    }

    fn open_microphone(&self, params: &AudioParams) -> Result<Box<dyn AudioSource>, AcquireError> {
        Ok(Box::new(CpalAudioSource::new(
            self.mic_device.clone(),
            *params,
        )))
    }

    fn start_system_loopback(&self) -> Result<(), AcquireError> {
        let helper = self.loopback_helper.as_deref().ok_or_else(|| {
            AcquireError::LoopbackHelperFailed(
                "No loopback helper configured (audio.loopback_helper)".to_string(),
            )
        })?;

        let child = Command::new(helper)
            .spawn()
            .map_err(|e| AcquireError::LoopbackHelperFailed(format!("{helper}: {e}")))?;

        tracing::info!("Loopback helper started: {helper} (pid {})", child.id());
        *self.helper.lock().unwrap() = Some(child);
        Ok(())
    }

    fn stop_system_loopback(&self) {
        if let Some(mut child) = self.helper.lock().unwrap().take() {
            if let Err(e) = child.kill() {
                tracing::warn!("Failed to stop loopback helper: {e}");
            }
            let _ = child.wait();
            tracing::info!("Loopback helper stopped");
        }
    }
}

/// One cpal capture source. The stream lives on a dedicated thread between
/// `start` and `stop` because cpal streams must stay on the thread that
/// created them.
pub struct CpalAudioSource {
    device_spec: String,
    params: AudioParams,
    stop_tx: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl CpalAudioSource {
    pub fn new(device_spec: String, params: AudioParams) -> Self {
        Self {
            device_spec,
            params,
            stop_tx: None,
            thread: None,
        }
    }
}

impl AudioSource for CpalAudioSource {
    fn start(&mut self, sink: SampleSink) -> Result<(), AcquireError> {
        if self.stop_tx.is_some() {
            return Ok(());
        }

        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), AcquireError>>();
        let device_spec = self.device_spec.clone();
        let params = self.params;

        let thread = std::thread::spawn(move || {
            let stream = match open_input_stream(&device_spec, &params, sink) {
                Ok(stream) => {
                    let _ = ready_tx.send(Ok(()));
                    stream
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };

            // Park until stop; the stream is dropped (and closed) on exit
            let _ = stop_rx.recv();
            drop(stream);
        });

        match ready_rx.recv() {
            Ok(Ok(())) => {
                self.stop_tx = Some(stop_tx);
                self.thread = Some(thread);
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => Err(AcquireError::StreamCreationFailed(
                "Capture thread exited before reporting readiness".to_string(),
            )),
        }
    }

    fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for CpalAudioSource {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Opens and starts a cpal input stream feeding mono float samples to `sink`.
fn open_input_stream(
    device_spec: &str,
    params: &AudioParams,
    mut sink: SampleSink,
) -> Result<cpal::Stream, AcquireError> {
    // Get device while suppressing ALSA library warnings
    let device = suppress_alsa_warnings(|| {
        let host = cpal::default_host();
        if device_spec == "default" {
            host.default_input_device()
                .ok_or_else(|| AcquireError::DeviceNotFound("No audio input device".to_string()))
        } else {
            find_device_by_spec(&host, device_spec)
        }
    })?;

    let device_name = device
        .name()
        .unwrap_or_else(|_| "Unknown device".to_string());
    tracing::info!("Capture device: {device_name}");

    let default_config = device
        .default_input_config()
        .map_err(|e| AcquireError::ConfigurationFailed(e.to_string()))?;

    // Capture at the session rate when the device supports it, otherwise at
    // the device's native rate with a warning; a working device is never
    // refused over its clock
    let sample_rate = if supports_rate(&device, params.sample_rate) {
        params.sample_rate
    } else {
        tracing::warn!(
            "Requested sample rate {}Hz but device uses {}Hz. Capturing at device rate.",
            params.sample_rate,
            default_config.sample_rate().0
        );
        default_config.sample_rate().0
    };

    let config = cpal::StreamConfig {
        channels: default_config.channels(),
        sample_rate: cpal::SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };
    let channels = config.channels as usize;

    let stream = device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                if channels == 1 {
                    sink(data);
                } else {
                    let mono = downmix_to_mono(data, channels);
                    sink(&mono);
                }
            },
            |err| {
                tracing::error!("Audio stream error: {err}");
            },
            None,
        )
        .map_err(|e| AcquireError::StreamCreationFailed(e.to_string()))?;

    tracing::debug!("Stream configuration: {sample_rate}Hz, {channels} channels");

    stream
        .play()
        .map_err(|e| AcquireError::StreamCreationFailed(e.to_string()))?;

    Ok(stream)
}

/// Whether the device advertises an input config covering `rate` Hz.
fn supports_rate(device: &cpal::Device, rate: u32) -> bool {
    match device.supported_input_configs() {
        Ok(mut configs) => configs.any(|c| {
            c.min_sample_rate().0 <= rate
                && rate <= c.max_sample_rate().0
                && c.sample_format() == cpal::SampleFormat::F32
        }),
        Err(_) => false,
    }
}

/// Averages interleaved multi-channel samples down to mono.
fn downmix_to_mono(data: &[f32], channels: usize) -> Vec<f32> {
    data.chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Finds an audio input device by name or numeric index.
fn find_device_by_spec(host: &cpal::Host, device_spec: &str) -> Result<cpal::Device, AcquireError> {
    // Try to parse as a numeric index first
    if let Ok(index) = device_spec.parse::<usize>() {
        let devices: Vec<_> = host
            .input_devices()
            .map_err(|e| AcquireError::ConfigurationFailed(format!("Device enumeration: {e}")))?
            .collect();

        return devices.into_iter().nth(index).ok_or_else(|| {
            AcquireError::DeviceNotFound(format!("Device index {index} is out of range"))
        });
    }

    let devices = host
        .input_devices()
        .map_err(|e| AcquireError::ConfigurationFailed(format!("Device enumeration: {e}")))?;

    for device in devices {
        if let Ok(name) = device.name() {
            if name == device_spec {
                return Ok(device);
            }
        }
    }

    Err(AcquireError::DeviceNotFound(format!(
        "Audio input device '{device_spec}' not found. Use 'sidecoach list-devices' to see available devices."
    )))
}

/// Looks for an input device that exposes the system output (a monitor or
/// loopback source).
fn find_loopback_device_name() -> Result<String, AcquireError> {
    suppress_alsa_warnings(|| {
        let host = cpal::default_host();
        let devices = host
            .input_devices()
            .map_err(|e| AcquireError::ConfigurationFailed(format!("Device enumeration: {e}")))?;

        for device in devices {
            if let Ok(name) = device.name() {
                let lowered = name.to_lowercase();
                if LOOPBACK_NAME_HINTS.iter().any(|hint| lowered.contains(hint)) {
                    tracing::info!("System audio loopback device: {name}");
                    return Ok(name);
                }
            }
        }

        Err(AcquireError::StreamCreationFailed(
            "No system audio loopback device found".to_string(),
        ))
    })
}

/// Temporarily redirects stderr to /dev/null to suppress ALSA library warnings on Linux.
/// On non-Linux platforms, this is a no-op since ALSA doesn't exist.
#[cfg(target_os = "linux")]
fn suppress_alsa_warnings<F, T>(f: F) -> Result<T, AcquireError>
where
    F: FnOnce() -> Result<T, AcquireError>,
{
    let dev_null = match OpenOptions::new().write(true).open("/dev/null") {
        Ok(file) => file,
        Err(_) => return f(),
    };

    let dev_null_fd = dev_null.as_raw_fd();

    // Save the current stderr file descriptor
    let old_stderr = unsafe { libc::dup(libc::STDERR_FILENO) };
    if old_stderr == -1 {
        return f();
    }

    // Redirect stderr to /dev/null
    let redirect_result = unsafe { libc::dup2(dev_null_fd, libc::STDERR_FILENO) };
    if redirect_result == -1 {
        unsafe { libc::close(old_stderr) };
        return f();
    }

    // Execute the closure
    let result = f();

    // Restore the original stderr
    unsafe {
        libc::dup2(old_stderr, libc::STDERR_FILENO);
        libc::close(old_stderr);
    }

    result
}

/// On non-Linux platforms, no stderr suppression is needed since ALSA doesn't exist.
#[cfg(not(target_os = "linux"))]
fn suppress_alsa_warnings<F, T>(f: F) -> Result<T, AcquireError>
where
    F: FnOnce() -> Result<T, AcquireError>,
{
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downmix_averages_stereo_pairs() {
        let mono = downmix_to_mono(&[0.5, -0.5, 1.0, 0.0], 2);
        assert_eq!(mono, vec![0.0, 0.5]);
    }

    #[test]
    fn downmix_averages_multichannel_frames() {
        let mono = downmix_to_mono(&[0.3, 0.3, 0.3, 0.6, 0.6, 0.6], 3);
        assert!((mono[0] - 0.3).abs() < 1e-6);
        assert!((mono[1] - 0.6).abs() < 1e-6);
    }

    #[test]
    fn loopback_hints_match_common_monitors() {
        let matches = |name: &str| {
            let lowered = name.to_lowercase();
            LOOPBACK_NAME_HINTS.iter().any(|h| lowered.contains(h))
        };
        assert!(matches("Monitor of Built-in Audio Analog Stereo"));
        assert!(matches("Stereo Mix (Realtek Audio)"));
        assert!(matches("BlackHole 2ch"));
        assert!(!matches("USB Microphone"));
    }

    #[test]
    fn helper_is_required_for_loopback_start() {
        let acquirer = CpalAcquirer::new("default");
        assert!(matches!(
            acquirer.start_system_loopback(),
            Err(AcquireError::LoopbackHelperFailed(_))
        ));
    }
}
