//! On-demand screen frame capture and compression.
//!
//! A session holds one hidden video sink bound to the active display stream.
//! When the user triggers a screenshot, the current frame is drawn into an
//! off-screen raster buffer, JPEG-compressed at the configured quality tier
//! and dispatched to the transport together with a fixed instruction prompt.
//! Capture is strictly best-effort: a sink that is not yet ready makes the
//! trigger a silent no-op, and a failed dispatch is logged and dropped.

use crate::config::ImageQuality;
use crate::media::AcquireError;
use crate::transport::Transport;
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use std::sync::Arc;

/// Instruction prompt sent alongside every manual screenshot.
pub const MANUAL_SCREENSHOT_PROMPT: &str = "Help me with what is on this screen. Give me the \
complete answer directly, no filler. If it is a coding question, outline the approach in a few \
bullet points and then give the entire code. If it is a multiple choice question, name the \
answer. Mention anything else on the page I need to know.";

/// One raw video frame in RGBA8 layout, row-major, native resolution.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// A compressed screen snapshot ready for dispatch: JPEG bytes, the quality
/// factor used and the accompanying instruction text.
#[derive(Debug, Clone)]
pub struct FrameSnapshot {
    pub jpeg: Vec<u8>,
    pub quality: f32,
    pub prompt: &'static str,
}

/// The hidden video sink bound to the active display stream.
///
/// Readiness mirrors a media element's load sequence: a sink must have seen
/// its stream metadata and be in a playable state before frames can be
/// grabbed.
pub trait ScreenSource: Send {
    /// Whether the sink has received stream metadata (resolution known).
    fn loaded_metadata(&self) -> bool;

    /// Whether the sink holds a current frame that can be drawn.
    fn playable(&self) -> bool;

    /// Native resolution of the stream, once metadata is loaded.
    fn resolution(&self) -> Option<(u32, u32)>;

    /// Grabs the current frame at native resolution.
    ///
    /// # Errors
    /// - If the underlying stream cannot produce a frame
    fn grab_frame(&mut self) -> Result<RawFrame, AcquireError>;

    /// Releases the underlying stream track. Must be idempotent.
    fn stop(&mut self);
}

/// A sink with no backend behind it. Never reaches readiness, so every
/// capture trigger is a silent skip. Used when the embedding provides no
/// screen frame source.
pub struct DetachedScreenSource;

impl ScreenSource for DetachedScreenSource {
    fn loaded_metadata(&self) -> bool {
        false
    }

    fn playable(&self) -> bool {
        false
    }

    fn resolution(&self) -> Option<(u32, u32)> {
        None
    }

    fn grab_frame(&mut self) -> Result<RawFrame, AcquireError> {
        Err(AcquireError::DisplayUnavailable)
    }

    fn stop(&mut self) {}
}

/// Captures and dispatches screen snapshots for one session.
pub struct FrameCapturer {
    source: Box<dyn ScreenSource>,
    quality: ImageQuality,
    /// Off-screen RGB raster reused across triggers, sized lazily to the
    /// source's native resolution.
    raster: Vec<u8>,
}

impl FrameCapturer {
    pub fn new(source: Box<dyn ScreenSource>, quality: ImageQuality) -> Self {
        Self {
            source,
            quality,
            raster: Vec::new(),
        }
    }

    /// Captures the current frame and dispatches it with the instruction
    /// prompt. Single-shot: not-ready sinks are skipped silently, dispatch
    /// failures are logged and never retried.
    pub async fn capture_and_send(&mut self, transport: &Arc<dyn Transport>) {
        let snapshot = match self.snapshot() {
            Some(s) => s,
            None => return,
        };

        if let Err(e) = transport.send_frame(snapshot).await {
            tracing::error!("Failed to send screen frame: {e}");
        }
    }

    /// Produces a compressed snapshot of the current frame, or `None` when
    /// the sink is not ready or the frame cannot be encoded.
    fn snapshot(&mut self) -> Option<FrameSnapshot> {
        if !self.source.loaded_metadata() || !self.source.playable() {
            tracing::debug!("Screen sink not ready, skipping capture");
            return None;
        }

        let frame = match self.source.grab_frame() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!("Frame grab failed: {e}");
                return None;
            }
        };

        let quality = self.quality.quality_factor();
        match self.encode_jpeg(&frame, quality) {
            Ok(jpeg) => Some(FrameSnapshot {
                jpeg,
                quality,
                prompt: MANUAL_SCREENSHOT_PROMPT,
            }),
            Err(e) => {
                tracing::error!("Frame encode failed: {e}");
                None
            }
        }
    }

    /// Draws the frame into the off-screen raster (dropping alpha) and
    /// JPEG-encodes it at the given quality factor.
    fn encode_jpeg(&mut self, frame: &RawFrame, quality: f32) -> Result<Vec<u8>, image::ImageError> {
        let pixel_count = (frame.width * frame.height) as usize;
        self.raster.clear();
        self.raster.reserve(pixel_count * 3);
        for px in frame.rgba.chunks_exact(4) {
            self.raster.extend_from_slice(&px[..3]);
        }

        let mut jpeg = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut jpeg, (quality * 100.0) as u8);
        encoder.encode(
            &self.raster,
            frame.width,
            frame.height,
            ExtendedColorType::Rgb8,
        )?;
        Ok(jpeg)
    }

    /// Releases the underlying screen stream.
    pub fn stop(&mut self) {
        self.source.stop();
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FakeScreenSource;
    use super::*;

    #[test]
    fn not_ready_sink_skips_silently() {
        let mut capturer = FrameCapturer::new(
            Box::new(FakeScreenSource::not_ready()),
            ImageQuality::Medium,
        );
        assert!(capturer.snapshot().is_none());
    }

    #[test]
    fn ready_sink_produces_jpeg_snapshot() {
        let mut capturer =
            FrameCapturer::new(Box::new(FakeScreenSource::ready(32, 16)), ImageQuality::High);
        let snapshot = capturer.snapshot().expect("snapshot");
        assert_eq!(snapshot.quality, 0.9);
        assert_eq!(snapshot.prompt, MANUAL_SCREENSHOT_PROMPT);
        // JPEG magic bytes
        assert_eq!(&snapshot.jpeg[..2], &[0xff, 0xd8]);
    }

    #[test]
    fn quality_tier_maps_to_factor() {
        for (tier, factor) in [
            (ImageQuality::Low, 0.5),
            (ImageQuality::Medium, 0.7),
            (ImageQuality::High, 0.9),
        ] {
            let mut capturer = FrameCapturer::new(Box::new(FakeScreenSource::ready(8, 8)), tier);
            assert_eq!(capturer.snapshot().unwrap().quality, factor);
        }
    }

    #[test]
    fn detached_source_never_ready() {
        let mut capturer =
            FrameCapturer::new(Box::new(DetachedScreenSource), ImageQuality::Medium);
        assert!(capturer.snapshot().is_none());
    }
}
