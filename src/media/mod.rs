//! Media capture core: audio acquisition, chunking and screen frame capture.
//!
//! This is the pipeline between the OS media sources and the transport: audio
//! samples arrive on hardware callback threads, are accumulated into
//! fixed-duration chunks and dispatched fire-and-forget; screen frames are
//! grabbed on demand and JPEG-compressed before dispatch.

pub mod acquire;
pub mod chunker;
pub mod cpal_audio;
pub mod pcm;
pub mod pipeline;
pub mod screen;
pub mod strategy;

pub use acquire::{AcquireError, AudioParams, AudioSource, DisplayCapture, MediaAcquirer};
pub use chunker::{AudioChunk, ChunkAssembler, ChunkSource};
pub use cpal_audio::CpalAcquirer;
pub use pipeline::AudioPipeline;
pub use screen::{FrameCapturer, RawFrame, ScreenSource};
pub use strategy::{strategy_for, AcquiredMedia, AcquisitionStrategy, Platform};

/// Sample rate all audio legs are opened at, in Hz.
pub const SAMPLE_RATE: u32 = 24_000;

/// Duration of one transport audio chunk, in seconds.
pub const CHUNK_DURATION_SECS: f64 = 0.1;

/// Samples per transport chunk (2400 at 24 kHz).
pub const SAMPLES_PER_CHUNK: usize = (SAMPLE_RATE as f64 * CHUNK_DURATION_SECS) as usize;
