//! Fixed-duration audio chunk assembly.
//!
//! Samples from an audio callback accumulate in an owned buffer; whenever a
//! full chunk's worth is available it is drained off the front, converted to
//! 16-bit PCM and packaged for the transport. Leftover samples stay buffered
//! for the next cycle, so no sample is ever dropped or padded.

use crate::media::pcm::{self, AUDIO_PCM_MIME};
use crate::media::SAMPLES_PER_CHUNK;

/// Which capture leg a chunk came from. Each leg has its own transport
/// destination, so chunks from different legs are never conflated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkSource {
    /// System/speaker output leg
    System,
    /// Microphone leg
    Mic,
}

impl ChunkSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system-audio",
            Self::Mic => "mic-audio",
        }
    }
}

/// One transport-ready slice of audio: 16-bit little-endian PCM bytes plus
/// mime descriptor and source tag. Consumed exactly once by the transport.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    pub data: Vec<u8>,
    pub mime: &'static str,
    pub source: ChunkSource,
}

impl AudioChunk {
    /// Number of samples carried by this chunk.
    pub fn sample_count(&self) -> usize {
        self.data.len() / 2
    }
}

/// Accumulates float samples and drains exact fixed-size chunks.
///
/// The buffer is a growable `Vec` with an explicit read offset; drained
/// samples are compacted away in one pass per callback rather than spliced
/// per chunk.
pub struct ChunkAssembler {
    buffer: Vec<f32>,
    read_pos: usize,
    samples_per_chunk: usize,
    source: ChunkSource,
}

impl ChunkAssembler {
    pub fn new(source: ChunkSource) -> Self {
        Self::with_chunk_size(source, SAMPLES_PER_CHUNK)
    }

    fn with_chunk_size(source: ChunkSource, samples_per_chunk: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(samples_per_chunk * 4),
            read_pos: 0,
            samples_per_chunk,
            source,
        }
    }

    /// Appends incoming samples and returns every chunk that became complete.
    ///
    /// Chunks are always exactly `samples_per_chunk` long; a short remainder
    /// stays buffered until the next call.
    pub fn push(&mut self, samples: &[f32]) -> Vec<AudioChunk> {
        self.buffer.extend_from_slice(samples);

        let mut chunks = Vec::new();
        while self.buffer.len() - self.read_pos >= self.samples_per_chunk {
            let window = &self.buffer[self.read_pos..self.read_pos + self.samples_per_chunk];
            let pcm16 = pcm::float_to_int16(window);
            chunks.push(AudioChunk {
                data: pcm::int16_to_le_bytes(&pcm16),
                mime: AUDIO_PCM_MIME,
                source: self.source,
            });
            self.read_pos += self.samples_per_chunk;
        }

        // Compact once per callback instead of per chunk
        if self.read_pos > 0 {
            self.buffer.drain(..self.read_pos);
            self.read_pos = 0;
        }

        chunks
    }

    /// Number of samples waiting for the next chunk boundary.
    pub fn buffered(&self) -> usize {
        self.buffer.len() - self.read_pos
    }

    /// Discards any partially accumulated samples. Called at stop; partial
    /// chunks are never flushed to the transport.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.read_pos = 0;
    }
}
