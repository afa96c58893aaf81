//! Live audio pipeline: source callback -> chunk assembly -> dispatch.
//!
//! Each pipeline owns one audio source and one assembler. The source's
//! callback thread only appends samples and hands completed chunks to an
//! unbounded channel; an async dispatcher picks them up and fires one
//! transport send per chunk. Dispatch never blocks the callback and chunk
//! sends may complete out of submission order; within one source, chunks are
//! still produced in sample order.

use crate::media::acquire::{AcquireError, AudioSource};
use crate::media::chunker::{AudioChunk, ChunkAssembler, ChunkSource};
use crate::transport::Transport;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// One running capture leg (system audio or microphone).
pub struct AudioPipeline {
    source: Box<dyn AudioSource>,
    assembler: Arc<Mutex<ChunkAssembler>>,
    chunk_tx: Option<mpsc::UnboundedSender<AudioChunk>>,
    tag: ChunkSource,
}

impl AudioPipeline {
    /// Starts streaming from `source`, dispatching chunks tagged with `tag`
    /// to `transport`.
    ///
    /// # Errors
    /// - If the underlying audio source fails to start
    pub fn start(
        mut source: Box<dyn AudioSource>,
        tag: ChunkSource,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, AcquireError> {
        let assembler = Arc::new(Mutex::new(ChunkAssembler::new(tag)));
        let (chunk_tx, mut chunk_rx) = mpsc::unbounded_channel::<AudioChunk>();

        let callback_assembler = Arc::clone(&assembler);
        let callback_tx = chunk_tx.clone();
        source.start(Box::new(move |samples| {
            let chunks = callback_assembler.lock().unwrap().push(samples);
            for chunk in chunks {
                // Send failure means the dispatcher is gone, i.e. we are
                // stopping; the chunk is dropped either way
                let _ = callback_tx.send(chunk);
            }
        }))?;

        // Dispatcher: one independent fire-and-forget send per chunk. Ends
        // when the last sender is dropped at stop; in-flight sends are left
        // to complete on their own.
        tokio::spawn(async move {
            while let Some(chunk) = chunk_rx.recv().await {
                let transport = Arc::clone(&transport);
                tokio::spawn(async move {
                    let source = chunk.source;
                    if let Err(e) = transport.send_audio_chunk(chunk).await {
                        tracing::warn!("Dropped {} chunk: {e}", source.as_str());
                    }
                });
            }
            tracing::debug!("Audio dispatcher finished");
        });

        tracing::info!("Audio pipeline started: {}", tag.as_str());
        Ok(Self {
            source,
            assembler,
            chunk_tx: Some(chunk_tx),
            tag,
        })
    }

    /// Samples buffered below the next chunk boundary.
    pub fn buffered_samples(&self) -> usize {
        self.assembler.lock().unwrap().buffered()
    }

    /// Stops the source, discards the partial buffer and lets the dispatcher
    /// wind down. Idempotent.
    pub fn stop(&mut self) {
        self.source.stop();
        self.assembler.lock().unwrap().clear();
        self.chunk_tx.take();
        tracing::info!("Audio pipeline stopped: {}", self.tag.as_str());
    }
}

impl Drop for AudioPipeline {
    fn drop(&mut self) {
        self.stop();
    }
}
