// Copyright (c) 2024-2026 Voxline Contributors
//
// SPDX-License-Identifier: Apache-2.0
mod mock;
mod provider;
mod providers;

pub use mock::MockTtsProvider;
pub use provider::{AudioChunkStream, TtsProvider};
pub use providers::{FreeFallbackProvider, NeuralStreamingProvider, SecondaryPcmProvider};

use std::sync::Arc;

use futures::StreamExt;
use tracing::{debug, warn};

/// Target chunk size: small enough that barge-in can cancel within ~50ms of
/// audio at 16kHz PCM16 mono (2 bytes/sample * 16000 samples/sec * 0.05s ~= 1600B,
/// rounded up to the 2-4KB band the spec calls out).
pub const CHUNK_SIZE_BYTES: usize = 3200;

/// Synthesizes `text` by trying each provider in order, returning the first
/// one that yields at least one non-empty chunk. A later provider's chunks
/// are never interleaved with an earlier provider's within one call — once
/// a provider produces output, its stream is drained to completion.
pub struct TtsClient {
    providers: Vec<Arc<dyn TtsProvider>>,
}

impl TtsClient {
    pub fn new(providers: Vec<Arc<dyn TtsProvider>>) -> Self {
        Self { providers }
    }

    pub async fn synthesize(&self, text: &str, voice_id: &str) -> AudioChunkStream {
        for provider in &self.providers {
            match provider.synthesize(text, voice_id).await {
                Ok(mut stream) => {
                    // Peek for the first non-empty chunk before committing to
                    // this provider, so an empty-output provider still falls
                    // through to the next one.
                    match stream.next().await {
                        Some(Ok(chunk)) if !chunk.is_empty() => {
                            debug!(provider = provider.name(), "TTS provider produced audio");
                            let rest = stream;
                            return Box::pin(futures::stream::once(async move { Ok(chunk) }).chain(rest));
                        }
                        Some(Ok(_empty)) => continue,
                        Some(Err(e)) => {
                            warn!(provider = provider.name(), error = %e, "TTS provider failed");
                            continue;
                        }
                        None => continue,
                    }
                }
                Err(e) => {
                    warn!(provider = provider.name(), error = %e, "TTS provider failed to start");
                    continue;
                }
            }
        }
        warn!("all TTS providers exhausted with no audio");
        Box::pin(futures::stream::empty())
    }
}
