// Copyright (c) 2024-2026 Voxline Contributors
//
// SPDX-License-Identifier: Apache-2.0
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

pub type AudioChunkStream = Pin<Box<dyn Stream<Item = anyhow::Result<Bytes>> + Send>>;

/// One entry in the TTS provider fallback chain. Every implementation
/// streams PCM16@16kHz mono chunks regardless of its own native sample
/// rate/format — resampling and MP3 decoding happen inside the provider, not
/// in the shared `TtsClient`.
#[async_trait]
pub trait TtsProvider: Send + Sync {
    fn name(&self) -> &str;
    async fn synthesize(&self, text: &str, voice_id: &str) -> anyhow::Result<AudioChunkStream>;
}
