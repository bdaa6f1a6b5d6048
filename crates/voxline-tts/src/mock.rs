// Copyright (c) 2024-2026 Voxline Contributors
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use bytes::Bytes;

use crate::provider::AudioChunkStream;

/// Test double returning a fixed chunk sequence, or failing to start if
/// constructed via [`MockTtsProvider::failing`].
pub struct MockTtsProvider {
    name: String,
    chunks: Vec<Bytes>,
    fail: bool,
}

impl MockTtsProvider {
    pub fn new(name: impl Into<String>, chunks: Vec<Bytes>) -> Self {
        Self {
            name: name.into(),
            chunks,
            fail: false,
        }
    }

    pub fn failing(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            chunks: Vec::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl crate::TtsProvider for MockTtsProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn synthesize(&self, _text: &str, _voice_id: &str) -> anyhow::Result<AudioChunkStream> {
        if self.fail {
            anyhow::bail!("mock TTS provider configured to fail");
        }
        let chunks: Vec<anyhow::Result<Bytes>> = self.chunks.iter().cloned().map(Ok).collect();
        Ok(Box::pin(futures::stream::iter(chunks)))
    }
}
