// Copyright (c) 2024-2026 Voxline Contributors
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use tracing::debug;

use crate::provider::AudioChunkStream;
use crate::CHUNK_SIZE_BYTES;

/// Primary low-latency neural provider. Streams PCM16@16kHz directly so no
/// resampling is needed on the hot path.
pub struct NeuralStreamingProvider {
    api_key: String,
    model_id: String,
    base_url: String,
    client: reqwest::Client,
}

impl NeuralStreamingProvider {
    pub fn new(api_key: String, model_id: String) -> Self {
        Self {
            api_key,
            model_id,
            base_url: "https://api.elevenlabs.io/v1".into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl crate::TtsProvider for NeuralStreamingProvider {
    fn name(&self) -> &str {
        "neural_primary"
    }

    async fn synthesize(&self, text: &str, voice_id: &str) -> anyhow::Result<AudioChunkStream> {
        debug!(voice_id, model = %self.model_id, "synthesizing via primary provider");
        let resp = self
            .client
            .post(format!(
                "{}/text-to-speech/{voice_id}/stream?output_format=pcm_16000",
                self.base_url
            ))
            .header("xi-api-key", &self.api_key)
            .json(&serde_json::json!({ "text": text, "model_id": self.model_id }))
            .send()
            .await?;

        if !resp.status().is_success() {
            anyhow::bail!("primary TTS provider error {}", resp.status());
        }

        Ok(Box::pin(rechunk(resp.bytes_stream())))
    }
}

/// Secondary provider: streams PCM@24kHz; resampled to 16kHz before
/// reaching the shared chunk size.
pub struct SecondaryPcmProvider {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl SecondaryPcmProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: "https://api.openai.com/v1".into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl crate::TtsProvider for SecondaryPcmProvider {
    fn name(&self) -> &str {
        "secondary_pcm24k"
    }

    async fn synthesize(&self, text: &str, voice_id: &str) -> anyhow::Result<AudioChunkStream> {
        debug!(voice_id, "synthesizing via secondary provider");
        let resp = self
            .client
            .post(format!("{}/audio/speech", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "model": "tts-1",
                "voice": voice_id,
                "input": text,
                "response_format": "pcm",
            }))
            .send()
            .await?;

        if !resp.status().is_success() {
            anyhow::bail!("secondary TTS provider error {}", resp.status());
        }

        let bytes = resp.bytes().await?;
        let resampled = voxline_codec::resample_linear(&bytes, 24000, 16000)?;
        Ok(Box::pin(futures::stream::iter(
            resampled
                .chunks(CHUNK_SIZE_BYTES)
                .map(|c| Ok(Bytes::copy_from_slice(c)))
                .collect::<Vec<_>>(),
        )))
    }
}

/// Free synthetic fallback: streams MP3, decoded to PCM16@16kHz mono.
pub struct FreeFallbackProvider {
    base_url: String,
    client: reqwest::Client,
}

impl FreeFallbackProvider {
    pub fn new() -> Self {
        Self {
            base_url: "https://translate.google.com/translate_tts".into(),
            client: reqwest::Client::new(),
        }
    }
}

impl Default for FreeFallbackProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl crate::TtsProvider for FreeFallbackProvider {
    fn name(&self) -> &str {
        "free_fallback"
    }

    async fn synthesize(&self, text: &str, _voice_id: &str) -> anyhow::Result<AudioChunkStream> {
        debug!("synthesizing via free fallback provider");
        let resp = self
            .client
            .get(&self.base_url)
            .query(&[("ie", "UTF-8"), ("client", "tw-ob"), ("q", text), ("tl", "en")])
            .send()
            .await?;

        if !resp.status().is_success() {
            anyhow::bail!("free fallback TTS error {}", resp.status());
        }

        let mp3_bytes = resp.bytes().await?;
        let pcm = decode_mp3_to_pcm16_mono_16k(&mp3_bytes)?;
        Ok(Box::pin(futures::stream::iter(
            pcm.chunks(CHUNK_SIZE_BYTES)
                .map(|c| Ok(Bytes::copy_from_slice(c)))
                .collect::<Vec<_>>(),
        )))
    }
}

/// Decodes MP3 to PCM16 mono and resamples to 16kHz using the pure-Rust
/// `puremp3` decoder — no external process dependency, per the spec's
/// "pure-code decoder if present" alternative to shelling out.
fn decode_mp3_to_pcm16_mono_16k(mp3_bytes: &[u8]) -> anyhow::Result<Vec<u8>> {
    let mut decoder = puremp3::Mp3Decoder::new(std::io::Cursor::new(mp3_bytes));
    let mut pcm = BytesMut::new();
    let mut native_rate = 16000u32;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                native_rate = frame.sample_rate;
                let channels = frame.num_channels();
                for i in 0..frame.samples[0].len() {
                    let mono = if channels > 1 {
                        (frame.samples[0][i] + frame.samples[1][i]) / 2.0
                    } else {
                        frame.samples[0][i]
                    };
                    let sample = (mono * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
                    pcm.extend_from_slice(&sample.to_le_bytes());
                }
            }
            Err(puremp3::Error::Eof) => break,
            Err(e) => return Err(anyhow::anyhow!("mp3 decode error: {e:?}")),
        }
    }

    Ok(voxline_codec::resample_linear(&pcm, native_rate, 16000)?)
}

fn rechunk(
    byte_stream: impl futures::Stream<Item = reqwest::Result<bytes::Bytes>> + Send + 'static,
) -> impl futures::Stream<Item = anyhow::Result<Bytes>> + Send {
    byte_stream.map(|r| r.map_err(anyhow::Error::from))
}
