// Copyright (c) 2024-2026 Voxline Contributors
//
// SPDX-License-Identifier: Apache-2.0
mod cli;

use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use tokio::sync::Mutex;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use cli::{Cli, Commands};
use voxline_core::{
    Agent, Call, CallDirection, ControlMessage, InMemoryTranscriptSink, SessionDeps,
    TransportSink,
};
use voxline_model::provider_for_model;
use voxline_stt::WebSocketSttClient;
use voxline_tools::{InMemoryFunctionCallLogStore, ReqwestWebhookTransport, ToolRegistry};
use voxline_tts::{FreeFallbackProvider, NeuralStreamingProvider, SecondaryPcmProvider, TtsClient, TtsProvider};

/// Deepgram-shaped streaming recognizer endpoint. Not configurable: the
/// engine speaks one wire dialect (see `voxline_stt::websocket`); swapping
/// recognizer vendors means swapping the URL and auth scheme, which is a
/// code change, not a runtime flag.
const STT_WS_URL: &str = "wss://api.deepgram.com/v1/listen";

/// 100ms of PCM16@16kHz mono per frame — the pacing the session expects
/// from a live microphone, reproduced here so a WAV file drives the
/// recognizer the same way a real caller would.
const FRAME_BYTES: usize = 3200;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    if let Some(Commands::Completions { shell }) = cli.command {
        let mut cmd = Cli::command();
        let name = cmd.get_name().to_string();
        generate(shell, &mut cmd, name, &mut std::io::stdout());
        return Ok(());
    }

    run_session(cli).await
}

async fn run_session(cli: Cli) -> anyhow::Result<()> {
    let config = voxline_config::load(cli.config.as_deref())?;

    let mut agent = Agent::default_agent();
    agent.system_prompt = cli.system_prompt.clone();
    agent.voice_id = cli.voice_id.clone();
    agent.llm_model = cli.model.clone();
    if !cli.tools.is_empty() {
        agent.tools_enabled = cli.tools.clone();
    }

    let llm_provider = provider_for_model(&agent.llm_model, &config.llm);

    let mut tts_providers: Vec<Arc<dyn TtsProvider>> = Vec::new();
    if let Some(key) = &config.tts.primary_api_key {
        tts_providers.push(Arc::new(NeuralStreamingProvider::new(key.clone(), agent.voice_id.clone())));
    }
    if let Some(key) = &config.tts.secondary_api_key {
        tts_providers.push(Arc::new(SecondaryPcmProvider::new(key.clone())));
    }
    tts_providers.push(Arc::new(FreeFallbackProvider::new()));
    let tts = Arc::new(TtsClient::new(tts_providers));

    let tools = Arc::new(ToolRegistry::new(
        Vec::new(),
        Arc::new(InMemoryFunctionCallLogStore::new()),
        Arc::new(ReqwestWebhookTransport::default()),
    ));

    let deps = SessionDeps {
        llm_provider,
        tts,
        tools,
        rag: None,
        transcripts: Arc::new(InMemoryTranscriptSink::new()),
    };

    let stt_api_key = config.stt.api_key.clone();
    let endpointing_ms = config.stt.endpointing_ms;
    let stt_factory = move |sink| {
        Box::new(WebSocketSttClient::new(STT_WS_URL, stt_api_key, "en-US", endpointing_ms, sink))
            as Box<dyn voxline_stt::SttClient>
    };

    let transport: Arc<dyn TransportSink> = Arc::new(StdioTransport::new(&cli.output)?);
    let call = Call::new(uuid::Uuid::new_v4().to_string(), agent.id.clone(), CallDirection::Browser);

    let handle = voxline_core::start_session(call, Some(agent), deps, stt_factory, transport).await;

    let pcm = read_input_pcm(&cli.input)?;
    for frame in pcm.chunks(FRAME_BYTES) {
        handle.session.handle_audio(frame);
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    handle.session.notify_transport_closed("browser_disconnect");
    handle.task.await.context("session task panicked")?;
    eprintln!("response audio written to {}", cli.output.display());
    Ok(())
}

fn read_input_pcm(path: &Path) -> anyhow::Result<Vec<u8>> {
    let mut raw = Vec::new();
    if path.as_os_str() == "-" {
        std::io::stdin().read_to_end(&mut raw)?;
    } else {
        std::fs::File::open(path)
            .with_context(|| format!("opening {}", path.display()))?
            .read_to_end(&mut raw)?;
    }
    Ok(strip_wav_header(raw))
}

/// Strips a RIFF/WAVE container down to its `data` chunk's raw samples.
/// Input without the `RIFF....WAVE` magic is assumed to already be bare
/// PCM16LE and is returned unchanged.
fn strip_wav_header(raw: Vec<u8>) -> Vec<u8> {
    if raw.len() < 12 || &raw[0..4] != b"RIFF" || &raw[8..12] != b"WAVE" {
        return raw;
    }
    let mut pos = 12;
    while pos + 8 <= raw.len() {
        let chunk_id = &raw[pos..pos + 4];
        let chunk_size = u32::from_le_bytes([raw[pos + 4], raw[pos + 5], raw[pos + 6], raw[pos + 7]]) as usize;
        let data_start = pos + 8;
        if chunk_id == b"data" {
            let data_end = (data_start + chunk_size).min(raw.len());
            return raw[data_start..data_end].to_vec();
        }
        pos = data_start + chunk_size + (chunk_size % 2);
    }
    raw
}

/// Transport for the dev harness: control messages print to stdout as JSON
/// lines, synthesized audio accumulates in the output PCM file.
struct StdioTransport {
    audio: Mutex<std::fs::File>,
}

impl StdioTransport {
    fn new(output: &Path) -> anyhow::Result<Self> {
        let file = std::fs::File::create(output)
            .with_context(|| format!("creating {}", output.display()))?;
        Ok(Self { audio: Mutex::new(file) })
    }
}

#[async_trait]
impl TransportSink for StdioTransport {
    async fn send_audio(&self, pcm: Bytes) {
        let mut file = self.audio.lock().await;
        let _ = file.write_all(&pcm);
    }

    async fn send_message(&self, message: ControlMessage) {
        if let Ok(json) = serde_json::to_string(&message) {
            println!("{json}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_through_raw_pcm_without_riff_magic() {
        let raw = vec![1, 2, 3, 4];
        assert_eq!(strip_wav_header(raw.clone()), raw);
    }

    #[test]
    fn strips_riff_header_down_to_data_chunk() {
        let mut wav = Vec::new();
        wav.extend_from_slice(b"RIFF");
        wav.extend_from_slice(&36u32.to_le_bytes());
        wav.extend_from_slice(b"WAVE");
        wav.extend_from_slice(b"fmt ");
        wav.extend_from_slice(&16u32.to_le_bytes());
        wav.extend_from_slice(&[0u8; 16]);
        wav.extend_from_slice(b"data");
        let samples = vec![9u8, 9, 8, 8];
        wav.extend_from_slice(&(samples.len() as u32).to_le_bytes());
        wav.extend_from_slice(&samples);

        assert_eq!(strip_wav_header(wav), samples);
    }
}
