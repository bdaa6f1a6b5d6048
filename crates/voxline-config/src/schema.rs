// Copyright (c) 2024-2026 Voxline Contributors
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

/// Root configuration tree. Deserialized from merged YAML layers with
/// provider API keys backfilled from environment variables when absent
/// from the file (env vars never override an explicit file value, so a
/// `voxline.yaml` checked into a private repo still wins for local dev).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub stt: SttConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub tts: TtsConfig,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub telephony: TelephonyConfig,
    #[serde(default)]
    pub tunnel: TunnelConfig,
    #[serde(default)]
    pub rag: RagConfig,
    #[serde(default)]
    pub app_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SttConfig {
    /// Streaming recognizer provider name (e.g. "deepgram").
    #[serde(default = "default_stt_provider")]
    pub provider: String,
    pub api_key: Option<String>,
    /// Trailing-silence endpointing threshold.
    #[serde(default = "default_endpointing_ms")]
    pub endpointing_ms: u32,
    #[serde(default = "default_vad")]
    pub vad_events: bool,
}

fn default_stt_provider() -> String {
    "deepgram".to_string()
}
fn default_endpointing_ms() -> u32 {
    300
}
fn default_vad() -> bool {
    true
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            provider: default_stt_provider(),
            api_key: None,
            endpointing_ms: default_endpointing_ms(),
            vad_events: default_vad(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmConfig {
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub anthropic_base_url: Option<String>,
    pub google_api_key: Option<String>,
    pub deepseek_api_key: Option<String>,
    pub groq_api_key: Option<String>,
    /// Default model used when an agent doesn't set `llm_model`.
    #[serde(default = "default_llm_model")]
    pub default_model: String,
    /// Embedding model id for RAG query embedding.
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TtsConfig {
    pub primary_api_key: Option<String>,
    pub primary_voice_id: Option<String>,
    pub secondary_api_key: Option<String>,
    #[serde(default = "default_tts_timeout")]
    pub http_timeout_seconds: u64,
}

fn default_tts_timeout() -> u64 {
    30
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            primary_api_key: None,
            primary_voice_id: None,
            secondary_api_key: None,
            http_timeout_seconds: default_tts_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VectorStoreConfig {
    pub provider: Option<String>,
    pub api_key: Option<String>,
    pub index_name: Option<String>,
    pub host: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DatabaseConfig {
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TelephonyConfig {
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TunnelConfig {
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

fn default_top_k() -> usize {
    5
}
fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    200
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

/// Backfill provider API keys from the process environment when a config
/// layer didn't set them explicitly. Mirrors the five-provider LLM surface
/// plus STT/TTS/vector-store/telephony/tunnel credentials called out in the
/// external-interfaces section of the spec.
pub fn apply_env_overrides(config: &mut Config) {
    use std::env;

    macro_rules! fill {
        ($field:expr, $var:expr) => {
            if $field.is_none() {
                $field = env::var($var).ok();
            }
        };
    }

    fill!(config.stt.api_key, "VOXLINE_STT_API_KEY");
    fill!(config.llm.openai_api_key, "OPENAI_API_KEY");
    fill!(config.llm.anthropic_api_key, "ANTHROPIC_API_KEY");
    fill!(config.llm.google_api_key, "GOOGLE_API_KEY");
    fill!(config.llm.deepseek_api_key, "DEEPSEEK_API_KEY");
    fill!(config.llm.groq_api_key, "GROQ_API_KEY");
    fill!(config.tts.primary_api_key, "VOXLINE_TTS_PRIMARY_API_KEY");
    fill!(config.tts.secondary_api_key, "VOXLINE_TTS_SECONDARY_API_KEY");
    fill!(config.vector_store.api_key, "VOXLINE_VECTOR_STORE_API_KEY");
    fill!(config.database.url, "DATABASE_URL");
    fill!(config.telephony.account_sid, "TELEPHONY_ACCOUNT_SID");
    fill!(config.telephony.auth_token, "TELEPHONY_AUTH_TOKEN");
    fill!(config.tunnel.token, "VOXLINE_TUNNEL_TOKEN");
    fill!(config.app_url, "VOXLINE_APP_URL");
}
