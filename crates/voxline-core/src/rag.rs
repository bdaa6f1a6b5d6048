// Copyright (c) 2024-2026 Voxline Contributors
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use voxline_vectorstore::VectorStore;

/// No teacher counterpart — authored fresh, in the same shape as the
/// teacher's smaller single-method provider traits (`ModelProvider::name`
/// aside, one verb, one `anyhow::Result`).
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;
}

/// Thin caller of an OpenAI-compatible `/embeddings` endpoint. Default model
/// mirrors the original system's `text-embedding-3-small`.
pub struct RestEmbedder {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl RestEmbedder {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl Embedder for RestEmbedder {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let url = format!("{}/embeddings", self.base_url.trim_end_matches('/'));
        let resp = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&json!({ "model": self.model, "input": text }))
            .send()
            .await?
            .error_for_status()?;
        let body: serde_json::Value = resp.json().await?;
        let embedding = body["data"][0]["embedding"]
            .as_array()
            .ok_or_else(|| anyhow::anyhow!("embeddings response missing data[0].embedding"))?
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        Ok(embedding)
    }
}

/// Wired in only when the agent's knowledge base is configured and active;
/// its mere presence on the session is what stands in for the
/// "has a knowledge_base_id and that KB is active" check — the KB row
/// itself lives in the storage backend, which this crate never queries
/// directly.
#[derive(Clone)]
pub struct RagContext {
    pub embedder: Arc<dyn Embedder>,
    pub vector_store: Arc<dyn VectorStore>,
    pub namespace: String,
    pub top_k: usize,
}

/// Embeds `user_utterance`, queries the vector store, and concatenates the
/// `text` field of the returned chunks with `\n\n---\n\n`. Returns `None`
/// (inject nothing) when the store returns zero chunks.
pub async fn retrieve_context(rag: &RagContext, user_utterance: &str) -> anyhow::Result<Option<String>> {
    let embedding = rag.embedder.embed(user_utterance).await?;
    let chunks = rag.vector_store.query(&embedding, rag.top_k, &rag.namespace).await?;
    if chunks.is_empty() {
        return Ok(None);
    }
    let joined = chunks
        .into_iter()
        .map(|c| c.text)
        .collect::<Vec<_>>()
        .join("\n\n---\n\n");
    Ok(Some(joined))
}
