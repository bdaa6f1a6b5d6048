// Copyright (c) 2024-2026 Voxline Contributors
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::{DeleteSelector, ScoredChunk, VectorRecord, VectorStore};

/// HTTP client for a Pinecone-shaped vector index: data-plane operations
/// (`/vectors/upsert`, `/query`, `/vectors/delete`) against a per-index
/// host, lazily connected and shared per knowledge base.
pub struct PineconeVectorStore {
    host: String,
    api_key: String,
    client: reqwest::Client,
}

impl PineconeVectorStore {
    pub fn new(host: String, api_key: String) -> Self {
        Self {
            host,
            api_key,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("https://{}{}", self.host.trim_start_matches("https://"), path)
    }
}

#[async_trait]
impl VectorStore for PineconeVectorStore {
    async fn upsert(&self, vectors: Vec<VectorRecord>, namespace: &str) -> anyhow::Result<()> {
        let body = json!({
            "namespace": namespace,
            "vectors": vectors.iter().map(|v| json!({
                "id": v.id,
                "values": v.embedding,
                "metadata": merge_text_into_metadata(&v.text, &v.metadata),
            })).collect::<Vec<_>>(),
        });
        debug!(namespace, count = vectors.len(), "upserting vectors");
        let resp = self
            .client
            .post(self.url("/vectors/upsert"))
            .header("Api-Key", &self.api_key)
            .json(&body)
            .send()
            .await?;
        if !resp.status().is_success() {
            anyhow::bail!("pinecone upsert failed: {}", resp.status());
        }
        Ok(())
    }

    async fn query(
        &self,
        embedding: &[f32],
        top_k: usize,
        namespace: &str,
    ) -> anyhow::Result<Vec<ScoredChunk>> {
        let body = json!({
            "namespace": namespace,
            "vector": embedding,
            "topK": top_k,
            "includeMetadata": true,
        });
        let resp = self
            .client
            .post(self.url("/query"))
            .header("Api-Key", &self.api_key)
            .json(&body)
            .send()
            .await?;
        if !resp.status().is_success() {
            anyhow::bail!("pinecone query failed: {}", resp.status());
        }
        let parsed: Value = resp.json().await?;
        let matches = parsed["matches"].as_array().cloned().unwrap_or_default();
        Ok(matches
            .into_iter()
            .map(|m| ScoredChunk {
                id: m["id"].as_str().unwrap_or_default().to_string(),
                score: m["score"].as_f64().unwrap_or(0.0) as f32,
                text: m["metadata"]["text"].as_str().unwrap_or_default().to_string(),
                metadata: m["metadata"].clone(),
            })
            .collect())
    }

    async fn delete(&self, selector: DeleteSelector<'_>, namespace: &str) -> anyhow::Result<()> {
        let body = match selector {
            DeleteSelector::Ids(ids) => json!({ "ids": ids, "namespace": namespace }),
            DeleteSelector::All => json!({ "deleteAll": true, "namespace": namespace }),
        };
        let resp = self
            .client
            .post(self.url("/vectors/delete"))
            .header("Api-Key", &self.api_key)
            .json(&body)
            .send()
            .await?;
        if !resp.status().is_success() {
            anyhow::bail!("pinecone delete failed: {}", resp.status());
        }
        Ok(())
    }
}

fn merge_text_into_metadata(text: &str, metadata: &Value) -> Value {
    let mut merged = metadata.clone();
    if let Value::Object(map) = &mut merged {
        map.insert("text".to_string(), json!(text));
    } else {
        merged = json!({ "text": text });
    }
    merged
}
