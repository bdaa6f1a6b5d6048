// Copyright (c) 2024-2026 Voxline Contributors
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::{DeleteSelector, ScoredChunk, VectorRecord, VectorStore};

/// In-process vector store used by RAG retriever tests and by the session
/// orchestrator's own test suite — avoids needing a live Pinecone-style
/// index to exercise the retrieval path end-to-end.
#[derive(Default)]
pub struct InMemoryVectorStore {
    namespaces: Mutex<HashMap<String, HashMap<String, VectorRecord>>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(&self, vectors: Vec<VectorRecord>, namespace: &str) -> anyhow::Result<()> {
        let mut guard = self.namespaces.lock().unwrap();
        let ns = guard.entry(namespace.to_string()).or_default();
        for v in vectors {
            ns.insert(v.id.clone(), v);
        }
        Ok(())
    }

    async fn query(
        &self,
        embedding: &[f32],
        top_k: usize,
        namespace: &str,
    ) -> anyhow::Result<Vec<ScoredChunk>> {
        let guard = self.namespaces.lock().unwrap();
        let Some(ns) = guard.get(namespace) else {
            return Ok(Vec::new());
        };
        let mut scored: Vec<ScoredChunk> = ns
            .values()
            .map(|v| ScoredChunk {
                id: v.id.clone(),
                score: cosine_similarity(embedding, &v.embedding),
                text: v.text.clone(),
                metadata: v.metadata.clone(),
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn delete(&self, selector: DeleteSelector<'_>, namespace: &str) -> anyhow::Result<()> {
        let mut guard = self.namespaces.lock().unwrap();
        let Some(ns) = guard.get_mut(namespace) else {
            return Ok(());
        };
        match selector {
            DeleteSelector::Ids(ids) => {
                for id in ids {
                    ns.remove(id);
                }
            }
            DeleteSelector::All => ns.clear(),
        }
        Ok(())
    }
}
