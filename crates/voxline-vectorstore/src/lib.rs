// Copyright (c) 2024-2026 Voxline Contributors
//
// SPDX-License-Identifier: Apache-2.0
mod memory;
mod pinecone;

pub use memory::InMemoryVectorStore;
pub use pinecone::PineconeVectorStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub embedding: Vec<f32>,
    pub text: String,
    pub metadata: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub id: String,
    pub score: f32,
    pub text: String,
    pub metadata: Value,
}

pub enum DeleteSelector<'a> {
    Ids(&'a [String]),
    All,
}

/// Namespaced vector store interface. A namespace is a tenant-like
/// partition within an index — every operation is scoped to one.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn upsert(&self, vectors: Vec<VectorRecord>, namespace: &str) -> anyhow::Result<()>;

    async fn query(
        &self,
        embedding: &[f32],
        top_k: usize,
        namespace: &str,
    ) -> anyhow::Result<Vec<ScoredChunk>>;

    async fn delete(&self, selector: DeleteSelector<'_>, namespace: &str) -> anyhow::Result<()>;
}

/// Stable chunk vector id for the `chunk_index`'th chunk of `file_id`, per
/// the data-model invariant that deleting a `KBFile` removes exactly
/// `{file_id}_0 .. {file_id}_(chunk_count-1)`.
pub fn chunk_vector_id(file_id: &str, chunk_index: usize) -> String {
    format!("{file_id}_{chunk_index}")
}

/// All vector ids for a file with `chunk_count` chunks, in order.
pub fn file_vector_ids(file_id: &str, chunk_count: usize) -> Vec<String> {
    (0..chunk_count).map(|i| chunk_vector_id(file_id, i)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_vector_id_follows_stable_pattern() {
        assert_eq!(chunk_vector_id("file-1", 0), "file-1_0");
        assert_eq!(chunk_vector_id("file-1", 7), "file-1_7");
    }

    #[test]
    fn file_vector_ids_covers_full_range() {
        let ids = file_vector_ids("file-2", 3);
        assert_eq!(ids, vec!["file-2_0", "file-2_1", "file-2_2"]);
    }
}
