// Copyright (c) 2024-2026 Voxline Contributors
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::TranscriptEntry;

/// Sink for append-only transcript entries. The relational store itself is
/// out of scope for this crate (per the engine's non-goals); a real
/// deployment backs this with a DB insert. `InMemoryTranscriptSink` is the
/// stand-in used by the orchestrator's own tests.
#[async_trait]
pub trait TranscriptEntrySink: Send + Sync {
    async fn record(&self, entry: TranscriptEntry);
}

#[derive(Default)]
pub struct InMemoryTranscriptSink {
    entries: Mutex<Vec<TranscriptEntry>>,
}

impl InMemoryTranscriptSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all(&self) -> Vec<TranscriptEntry> {
        self.entries.lock().await.clone()
    }
}

#[async_trait]
impl TranscriptEntrySink for InMemoryTranscriptSink {
    async fn record(&self, entry: TranscriptEntry) {
        self.entries.lock().await.push(entry);
    }
}
