// Copyright (c) 2024-2026 Voxline Contributors
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use crate::types::{CompletionRequest, ProviderEvent};

pub type ProviderEventStream = Pin<Box<dyn Stream<Item = anyhow::Result<ProviderEvent>> + Send>>;

/// A single LLM family's wire driver. Implementors only need to translate
/// their provider's request/response shape; tool-call accumulation and the
/// `text_delta`/`tool_call`/`done` event contract are handled once, in
/// `lib.rs`, for every provider.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Human-readable provider name ("anthropic", "openai", ...).
    fn name(&self) -> &str;

    /// Open a streaming completion request and return a stream of raw,
    /// provider-specific deltas.
    async fn stream(&self, req: CompletionRequest) -> anyhow::Result<ProviderEventStream>;
}
