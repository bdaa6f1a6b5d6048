// Copyright (c) 2024-2026 Voxline Contributors
//
// SPDX-License-Identifier: Apache-2.0
mod anthropic;
mod google;
mod mock;
mod openai_compat;
mod provider;
mod registry;
mod types;

pub use mock::{MockProvider, MockStep};
pub use provider::{ModelProvider, ProviderEventStream};
pub use registry::provider_for_model;
pub use types::{
    CompletionRequest, ConversationMessage, LlmEvent, ProviderEvent, Role, ToolDefinition,
};

use std::collections::BTreeMap;
use std::pin::Pin;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use serde_json::Value;
use tracing::warn;
use types::ProviderEvent;

pub type LlmEventStream = Pin<Box<dyn Stream<Item = LlmEvent> + Send>>;

/// Drive `provider` to completion and adapt its raw deltas into the public
/// `text_delta` / `tool_call` / `done` event contract:
///
/// - `text_delta` events pass straight through as they arrive.
/// - Tool-call fragments are accumulated per index and only surfaced, each
///   as a single `ToolCall` event, after the provider's own stream ends —
///   never interleaved with text.
/// - If the provider stream errors, the error is logged and swallowed here;
///   the caller observes only that no further text/tool events arrive
///   before `Done`. The session layer is responsible for surfacing a
///   user-visible error from its own call context.
pub async fn stream_completion(
    provider: Arc<dyn ModelProvider>,
    req: CompletionRequest,
) -> LlmEventStream {
    let result = provider.stream(req).await;
    let raw: Pin<Box<dyn Stream<Item = anyhow::Result<ProviderEvent>> + Send>> = match result {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "LLM provider failed to open stream");
            return Box::pin(futures::stream::iter(vec![LlmEvent::Done]));
        }
    };

    Box::pin(async_stream::stream! {
        let mut tool_calls: BTreeMap<u32, (Option<String>, String)> = BTreeMap::new();
        tokio::pin!(raw);
        while let Some(item) = raw.next().await {
            match item {
                Ok(ProviderEvent::TextDelta(text)) => {
                    if !text.is_empty() {
                        yield LlmEvent::TextDelta(text);
                    }
                }
                Ok(ProviderEvent::ToolCallDelta { index, name, arguments_fragment }) => {
                    let entry = tool_calls.entry(index).or_insert((None, String::new()));
                    if let Some(n) = name {
                        entry.0 = Some(n);
                    }
                    entry.1.push_str(&arguments_fragment);
                }
                Ok(ProviderEvent::Done) => break,
                Err(e) => {
                    warn!(error = %e, "LLM stream failed mid-response");
                    break;
                }
            }
        }
        for (_, (name, raw_args)) in tool_calls {
            let name = name.unwrap_or_default();
            let arguments: Value = serde_json::from_str(&raw_args).unwrap_or_else(|_| serde_json::json!({}));
            yield LlmEvent::ToolCall { name, arguments };
        }
        yield LlmEvent::Done;
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockStep;

    async fn collect(stream: LlmEventStream) -> Vec<LlmEvent> {
        stream.collect().await
    }

    #[tokio::test]
    async fn text_only_response_emits_deltas_then_done() {
        let provider: Arc<dyn ModelProvider> = Arc::new(MockProvider::new(
            "mock",
            vec![MockStep::Text("Hello"), MockStep::Text(", world.")],
        ));
        let req = CompletionRequest::new("mock-model", vec![ConversationMessage::user("hi")]);
        let events = collect(stream_completion(provider, req).await).await;
        assert_eq!(
            events,
            vec![
                LlmEvent::TextDelta("Hello".into()),
                LlmEvent::TextDelta(", world.".into()),
                LlmEvent::Done,
            ]
        );
    }

    #[tokio::test]
    async fn tool_calls_accumulate_and_surface_before_done() {
        let provider: Arc<dyn ModelProvider> = Arc::new(MockProvider::new(
            "mock",
            vec![
                MockStep::Text("Let me check."),
                MockStep::ToolCall {
                    index: 0,
                    name: "check_availability",
                    arguments: serde_json::json!({"date": "2026-08-01"}),
                },
            ],
        ));
        let req = CompletionRequest::new("mock-model", vec![ConversationMessage::user("hi")]);
        let events = collect(stream_completion(provider, req).await).await;
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], LlmEvent::TextDelta("Let me check.".into()));
        assert!(matches!(&events[1], LlmEvent::ToolCall { name, .. } if name == "check_availability"));
        assert_eq!(events[2], LlmEvent::Done);
    }

    #[tokio::test]
    async fn malformed_tool_arguments_fall_back_to_empty_object() {
        struct BrokenArgsProvider;
        #[async_trait::async_trait]
        impl ModelProvider for BrokenArgsProvider {
            fn name(&self) -> &str {
                "broken"
            }
            async fn stream(&self, _req: CompletionRequest) -> anyhow::Result<provider::ProviderEventStream> {
                Ok(Box::pin(tokio_stream::iter(vec![
                    Ok(ProviderEvent::ToolCallDelta {
                        index: 0,
                        name: Some("end_call".into()),
                        arguments_fragment: "{not json".into(),
                    }),
                    Ok(ProviderEvent::Done),
                ])))
            }
        }
        let provider: Arc<dyn ModelProvider> = Arc::new(BrokenArgsProvider);
        let req = CompletionRequest::new("mock-model", vec![ConversationMessage::user("hi")]);
        let events = collect(stream_completion(provider, req).await).await;
        assert!(matches!(&events[0], LlmEvent::ToolCall { arguments, .. } if *arguments == serde_json::json!({})));
    }

    #[tokio::test]
    async fn provider_open_failure_yields_bare_done() {
        struct FailingProvider;
        #[async_trait::async_trait]
        impl ModelProvider for FailingProvider {
            fn name(&self) -> &str {
                "failing"
            }
            async fn stream(&self, _req: CompletionRequest) -> anyhow::Result<provider::ProviderEventStream> {
                anyhow::bail!("no api key")
            }
        }
        let provider: Arc<dyn ModelProvider> = Arc::new(FailingProvider);
        let req = CompletionRequest::new("mock-model", vec![ConversationMessage::user("hi")]);
        let events = collect(stream_completion(provider, req).await).await;
        assert_eq!(events, vec![LlmEvent::Done]);
    }
}
