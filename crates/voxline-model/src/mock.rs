// Copyright (c) 2024-2026 Voxline Contributors
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use serde_json::Value;

use crate::provider::ProviderEventStream;
use crate::types::{CompletionRequest, ProviderEvent};

/// Scripted provider used by session-orchestrator tests: replays a fixed
/// sequence of events regardless of the request it receives.
pub struct MockProvider {
    name: String,
    script: Vec<MockStep>,
}

#[derive(Clone)]
pub enum MockStep {
    Text(&'static str),
    ToolCall { index: u32, name: &'static str, arguments: Value },
}

impl MockProvider {
    pub fn new(name: impl Into<String>, script: Vec<MockStep>) -> Self {
        Self {
            name: name.into(),
            script,
        }
    }
}

#[async_trait]
impl crate::ModelProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn stream(&self, _req: CompletionRequest) -> anyhow::Result<ProviderEventStream> {
        let mut events = Vec::new();
        for step in &self.script {
            match step {
                MockStep::Text(t) => events.push(Ok(ProviderEvent::TextDelta(t.to_string()))),
                MockStep::ToolCall { index, name, arguments } => {
                    events.push(Ok(ProviderEvent::ToolCallDelta {
                        index: *index,
                        name: Some(name.to_string()),
                        arguments_fragment: arguments.to_string(),
                    }));
                }
            }
        }
        events.push(Ok(ProviderEvent::Done));
        Ok(Box::pin(tokio_stream::iter(events)))
    }
}
