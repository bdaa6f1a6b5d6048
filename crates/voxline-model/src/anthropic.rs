// Copyright (c) 2024-2026 Voxline Contributors
//
// SPDX-License-Identifier: Apache-2.0
use anyhow::{bail, Context};
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use tracing::debug;

use crate::provider::ProviderEventStream;
use crate::types::{CompletionRequest, ConversationMessage, ProviderEvent, Role};

pub struct AnthropicProvider {
    api_key: Option<String>,
    base_url: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(api_key: Option<String>, base_url: Option<String>) -> Self {
        Self {
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.anthropic.com".into()),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl crate::ModelProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn stream(&self, req: CompletionRequest) -> anyhow::Result<ProviderEventStream> {
        let key = self
            .api_key
            .as_deref()
            .context("ANTHROPIC_API_KEY not set")?;

        let (system_text, messages) = split_system(&req.messages);
        let tools: Vec<Value> = req
            .tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "input_schema": t.parameters,
                })
            })
            .collect();

        let mut body = json!({
            "model": req.model,
            "messages": messages,
            "max_tokens": req.max_tokens,
            "temperature": req.temperature,
            "stream": true,
        });
        if !system_text.is_empty() {
            body["system"] = json!(system_text);
        }
        if !tools.is_empty() {
            body["tools"] = json!(tools);
        }

        debug!(model = %req.model, "sending anthropic request");

        let resp = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .context("Anthropic request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            bail!("Anthropic error {status}: {text}");
        }

        Ok(Box::pin(sse_to_events(resp.bytes_stream())))
    }
}

fn split_system(messages: &[ConversationMessage]) -> (String, Vec<Value>) {
    let mut system = String::new();
    let mut out = Vec::new();
    for m in messages {
        match m.role {
            Role::System => {
                if !system.is_empty() {
                    system.push('\n');
                }
                system.push_str(&m.content);
            }
            Role::User | Role::Tool => out.push(json!({"role": "user", "content": m.content})),
            Role::Assistant => out.push(json!({"role": "assistant", "content": m.content})),
        }
    }
    (system, out)
}

/// SSE lines can be split across TCP chunks; a remainder buffer carries
/// partial lines forward across `scan` invocations.
fn sse_to_events(
    byte_stream: impl futures::Stream<Item = reqwest::Result<bytes::Bytes>> + Send + 'static,
) -> impl futures::Stream<Item = anyhow::Result<ProviderEvent>> + Send {
    byte_stream
        .scan(String::new(), |buf, chunk| {
            let text = match chunk {
                Ok(b) => String::from_utf8_lossy(&b).to_string(),
                Err(e) => return futures::future::ready(Some(vec![Err(anyhow::anyhow!(e))])),
            };
            buf.push_str(&text);
            let mut events = Vec::new();
            while let Some(pos) = buf.find('\n') {
                let line = buf[..pos].trim_end_matches('\r').to_string();
                buf.drain(..=pos);
                if let Some(data) = line.strip_prefix("data: ") {
                    let data = data.trim();
                    if let Ok(v) = serde_json::from_str::<Value>(data) {
                        if let Some(ev) = parse_anthropic_event(&v) {
                            events.push(Ok(ev));
                        }
                    }
                }
            }
            futures::future::ready(Some(events))
        })
        .flat_map(futures::stream::iter)
}

pub(crate) fn parse_anthropic_event(v: &Value) -> Option<ProviderEvent> {
    let event_type = v["type"].as_str().unwrap_or("");
    match event_type {
        "content_block_start" => {
            let index = v["index"].as_u64().unwrap_or(0) as u32;
            let block = &v["content_block"];
            if block["type"].as_str() == Some("tool_use") {
                Some(ProviderEvent::ToolCallDelta {
                    index,
                    name: block["name"].as_str().map(|s| s.to_string()),
                    arguments_fragment: String::new(),
                })
            } else {
                None
            }
        }
        "content_block_delta" => {
            let index = v["index"].as_u64().unwrap_or(0) as u32;
            let delta = &v["delta"];
            match delta["type"].as_str().unwrap_or("") {
                "text_delta" => Some(ProviderEvent::TextDelta(
                    delta["text"].as_str().unwrap_or("").to_string(),
                )),
                "input_json_delta" => Some(ProviderEvent::ToolCallDelta {
                    index,
                    name: None,
                    arguments_fragment: delta["partial_json"].as_str().unwrap_or("").to_string(),
                }),
                _ => None,
            }
        }
        "message_stop" => Some(ProviderEvent::Done),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_text_delta() {
        let v: Value = serde_json::from_str(
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"hi"}}"#,
        )
        .unwrap();
        assert_eq!(
            parse_anthropic_event(&v),
            Some(ProviderEvent::TextDelta("hi".into()))
        );
    }

    #[test]
    fn parses_tool_use_start_then_args() {
        let start: Value = serde_json::from_str(
            r#"{"type":"content_block_start","index":1,"content_block":{"type":"tool_use","id":"t1","name":"end_call"}}"#,
        )
        .unwrap();
        assert_eq!(
            parse_anthropic_event(&start),
            Some(ProviderEvent::ToolCallDelta {
                index: 1,
                name: Some("end_call".into()),
                arguments_fragment: String::new()
            })
        );

        let delta: Value = serde_json::from_str(
            r#"{"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"{\"reason\":"}}"#,
        )
        .unwrap();
        assert_eq!(
            parse_anthropic_event(&delta),
            Some(ProviderEvent::ToolCallDelta {
                index: 1,
                name: None,
                arguments_fragment: "{\"reason\":".into()
            })
        );
    }

    #[test]
    fn message_stop_yields_done() {
        let v: Value = serde_json::from_str(r#"{"type":"message_stop"}"#).unwrap();
        assert_eq!(parse_anthropic_event(&v), Some(ProviderEvent::Done));
    }

    #[test]
    fn ping_and_unknown_events_are_ignored() {
        let v: Value = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(parse_anthropic_event(&v), None);
    }
}
