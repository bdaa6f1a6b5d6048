// Copyright (c) 2024-2026 Voxline Contributors
//
// SPDX-License-Identifier: Apache-2.0
use anyhow::{bail, Context};
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::debug;

use crate::provider::ProviderEventStream;
use crate::types::{CompletionRequest, ConversationMessage, ProviderEvent, Role};

/// Driver for any OpenAI-Chat-Completions-compatible API: OpenAI itself,
/// plus DeepSeek and Groq, which both speak the same wire format with a
/// different base URL and key. One driver, three provider names.
pub struct OpenAiCompatProvider {
    provider_name: &'static str,
    api_key: Option<String>,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    pub fn openai(api_key: Option<String>, base_url: Option<String>) -> Self {
        Self {
            provider_name: "openai",
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com/v1".into()),
            client: reqwest::Client::new(),
        }
    }

    pub fn deepseek(api_key: Option<String>) -> Self {
        Self {
            provider_name: "deepseek",
            api_key,
            base_url: "https://api.deepseek.com/v1".into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn groq(api_key: Option<String>) -> Self {
        Self {
            provider_name: "groq",
            api_key,
            base_url: "https://api.groq.com/openai/v1".into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl crate::ModelProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        self.provider_name
    }

    async fn stream(&self, req: CompletionRequest) -> anyhow::Result<ProviderEventStream> {
        let key = self
            .api_key
            .as_deref()
            .with_context(|| format!("no API key configured for provider '{}'", self.provider_name))?;

        let messages: Vec<Value> = req
            .messages
            .iter()
            .map(|m| {
                json!({
                    "role": role_str(m.role),
                    "content": m.content,
                })
            })
            .collect();

        let tools: Vec<Value> = req
            .tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    }
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
        if !tools.is_empty() {
            body["tools"] = json!(tools);
        }

        debug!(provider = self.provider_name, model = %req.model, "sending chat completion request");

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(key)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("{} request failed", self.provider_name))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            bail!("{} error {status}: {text}", self.provider_name);
        }

        Ok(Box::pin(sse_to_events(resp.bytes_stream())))
    }
}

fn role_str(r: Role) -> &'static str {
    match r {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

fn sse_to_events(
    byte_stream: impl futures::Stream<Item = reqwest::Result<bytes::Bytes>> + Send + 'static,
) -> impl futures::Stream<Item = anyhow::Result<ProviderEvent>> + Send {
    byte_stream
        .scan(
            (String::new(), HashMap::<u32, String>::new()),
            |(buf, tool_names), chunk| {
                let text = match chunk {
                    Ok(b) => String::from_utf8_lossy(&b).to_string(),
                    Err(e) => return futures::future::ready(Some(vec![Err(anyhow::anyhow!(e))])),
                };
                buf.push_str(&text);
                let mut events = Vec::new();
                while let Some(pos) = buf.find('\n') {
                    let line = buf[..pos].trim_end_matches('\r').to_string();
                    buf.drain(..=pos);
                    let Some(data) = line.strip_prefix("data: ") else {
                        continue;
                    };
                    let data = data.trim();
                    if data == "[DONE]" {
                        events.push(Ok(ProviderEvent::Done));
                        continue;
                    }
                    if let Ok(v) = serde_json::from_str::<Value>(data) {
                        events.extend(parse_chat_completion_chunk(&v, tool_names));
                    }
                }
                futures::future::ready(Some(events))
            },
        )
        .flat_map(futures::stream::iter)
}

fn parse_chat_completion_chunk(
    v: &Value,
    tool_names_seen: &mut HashMap<u32, String>,
) -> Vec<anyhow::Result<ProviderEvent>> {
    let mut out = Vec::new();
    let Some(choice) = v["choices"].get(0) else {
        return out;
    };
    let delta = &choice["delta"];

    if let Some(text) = delta["content"].as_str() {
        if !text.is_empty() {
            out.push(Ok(ProviderEvent::TextDelta(text.to_string())));
        }
    }

    if let Some(calls) = delta["tool_calls"].as_array() {
        for call in calls {
            let index = call["index"].as_u64().unwrap_or(0) as u32;
            let name = call["function"]["name"].as_str().map(|s| s.to_string());
            if let Some(n) = &name {
                tool_names_seen.insert(index, n.clone());
            }
            let arguments_fragment = call["function"]["arguments"]
                .as_str()
                .unwrap_or("")
                .to_string();
            out.push(Ok(ProviderEvent::ToolCallDelta {
                index,
                name,
                arguments_fragment,
            }));
        }
    }

    if choice["finish_reason"].is_string() {
        out.push(Ok(ProviderEvent::Done));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_text_delta_chunk() {
        let v: Value = serde_json::from_str(
            r#"{"choices":[{"delta":{"content":"Hello"},"finish_reason":null}]}"#,
        )
        .unwrap();
        let mut seen = HashMap::new();
        let events = parse_chat_completion_chunk(&v, &mut seen);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0].as_ref().unwrap(), ProviderEvent::TextDelta(t) if t == "Hello"));
    }

    #[test]
    fn parses_tool_call_chunk_with_name_then_args() {
        let v1: Value = serde_json::from_str(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"name":"end_call","arguments":""}}]},"finish_reason":null}]}"#,
        )
        .unwrap();
        let mut seen = HashMap::new();
        let ev1 = parse_chat_completion_chunk(&v1, &mut seen);
        assert!(matches!(
            ev1[0].as_ref().unwrap(),
            ProviderEvent::ToolCallDelta { name: Some(n), .. } if n == "end_call"
        ));

        let v2: Value = serde_json::from_str(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"reason\":\"done\"}"}}]},"finish_reason":"tool_calls"}]}"#,
        )
        .unwrap();
        let ev2 = parse_chat_completion_chunk(&v2, &mut seen);
        assert_eq!(ev2.len(), 2);
        assert!(matches!(ev2[1].as_ref().unwrap(), ProviderEvent::Done));
    }

    #[test]
    fn finish_reason_stop_yields_done() {
        let v: Value = serde_json::from_str(
            r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#,
        )
        .unwrap();
        let mut seen = HashMap::new();
        let events = parse_chat_completion_chunk(&v, &mut seen);
        assert!(matches!(events[0].as_ref().unwrap(), ProviderEvent::Done));
    }
}
