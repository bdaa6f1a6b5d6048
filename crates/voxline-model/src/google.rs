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

/// Gemini driver against the `streamGenerateContent` SSE endpoint.
pub struct GoogleProvider {
    api_key: Option<String>,
    base_url: String,
    client: reqwest::Client,
}

impl GoogleProvider {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            base_url: "https://generativelanguage.googleapis.com/v1beta".into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl crate::ModelProvider for GoogleProvider {
    fn name(&self) -> &str {
        "google"
    }

    async fn stream(&self, req: CompletionRequest) -> anyhow::Result<ProviderEventStream> {
        let key = self.api_key.as_deref().context("GOOGLE_API_KEY not set")?;

        let (system_text, contents) = split_system(&req.messages);
        let mut body = json!({ "contents": contents });
        if !system_text.is_empty() {
            body["systemInstruction"] = json!({ "parts": [{ "text": system_text }] });
        }
        if !req.tools.is_empty() {
            let decls: Vec<Value> = req
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    })
                })
                .collect();
            body["tools"] = json!([{ "functionDeclarations": decls }]);
        }
        body["generationConfig"] = json!({
            "temperature": req.temperature,
            "maxOutputTokens": req.max_tokens,
        });

        debug!(model = %req.model, "sending google request");

        let url = format!(
            "{}/models/{}:streamGenerateContent?alt=sse&key={}",
            self.base_url, req.model, key
        );
        let resp = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .context("Google request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            bail!("Google error {status}: {text}");
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
            Role::User | Role::Tool => out.push(json!({
                "role": "user",
                "parts": [{ "text": m.content }],
            })),
            Role::Assistant => out.push(json!({
                "role": "model",
                "parts": [{ "text": m.content }],
            })),
        }
    }
    (system, out)
}

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
                        events.extend(parse_google_chunk(&v));
                    }
                }
            }
            futures::future::ready(Some(events))
        })
        .flat_map(futures::stream::iter)
}

fn parse_google_chunk(v: &Value) -> Vec<anyhow::Result<ProviderEvent>> {
    let mut out = Vec::new();
    let Some(candidate) = v["candidates"].get(0) else {
        return out;
    };
    let parts = candidate["content"]["parts"].as_array().cloned().unwrap_or_default();
    for (i, part) in parts.iter().enumerate() {
        if let Some(text) = part["text"].as_str() {
            out.push(Ok(ProviderEvent::TextDelta(text.to_string())));
        }
        if let Some(call) = part.get("functionCall") {
            let name = call["name"].as_str().map(|s| s.to_string());
            let args = call["args"].to_string();
            out.push(Ok(ProviderEvent::ToolCallDelta {
                index: i as u32,
                name,
                arguments_fragment: args,
            }));
        }
    }
    if let Some(reason) = candidate["finishReason"].as_str() {
        if !reason.is_empty() {
            out.push(Ok(ProviderEvent::Done));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_text_part() {
        let v: Value = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"hi"}]}}]}"#,
        )
        .unwrap();
        let events = parse_google_chunk(&v);
        assert!(matches!(events[0].as_ref().unwrap(), ProviderEvent::TextDelta(t) if t == "hi"));
    }

    #[test]
    fn parses_function_call_part() {
        let v: Value = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"functionCall":{"name":"end_call","args":{"reason":"done"}}}]},"finishReason":"STOP"}]}"#,
        )
        .unwrap();
        let events = parse_google_chunk(&v);
        assert_eq!(events.len(), 2);
        assert!(matches!(
            events[0].as_ref().unwrap(),
            ProviderEvent::ToolCallDelta { name: Some(n), .. } if n == "end_call"
        ));
        assert!(matches!(events[1].as_ref().unwrap(), ProviderEvent::Done));
    }
}
