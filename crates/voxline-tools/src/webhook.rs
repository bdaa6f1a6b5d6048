// Copyright (c) 2024-2026 Voxline Contributors
//
// SPDX-License-Identifier: Apache-2.0
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::warn;

use crate::jsonpath::eval_dotted_path;
use crate::types::{CustomFunction, HttpMethod, PayloadMode, RecentMessage};

/// Abstraction over the actual HTTP call so the retry/backoff/mapping logic
/// is independently testable without a live network.
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    /// Returns `(status_code, response_body)` on any HTTP response, or an
    /// error for transport failure/timeout.
    async fn call(
        &self,
        method: HttpMethod,
        url: &str,
        headers: &[(String, String)],
        body: Option<Value>,
        timeout: Duration,
    ) -> anyhow::Result<(u16, String)>;
}

pub struct ReqwestWebhookTransport {
    client: reqwest::Client,
}

impl Default for ReqwestWebhookTransport {
    fn default() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl WebhookTransport for ReqwestWebhookTransport {
    async fn call(
        &self,
        method: HttpMethod,
        url: &str,
        headers: &[(String, String)],
        body: Option<Value>,
        timeout: Duration,
    ) -> anyhow::Result<(u16, String)> {
        let reqwest_method = match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };
        let mut builder = self.client.request(reqwest_method, url).timeout(timeout);
        for (k, v) in headers {
            builder = builder.header(k, v);
        }
        if let HttpMethod::Get = method {
            if let Some(Value::Object(map)) = &body {
                let pairs: Vec<(String, String)> = map
                    .iter()
                    .map(|(k, v)| (k.clone(), value_to_query_string(v)))
                    .collect();
                builder = builder.query(&pairs);
            }
        } else if let Some(b) = &body {
            builder = builder.json(b);
        }
        let resp = builder.send().await?;
        let status = resp.status().as_u16();
        let text = resp.text().await.unwrap_or_default();
        Ok((status, text))
    }
}

fn value_to_query_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Execute a custom webhook tool call, including retry/backoff, response
/// parsing, and response-mapping. Arguments merge with a `_call_context`
/// block (call id + last six messages) when `payload_mode = full_context`.
pub async fn execute_custom_function(
    transport: &dyn WebhookTransport,
    function: &CustomFunction,
    arguments: &Value,
    call_id: &str,
    recent_messages: &[RecentMessage],
) -> Value {
    let mut headers: Vec<(String, String)> = function.headers.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    if !headers.iter().any(|(k, _)| k.eq_ignore_ascii_case("content-type")) {
        headers.push(("Content-Type".to_string(), "application/json".to_string()));
    }

    let body = build_body(function, arguments, call_id, recent_messages);
    let timeout = Duration::from_secs(function.timeout_seconds);
    let total_attempts = function.retry_count + 1;

    let mut last_error = String::new();
    for attempt in 0..total_attempts {
        if attempt > 0 {
            tokio::time::sleep(Duration::from_secs(attempt as u64)).await;
        }
        match transport
            .call(function.method, &function.webhook_url, &headers, Some(body.clone()), timeout)
            .await
        {
            Ok((status, text)) if status < 400 => {
                return parse_success(&text, function);
            }
            Ok((status, text)) => {
                last_error = format!("HTTP {status}: {text}");
                warn!(function = %function.name, attempt, status, "webhook returned error status");
            }
            Err(e) => {
                warn!(function = %function.name, attempt, error = %e, "webhook call failed");
                last_error = e.to_string();
            }
        }
    }

    let mut result = Map::new();
    result.insert("error".to_string(), json!(last_error));
    if let Some(speak) = &function.speak_on_failure {
        result.insert("_speak_on_failure".to_string(), json!(speak));
    }
    Value::Object(result)
}

fn build_body(
    function: &CustomFunction,
    arguments: &Value,
    call_id: &str,
    recent_messages: &[RecentMessage],
) -> Value {
    let mut merged = match arguments {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    if function.payload_mode == PayloadMode::FullContext {
        let last_six: Vec<Value> = recent_messages
            .iter()
            .rev()
            .take(6)
            .rev()
            .map(|m| json!({"role": m.role, "content": m.content}))
            .collect();
        merged.insert(
            "_call_context".to_string(),
            json!({ "call_id": call_id, "messages": last_six }),
        );
    }
    Value::Object(merged)
}

fn parse_success(text: &str, function: &CustomFunction) -> Value {
    let body: Value = serde_json::from_str(text).unwrap_or_else(|_| json!({ "response": text }));

    let Some(mapping) = &function.response_mapping else {
        return body;
    };

    let mut out = Map::new();
    out.insert("_raw".to_string(), body.clone());
    for (key, path) in mapping {
        out.insert(key.clone(), eval_dotted_path(&body, path));
    }
    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn function(retry_count: u32, timeout_seconds: u64) -> CustomFunction {
        CustomFunction {
            name: "lookup_order".into(),
            description: "look up an order".into(),
            parameters: json!({"type": "object"}),
            webhook_url: "https://example.com/webhook".into(),
            method: HttpMethod::Post,
            headers: Default::default(),
            timeout_seconds,
            retry_count,
            response_mapping: None,
            speak_during_execution: None,
            speak_on_failure: None,
            payload_mode: PayloadMode::ArgsOnly,
            store_variables: None,
        }
    }

    struct ScriptedTransport {
        responses: std::sync::Mutex<Vec<anyhow::Result<(u16, String)>>>,
        call_count: Arc<AtomicU32>,
    }

    #[async_trait]
    impl WebhookTransport for ScriptedTransport {
        async fn call(
            &self,
            _method: HttpMethod,
            _url: &str,
            _headers: &[(String, String)],
            _body: Option<Value>,
            _timeout: Duration,
        ) -> anyhow::Result<(u16, String)> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            let mut guard = self.responses.lock().unwrap();
            if guard.is_empty() {
                anyhow::bail!("no more scripted responses");
            }
            guard.remove(0)
        }
    }

    #[tokio::test]
    async fn success_without_mapping_returns_parsed_body() {
        let transport = ScriptedTransport {
            responses: std::sync::Mutex::new(vec![Ok((200, r#"{"ok":true}"#.to_string()))]),
            call_count: Arc::new(AtomicU32::new(0)),
        };
        let func = function(0, 5);
        let result = execute_custom_function(&transport, &func, &json!({}), "call-1", &[]).await;
        assert_eq!(result, json!({"ok": true}));
    }

    #[tokio::test]
    async fn non_json_body_falls_back_to_response_key() {
        let transport = ScriptedTransport {
            responses: std::sync::Mutex::new(vec![Ok((200, "plain text".to_string()))]),
            call_count: Arc::new(AtomicU32::new(0)),
        };
        let func = function(0, 5);
        let result = execute_custom_function(&transport, &func, &json!({}), "call-1", &[]).await;
        assert_eq!(result, json!({"response": "plain text"}));
    }

    #[tokio::test]
    async fn response_mapping_produces_raw_plus_mapped_keys() {
        let transport = ScriptedTransport {
            responses: std::sync::Mutex::new(vec![Ok((
                200,
                r#"{"data":{"order":{"status":"shipped"}}}"#.to_string(),
            ))]),
            call_count: Arc::new(AtomicU32::new(0)),
        };
        let mut func = function(0, 5);
        let mut mapping = std::collections::HashMap::new();
        mapping.insert("status".to_string(), "$.data.order.status".to_string());
        func.response_mapping = Some(mapping);

        let result = execute_custom_function(&transport, &func, &json!({"order_id": "1"}), "call-1", &[]).await;
        assert_eq!(result["status"], "shipped");
        assert_eq!(result["_raw"]["data"]["order"]["status"], "shipped");
    }

    #[tokio::test]
    async fn retries_on_error_status_then_succeeds() {
        let call_count = Arc::new(AtomicU32::new(0));
        let transport = ScriptedTransport {
            responses: std::sync::Mutex::new(vec![
                Ok((500, "err".to_string())),
                Ok((200, r#"{"ok":true}"#.to_string())),
            ]),
            call_count: call_count.clone(),
        };
        let func = function(1, 5);
        let result = execute_custom_function(&transport, &func, &json!({}), "call-1", &[]).await;
        assert_eq!(result, json!({"ok": true}));
        assert_eq!(call_count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn exhausted_retries_returns_error_with_speak_on_failure() {
        let transport = ScriptedTransport {
            responses: std::sync::Mutex::new(vec![
                Err(anyhow::anyhow!("Timeout after 1s")),
                Err(anyhow::anyhow!("Timeout after 1s")),
                Err(anyhow::anyhow!("Timeout after 1s")),
            ]),
            call_count: Arc::new(AtomicU32::new(0)),
        };
        let mut func = function(2, 1);
        func.speak_on_failure = Some("Sorry, I could not reach the system.".into());
        let result = execute_custom_function(&transport, &func, &json!({}), "call-1", &[]).await;
        assert_eq!(result["_speak_on_failure"], "Sorry, I could not reach the system.");
        assert!(result["error"].is_string());
    }

    #[tokio::test]
    async fn full_context_payload_includes_call_context_with_last_six_messages() {
        let transport = ScriptedTransport {
            responses: std::sync::Mutex::new(vec![Ok((200, r#"{"ok":true}"#.to_string()))]),
            call_count: Arc::new(AtomicU32::new(0)),
        };
        let mut func = function(0, 5);
        func.payload_mode = PayloadMode::FullContext;

        let messages: Vec<RecentMessage> = (0..10)
            .map(|i| RecentMessage { role: "user".into(), content: format!("msg{i}") })
            .collect();

        let body = build_body(&func, &json!({"a": 1}), "call-42", &messages);
        let ctx = &body["_call_context"];
        assert_eq!(ctx["call_id"], "call-42");
        let msgs = ctx["messages"].as_array().unwrap();
        assert_eq!(msgs.len(), 6);
        assert_eq!(msgs[5]["content"], "msg9");
        assert_eq!(msgs[0]["content"], "msg4");
        let _ = execute_custom_function(&transport, &func, &json!({"a":1}), "call-42", &messages).await;
    }
}
