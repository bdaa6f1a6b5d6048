// Copyright (c) 2024-2026 Voxline Contributors
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::builtin;
use crate::types::{CustomFunction, FunctionCallLog, FunctionCallStatus, RecentMessage};
use crate::webhook::{execute_custom_function, WebhookTransport};
use voxline_model::ToolDefinition;

/// Persists `FunctionCallLog` rows. A real deployment backs this with the
/// call database; tests use `InMemoryFunctionCallLogStore`.
#[async_trait]
pub trait FunctionCallLogStore: Send + Sync {
    async fn insert(&self, log: FunctionCallLog) -> anyhow::Result<()>;
    async fn update(&self, log: FunctionCallLog) -> anyhow::Result<()>;
}

#[derive(Default)]
pub struct InMemoryFunctionCallLogStore {
    logs: Mutex<Vec<FunctionCallLog>>,
}

impl InMemoryFunctionCallLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all(&self) -> Vec<FunctionCallLog> {
        self.logs.lock().await.clone()
    }
}

#[async_trait]
impl FunctionCallLogStore for InMemoryFunctionCallLogStore {
    async fn insert(&self, log: FunctionCallLog) -> anyhow::Result<()> {
        self.logs.lock().await.push(log);
        Ok(())
    }

    async fn update(&self, log: FunctionCallLog) -> anyhow::Result<()> {
        let mut guard = self.logs.lock().await;
        if let Some(existing) = guard.iter_mut().find(|l| l.id == log.id) {
            *existing = log;
        }
        Ok(())
    }
}

/// Dispatches tool calls to either a fixed built-in or an operator-defined
/// custom webhook, and journals every call through a `FunctionCallLogStore`.
pub struct ToolRegistry {
    custom_functions: HashMap<String, CustomFunction>,
    log_store: Arc<dyn FunctionCallLogStore>,
    transport: Arc<dyn WebhookTransport>,
}

impl ToolRegistry {
    pub fn new(
        custom_functions: Vec<CustomFunction>,
        log_store: Arc<dyn FunctionCallLogStore>,
        transport: Arc<dyn WebhookTransport>,
    ) -> Self {
        Self {
            custom_functions: custom_functions.into_iter().map(|f| (f.name.clone(), f)).collect(),
            log_store,
            transport,
        }
    }

    /// All tool definitions offered to the model: built-ins named in
    /// `enabled_builtins`, then the registered custom functions.
    pub fn definitions_for(&self, enabled_builtins: &[String]) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = enabled_builtins
            .iter()
            .filter_map(|name| builtin::definition_for(name))
            .collect();
        for f in self.custom_functions.values() {
            defs.push(ToolDefinition {
                name: f.name.clone(),
                description: f.description.clone(),
                parameters: f.parameters.clone(),
            });
        }
        defs
    }

    pub fn is_known(&self, name: &str) -> bool {
        builtin::is_builtin(name) || self.custom_functions.contains_key(name)
    }

    /// Whether `name` is a custom function configured with
    /// `speak_during_execution`, used by the orchestrator to decide whether
    /// to start a filler-speech task while the webhook runs.
    pub fn wants_filler_speech(&self, name: &str) -> bool {
        self.custom_functions
            .get(name)
            .and_then(|f| f.speak_during_execution)
            .unwrap_or(false)
    }

    /// Executes a tool call by name, logging Executing -> Completed/Failed.
    /// Unknown names are logged as Failed and return an error result rather
    /// than panicking — a model can hallucinate a tool name at any time.
    pub async fn execute(
        &self,
        call_id: &str,
        name: &str,
        arguments: Value,
        recent_messages: &[RecentMessage],
    ) -> Value {
        let log_id = Uuid::new_v4().to_string();
        let mut log = FunctionCallLog {
            id: log_id.clone(),
            call_id: Some(call_id.to_string()),
            function_name: name.to_string(),
            arguments: arguments.clone(),
            result: None,
            status: FunctionCallStatus::Executing,
            error_message: None,
            executed_at: Utc::now(),
        };
        let _ = self.log_store.insert(log.clone()).await;

        let result = if builtin::is_builtin(name) {
            builtin::execute(name, &arguments)
        } else if let Some(function) = self.custom_functions.get(name) {
            execute_custom_function(
                self.transport.as_ref(),
                function,
                &arguments,
                call_id,
                recent_messages,
            )
            .await
        } else {
            serde_json::json!({ "error": format!("unknown tool: {name}") })
        };

        log.status = if result.get("error").is_some() {
            FunctionCallStatus::Failed
        } else {
            FunctionCallStatus::Completed
        };
        log.error_message = result.get("error").and_then(|e| e.as_str()).map(|s| s.to_string());
        log.result = Some(result.clone());
        let _ = self.log_store.update(log).await;

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{HttpMethod, PayloadMode};
    use serde_json::json;

    struct AlwaysOkTransport;

    #[async_trait]
    impl WebhookTransport for AlwaysOkTransport {
        async fn call(
            &self,
            _method: HttpMethod,
            _url: &str,
            _headers: &[(String, String)],
            _body: Option<Value>,
            _timeout: std::time::Duration,
        ) -> anyhow::Result<(u16, String)> {
            Ok((200, r#"{"ok":true}"#.to_string()))
        }
    }

    fn registry() -> ToolRegistry {
        let custom = CustomFunction {
            name: "lookup_order".into(),
            description: "look up an order".into(),
            parameters: json!({"type": "object"}),
            webhook_url: "https://example.com".into(),
            method: HttpMethod::Post,
            headers: Default::default(),
            timeout_seconds: 5,
            retry_count: 0,
            response_mapping: None,
            speak_during_execution: None,
            speak_on_failure: None,
            payload_mode: PayloadMode::ArgsOnly,
            store_variables: None,
        };
        ToolRegistry::new(
            vec![custom],
            Arc::new(InMemoryFunctionCallLogStore::new()),
            Arc::new(AlwaysOkTransport),
        )
    }

    #[tokio::test]
    async fn executes_builtin_by_name() {
        let reg = registry();
        let result = reg
            .execute("call-1", builtin::END_CALL, json!({"reason": "done"}), &[])
            .await;
        assert_eq!(result["action"], "end_call");
    }

    #[tokio::test]
    async fn executes_custom_function_by_name() {
        let reg = registry();
        let result = reg.execute("call-1", "lookup_order", json!({}), &[]).await;
        assert_eq!(result["ok"], true);
    }

    #[tokio::test]
    async fn unknown_tool_name_returns_error_without_panicking() {
        let reg = registry();
        let result = reg.execute("call-1", "delete_everything", json!({}), &[]).await;
        assert!(result["error"].as_str().unwrap().contains("unknown tool"));
    }

    #[tokio::test]
    async fn definitions_for_includes_requested_builtins_and_all_custom() {
        let reg = registry();
        let defs = reg.definitions_for(&[builtin::END_CALL.to_string()]);
        let names: Vec<&str> = defs.iter().map(|d| d.name.as_str()).collect();
        assert!(names.contains(&builtin::END_CALL));
        assert!(names.contains(&"lookup_order"));
        assert!(!names.contains(&builtin::TRANSFER_CALL));
    }

    #[tokio::test]
    async fn execute_journals_completed_call() {
        let log_store = Arc::new(InMemoryFunctionCallLogStore::new());
        let reg = ToolRegistry::new(vec![], log_store.clone(), Arc::new(AlwaysOkTransport));
        let _ = reg.execute("call-1", builtin::END_CALL, json!({"reason": "done"}), &[]).await;
        let logs = log_store.all().await;
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, FunctionCallStatus::Completed);
    }
}
