// Copyright (c) 2024-2026 Voxline Contributors
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadMode {
    ArgsOnly,
    FullContext,
}

/// DB-backed definition of an operator-configured webhook tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomFunction {
    pub name: String,
    pub description: String,
    /// JSON Schema object.
    pub parameters: Value,
    pub webhook_url: String,
    pub method: HttpMethod,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub retry_count: u32,
    /// Maps an output key to a dotted JSONPath into the webhook's response body.
    #[serde(default)]
    pub response_mapping: Option<HashMap<String, String>>,
    #[serde(default)]
    pub speak_during_execution: Option<bool>,
    #[serde(default)]
    pub speak_on_failure: Option<String>,
    #[serde(default = "default_payload_mode")]
    pub payload_mode: PayloadMode,
    #[serde(default)]
    pub store_variables: Option<bool>,
}

fn default_timeout_seconds() -> u64 {
    30
}
fn default_payload_mode() -> PayloadMode {
    PayloadMode::ArgsOnly
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionCallStatus {
    Executing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCallLog {
    pub id: String,
    pub call_id: Option<String>,
    pub function_name: String,
    pub arguments: Value,
    pub result: Option<Value>,
    pub status: FunctionCallStatus,
    pub error_message: Option<String>,
    pub executed_at: DateTime<Utc>,
}

/// The last few turns of conversation, used to build `_call_context` for
/// `payload_mode = full_context` and nowhere else.
#[derive(Debug, Clone)]
pub struct RecentMessage {
    pub role: String,
    pub content: String,
}
