// Copyright (c) 2024-2026 Voxline Contributors
//
// SPDX-License-Identifier: Apache-2.0
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Snapshotted at session start; immutable for the duration of the call —
/// an operator editing the agent mid-call never affects a session already
/// in progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub system_prompt: String,
    pub voice_id: String,
    /// BCP-47 language tag, e.g. `en-US`.
    pub language: String,
    pub llm_model: String,
    pub tools_enabled: Vec<String>,
    pub knowledge_base_id: Option<String>,
    #[serde(default)]
    pub metadata: Value,
}

impl Agent {
    /// Used when a call arrives with no resolvable agent configuration —
    /// startup still proceeds rather than aborting the call outright.
    pub fn default_agent() -> Self {
        Self {
            id: "default".to_string(),
            system_prompt: "You are a helpful voice assistant. Keep responses brief.".to_string(),
            voice_id: "default".to_string(),
            language: "en-US".to_string(),
            llm_model: "gpt-4o-mini".to_string(),
            tools_enabled: vec!["end_call".to_string()],
            knowledge_base_id: None,
            metadata: Value::Null,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallDirection {
    Inbound,
    Outbound,
    Browser,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Queued,
    Connecting,
    Ringing,
    InProgress,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Call {
    pub id: String,
    pub agent_id: String,
    pub direction: CallDirection,
    pub caller_number: Option<String>,
    pub external_call_sid: Option<String>,
    pub status: CallStatus,
    pub end_reason: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
}

impl Call {
    pub fn new(id: impl Into<String>, agent_id: impl Into<String>, direction: CallDirection) -> Self {
        Self {
            id: id.into(),
            agent_id: agent_id.into(),
            direction,
            caller_number: None,
            external_call_sid: None,
            status: CallStatus::Queued,
            end_reason: None,
            started_at: Utc::now(),
            ended_at: None,
            duration_seconds: None,
        }
    }

    /// Stamps `ended_at`/`duration_seconds`/`end_reason` and moves status to
    /// its terminal value. `duration_seconds` is always `ended_at -
    /// started_at` in whole seconds, never backdated or recomputed later.
    pub fn end(&mut self, status: CallStatus, reason: impl Into<String>) {
        let now = Utc::now();
        self.ended_at = Some(now);
        self.duration_seconds = Some((now - self.started_at).num_seconds());
        self.end_reason = Some(reason.into());
        self.status = status;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptRole {
    User,
    Assistant,
    System,
}

/// Append-only: one entry per finalized utterance. Never mutated or deleted
/// once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub id: String,
    pub call_id: String,
    pub role: TranscriptRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl TranscriptEntry {
    pub fn new(call_id: impl Into<String>, role: TranscriptRole, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            call_id: call_id.into(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_end_sets_terminal_fields_once() {
        let mut call = Call::new("c1", "a1", CallDirection::Browser);
        call.end(CallStatus::Completed, "user_requested");
        assert_eq!(call.status, CallStatus::Completed);
        assert_eq!(call.end_reason.as_deref(), Some("user_requested"));
        assert!(call.ended_at.unwrap() >= call.started_at);
        assert_eq!(
            call.duration_seconds.unwrap(),
            (call.ended_at.unwrap() - call.started_at).num_seconds()
        );
    }
}
