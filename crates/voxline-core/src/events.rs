// Copyright (c) 2024-2026 Voxline Contributors
//
// SPDX-License-Identifier: Apache-2.0
use serde::Serialize;
use serde_json::Value;

/// Wire schema pushed from a session to its transport. Tagged, not a
/// heterogeneous dictionary, so a transport adapter can match exhaustively.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    SessionStarted {
        agent: String,
    },
    SessionEnded {
        reason: String,
        duration: i64,
    },
    Transcript {
        role: String,
        content: String,
        is_final: bool,
    },
    ToolCall {
        name: String,
        arguments: Value,
        result: Value,
    },
    Error {
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_started_serializes_with_type_tag() {
        let msg = ControlMessage::SessionStarted { agent: "front-desk".into() };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "session_started");
        assert_eq!(json["agent"], "front-desk");
    }

    #[test]
    fn transcript_carries_role_content_is_final() {
        let msg = ControlMessage::Transcript {
            role: "assistant".into(),
            content: "Hello.".into(),
            is_final: true,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "transcript");
        assert_eq!(json["is_final"], true);
    }
}
