// Copyright (c) 2024-2026 Voxline Contributors
//
// SPDX-License-Identifier: Apache-2.0
use serde_json::{json, Value};
use voxline_model::ToolDefinition;

/// Names of built-in tools, fixed per the spec. Order here has no semantic
/// meaning — `tools_enabled` on the agent controls which are offered and in
/// what order they're presented to the model.
pub const END_CALL: &str = "end_call";
pub const TRANSFER_CALL: &str = "transfer_call";
pub const CHECK_AVAILABILITY: &str = "check_availability";
pub const BOOK_APPOINTMENT: &str = "book_appointment";

pub const ALL_BUILTIN_NAMES: [&str; 4] =
    [END_CALL, TRANSFER_CALL, CHECK_AVAILABILITY, BOOK_APPOINTMENT];

pub fn definition_for(name: &str) -> Option<ToolDefinition> {
    match name {
        END_CALL => Some(ToolDefinition {
            name: END_CALL.into(),
            description: "End the current call.".into(),
            parameters: json!({
                "type": "object",
                "properties": { "reason": { "type": "string" } },
                "required": ["reason"],
            }),
        }),
        TRANSFER_CALL => Some(ToolDefinition {
            name: TRANSFER_CALL.into(),
            description: "Transfer the caller to a human agent or department.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "to_number": { "type": "string" },
                    "department": { "type": "string" },
                },
                "required": ["to_number"],
            }),
        }),
        CHECK_AVAILABILITY => Some(ToolDefinition {
            name: CHECK_AVAILABILITY.into(),
            description: "Check appointment availability for a given date and optional time.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "date": { "type": "string" },
                    "time": { "type": "string" },
                },
                "required": ["date"],
            }),
        }),
        BOOK_APPOINTMENT => Some(ToolDefinition {
            name: BOOK_APPOINTMENT.into(),
            description: "Book an appointment for the caller.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "date": { "type": "string" },
                    "time": { "type": "string" },
                    "notes": { "type": "string" },
                },
                "required": ["name", "date", "time"],
            }),
        }),
        _ => None,
    }
}

/// Executes a built-in by name. Callers must check `is_builtin` (or rely on
/// `definition_for` returning `Some`) before calling this — it panics on an
/// unrecognized name since the registry is the single place that decides
/// built-in vs. custom dispatch.
pub fn execute(name: &str, arguments: &Value) -> Value {
    match name {
        END_CALL => {
            let reason = arguments["reason"].as_str().unwrap_or("unspecified").to_string();
            json!({ "action": "end_call", "reason": reason })
        }
        TRANSFER_CALL => {
            json!({
                "action": "transfer_call",
                "to_number": arguments["to_number"].as_str().unwrap_or_default(),
                "department": arguments["department"].as_str(),
                "status": "transferring",
            })
        }
        // Stub data: these two built-ins return canned results rather than
        // querying any real scheduling backend. Reproduced as-is per the
        // spec's open question about whether this is a deliberate demo stub
        // or a placeholder — behavior is unchanged either way.
        CHECK_AVAILABILITY => {
            json!({
                "available": true,
                "date": arguments["date"].as_str().unwrap_or_default(),
                "time": arguments["time"].as_str(),
                "slots": ["09:00", "11:00", "14:00", "16:00"],
            })
        }
        BOOK_APPOINTMENT => {
            json!({
                "status": "confirmed",
                "name": arguments["name"].as_str().unwrap_or_default(),
                "date": arguments["date"].as_str().unwrap_or_default(),
                "time": arguments["time"].as_str().unwrap_or_default(),
                "notes": arguments["notes"].as_str(),
            })
        }
        other => panic!("execute() called with non-builtin tool name {other}"),
    }
}

pub fn is_builtin(name: &str) -> bool {
    ALL_BUILTIN_NAMES.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_call_result_has_end_call_action() {
        let result = execute(END_CALL, &json!({"reason": "user_requested"}));
        assert_eq!(result["action"], "end_call");
        assert_eq!(result["reason"], "user_requested");
    }

    #[test]
    fn check_availability_returns_canned_slots() {
        let result = execute(CHECK_AVAILABILITY, &json!({"date": "2026-08-01"}));
        assert_eq!(result["available"], true);
        assert!(result["slots"].as_array().unwrap().len() > 0);
    }

    #[test]
    fn book_appointment_confirms() {
        let result = execute(
            BOOK_APPOINTMENT,
            &json!({"name": "Jo", "date": "2026-08-01", "time": "09:00"}),
        );
        assert_eq!(result["status"], "confirmed");
    }

    #[test]
    fn definition_lookup_is_none_for_unknown_name() {
        assert!(definition_for("delete_database").is_none());
    }

    #[test]
    fn is_builtin_matches_definition_presence() {
        for name in ALL_BUILTIN_NAMES {
            assert!(is_builtin(name));
            assert!(definition_for(name).is_some());
        }
        assert!(!is_builtin("lookup_order"));
    }
}
