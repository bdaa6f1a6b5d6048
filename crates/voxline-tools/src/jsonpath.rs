// Copyright (c) 2024-2026 Voxline Contributors
//
// SPDX-License-Identifier: Apache-2.0
use serde_json::Value;

/// Evaluates a dotted-path expression against a JSON document.
///
/// Leading `$` and `.` are stripped; numeric segments index lists; a
/// missing key or out-of-range index yields `null` for that output key,
/// never an error — malformed `response_mapping` should degrade, not crash
/// the call.
pub fn eval_dotted_path(doc: &Value, path: &str) -> Value {
    let trimmed = path.trim_start_matches('$').trim_start_matches('.');
    if trimmed.is_empty() {
        return doc.clone();
    }
    let mut current = doc;
    for segment in trimmed.split('.') {
        if segment.is_empty() {
            continue;
        }
        current = match segment.parse::<usize>() {
            Ok(index) => match current.as_array().and_then(|a| a.get(index)) {
                Some(v) => v,
                None => return Value::Null,
            },
            Err(_) => match current.get(segment) {
                Some(v) => v,
                None => return Value::Null,
            },
        };
    }
    current.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strips_leading_dollar_and_dot() {
        let doc = json!({"status": "shipped"});
        assert_eq!(eval_dotted_path(&doc, "$.status"), json!("shipped"));
        assert_eq!(eval_dotted_path(&doc, ".status"), json!("shipped"));
        assert_eq!(eval_dotted_path(&doc, "status"), json!("shipped"));
    }

    #[test]
    fn nested_object_path() {
        let doc = json!({"data": {"order": {"status": "shipped"}}});
        assert_eq!(eval_dotted_path(&doc, "$.data.order.status"), json!("shipped"));
    }

    #[test]
    fn numeric_segment_indexes_list() {
        let doc = json!({"items": ["a", "b", "c"]});
        assert_eq!(eval_dotted_path(&doc, "items.1"), json!("b"));
    }

    #[test]
    fn missing_key_yields_null_not_error() {
        let doc = json!({"a": 1});
        assert_eq!(eval_dotted_path(&doc, "b.c"), Value::Null);
    }

    #[test]
    fn out_of_range_index_yields_null() {
        let doc = json!({"items": ["a"]});
        assert_eq!(eval_dotted_path(&doc, "items.5"), Value::Null);
    }

    #[test]
    fn empty_path_returns_whole_document() {
        let doc = json!({"a": 1});
        assert_eq!(eval_dotted_path(&doc, "$"), doc);
    }
}
