//! Attribute access over heterogeneous configuration records.
//!
//! Per-role configuration records share no common shape, so the graph
//! builder reads the fields it needs (IP address, prefix, gateway, peer id
//! references) through dotted attribute paths declared in the topology spec
//! table. Records are `serde_json::Value` trees; a lookup distinguishes
//! "field absent" (`None`) from "field has the wrong type" (an error).

use serde_json::Value;

use crate::error::RouteGraphError;

/// Resolve a dotted path (`interfaces.control.localAddress`) inside a record.
///
/// Returns `None` if any segment is missing or if an intermediate value is
/// not an object. An explicit JSON `null` counts as absent.
pub fn lookup<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = record;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

/// Read an optional string field.
pub fn get_str(
    record: &Value,
    path: &str,
    context: &str,
) -> Result<Option<String>, RouteGraphError> {
    match lookup(record, path) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(type_error(path, context, "string", other)),
    }
}

/// Read a required string field; absence is an error.
pub fn require_str(record: &Value, path: &str, context: &str) -> Result<String, RouteGraphError> {
    get_str(record, path, context)?.ok_or_else(|| RouteGraphError::FieldAbsent {
        path: path.to_string(),
        context: context.to_string(),
    })
}

/// Read an optional boolean field.
pub fn get_bool(
    record: &Value,
    path: &str,
    context: &str,
) -> Result<Option<bool>, RouteGraphError> {
    match lookup(record, path) {
        None => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(other) => Err(type_error(path, context, "boolean", other)),
    }
}

/// Read a required IP prefix length field (0-128).
pub fn require_prefix(record: &Value, path: &str, context: &str) -> Result<u8, RouteGraphError> {
    match lookup(record, path) {
        None => Err(RouteGraphError::FieldAbsent {
            path: path.to_string(),
            context: context.to_string(),
        }),
        Some(Value::Number(n)) => match n.as_u64() {
            Some(p) if p <= 128 => Ok(p as u8),
            _ => Err(type_error(path, context, "prefix length 0-128", &Value::Number(n.clone()))),
        },
        Some(other) => Err(type_error(path, context, "prefix length 0-128", other)),
    }
}

/// Read the list elements of an array field.
pub fn get_list<'a>(
    record: &'a Value,
    path: &str,
    context: &str,
) -> Result<Option<&'a [Value]>, RouteGraphError> {
    match lookup(record, path) {
        None => Ok(None),
        Some(Value::Array(items)) => Ok(Some(items)),
        Some(other) => Err(type_error(path, context, "list", other)),
    }
}

/// Read a peer id reference: either a single id or a list of ids.
///
/// Any other shape is a fatal configuration error, since a malformed peer
/// reference makes the topology unsafe to route on.
pub fn get_id_list(
    record: &Value,
    path: &str,
    context: &str,
) -> Result<Option<Vec<String>>, RouteGraphError> {
    match lookup(record, path) {
        None => Ok(None),
        Some(Value::String(id)) => Ok(Some(vec![id.clone()])),
        Some(Value::Array(items)) => {
            let mut ids = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::String(id) => ids.push(id.clone()),
                    other => return Err(type_error(path, context, "id or list of ids", other)),
                }
            }
            Ok(Some(ids))
        }
        Some(other) => Err(type_error(path, context, "id or list of ids", other)),
    }
}

fn type_error(path: &str, context: &str, expected: &'static str, found: &Value) -> RouteGraphError {
    let found = match found {
        Value::Null => "null".to_string(),
        Value::Bool(_) => "boolean".to_string(),
        Value::Number(_) => "number".to_string(),
        Value::String(_) => "string".to_string(),
        Value::Array(_) => "list".to_string(),
        Value::Object(_) => "object".to_string(),
    };
    RouteGraphError::FieldType {
        path: path.to_string(),
        context: context.to_string(),
        expected,
        found,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record() -> Value {
        json!({
            "id": "range-1",
            "enabled": true,
            "interfaces": {
                "control": {
                    "localAddress": "10.0.0.1",
                    "prefix": 24,
                    "gateway": null
                }
            },
            "peerIds": ["a", "b"],
            "singlePeer": "c"
        })
    }

    #[test]
    fn test_lookup_nested_path() {
        let r = record();
        let value = lookup(&r, "interfaces.control.localAddress").unwrap();
        assert_eq!(value, &json!("10.0.0.1"));
    }

    #[test]
    fn test_lookup_absent_and_null() {
        let r = record();
        assert!(lookup(&r, "interfaces.data.localAddress").is_none());
        // Explicit null reads as absent
        assert!(lookup(&r, "interfaces.control.gateway").is_none());
    }

    #[test]
    fn test_get_str_type_mismatch() {
        let r = record();
        let err = get_str(&r, "enabled", "test").unwrap_err();
        match err {
            RouteGraphError::FieldType { expected, found, .. } => {
                assert_eq!(expected, "string");
                assert_eq!(found, "boolean");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_require_str_absent() {
        let r = record();
        let err = require_str(&r, "missing", "test").unwrap_err();
        assert!(matches!(err, RouteGraphError::FieldAbsent { .. }));
    }

    #[test]
    fn test_require_prefix_bounds() {
        let r = json!({"prefix": 24, "big": 129, "neg": -1});
        assert_eq!(require_prefix(&r, "prefix", "test").unwrap(), 24);
        assert!(require_prefix(&r, "big", "test").is_err());
        assert!(require_prefix(&r, "neg", "test").is_err());
    }

    #[test]
    fn test_get_id_list_shapes() {
        let r = record();
        assert_eq!(
            get_id_list(&r, "peerIds", "test").unwrap(),
            Some(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(
            get_id_list(&r, "singlePeer", "test").unwrap(),
            Some(vec!["c".to_string()])
        );
        assert_eq!(get_id_list(&r, "missing", "test").unwrap(), None);
        // A number is neither an id nor a list of ids
        let bad = json!({"peer": 7});
        assert!(get_id_list(&bad, "peer", "test").is_err());
    }
}
