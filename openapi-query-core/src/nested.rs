// Dot-path writes into request-init objects.

use serde_json::{Map, Value};

/// Write `value` at the dot-separated `path` inside `root`.
///
/// Missing intermediates are created. An intermediate that exists but is not
/// an object is replaced by an empty object, discarding what was there. A
/// non-object `root` is treated the same way.
pub fn set_nested_value(root: &mut Value, path: &str, value: Value) {
    let segments: Vec<&str> = path.split('.').collect();
    write_at(root, &segments, value);
}

/// Non-mutating variant: returns a copy of `root` with `value` written at `path`.
pub fn with_nested_value(root: &Value, path: &str, value: Value) -> Value {
    let mut copy = root.clone();
    set_nested_value(&mut copy, path, value);
    copy
}

fn write_at(target: &mut Value, segments: &[&str], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        *target = value;
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(map) = target {
        let slot = map.entry(head.to_string()).or_insert(Value::Null);
        write_at(slot, rest, value);
    }
}
