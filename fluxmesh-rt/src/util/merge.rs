//! Deep merge of configuration values.
//!
//! Used wherever code-level defaults meet runtime-supplied configuration:
//! app subclass defaults, per-session broker overrides, and component
//! override chains. All merge sites share this single implementation so
//! they agree on the rules.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use serde_json::Value;

// Layer 3: Internal module imports
// (none)

/// Deep-merge `overlay` onto `base` and return the combined value.
///
/// Rules:
/// - mappings merge recursively, key by key;
/// - sequences concatenate, `base` elements first;
/// - everything else is replaced by the `overlay` value.
///
/// # Example
/// ```rust
/// use fluxmesh_rt::util::deep_merge;
/// use serde_json::json;
///
/// let merged = deep_merge(
///     json!({"a": {"x": 1}, "list": [1]}),
///     json!({"a": {"y": 2}, "list": [2]}),
/// );
/// assert_eq!(merged, json!({"a": {"x": 1, "y": 2}, "list": [1, 2]}));
/// ```
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                match base_map.remove(&key) {
                    Some(base_value) => {
                        base_map.insert(key, deep_merge(base_value, overlay_value));
                    }
                    None => {
                        base_map.insert(key, overlay_value);
                    }
                }
            }
            Value::Object(base_map)
        }
        (Value::Array(mut base_list), Value::Array(overlay_list)) => {
            base_list.extend(overlay_list);
            Value::Array(base_list)
        }
        (_, overlay) => overlay,
    }
}
