//! Structural diff between two materialized states.
//!
//! Produces the set of JSON-Pointer-like paths (RFC 6901 escaping) at
//! which two values disagree, each path naming the shallowest location of
//! a disagreement. Consumers use it for change highlighting; tests use it
//! as the replay-correctness oracle, since `diff(replayed, expected)`
//! must be empty.

use indexmap::IndexSet;
use tideline_core::{Slot, Value};

/// Compute the ordered, deduplicated set of pointer paths at which
/// `current` and `previous` disagree.
///
/// A root-level disagreement reports `"/"`. Absent entries, `Undefined`
/// leaves and array holes are all "no value" and equal to each other;
/// `null` is a real value. An empty array and an empty object are
/// structurally equal (zero enumerable entries either way).
#[must_use]
pub fn diff(current: &Value, previous: &Value) -> Vec<String> {
    let mut paths = IndexSet::new();
    walk(
        present(current),
        present(previous),
        &mut Vec::new(),
        &mut paths,
    );
    paths.into_iter().collect()
}

/// Normalize "no value" shapes to `None`.
fn present(value: &Value) -> Option<&Value> {
    match value {
        Value::Undefined => None,
        other => Some(other),
    }
}

fn slot_present(slot: Option<&Slot>) -> Option<&Value> {
    match slot {
        None | Some(Slot::Hole) => None,
        Some(Slot::Item(v)) => present(v),
    }
}

fn walk(
    current: Option<&Value>,
    previous: Option<&Value>,
    segments: &mut Vec<String>,
    paths: &mut IndexSet<String>,
) {
    match (current, previous) {
        (None, None) => {}
        (Some(_), None) | (None, Some(_)) => {
            paths.insert(render(segments));
        }
        (Some(a), Some(b)) => match (a, b) {
            (Value::Object(ca), Value::Object(cb)) => {
                let mut keys: IndexSet<&String> = ca.keys().collect();
                keys.extend(cb.keys());
                for key in keys {
                    let va = ca.get(key).and_then(present);
                    let vb = cb.get(key).and_then(present);
                    segments.push(escape(key));
                    walk(va, vb, segments, paths);
                    segments.pop();
                }
            }
            (Value::Array(sa), Value::Array(sb)) => {
                for index in 0..sa.len().max(sb.len()) {
                    let va = slot_present(sa.get(index));
                    let vb = slot_present(sb.get(index));
                    segments.push(index.to_string());
                    walk(va, vb, segments, paths);
                    segments.pop();
                }
            }
            // Zero enumerable entries on both sides: structurally equal.
            (Value::Object(entries), Value::Array(slots))
            | (Value::Array(slots), Value::Object(entries)) => {
                let object_empty = entries.values().all(Value::is_undefined);
                if !(object_empty && slots.is_empty()) {
                    paths.insert(render(segments));
                }
            }
            _ => {
                if !leaf_equal(a, b) {
                    paths.insert(render(segments));
                }
            }
        },
    }
}

/// Leaf (and mixed container/leaf) equality. Numbers compare by value
/// with NaN equal to itself so a NaN leaf does not diff forever against
/// its own clone; any cross-type pair disagrees.
fn leaf_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => x == y || (x.is_nan() && y.is_nan()),
        (Value::BigInt(x), Value::BigInt(y)) => x == y,
        (Value::String(x), Value::String(y)) => x == y,
        _ => false,
    }
}

fn render(segments: &[String]) -> String {
    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

/// RFC 6901 token escaping: `~` -> `~0`, `/` -> `~1`.
fn escape(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn d(current: serde_json::Value, previous: serde_json::Value) -> Vec<String> {
        diff(&Value::from_json(current), &Value::from_json(previous))
    }

    #[test]
    fn test_identical_values_yield_no_paths() {
        assert!(d(json!(null), json!(null)).is_empty());
        assert!(d(json!(1), json!(1)).is_empty());
        assert!(d(json!({"a": [1, {"b": true}]}), json!({"a": [1, {"b": true}]})).is_empty());
    }

    #[test]
    fn test_differing_primitive_at_root() {
        assert_eq!(d(json!(1), json!(2)), vec!["/"]);
        assert_eq!(d(json!("a"), json!(1)), vec!["/"]);
        assert_eq!(d(json!(null), json!(5)), vec!["/"]);
    }

    #[test]
    fn test_spec_vector() {
        assert_eq!(d(json!({"a": 1, "b": 2}), json!({"a": 1, "b": 3})), vec!["/b"]);
    }

    #[test]
    fn test_key_only_on_one_side() {
        assert_eq!(d(json!({"a": 1}), json!({})), vec!["/a"]);
        assert_eq!(d(json!({}), json!({"a": 1})), vec!["/a"]);
        // null is a value, so presence vs null still differs
        assert_eq!(d(json!({"a": null}), json!({})), vec!["/a"]);
    }

    #[test]
    fn test_nested_pointer() {
        assert_eq!(
            d(json!({"a": {"b": {"c": 1}}}), json!({"a": {"b": {"c": 2}}})),
            vec!["/a/b/c"]
        );
    }

    #[test]
    fn test_type_change_reports_container_boundary() {
        assert_eq!(d(json!({"a": [1]}), json!({"a": {"x": 1}})), vec!["/a"]);
        assert_eq!(d(json!([1]), json!({"x": 1})), vec!["/"]);
    }

    #[test]
    fn test_empty_array_equals_empty_object() {
        assert!(d(json!([]), json!({})).is_empty());
        assert!(d(json!({"a": []}), json!({"a": {}})).is_empty());
    }

    #[test]
    fn test_array_index_and_length_diffs() {
        assert_eq!(d(json!([1, 2, 3]), json!([1, 9, 3])), vec!["/1"]);
        assert_eq!(d(json!([1, 2]), json!([1])), vec!["/1"]);
        assert_eq!(d(json!([1]), json!([1, 2, 3])), vec!["/1", "/2"]);
        assert_eq!(
            d(json!([{"a": 1}]), json!([{"a": 2}])),
            vec!["/0/a"]
        );
    }

    #[test]
    fn test_shallowest_location_only() {
        // The whole subtree under "a" is replaced by a primitive; only
        // the container boundary is reported, not every nested leaf.
        assert_eq!(d(json!({"a": {"b": 1, "c": 2}}), json!({"a": 5})), vec!["/a"]);
    }

    #[test]
    fn test_escaping() {
        assert_eq!(d(json!({"a/b": 1}), json!({"a/b": 2})), vec!["/a~1b"]);
        assert_eq!(d(json!({"t~": 1}), json!({"t~": 2})), vec!["/t~0"]);
    }

    #[test]
    fn test_undefined_equals_absent() {
        let mut with_undefined = Value::object();
        if let Some(entries) = with_undefined.as_object_mut() {
            entries.insert("ghost".to_string(), Value::Undefined);
        }
        assert!(diff(&with_undefined, &Value::object()).is_empty());
    }

    #[test]
    fn test_hole_equals_missing_tail() {
        let holey = Value::Array(vec![Slot::Item(Value::from(1.0)), Slot::Hole]);
        let short = Value::Array(vec![Slot::Item(Value::from(1.0))]);
        assert!(diff(&holey, &short).is_empty());
    }

    #[test]
    fn test_symmetric_cardinality() {
        let a = json!({"x": 1, "y": {"z": [1, 2]}, "only_a": true});
        let b = json!({"x": 2, "y": {"z": [1]}, "only_b": false});
        let forward = d(a.clone(), b.clone());
        let backward = d(b, a);
        assert_eq!(forward.len(), backward.len());
    }

    #[test]
    fn test_paths_are_deduplicated_and_ordered() {
        // Walk order is current-side key order; serde_json maps sort keys,
        // so the paths come out sorted and unique.
        let paths = d(json!({"b": 1, "a": 1}), json!({"b": 2, "a": 2}));
        assert_eq!(paths, vec!["/a", "/b"]);
        let unique: std::collections::HashSet<_> = paths.iter().collect();
        assert_eq!(unique.len(), paths.len());
    }

    #[test]
    fn test_nan_does_not_diff_against_itself() {
        let nan = Value::Number(f64::NAN);
        assert!(diff(&nan, &nan.clone()).is_empty());
    }
}
