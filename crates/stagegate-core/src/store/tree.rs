//! In-memory JSON tree operations with hosted-store update semantics.
//!
//! - Writing `null` deletes; deleting an absent key is a no-op.
//! - Missing intermediate objects are created on write.
//! - Objects and arrays left empty by a write are removed, like the hosted
//!   store never keeps empty containers.
//! - An array is addressed by decimal index; writing a key that is not an
//!   existing index turns the array into an index-keyed object.
//! - An object whose keys are all array indexes, more than half of them
//!   present up to the largest, is kept as an array with `null` holes.

use serde_json::{Map, Value};

use super::{DocPath, Patch, StoreError};

/// Read the value at `path`, treating `null` as absent.
#[must_use]
pub fn get_value<'a>(node: &'a Value, path: &[String]) -> Option<&'a Value> {
    path.iter()
        .try_fold(node, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment
                .parse::<usize>()
                .ok()
                .and_then(|index| items.get(index)),
            _ => None,
        })
        .filter(|value| !value.is_null())
}

/// Write `value` at `path`.
pub fn set_value(node: &mut Value, path: &[String], value: Value) {
    let Some((head, rest)) = path.split_first() else {
        *node = if is_vacant(&value) {
            Value::Null
        } else {
            settle(value)
        };
        return;
    };

    if let Value::Array(items) = node {
        if let Some(child) = head
            .parse::<usize>()
            .ok()
            .and_then(|index| items.get_mut(index))
        {
            set_value(child, rest, value);
            if items.iter().all(Value::is_null) {
                *node = Value::Null;
            }
            return;
        }
        if value.is_null() {
            return;
        }
        let entries: Map<String, Value> = std::mem::take(items)
            .into_iter()
            .enumerate()
            .filter(|(_, item)| !item.is_null())
            .map(|(index, item)| (index.to_string(), item))
            .collect();
        *node = Value::Object(entries);
    }

    if !node.is_object() {
        if value.is_null() {
            return;
        }
        *node = Value::Object(Map::new());
    }

    let Value::Object(map) = node else {
        return;
    };
    if value.is_null() && !map.contains_key(head) {
        return;
    }
    let child = map.entry(head.clone()).or_insert(Value::Null);
    set_value(child, rest, value);
    if is_vacant(child) {
        map.remove(head);
    }
    if let Some(items) = as_dense_array(map) {
        *node = Value::Array(items);
    }
}

/// Apply the array rule to a whole written value.
fn settle(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let map: Map<String, Value> = map
                .into_iter()
                .filter(|(_, child)| !child.is_null())
                .map(|(key, child)| (key, settle(child)))
                .collect();
            as_dense_array(&map).map_or(Value::Object(map), Value::Array)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(settle).collect()),
        other => other,
    }
}

fn as_dense_array(map: &Map<String, Value>) -> Option<Vec<Value>> {
    if map.is_empty() {
        return None;
    }
    let mut indexed = Vec::with_capacity(map.len());
    for (key, child) in map {
        indexed.push((array_index(key)?, child));
    }
    let max = indexed.iter().map(|(index, _)| *index).max()?;
    if map.len() * 2 <= max + 1 {
        return None;
    }
    let mut items = vec![Value::Null; max + 1];
    for (index, child) in indexed {
        items[index] = child.clone();
    }
    Some(items)
}

/// Canonical decimal index: digits only, no leading zero.
#[must_use]
pub fn array_index(key: &str) -> Option<usize> {
    let canonical = !key.is_empty()
        && key.bytes().all(|b| b.is_ascii_digit())
        && (key == "0" || !key.starts_with('0'));
    if canonical { key.parse().ok() } else { None }
}

/// `null`, `{}` and `[]` all mean "nothing stored here".
#[must_use]
pub fn is_vacant(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Expand a patch into absolute `(path, value)` writes.
///
/// # Errors
///
/// Returns [`StoreError::InvalidPath`] for an unparsable key, an empty key,
/// or two keys where one is an ancestor of the other.
pub fn resolve_patch(base: &DocPath, patch: &Patch) -> Result<Vec<(DocPath, Value)>, StoreError> {
    let mut writes = Vec::with_capacity(patch.len());
    for (key, value) in patch {
        let relative = DocPath::parse(key)?;
        if relative.is_empty() {
            return Err(StoreError::InvalidPath {
                path: format!("{base}/{key}"),
                reason: "patch keys must name a child path",
            });
        }
        writes.push((base.join(&relative), value.clone()));
    }

    for (i, (left, _)) in writes.iter().enumerate() {
        for (right, _) in writes.iter().skip(i + 1) {
            if left.contains(right) || right.contains(left) {
                return Err(StoreError::InvalidPath {
                    path: format!("{left} / {right}"),
                    reason: "patch keys overlap",
                });
            }
        }
    }
    Ok(writes)
}

/// Apply a patch to a tree.
///
/// # Errors
///
/// See [`resolve_patch`]; the tree is untouched when the patch is rejected.
pub fn apply_update(root: &mut Value, base: &DocPath, patch: &Patch) -> Result<(), StoreError> {
    for (path, value) in resolve_patch(base, patch)? {
        set_value(root, path.segments(), value);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(raw: &str) -> DocPath {
        DocPath::parse(raw).unwrap()
    }

    fn patch(value: Value) -> Patch {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn update_creates_intermediate_objects() {
        let mut root = Value::Null;
        apply_update(&mut root, &path("a/b"), &patch(json!({"c/d": 1, "e": true}))).unwrap();
        assert_eq!(root, json!({"a": {"b": {"c": {"d": 1}, "e": true}}}));
    }

    #[test]
    fn null_deletes_and_prunes_empty_parents() {
        let mut root = json!({"a": {"b": {"c": 1}}, "keep": 2});
        apply_update(&mut root, &DocPath::root(), &patch(json!({"a/b/c": null}))).unwrap();
        assert_eq!(root, json!({"keep": 2}));
    }

    #[test]
    fn deleting_absent_key_is_noop() {
        let mut root = json!({"a": 1});
        apply_update(&mut root, &path("x/y"), &patch(json!({"z": null}))).unwrap();
        assert_eq!(root, json!({"a": 1}));
    }

    #[test]
    fn array_index_is_patched_in_place() {
        let mut root = json!({"list": [{"checked": false}, {"checked": false}]});
        apply_update(&mut root, &path("list/1"), &patch(json!({"checked": true}))).unwrap();
        assert_eq!(root, json!({"list": [{"checked": false}, {"checked": true}]}));
    }

    #[test]
    fn unknown_array_key_converts_to_object() {
        let mut root = json!({"list": ["a", "b"]});
        apply_update(&mut root, &path("list"), &patch(json!({"x": "c"}))).unwrap();
        assert_eq!(root, json!({"list": {"0": "a", "1": "b", "x": "c"}}));
    }

    #[test]
    fn dense_index_keys_become_an_array() {
        let mut root = Value::Null;
        apply_update(
            &mut root,
            &path("list"),
            &patch(json!({"0/id": "a", "1/id": "b"})),
        )
        .unwrap();
        assert_eq!(root, json!({"list": [{"id": "a"}, {"id": "b"}]}));

        apply_update(&mut root, &DocPath::root(), &patch(json!({"list/3": "d"}))).unwrap();
        assert_eq!(root, json!({"list": [{"id": "a"}, {"id": "b"}, null, "d"]}));
    }

    #[test]
    fn sparse_or_padded_index_keys_stay_an_object() {
        let mut root = Value::Null;
        apply_update(&mut root, &DocPath::root(), &patch(json!({"list": {"7": "x"}}))).unwrap();
        assert_eq!(root, json!({"list": {"7": "x"}}));

        let mut padded = Value::Null;
        apply_update(&mut padded, &DocPath::root(), &patch(json!({"list": {"00": "x"}}))).unwrap();
        assert_eq!(padded, json!({"list": {"00": "x"}}));
    }

    #[test]
    fn overlapping_keys_are_rejected_without_writing() {
        let mut root = json!({"a": 1});
        let err = apply_update(&mut root, &DocPath::root(), &patch(json!({"b": {}, "b/c": 2})));
        assert!(matches!(err, Err(StoreError::InvalidPath { .. })));
        assert_eq!(root, json!({"a": 1}));
    }

    #[test]
    fn get_value_walks_arrays_and_ignores_null() {
        let root = json!({"a": [{"b": 1}, null]});
        assert_eq!(get_value(&root, path("a/0/b").segments()), Some(&json!(1)));
        assert_eq!(get_value(&root, path("a/1").segments()), None);
        assert_eq!(get_value(&root, path("a/7").segments()), None);
    }
}
