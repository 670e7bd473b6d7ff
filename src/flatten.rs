//! Flatten nested or dotted data into ordered `(path, value)` pairs.
//!
//! Layers may arrive as nested mappings (`{optim: {lr: 0.1}}`), as dotted
//! keys (`{"optim.lr": 0.1}`), or any mix of the two. Both spell the same
//! path `["optim", "lr"]`:
//!
//! ```
//! use serde_json::json;
//! use nestfig::flatten::flatten;
//!
//! let data = json!({"optim": {"lr": 0.1}, "optim.momentum": 0.8});
//! let pairs = flatten(data.as_object().unwrap());
//! assert_eq!(pairs[0].0, ["optim", "lr"]);
//! assert_eq!(pairs[1].0, ["optim", "momentum"]);
//! ```

use serde_json::{Map, Value};

/// Split a dotted key into path segments.
pub fn split_key(key: &str) -> Vec<String> {
    key.split('.').map(str::to_string).collect()
}

/// Join path segments back into a dotted key.
pub fn join(path: &[String]) -> String {
    path.join(".")
}

/// One flattened `(path, value)` pair, remembering which segments opened a
/// new mapping level.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatEntry {
    pub path: Vec<String>,
    /// Indices into `path` where a mapping key begins. Segments between two
    /// levels came from one dotted key.
    pub levels: Vec<usize>,
    pub value: Value,
}

/// Flatten a mapping into paths, preserving key order and level boundaries.
///
/// Non-empty objects are recursed into. Everything else, including empty
/// objects, is emitted as a value at its path.
pub fn flatten_levels(map: &Map<String, Value>) -> Vec<FlatEntry> {
    let mut out = Vec::new();
    walk(map, &[], &[], &mut out);
    out
}

/// Flatten a mapping into paths, preserving key order.
pub fn flatten(map: &Map<String, Value>) -> Vec<(Vec<String>, Value)> {
    flatten_levels(map)
        .into_iter()
        .map(|entry| (entry.path, entry.value))
        .collect()
}

fn walk(map: &Map<String, Value>, prefix: &[String], levels: &[usize], out: &mut Vec<FlatEntry>) {
    for (key, value) in map {
        let mut path = prefix.to_vec();
        let mut levels = levels.to_vec();
        levels.push(path.len());
        path.extend(split_key(key));
        match value {
            Value::Object(inner) if !inner.is_empty() => walk(inner, &path, &levels, out),
            other => out.push(FlatEntry {
                path,
                levels,
                value: other.clone(),
            }),
        }
    }
}

/// Flatten into `("a.b", value)` pairs.
pub fn flatten_dotted(map: &Map<String, Value>) -> Vec<(String, Value)> {
    flatten(map)
        .into_iter()
        .map(|(path, value)| (join(&path), value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pairs(v: Value) -> Vec<(String, Value)> {
        flatten_dotted(v.as_object().unwrap())
    }

    #[test]
    fn flat_keys_pass_through() {
        assert_eq!(pairs(json!({"epochs": 5})), vec![("epochs".into(), json!(5))]);
    }

    #[test]
    fn nested_objects_become_dotted() {
        let out = pairs(json!({"database": {"url": "pg://", "pool": {"size": 5}}}));
        assert_eq!(
            out,
            vec![
                ("database.url".into(), json!("pg://")),
                ("database.pool.size".into(), json!(5)),
            ]
        );
    }

    #[test]
    fn dotted_and_nested_mix() {
        let out = pairs(json!({"a.b": 1, "a": {"c": 2}}));
        assert_eq!(out, vec![("a.b".into(), json!(1)), ("a.c".into(), json!(2))]);
    }

    #[test]
    fn empty_objects_are_values() {
        assert_eq!(pairs(json!({"optim": {}})), vec![("optim".into(), json!({}))]);
    }

    #[test]
    fn arrays_and_nulls_are_leaves() {
        let out = pairs(json!({"xs": [1, {"a": 1}], "n": null}));
        assert_eq!(
            out,
            vec![("xs".into(), json!([1, {"a": 1}])), ("n".into(), Value::Null)]
        );
    }

    #[test]
    fn selector_keys_are_kept_in_order() {
        let out = pairs(json!({"optim": {"__class__": "sgd", "lr": 0.1}}));
        assert_eq!(out[0].0, "optim.__class__");
        assert_eq!(out[1].0, "optim.lr");
    }

    #[test]
    fn levels_mark_mapping_boundaries() {
        let data = json!({"params": {"z": 0}, "a.b": {"c": 1}});
        let out = flatten_levels(data.as_object().unwrap());
        assert_eq!(out[0].path, ["params", "z"]);
        assert_eq!(out[0].levels, [0, 1]);
        assert_eq!(out[1].path, ["a", "b", "c"]);
        assert_eq!(out[1].levels, [0, 2]);
    }

    #[test]
    fn split_and_join_are_inverse() {
        assert_eq!(split_key("a.b.c"), ["a", "b", "c"]);
        assert_eq!(join(&split_key("a.b.c")), "a.b.c");
    }
}
