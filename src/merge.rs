//! Layers of raw assignments, plus the mapping helpers used to build them.

use serde_json::{Map, Value};

use crate::flatten::{self, FlatEntry};
use crate::smartcast::Input;
use crate::types::Source;

/// One raw `path = value` statement inside a layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub path: Vec<String>,
    pub value: Input,
    /// Unknown paths are skipped instead of rejected.
    pub lenient: bool,
    /// Indices into `path` where a mapping key begins (see
    /// [`FlatEntry`]). A value written as a mapping right at a leaf replaces
    /// that leaf whole; a dotted key past a leaf only patches it.
    pub levels: Vec<usize>,
}

/// A sparse data source. Entries are kept in the order they were given, so
/// later entries for the same path overwrite earlier ones.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub source: Source,
    pub entries: Vec<Assignment>,
}

impl Layer {
    pub fn new(source: Source) -> Self {
        Self {
            source,
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, dotted: &str, value: Input) {
        self.push_path(flatten::split_key(dotted), value);
    }

    pub fn push_path(&mut self, path: Vec<String>, value: Input) {
        self.entries.push(Assignment {
            path,
            value,
            lenient: false,
            levels: vec![0],
        });
    }

    /// Add one flattened entry of typed data.
    pub fn push_flat(&mut self, entry: FlatEntry, lenient: bool) {
        self.entries.push(Assignment {
            path: entry.path,
            value: Input::Native(entry.value),
            lenient,
            levels: entry.levels,
        });
    }

    /// Add every entry of a nested or dotted mapping of typed data.
    pub fn push_map(&mut self, map: &Map<String, Value>) {
        for entry in flatten::flatten_levels(map) {
            self.push_flat(entry, false);
        }
    }

    /// Build a layer from a nested or dotted mapping of typed data.
    pub fn from_map(source: Source, map: &Map<String, Value>) -> Self {
        let mut layer = Self::new(source);
        layer.push_map(map);
        layer
    }

    /// Like [`from_map`](Self::from_map), for file data: top-level keys that
    /// start with `__` or contain a `.` are ignored when nothing matches them.
    pub fn from_file_map(map: &Map<String, Value>) -> Self {
        let mut layer = Self::new(Source::File);
        for (key, value) in map {
            let lenient = key.starts_with("__") || key.contains('.');
            let mut single = Map::new();
            single.insert(key.clone(), value.clone());
            for entry in flatten::flatten_levels(&single) {
                layer.push_flat(entry, lenient);
            }
        }
        layer
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Deep-merge `overlay` on top of `base`.
/// If both sides have a mapping for the same key, recurse.
/// Otherwise, `overlay`'s value wins.
pub fn deep_merge(mut base: Map<String, Value>, overlay: Map<String, Value>) -> Map<String, Value> {
    for (key, overlay_val) in overlay {
        match (base.remove(&key), overlay_val) {
            (Some(Value::Object(base_map)), Value::Object(overlay_map)) => {
                base.insert(key, Value::Object(deep_merge(base_map, overlay_map)));
            }
            (_, overlay_val) => {
                base.insert(key, overlay_val);
            }
        }
    }
    base
}

/// Set `value` at `path` inside `map`, creating (or replacing non-mapping)
/// intermediate values with mappings.
pub fn set_nested(map: &mut Map<String, Value>, path: &[String], value: Value) {
    let Some((leaf, parents)) = path.split_last() else {
        return;
    };
    let mut current = map;
    for segment in parents {
        let slot = current
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        let Value::Object(next) = slot else {
            return;
        };
        current = next;
    }
    current.insert(leaf.clone(), value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn disjoint_keys_merge() {
        let merged = deep_merge(map(json!({"host": "localhost"})), map(json!({"port": 3000})));
        assert_eq!(Value::Object(merged), json!({"host": "localhost", "port": 3000}));
    }

    #[test]
    fn same_scalar_key_overlay_wins() {
        let merged = deep_merge(map(json!({"port": 8080})), map(json!({"port": 3000})));
        assert_eq!(merged["port"], json!(3000));
    }

    #[test]
    fn nested_mappings_recurse() {
        let base = map(json!({"optim": {"lr": 0.1, "beta1": 0.9}}));
        let overlay = map(json!({"optim": {"lr": 0.2}}));
        let merged = deep_merge(base, overlay);
        assert_eq!(merged["optim"], json!({"lr": 0.2, "beta1": 0.9}));
    }

    #[test]
    fn overlay_scalar_replaces_mapping() {
        let merged = deep_merge(map(json!({"optim": {"lr": 0.1}})), map(json!({"optim": "sgd"})));
        assert_eq!(merged["optim"], json!("sgd"));
    }

    #[test]
    fn empty_sides() {
        let base = map(json!({"port": 8080}));
        assert_eq!(deep_merge(base.clone(), Map::new()), base);
        assert_eq!(deep_merge(Map::new(), base.clone()), base);
    }

    #[test]
    fn set_nested_creates_and_replaces_intermediates() {
        let mut m = map(json!({"a": 1}));
        set_nested(&mut m, &["a".into(), "b".into()], json!(2));
        set_nested(&mut m, &["c".into(), "d".into(), "e".into()], json!(3));
        assert_eq!(Value::Object(m), json!({"a": {"b": 2}, "c": {"d": {"e": 3}}}));
    }

    #[test]
    fn set_nested_last_write_wins() {
        let mut m = Map::new();
        set_nested(&mut m, &["x".into()], json!(1));
        set_nested(&mut m, &["x".into()], json!(2));
        assert_eq!(m["x"], json!(2));
    }

    #[test]
    fn file_layer_marks_reserved_and_dotted_keys_lenient() {
        let layer = Layer::from_file_map(&map(json!({
            "__note__": "docs",
            "a.b": 1,
            "epochs": 3,
            "optim": {"__class__": "sgd"},
        })));
        let lenient: Vec<bool> = layer.entries.iter().map(|e| e.lenient).collect();
        assert_eq!(lenient, [true, true, false, false]);
        assert_eq!(layer.entries[3].path, ["optim", "__class__"]);
        assert_eq!(layer.entries[3].levels, [0, 1]);
    }

    #[test]
    fn push_splits_dotted_keys() {
        let mut layer = Layer::new(Source::Cli);
        layer.push("optim.lr", Input::text("0.1"));
        assert_eq!(layer.entries[0].path, ["optim", "lr"]);
        assert!(!layer.entries[0].lenient);
        assert_eq!(layer.entries[0].levels, [0]);
    }
}
