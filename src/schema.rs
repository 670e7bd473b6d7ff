//! Schema nodes, sub-config nodes, and the declaration-time normalization step.
//!
//! A [`Schema`] is an ordered, immutable mapping from field name to [`Entry`].
//! It is produced exactly once per declared configuration type by
//! [`normalize`], usually through [`Schema::builder`]:
//!
//! ```
//! use nestfig::{Field, Schema, SubConfig, ValueType};
//!
//! let adam = Schema::builder("Adam").value("lr", 0.001).value("beta1", 0.9).build()?;
//! let sgd = Schema::builder("Sgd").value("lr", 0.01).value("momentum", 0.9).build()?;
//! let train = Schema::builder("Train")
//!     .field("epochs", Field::new(10).ty(ValueType::Int))
//!     .subconfig(
//!         "optim",
//!         SubConfig::new(adam.clone()).choice("adam", adam).choice("sgd", sgd),
//!     )
//!     .build()?;
//! assert_eq!(train.names().collect::<Vec<_>>(), ["epochs", "optim"]);
//! # Ok::<(), nestfig::NestfigError>(())
//! ```
//!
//! Inheritance is an explicit overlay: [`SchemaBuilder::extends`] lists base
//! schemas in order, and every declared name replaces the inherited entry of
//! the same name in place. Names the child does not mention are kept as-is.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::warn;

use crate::error::NestfigError;
use crate::field::Field;
use crate::registry::Namespace;
use crate::smartcast::Input;

/// The reserved key selecting the variant of the nearest enclosing sub-config.
pub const SELECTOR_KEY: &str = "__class__";

/// One named slot of a schema.
#[derive(Debug, Clone)]
pub enum Entry {
    Leaf(Field),
    Sub(SubConfig),
}

impl Entry {
    pub fn as_leaf(&self) -> Option<&Field> {
        match self {
            Entry::Leaf(f) => Some(f),
            Entry::Sub(_) => None,
        }
    }

    pub fn as_sub(&self) -> Option<&SubConfig> {
        match self {
            Entry::Sub(s) => Some(s),
            Entry::Leaf(_) => None,
        }
    }
}

/// A field whose value is itself a schema, chosen at resolution time.
#[derive(Debug, Clone)]
pub struct SubConfig {
    default: Option<Arc<Schema>>,
    choices: Vec<(String, Arc<Schema>)>,
    help: String,
    strict: bool,
}

impl SubConfig {
    pub fn new(default: Arc<Schema>) -> Self {
        Self {
            default: Some(default),
            choices: Vec::new(),
            help: String::new(),
            strict: false,
        }
    }

    /// A sub-config that must be selected explicitly somewhere.
    pub fn without_default() -> Self {
        Self {
            default: None,
            choices: Vec::new(),
            help: String::new(),
            strict: false,
        }
    }

    pub fn choice(mut self, key: &str, schema: Arc<Schema>) -> Self {
        self.choices.push((key.to_string(), schema));
        self
    }

    pub fn help(mut self, help: &str) -> Self {
        self.help = help.to_string();
        self
    }

    /// Reject unknown selectors instead of falling back to the default.
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    pub fn default_schema(&self) -> Option<&Arc<Schema>> {
        self.default.as_ref()
    }

    pub fn choices(&self) -> impl Iterator<Item = (&str, &Arc<Schema>)> {
        self.choices.iter().map(|(k, s)| (k.as_str(), s))
    }

    pub fn help_text(&self) -> &str {
        &self.help
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Selector strings this node understands, for error messages and help.
    pub fn known_selectors(&self) -> Vec<String> {
        let mut known: Vec<String> = self.choices.iter().map(|(k, _)| k.clone()).collect();
        if known.is_empty()
            && let Some(d) = &self.default
        {
            known.push(d.name().to_string());
        }
        known
    }

    /// Map a selector string onto a candidate schema.
    ///
    /// Exact `choices` keys first, then visible schema names (the candidates,
    /// the default, and `namespace`), then the default schema.
    pub fn resolve(
        &self,
        path: &str,
        selector: &str,
        namespace: &Namespace,
    ) -> Result<Arc<Schema>, NestfigError> {
        if let Some((_, schema)) = self.choices.iter().find(|(k, _)| k == selector) {
            return Ok(schema.clone());
        }

        let visible = self
            .choices
            .iter()
            .map(|(_, s)| s)
            .chain(self.default.iter())
            .find(|s| s.name() == selector)
            .cloned()
            .or_else(|| namespace.get(selector));
        if let Some(schema) = visible {
            return Ok(schema);
        }

        match &self.default {
            Some(default) if !self.strict => {
                warn!(
                    path,
                    selector,
                    fallback = default.name(),
                    "unknown selector, using the default sub-config"
                );
                Ok(default.clone())
            }
            _ => Err(NestfigError::UnresolvedSelector {
                path: path.to_string(),
                selector: selector.to_string(),
                known: self.known_selectors(),
            }),
        }
    }

    /// The selector string to export for `schema`: its `choices` key when it
    /// has one, otherwise its name.
    pub fn selector_for(&self, schema: &Arc<Schema>) -> String {
        self.choices
            .iter()
            .find(|(_, s)| Arc::ptr_eq(s, schema))
            .or_else(|| self.choices.iter().find(|(_, s)| s.name() == schema.name()))
            .map(|(k, _)| k.clone())
            .unwrap_or_else(|| schema.name().to_string())
    }
}

/// An immutable, ordered set of named entries.
#[derive(Debug)]
pub struct Schema {
    name: String,
    description: String,
    entries: Vec<(String, Entry)>,
    index: HashMap<String, usize>,
    short_index: HashMap<char, usize>,
}

impl Schema {
    pub fn builder(name: &str) -> SchemaBuilder {
        SchemaBuilder {
            name: name.to_string(),
            description: String::new(),
            bases: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in declaration order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Entry)> {
        self.entries.iter().map(|(n, e)| (n.as_str(), e))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    /// Entry by canonical name only.
    pub fn get(&self, name: &str) -> Option<&Entry> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, e)| e)
    }

    pub fn position_of(&self, key: &str) -> Option<usize> {
        self.index.get(key).copied()
    }

    /// Entry by name or alias, with its canonical name.
    pub fn lookup(&self, key: &str) -> Option<(&str, &Entry)> {
        self.index
            .get(key)
            .map(|&i| (self.entries[i].0.as_str(), &self.entries[i].1))
    }

    pub fn lookup_short(&self, short: char) -> Option<(&str, &Entry)> {
        self.short_index
            .get(&short)
            .map(|&i| (self.entries[i].0.as_str(), &self.entries[i].1))
    }

    pub(crate) fn entry_at(&self, index: usize) -> Option<(&str, &Entry)> {
        self.entries.get(index).map(|(n, e)| (n.as_str(), e))
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.lookup(name).and_then(|(_, e)| e.as_leaf())
    }

    /// Defaults as a nested mapping, following each sub-config's default.
    pub fn default_value(&self) -> Value {
        let mut map = Map::new();
        for (name, entry) in &self.entries {
            match entry {
                Entry::Leaf(f) => {
                    map.insert(name.clone(), f.default.clone());
                }
                Entry::Sub(sub) => {
                    let value = match sub.default_schema() {
                        Some(schema) => {
                            let mut node = Map::new();
                            node.insert(
                                SELECTOR_KEY.to_string(),
                                Value::String(sub.selector_for(schema)),
                            );
                            if let Value::Object(inner) = schema.default_value() {
                                node.extend(inner);
                            }
                            Value::Object(node)
                        }
                        None => Value::Null,
                    };
                    map.insert(name.clone(), value);
                }
            }
        }
        Value::Object(map)
    }
}

/// What a declaration body may contain for one name.
#[derive(Debug, Clone)]
pub enum Declared {
    /// A bare default; becomes a smart-typed [`Field`].
    Value(Value),
    Field(Field),
    /// A schema used directly as a default; becomes a [`SubConfig`].
    Schema(Arc<Schema>),
    Sub(SubConfig),
}

/// Collects a declaration and turns it into a [`Schema`] via [`normalize`].
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    name: String,
    description: String,
    bases: Vec<Arc<Schema>>,
    body: Vec<(String, Declared)>,
}

impl SchemaBuilder {
    pub fn description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// Inherit every entry of `base`. Later bases overlay earlier ones.
    pub fn extends(mut self, base: &Arc<Schema>) -> Self {
        self.bases.push(base.clone());
        self
    }

    pub fn value(mut self, name: &str, default: impl Into<Value>) -> Self {
        self.body
            .push((name.to_string(), Declared::Value(default.into())));
        self
    }

    pub fn field(mut self, name: &str, field: Field) -> Self {
        self.body.push((name.to_string(), Declared::Field(field)));
        self
    }

    pub fn nested(mut self, name: &str, schema: Arc<Schema>) -> Self {
        self.body.push((name.to_string(), Declared::Schema(schema)));
        self
    }

    pub fn subconfig(mut self, name: &str, sub: SubConfig) -> Self {
        self.body.push((name.to_string(), Declared::Sub(sub)));
        self
    }

    pub fn declare(mut self, name: &str, declared: Declared) -> Self {
        self.body.push((name.to_string(), declared));
        self
    }

    pub fn build(self) -> Result<Arc<Schema>, NestfigError> {
        normalize(&self.name, &self.description, &self.bases, self.body).map(Arc::new)
    }
}

fn check_name(schema: &str, name: &str) -> Result<(), NestfigError> {
    if name == SELECTOR_KEY || name.starts_with("__") {
        return Err(NestfigError::ReservedName {
            schema: schema.to_string(),
            name: name.to_string(),
        });
    }
    let reason = if name.is_empty() {
        "names cannot be empty"
    } else if name.contains('.') {
        "names cannot contain '.'"
    } else if name.chars().any(char::is_whitespace) {
        "names cannot contain whitespace"
    } else {
        return Ok(());
    };
    Err(NestfigError::InvalidName {
        schema: schema.to_string(),
        name: name.to_string(),
        reason: reason.to_string(),
    })
}

fn overlay(entries: &mut Vec<(String, Entry)>, name: String, entry: Entry) {
    match entries.iter_mut().find(|(n, _)| *n == name) {
        Some(slot) => slot.1 = entry,
        None => entries.push((name, entry)),
    }
}

/// Turn a declaration into a schema.
///
/// Bases are overlaid in order, then each declared name in `body`. Bare
/// values become smart fields, schemas become sub-configs with that schema
/// as the default. Defaults are cast through their field, and names, aliases,
/// positions and choice keys are validated.
pub fn normalize(
    name: &str,
    description: &str,
    bases: &[Arc<Schema>],
    body: Vec<(String, Declared)>,
) -> Result<Schema, NestfigError> {
    let mut entries: Vec<(String, Entry)> = Vec::new();
    for base in bases {
        for (n, e) in base.entries() {
            overlay(&mut entries, n.to_string(), e.clone());
        }
    }

    for (field_name, declared) in body {
        check_name(name, &field_name)?;
        let entry = match declared {
            Declared::Value(v) => Entry::Leaf(Field::new(v)),
            Declared::Field(f) => Entry::Leaf(f),
            Declared::Schema(s) => Entry::Sub(SubConfig::new(s)),
            Declared::Sub(sub) => {
                let mut seen: Vec<&str> = Vec::new();
                for (key, _) in &sub.choices {
                    if seen.contains(&key.as_str()) {
                        return Err(NestfigError::DuplicateChoice {
                            schema: name.to_string(),
                            field: field_name.clone(),
                            selector: key.clone(),
                        });
                    }
                    seen.push(key);
                }
                Entry::Sub(sub)
            }
        };
        overlay(&mut entries, field_name, entry);
    }

    for (field_name, entry) in entries.iter_mut() {
        if let Entry::Leaf(field) = entry {
            let cast = field.cast(field_name, &Input::Native(field.default.clone()))?;
            field.default = cast;
        }
    }

    let mut index: HashMap<String, usize> = HashMap::new();
    let mut short_index: HashMap<char, usize> = HashMap::new();
    let mut positions: HashMap<usize, usize> = HashMap::new();

    for (i, (field_name, _)) in entries.iter().enumerate() {
        index.insert(field_name.clone(), i);
    }
    for (i, (field_name, entry)) in entries.iter().enumerate() {
        let Entry::Leaf(field) = entry else { continue };
        for alias in field.aliases() {
            check_name(name, alias)?;
            if let Some(&other) = index.get(alias) {
                return Err(NestfigError::AliasCollision {
                    schema: name.to_string(),
                    alias: alias.clone(),
                    existing: entries[other].0.clone(),
                });
            }
            index.insert(alias.clone(), i);
        }
        for &short in field.short_aliases() {
            if let Some(&other) = short_index.get(&short) {
                return Err(NestfigError::AliasCollision {
                    schema: name.to_string(),
                    alias: format!("-{short}"),
                    existing: entries[other].0.clone(),
                });
            }
            short_index.insert(short, i);
        }
        if let Some(position) = field.positional() {
            if let Some(&other) = positions.get(&position) {
                return Err(NestfigError::AmbiguousPositionalFlag {
                    position,
                    first: entries[other].0.clone(),
                    second: field_name.clone(),
                });
            }
            positions.insert(position, i);
        }
    }

    Ok(Schema {
        name: name.to_string(),
        description: description.to_string(),
        entries,
        index,
        short_index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::{adam, sgd};
    use crate::smartcast::ValueType;
    use serde_json::json;

    #[test]
    fn bare_values_become_smart_fields() {
        let s = Schema::builder("S").value("a", 1).value("b", "x").build().unwrap();
        let a = s.field("a").unwrap();
        assert_eq!(a.value_type(), ValueType::Smart);
        assert_eq!(a.default_value(), &json!(1));
        assert_eq!(s.names().collect::<Vec<_>>(), ["a", "b"]);
    }

    #[test]
    fn nested_schema_becomes_subconfig_with_default() {
        let s = Schema::builder("S").nested("optim", adam()).build().unwrap();
        let sub = s.get("optim").unwrap().as_sub().unwrap();
        assert_eq!(sub.default_schema().unwrap().name(), "Adam");
    }

    #[test]
    fn child_overlays_parent_by_name() {
        let parent = Schema::builder("P").value("a", 1).value("b", 2).build().unwrap();
        let child = Schema::builder("C")
            .extends(&parent)
            .value("b", 20)
            .value("c", 3)
            .build()
            .unwrap();
        assert_eq!(child.names().collect::<Vec<_>>(), ["a", "b", "c"]);
        assert_eq!(child.field("a").unwrap().default_value(), &json!(1));
        assert_eq!(child.field("b").unwrap().default_value(), &json!(20));
        // parent untouched
        assert_eq!(parent.field("b").unwrap().default_value(), &json!(2));
    }

    #[test]
    fn later_bases_overlay_earlier_ones() {
        let one = Schema::builder("One").value("x", 1).value("y", 1).build().unwrap();
        let two = Schema::builder("Two").value("y", 2).build().unwrap();
        let s = Schema::builder("S").extends(&one).extends(&two).build().unwrap();
        assert_eq!(s.field("y").unwrap().default_value(), &json!(2));
        assert_eq!(s.names().collect::<Vec<_>>(), ["x", "y"]);
    }

    #[test]
    fn reserved_and_dotted_names_are_rejected() {
        let err = Schema::builder("S").value("__class__", 1).build().unwrap_err();
        assert!(matches!(err, NestfigError::ReservedName { .. }));
        let err = Schema::builder("S").value("__hidden", 1).build().unwrap_err();
        assert!(matches!(err, NestfigError::ReservedName { .. }));
        let err = Schema::builder("S").value("a.b", 1).build().unwrap_err();
        assert!(matches!(err, NestfigError::InvalidName { .. }));
    }

    #[test]
    fn alias_collisions_are_rejected() {
        let err = Schema::builder("S")
            .value("lr", 0.1)
            .field("rate", Field::new(1).alias("lr"))
            .build()
            .unwrap_err();
        assert!(matches!(err, NestfigError::AliasCollision { ref alias, .. } if alias == "lr"));

        let err = Schema::builder("S")
            .field("a", Field::new(1).short('x'))
            .field("b", Field::new(1).short('x'))
            .build()
            .unwrap_err();
        assert!(matches!(err, NestfigError::AliasCollision { .. }));
    }

    #[test]
    fn duplicate_positions_are_ambiguous() {
        let err = Schema::builder("S")
            .field("src", Field::new("").position(0))
            .field("dst", Field::new("").position(0))
            .build()
            .unwrap_err();
        match err {
            NestfigError::AmbiguousPositionalFlag { position, first, second } => {
                assert_eq!(position, 0);
                assert_eq!(first, "src");
                assert_eq!(second, "dst");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn duplicate_choice_keys_are_rejected() {
        let err = Schema::builder("S")
            .subconfig("optim", SubConfig::new(adam()).choice("a", adam()).choice("a", sgd()))
            .build()
            .unwrap_err();
        assert!(matches!(err, NestfigError::DuplicateChoice { .. }));
    }

    #[test]
    fn defaults_are_cast_at_declaration() {
        let s = Schema::builder("S")
            .field("n", Field::new("7").ty(ValueType::Int))
            .build()
            .unwrap();
        assert_eq!(s.field("n").unwrap().default_value(), &json!(7));

        let err = Schema::builder("S")
            .field("n", Field::new("seven").ty(ValueType::Int))
            .build()
            .unwrap_err();
        assert!(matches!(err, NestfigError::Cast { .. }));
    }

    #[test]
    fn lookup_routes_aliases_to_canonical_name() {
        let s = Schema::builder("S")
            .field("epochs", Field::new(10).alias("n_epochs").short('e'))
            .build()
            .unwrap();
        assert_eq!(s.lookup("n_epochs").unwrap().0, "epochs");
        assert_eq!(s.lookup_short('e').unwrap().0, "epochs");
        assert!(s.get("n_epochs").is_none());
    }

    #[test]
    fn selector_resolution_order() {
        let sub = SubConfig::new(adam()).choice("adam", adam()).choice("sgd", sgd());
        let ns = Namespace::new();
        assert_eq!(sub.resolve("optim", "sgd", &ns).unwrap().name(), "Sgd");
        // visible class name
        assert_eq!(sub.resolve("optim", "Sgd", &ns).unwrap().name(), "Sgd");
        // fallback to the default
        assert_eq!(sub.resolve("optim", "lbfgs", &ns).unwrap().name(), "Adam");
        let strict = sub.clone().strict();
        assert!(matches!(
            strict.resolve("optim", "lbfgs", &ns),
            Err(NestfigError::UnresolvedSelector { .. })
        ));
    }

    #[test]
    fn namespace_supplies_visible_names() {
        let sub = SubConfig::without_default();
        let ns = Namespace::new().with(sgd());
        assert_eq!(sub.resolve("optim", "Sgd", &ns).unwrap().name(), "Sgd");
        assert!(sub.resolve("optim", "Adam", &ns).is_err());
    }

    #[test]
    fn exported_selector_prefers_choice_key() {
        let s = sgd();
        let sub = SubConfig::new(adam()).choice("sgd", s.clone());
        assert_eq!(sub.selector_for(&s), "sgd");
        assert_eq!(sub.selector_for(&adam()), "Adam");
    }

    #[test]
    fn default_value_includes_selectors() {
        let s = Schema::builder("S")
            .value("epochs", 10)
            .subconfig("optim", SubConfig::new(adam()).choice("adam", adam()))
            .build()
            .unwrap();
        assert_eq!(
            s.default_value(),
            json!({"epochs": 10, "optim": {"__class__": "adam", "lr": 0.001, "beta1": 0.9}})
        );
    }
}
