//! The realized configuration: one typed tree with a mapping view and a
//! typed view over the same storage.

use std::fmt;
use std::ops::Index;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::NestfigError;
use crate::field::Field;
use crate::file;
use crate::flatten::{join, split_key};
use crate::merge::{Layer, set_nested};
use crate::registry::Namespace;
use crate::resolve::{self, ResolveInput};
use crate::schema::{Entry, SELECTOR_KEY, Schema};
use crate::smartcast::Input;
use crate::types::Format;

#[derive(Debug, Clone)]
pub(crate) enum Slot {
    Leaf { value: Value, explicit: bool },
    Node(Box<Config>),
}

impl Slot {
    fn same_data(&self, other: &Slot) -> bool {
        match (self, other) {
            (Slot::Leaf { value: a, .. }, Slot::Leaf { value: b, .. }) => a == b,
            (Slot::Node(a), Slot::Node(b)) => a == b,
            _ => false,
        }
    }
}

/// A resolved configuration.
///
/// Keys are dotted paths and may use aliases at every level. Sub-config
/// nodes are reached with [`section`](Self::section) and report their
/// variant through [`selector`](Self::selector).
#[derive(Debug, Clone)]
pub struct Config {
    schema: Arc<Schema>,
    selector: Option<Value>,
    selector_explicit: bool,
    slots: Vec<Slot>,
    namespace: Namespace,
}

/// A value or a nested section, as yielded by [`Config::iter`].
#[derive(Debug, Clone, Copy)]
pub enum Item<'a> {
    Value(&'a Value),
    Section(&'a Config),
}

struct Route {
    indices: Vec<usize>,
    canonical: Vec<String>,
    rest: Vec<String>,
}

impl Config {
    pub(crate) fn from_parts(
        schema: Arc<Schema>,
        selector: Option<String>,
        selector_explicit: bool,
        slots: Vec<Slot>,
        namespace: Namespace,
    ) -> Self {
        Self {
            schema,
            selector: selector.map(Value::String),
            selector_explicit,
            slots,
            namespace,
        }
    }

    /// Parse text produced by [`dumps`](Self::dumps) back through `schema`.
    ///
    /// Selectors that were resolved through a [`Namespace`] need
    /// [`loads_with`](Self::loads_with), or [`reloads`](Self::reloads) on the
    /// config they were dumped from.
    pub fn loads(schema: &Arc<Schema>, text: &str, format: Format) -> Result<Config, NestfigError> {
        Self::loads_with(schema, text, format, &Namespace::default())
    }

    /// Like [`loads`](Self::loads), letting selectors name schemas in `namespace`.
    pub fn loads_with(
        schema: &Arc<Schema>,
        text: &str,
        format: Format,
        namespace: &Namespace,
    ) -> Result<Config, NestfigError> {
        let map = file::parse(text, format, "config text")?;
        let input = ResolveInput {
            namespace: namespace.clone(),
            ..ResolveInput::default()
        }
        .with_layer(Layer::from_file_map(&map));
        resolve::resolve(schema, &input)
    }

    /// Parse text with this config's schema and namespace.
    pub fn reloads(&self, text: &str, format: Format) -> Result<Config, NestfigError> {
        Self::loads_with(&self.schema, text, format, &self.namespace)
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Extra schemas selectors could name when this config was resolved.
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// The variant key of this node, `None` at the root.
    pub fn selector(&self) -> Option<&str> {
        self.selector.as_ref().and_then(Value::as_str)
    }

    /// A fresh node of `schema` holding its defaults, tagged with `selector`.
    fn fresh_node(
        schema: &Arc<Schema>,
        selector: String,
        explicit: bool,
        namespace: &Namespace,
    ) -> Result<Config, NestfigError> {
        let input = ResolveInput {
            namespace: namespace.clone(),
            ..ResolveInput::default()
        };
        let mut node = resolve::resolve(schema, &input)?;
        node.selector = Some(Value::String(selector));
        node.selector_explicit = explicit;
        Ok(node)
    }

    fn route(&self, key: &str) -> Option<Route> {
        let segments = split_key(key);
        let mut config = self;
        let mut route = Route {
            indices: Vec::new(),
            canonical: Vec::new(),
            rest: Vec::new(),
        };
        for (i, segment) in segments.iter().enumerate() {
            let (name, _) = config.schema.lookup(segment)?;
            let index = config.schema.position_of(segment)?;
            route.indices.push(index);
            route.canonical.push(name.to_string());
            match config.slots.get(index)? {
                Slot::Leaf { .. } => {
                    route.rest = segments[i + 1..].to_vec();
                    return Some(route);
                }
                Slot::Node(inner) => {
                    if i + 1 == segments.len() {
                        return Some(route);
                    }
                    config = inner;
                }
            }
        }
        None
    }

    /// The node owning the last index of `indices`.
    fn owner(&self, indices: &[usize]) -> Option<&Config> {
        let (_, parents) = indices.split_last()?;
        let mut config = self;
        for &i in parents {
            match config.slots.get(i)? {
                Slot::Node(inner) => config = inner,
                Slot::Leaf { .. } => return None,
            }
        }
        Some(config)
    }

    fn owner_mut(&mut self, indices: &[usize]) -> Option<&mut Config> {
        let (_, parents) = indices.split_last()?;
        let mut config = self;
        for &i in parents {
            match config.slots.get_mut(i)? {
                Slot::Node(inner) => config = inner,
                Slot::Leaf { .. } => return None,
            }
        }
        Some(config)
    }

    fn slot(&self, route: &Route) -> Option<&Slot> {
        let index = *route.indices.last()?;
        self.owner(&route.indices)?.slots.get(index)
    }

    /// Value at a dotted key. Keys past a leaf index into its mapping, and
    /// a trailing `__class__` reads a section's selector.
    pub fn get(&self, key: &str) -> Option<&Value> {
        if let Some(node) = selector_node(key) {
            return self.section(node)?.selector.as_ref();
        }
        let route = self.route(key)?;
        let Slot::Leaf { value, .. } = self.slot(&route)? else {
            return None;
        };
        route
            .rest
            .iter()
            .try_fold(value, |current, segment| current.as_object()?.get(segment))
    }

    /// The sub-config node at a dotted key.
    pub fn section(&self, key: &str) -> Option<&Config> {
        let route = self.route(key)?;
        match self.slot(&route)? {
            Slot::Node(inner) => Some(inner),
            Slot::Leaf { .. } => None,
        }
    }

    /// Descriptor of the leaf at a dotted key.
    pub fn field(&self, key: &str) -> Option<&Field> {
        let route = self.route(key)?;
        let index = *route.indices.last()?;
        let (_, entry) = self.owner(&route.indices)?.schema.entry_at(index)?;
        entry.as_leaf()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some() || self.section(key).is_some()
    }

    /// Field names in declaration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.schema.names()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Item<'_>)> {
        self.schema.names().zip(self.slots.iter()).map(|(name, slot)| {
            let item = match slot {
                Slot::Leaf { value, .. } => Item::Value(value),
                Slot::Node(inner) => Item::Section(inner),
            };
            (name, item)
        })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Whether the key was supplied by a file, kwargs or the command line.
    /// A section counts as explicit if its selector or any leaf inside it was.
    pub fn is_explicit(&self, key: &str) -> bool {
        if let Some(node) = selector_node(key) {
            return self.section(node).is_some_and(|s| s.selector_explicit);
        }
        let Some(route) = self.route(key) else {
            return false;
        };
        match self.slot(&route) {
            Some(Slot::Leaf { explicit, .. }) => *explicit,
            Some(Slot::Node(inner)) => inner.selector_explicit || !inner.explicit_keys().is_empty(),
            None => false,
        }
    }

    /// Dotted keys of explicitly supplied leaves and selectors.
    pub fn explicit_keys(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_explicit(&[], &mut out);
        out
    }

    fn collect_explicit(&self, prefix: &[String], out: &mut Vec<String>) {
        for (name, slot) in self.schema.names().zip(&self.slots) {
            let mut path = prefix.to_vec();
            path.push(name.to_string());
            match slot {
                Slot::Leaf { explicit: true, .. } => out.push(join(&path)),
                Slot::Leaf { .. } => {}
                Slot::Node(inner) => {
                    if inner.selector_explicit {
                        out.push(join(&path));
                    }
                    inner.collect_explicit(&path, out);
                }
            }
        }
    }

    /// Set a leaf from typed data. The value is cast first; on failure the
    /// config is left untouched.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> Result<(), NestfigError> {
        self.assign(key, Input::Native(value.into()))
    }

    /// Set a leaf from untyped text, smart-casting it like a command-line value.
    pub fn set_text(&mut self, key: &str, text: &str) -> Result<(), NestfigError> {
        self.assign(key, Input::text(text))
    }

    fn assign(&mut self, key: &str, input: Input) -> Result<(), NestfigError> {
        let unknown = || NestfigError::UnknownField {
            path: key.to_string(),
            input: input.describe(),
        };
        if let Some(node) = selector_node(key) {
            return match &input {
                Input::Text(selector) | Input::Native(Value::String(selector)) => {
                    let selector = selector.clone();
                    self.select(node, &selector)
                }
                _ => Err(NestfigError::Cast {
                    path: key.to_string(),
                    input: input.describe(),
                    expected: "selector string".into(),
                    reason: "selectors name a variant".into(),
                }),
            };
        }
        let route = self.route(key).ok_or_else(unknown)?;
        let index = *route.indices.last().ok_or_else(unknown)?;
        let dotted = join(&route.canonical);

        let owner = self.owner(&route.indices).ok_or_else(unknown)?;
        let (_, entry) = owner.schema.entry_at(index).ok_or_else(unknown)?;
        let field = match entry {
            Entry::Leaf(field) => field,
            Entry::Sub(_) => {
                return match &input {
                    Input::Text(selector) | Input::Native(Value::String(selector)) => {
                        let selector = selector.clone();
                        self.select(key, &selector)
                    }
                    _ => Err(NestfigError::Cast {
                        path: dotted,
                        input: input.describe(),
                        expected: "selector string".into(),
                        reason: "sections can only be replaced by selecting a variant".into(),
                    }),
                };
            }
        };

        let value = if route.rest.is_empty() {
            field.cast(&dotted, &input)?
        } else if !field.accepts_subkeys() {
            return Err(unknown());
        } else {
            let mut base = match owner.slots.get(index) {
                Some(Slot::Leaf {
                    value: Value::Object(map),
                    ..
                }) => map.clone(),
                _ => Map::new(),
            };
            set_nested(&mut base, &route.rest, input.clone().into_value());
            field.cast(&dotted, &Input::Native(Value::Object(base)))?
        };

        let owner = self.owner_mut(&route.indices).ok_or_else(unknown)?;
        owner.slots[index] = Slot::Leaf {
            value,
            explicit: true,
        };
        Ok(())
    }

    /// Switch a sub-config to another variant, resetting it to that
    /// variant's defaults.
    pub fn select(&mut self, key: &str, selector: &str) -> Result<(), NestfigError> {
        let unknown = || NestfigError::UnknownField {
            path: key.to_string(),
            input: selector.to_string(),
        };
        let route = self.route(key).ok_or_else(unknown)?;
        let index = *route.indices.last().ok_or_else(unknown)?;
        let dotted = join(&route.canonical);

        let owner = self.owner(&route.indices).ok_or_else(unknown)?;
        let Some((_, Entry::Sub(sub))) = owner.schema.entry_at(index) else {
            return Err(unknown());
        };
        if !route.rest.is_empty() {
            return Err(unknown());
        }
        let chosen = sub.resolve(&dotted, selector, &owner.namespace)?;
        let fresh = Self::fresh_node(&chosen, sub.selector_for(&chosen), true, &owner.namespace)?;

        let owner = self.owner_mut(&route.indices).ok_or_else(unknown)?;
        owner.slots[index] = Slot::Node(Box::new(fresh));
        Ok(())
    }

    /// Restore the declared default of a leaf, or the default variant of a
    /// section. The key stays present.
    pub fn unset(&mut self, key: &str) -> Result<(), NestfigError> {
        if let Some(node) = selector_node(key) {
            return self.unset(node);
        }
        let unknown = || NestfigError::UnknownField {
            path: key.to_string(),
            input: String::new(),
        };
        let route = self.route(key).ok_or_else(unknown)?;
        if !route.rest.is_empty() {
            return Err(unknown());
        }
        let index = *route.indices.last().ok_or_else(unknown)?;
        let dotted = join(&route.canonical);

        let owner = self.owner(&route.indices).ok_or_else(unknown)?;
        let slot = match owner.schema.entry_at(index) {
            Some((_, Entry::Leaf(field))) => Slot::Leaf {
                value: field.default.clone(),
                explicit: false,
            },
            Some((_, Entry::Sub(sub))) => {
                let default = sub
                    .default_schema()
                    .ok_or(NestfigError::MissingRequiredField { path: dotted })?;
                let fresh =
                    Self::fresh_node(default, sub.selector_for(default), false, &owner.namespace)?;
                Slot::Node(Box::new(fresh))
            }
            None => return Err(unknown()),
        };

        let owner = self.owner_mut(&route.indices).ok_or_else(unknown)?;
        owner.slots[index] = slot;
        Ok(())
    }

    /// Plain nested mapping. Sections carry their `__class__` selector first.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        if let Some(selector) = &self.selector {
            map.insert(SELECTOR_KEY.to_string(), selector.clone());
        }
        for (name, slot) in self.schema.names().zip(&self.slots) {
            let value = match slot {
                Slot::Leaf { value, .. } => value.clone(),
                Slot::Node(inner) => inner.to_value(),
            };
            map.insert(name.to_string(), value);
        }
        Value::Object(map)
    }

    /// Dotted `(key, value)` pairs, one per leaf and one per selector.
    pub fn to_flat(&self) -> Vec<(String, Value)> {
        let mut out = Vec::new();
        self.collect_flat(&[], &mut out);
        out
    }

    fn collect_flat(&self, prefix: &[String], out: &mut Vec<(String, Value)>) {
        if let Some(selector) = &self.selector {
            let mut path = prefix.to_vec();
            path.push(SELECTOR_KEY.to_string());
            out.push((join(&path), selector.clone()));
        }
        for (name, slot) in self.schema.names().zip(&self.slots) {
            let mut path = prefix.to_vec();
            path.push(name.to_string());
            match slot {
                Slot::Leaf { value, .. } => out.push((join(&path), value.clone())),
                Slot::Node(inner) => inner.collect_flat(&path, out),
            }
        }
    }

    /// Serialize to text. [`loads`](Self::loads) reverses it.
    pub fn dumps(&self, format: Format) -> Result<String, NestfigError> {
        file::render(&self.to_value(), format)
    }

    /// Deserialize into a caller-defined struct.
    ///
    /// `__class__` keys are passed along, so structs that deny unknown fields
    /// need a field for them.
    pub fn view<T: DeserializeOwned>(&self) -> Result<T, NestfigError> {
        serde_json::from_value(self.to_value()).map_err(|e| NestfigError::Parse {
            what: format!("config '{}'", self.schema.name()),
            format: "typed view",
            reason: e.to_string(),
        })
    }
}

/// The section path of a key ending in `.__class__`.
fn selector_node(key: &str) -> Option<&str> {
    key.rsplit_once('.')
        .filter(|(_, last)| *last == SELECTOR_KEY)
        .map(|(node, _)| node)
}

impl PartialEq for Config {
    /// Compares data only; whether values were explicit is ignored.
    fn eq(&self, other: &Self) -> bool {
        self.schema.name() == other.schema.name()
            && self.selector == other.selector
            && self.slots.len() == other.slots.len()
            && self
                .slots
                .iter()
                .zip(&other.slots)
                .all(|(a, b)| a.same_data(b))
    }
}

impl Index<&str> for Config {
    type Output = Value;

    /// Missing keys index to `null`, like `serde_json::Value`.
    fn index(&self, key: &str) -> &Value {
        static NULL: Value = Value::Null;
        self.get(key).unwrap_or(&NULL)
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_value())
    }
}

impl Serialize for Config {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}
