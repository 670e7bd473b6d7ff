//! Core resolution pipeline: merge all layers into a typed [`Config`].
//!
//! Operates on pre-loaded data ([`ResolveInput`]) with no I/O, making the full
//! pipeline testable with synthetic inputs. Steps:
//!
//! 1. Order layers by [`Source`] (defaults < file < kwargs < cli)
//! 2. Selector pass: walk the schema top-down and pick the variant of every
//!    sub-config, outer nodes before inner ones
//! 3. Bind every assignment to a leaf of the effective tree; unknown paths
//!    are errors unless the assignment is lenient
//! 4. Leaf pass: the highest layer with data for a leaf wins and is cast
//!    through the leaf's field
//! 5. Required leaves without a value fail

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::config::{Config, Slot};
use crate::error::NestfigError;
use crate::field::Field;
use crate::flatten::join;
use crate::merge::{Layer, set_nested};
use crate::registry::Namespace;
use crate::schema::{Entry, SELECTOR_KEY, Schema, SubConfig};
use crate::smartcast::Input;
use crate::types::Source;

/// All pre-loaded data needed to resolve a config. No I/O happens here.
#[derive(Debug, Clone)]
pub struct ResolveInput {
    /// Layers in any order; they are sorted by source before merging.
    pub layers: Vec<Layer>,
    /// Extra schemas that selector strings may name.
    pub namespace: Namespace,
    /// When `false`, selectors may only come from the defaults layer.
    pub allow_selector_overrides: bool,
}

impl Default for ResolveInput {
    fn default() -> Self {
        Self {
            layers: Vec::new(),
            namespace: Namespace::default(),
            allow_selector_overrides: true,
        }
    }
}

impl ResolveInput {
    pub fn with_layer(mut self, layer: Layer) -> Self {
        self.layers.push(layer);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Form {
    /// `--optim=sgd`
    Sugar,
    /// `--optim.__class__=sgd`
    Canonical,
}

#[derive(Debug, PartialEq)]
enum Binding {
    /// `open` is set when dotted keys may reach inside the leaf's value.
    Leaf {
        path: Vec<String>,
        rest: Vec<String>,
        open: bool,
    },
    Selector { node: Vec<String>, form: Form },
    Unknown,
    /// Passes through a sub-config whose variant is not chosen yet.
    Pending,
}

#[derive(Debug, Clone)]
struct Selected {
    schema: Arc<Schema>,
    source: Option<Source>,
}

type Selections = HashMap<Vec<String>, Selected>;

/// Walk `raw` through the schema tree, following chosen variants, and map
/// aliases onto canonical names.
fn bind(root: &Arc<Schema>, selections: &Selections, raw: &[String]) -> Binding {
    let mut schema = root.clone();
    let mut canon: Vec<String> = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        let Some((name, entry)) = schema.lookup(&raw[i]) else {
            return Binding::Unknown;
        };
        canon.push(name.to_string());
        match entry {
            Entry::Leaf(field) => {
                return Binding::Leaf {
                    path: canon,
                    rest: raw[i + 1..].to_vec(),
                    open: field.accepts_subkeys(),
                };
            }
            Entry::Sub(_) => {
                if i + 1 == raw.len() {
                    return Binding::Selector {
                        node: canon,
                        form: Form::Sugar,
                    };
                }
                if raw[i + 1] == SELECTOR_KEY {
                    return if i + 2 == raw.len() {
                        Binding::Selector {
                            node: canon,
                            form: Form::Canonical,
                        }
                    } else {
                        Binding::Unknown
                    };
                }
                let next = match selections.get(&canon) {
                    Some(selected) => selected.schema.clone(),
                    None => return Binding::Pending,
                };
                schema = next;
            }
        }
        i += 1;
    }
    Binding::Unknown
}

/// Selector text of an assignment. `null` and `{}` select nothing.
fn selector_text(input: &Input) -> Option<String> {
    match input {
        Input::Text(t) => Some(t.clone()),
        Input::Native(Value::Null) => None,
        Input::Native(Value::Object(m)) if m.is_empty() => None,
        Input::Native(Value::String(s)) => Some(s.clone()),
        Input::Native(other) => Some(other.to_string()),
    }
}

fn ordered(layers: &[Layer]) -> Vec<&Layer> {
    let mut sorted: Vec<&Layer> = layers.iter().collect();
    sorted.sort_by_key(|l| l.source);
    sorted
}

/// Highest-precedence selector for `node`, checking sugar against canonical
/// within each layer.
fn find_selector(
    root: &Arc<Schema>,
    selections: &Selections,
    layers: &[&Layer],
    node: &[String],
) -> Result<Option<(String, Source)>, NestfigError> {
    for layer in layers.iter().rev() {
        let mut sugar: Option<String> = None;
        let mut canonical: Option<String> = None;
        for entry in &layer.entries {
            if let Binding::Selector { node: n, form } = bind(root, selections, &entry.path)
                && n == node
                && let Some(text) = selector_text(&entry.value)
            {
                match form {
                    Form::Sugar => sugar = Some(text),
                    Form::Canonical => canonical = Some(text),
                }
            }
        }
        match (sugar, canonical) {
            (Some(s), Some(c)) if s != c => {
                return Err(NestfigError::SelectorConflict {
                    path: join(node),
                    sugar: s,
                    canonical: c,
                });
            }
            (Some(s), _) | (None, Some(s)) => return Ok(Some((s, layer.source))),
            (None, None) => {}
        }
    }
    Ok(None)
}

/// The effective schema tree: which variant every sub-config resolved to.
#[derive(Debug, Clone)]
pub struct Realization {
    root: Arc<Schema>,
    selections: Selections,
}

/// A leaf of the effective tree.
#[derive(Debug, Clone)]
pub struct LeafSlot {
    pub path: Vec<String>,
    pub field: Field,
}

/// A sub-config node of the effective tree.
#[derive(Debug, Clone)]
pub struct NodeSlot {
    pub path: Vec<String>,
    pub sub: SubConfig,
    pub chosen: Arc<Schema>,
}

impl Realization {
    pub fn root(&self) -> &Arc<Schema> {
        &self.root
    }

    /// The variant chosen at a node path.
    pub fn selected(&self, node: &[String]) -> Option<&Arc<Schema>> {
        self.selections.get(node).map(|s| &s.schema)
    }

    /// Every leaf of the effective tree, in declaration order.
    pub fn leaves(&self) -> Vec<LeafSlot> {
        let mut out = Vec::new();
        self.walk(&self.root, &[], &mut |path, entry, _| {
            if let Entry::Leaf(field) = entry {
                out.push(LeafSlot {
                    path: path.to_vec(),
                    field: field.clone(),
                });
            }
        });
        out
    }

    /// Every sub-config node of the effective tree, outer nodes first.
    pub fn nodes(&self) -> Vec<NodeSlot> {
        let mut out = Vec::new();
        self.walk(&self.root, &[], &mut |path, entry, chosen| {
            if let (Entry::Sub(sub), Some(chosen)) = (entry, chosen) {
                out.push(NodeSlot {
                    path: path.to_vec(),
                    sub: sub.clone(),
                    chosen: chosen.clone(),
                });
            }
        });
        out
    }

    fn walk(
        &self,
        schema: &Arc<Schema>,
        prefix: &[String],
        visit: &mut dyn FnMut(&[String], &Entry, Option<&Arc<Schema>>),
    ) {
        for (name, entry) in schema.entries() {
            let mut path = prefix.to_vec();
            path.push(name.to_string());
            let chosen = self.selected(&path);
            visit(&path, entry, chosen);
            if let (Entry::Sub(_), Some(chosen)) = (entry, chosen) {
                self.walk(chosen, &path, visit);
            }
        }
    }
}

/// Selector pass: resolve every sub-config of the effective tree.
pub fn realize(schema: &Arc<Schema>, input: &ResolveInput) -> Result<Realization, NestfigError> {
    let layers = ordered(&input.layers);
    let mut selections = Selections::new();
    select_children(schema, schema, &[], &layers, input, &mut selections)?;
    Ok(Realization {
        root: schema.clone(),
        selections,
    })
}

fn select_children(
    root: &Arc<Schema>,
    schema: &Arc<Schema>,
    prefix: &[String],
    layers: &[&Layer],
    input: &ResolveInput,
    selections: &mut Selections,
) -> Result<(), NestfigError> {
    for (name, entry) in schema.entries() {
        let Entry::Sub(sub) = entry else { continue };
        let mut node = prefix.to_vec();
        node.push(name.to_string());
        let dotted = join(&node);

        let selected = match find_selector(root, selections, layers, &node)? {
            Some((selector, source)) => {
                if !input.allow_selector_overrides && source.is_explicit() {
                    return Err(NestfigError::SelectorOverridesDisabled { path: dotted });
                }
                let chosen = sub.resolve(&dotted, &selector, &input.namespace)?;
                debug!(path = %dotted, %selector, ?source, schema = chosen.name(), "selected sub-config");
                Selected {
                    schema: chosen,
                    source: Some(source),
                }
            }
            None => match sub.default_schema() {
                Some(default) => Selected {
                    schema: default.clone(),
                    source: None,
                },
                None => return Err(NestfigError::MissingRequiredField { path: dotted }),
            },
        };

        let chosen = selected.schema.clone();
        selections.insert(node.clone(), selected);
        select_children(root, &chosen, &node, layers, input, selections)?;
    }
    Ok(())
}

struct Hit<'a> {
    rank: usize,
    source: Source,
    rest: Vec<String>,
    /// Part of a mapping written at the leaf itself, so it replaces the
    /// default instead of patching it.
    whole: bool,
    value: &'a Input,
}

type LeafData<'a> = HashMap<Vec<String>, Vec<Hit<'a>>>;

/// Resolve configuration from pre-loaded layers.
pub fn resolve(schema: &Arc<Schema>, input: &ResolveInput) -> Result<Config, NestfigError> {
    let realization = realize(schema, input)?;
    let layers = ordered(&input.layers);

    let mut data: LeafData<'_> = HashMap::new();
    for (rank, layer) in layers.iter().enumerate() {
        for entry in &layer.entries {
            match bind(schema, &realization.selections, &entry.path) {
                Binding::Leaf { path, rest, open } => {
                    let whole = !rest.is_empty() && entry.levels.contains(&path.len());
                    if rest.is_empty() || whole || open {
                        data.entry(path).or_default().push(Hit {
                            rank,
                            source: layer.source,
                            rest,
                            whole,
                            value: &entry.value,
                        });
                        continue;
                    }
                }
                Binding::Selector { .. } => continue,
                Binding::Unknown | Binding::Pending => {}
            }
            let key = join(&entry.path);
            if entry.lenient {
                debug!(%key, "ignoring unrecognized file key");
            } else {
                return Err(NestfigError::UnknownField {
                    path: key,
                    input: entry.value.describe(),
                });
            }
        }
    }

    let ctx = BuildContext {
        realization: &realization,
        data: &data,
        namespace: &input.namespace,
    };
    build(schema, &[], None, false, &ctx)
}

/// A config holding only the schema's defaults.
pub fn defaults(schema: &Arc<Schema>) -> Result<Config, NestfigError> {
    resolve(schema, &ResolveInput::default())
}

struct BuildContext<'a> {
    realization: &'a Realization,
    data: &'a LeafData<'a>,
    namespace: &'a Namespace,
}

fn build(
    schema: &Arc<Schema>,
    prefix: &[String],
    selector: Option<String>,
    selector_explicit: bool,
    ctx: &BuildContext<'_>,
) -> Result<Config, NestfigError> {
    let mut slots = Vec::with_capacity(schema.len());
    for (name, entry) in schema.entries() {
        let mut path = prefix.to_vec();
        path.push(name.to_string());
        match entry {
            Entry::Leaf(field) => {
                let (value, explicit) = leaf_value(field, &path, ctx.data.get(&path))?;
                slots.push(Slot::Leaf { value, explicit });
            }
            Entry::Sub(sub) => {
                let Some(selected) = ctx.realization.selections.get(&path) else {
                    return Err(NestfigError::MissingRequiredField { path: join(&path) });
                };
                let explicit = selected.source.is_some_and(Source::is_explicit);
                let node = build(
                    &selected.schema,
                    &path,
                    Some(sub.selector_for(&selected.schema)),
                    explicit,
                    ctx,
                )?;
                slots.push(Slot::Node(Box::new(node)));
            }
        }
    }
    Ok(Config::from_parts(
        schema.clone(),
        selector,
        selector_explicit,
        slots,
        ctx.namespace.clone(),
    ))
}

fn leaf_value(
    field: &Field,
    path: &[String],
    hits: Option<&Vec<Hit<'_>>>,
) -> Result<(Value, bool), NestfigError> {
    let dotted = join(path);
    let top = hits.and_then(|h| h.iter().map(|hit| hit.rank).max());
    let (Some(hits), Some(top)) = (hits, top) else {
        if field.is_required() && field.default.is_null() {
            return Err(NestfigError::MissingRequiredField { path: dotted });
        }
        return Ok((field.default.clone(), false));
    };

    let mut source = Source::Defaults;
    let mut value: Option<Value> = None;
    for hit in hits.iter().filter(|h| h.rank == top) {
        source = hit.source;
        if hit.rest.is_empty() {
            value = Some(field.cast(&dotted, hit.value)?);
            continue;
        }
        let mut base = match value.take() {
            Some(Value::Object(map)) => map,
            Some(_) => Map::new(),
            None if hit.whole => Map::new(),
            None => match &field.default {
                Value::Object(map) => map.clone(),
                _ => Map::new(),
            },
        };
        set_nested(&mut base, &hit.rest, hit.value.clone().into_value());
        value = Some(Value::Object(base));
    }

    let value = match value {
        Some(v) => field.cast(&dotted, &Input::Native(v))?,
        None => field.default.clone(),
    };
    let explicit = source.is_explicit();
    trace!(path = %dotted, ?source, "leaf resolved");

    if field.is_required() && !explicit && value.is_null() {
        return Err(NestfigError::MissingRequiredField { path: dotted });
    }
    Ok((value, explicit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::{model_schema, train_schema};
    use crate::types::Format;
    use serde_json::json;

    fn layer(source: Source, pairs: &[(&str, Input)]) -> Layer {
        let mut layer = Layer::new(source);
        for (k, v) in pairs {
            layer.push(k, v.clone());
        }
        layer
    }

    fn cli(args: &[(&str, &str)]) -> Layer {
        let mut layer = Layer::new(Source::Cli);
        for (k, v) in args {
            layer.push(k, Input::text(*v));
        }
        layer
    }

    fn file(v: Value) -> Layer {
        Layer::from_file_map(v.as_object().unwrap())
    }

    fn input(layers: Vec<Layer>) -> ResolveInput {
        ResolveInput {
            layers,
            ..ResolveInput::default()
        }
    }

    #[test]
    fn defaults_only() {
        let config = defaults(&train_schema()).unwrap();
        assert_eq!(
            config.to_value(),
            json!({
                "epochs": 10,
                "batch_size": 32,
                "name": "run",
                "verbose": 0,
                "use_amp": false,
                "data_path": null,
                "optim": {"__class__": "adam", "lr": 0.001, "beta1": 0.9},
            })
        );
        assert!(config.explicit_keys().is_empty());
    }

    #[test]
    fn precedence_law() {
        let cfg = resolve(
            &train_schema(),
            &input(vec![
                cli(&[("optim.lr", "0.03")]),
                file(json!({"optim": {"lr": 0.02}})),
                layer(Source::Defaults, &[("optim.lr", Input::Native(json!(0.01)))]),
            ]),
        )
        .unwrap();
        assert_eq!(cfg.get("optim.lr"), Some(&json!(0.03)));
    }

    #[test]
    fn lower_layers_fill_gaps() {
        let cfg = resolve(
            &train_schema(),
            &input(vec![
                file(json!({"epochs": 3, "name": "from-file"})),
                layer(Source::Kwargs, &[("epochs", Input::Native(json!(4)))]),
            ]),
        )
        .unwrap();
        assert_eq!(cfg.get("epochs"), Some(&json!(4)));
        assert_eq!(cfg.get("name"), Some(&json!("from-file")));
        assert!(cfg.is_explicit("name"));
        assert!(!cfg.is_explicit("batch_size"));
    }

    #[test]
    fn selector_before_leaf() {
        let cfg = resolve(
            &train_schema(),
            &input(vec![cli(&[("optim.momentum", "0.8"), ("optim", "sgd")])]),
        )
        .unwrap();
        assert_eq!(cfg.section("optim").unwrap().selector(), Some("sgd"));
        assert_eq!(cfg.get("optim.momentum"), Some(&json!(0.8)));
        assert!(cfg.get("optim.beta1").is_none());
    }

    #[test]
    fn full_scenario() {
        let cfg = resolve(
            &train_schema(),
            &input(vec![cli(&[
                ("optim", "sgd"),
                ("optim.momentum", "0.8"),
                ("epochs", "20"),
            ])]),
        )
        .unwrap();
        let v = cfg.to_value();
        assert_eq!(v["epochs"], json!(20));
        assert_eq!(
            v["optim"],
            json!({"__class__": "sgd", "lr": 0.01, "momentum": 0.8})
        );
    }

    #[test]
    fn canonical_selector_form() {
        let cfg = resolve(
            &train_schema(),
            &input(vec![file(json!({"optim": {"__class__": "sgd", "lr": 0.5}}))]),
        )
        .unwrap();
        assert_eq!(cfg.get("optim.lr"), Some(&json!(0.5)));
        assert_eq!(cfg.section("optim").unwrap().selector(), Some("sgd"));
    }

    #[test]
    fn higher_layer_selector_wins() {
        let cfg = resolve(
            &train_schema(),
            &input(vec![
                file(json!({"optim": {"__class__": "sgd"}})),
                cli(&[("optim", "adam")]),
            ]),
        )
        .unwrap();
        assert_eq!(cfg.section("optim").unwrap().selector(), Some("adam"));
    }

    #[test]
    fn file_leaf_for_other_variant_is_unknown() {
        let err = resolve(
            &train_schema(),
            &input(vec![
                file(json!({"optim": {"momentum": 0.5}})),
            ]),
        )
        .unwrap_err();
        assert!(matches!(err, NestfigError::UnknownField { ref path, .. } if path == "optim.momentum"));
    }

    #[test]
    fn sugar_and_canonical_conflict_in_one_layer() {
        let err = resolve(
            &train_schema(),
            &input(vec![cli(&[("optim", "sgd"), ("optim.__class__", "adam")])]),
        )
        .unwrap_err();
        assert!(matches!(err, NestfigError::SelectorConflict { .. }));
    }

    #[test]
    fn agreeing_forms_do_not_conflict() {
        let cfg = resolve(
            &train_schema(),
            &input(vec![cli(&[("optim", "sgd"), ("optim.__class__", "sgd")])]),
        )
        .unwrap();
        assert_eq!(cfg.section("optim").unwrap().selector(), Some("sgd"));
    }

    #[test]
    fn same_forms_last_write_wins() {
        let cfg = resolve(
            &train_schema(),
            &input(vec![cli(&[("optim", "sgd"), ("optim", "adam")])]),
        )
        .unwrap();
        assert_eq!(cfg.section("optim").unwrap().selector(), Some("adam"));
    }

    #[test]
    fn empty_object_and_null_select_nothing() {
        let cfg = resolve(
            &train_schema(),
            &input(vec![file(json!({"optim": {}}))]),
        )
        .unwrap();
        assert_eq!(cfg.section("optim").unwrap().selector(), Some("adam"));

        let cfg = resolve(&train_schema(), &input(vec![file(json!({"optim": null}))])).unwrap();
        assert_eq!(cfg.section("optim").unwrap().selector(), Some("adam"));
    }

    #[test]
    fn unknown_selector_falls_back_to_default() {
        let cfg = resolve(&train_schema(), &input(vec![cli(&[("optim", "lbfgs")])])).unwrap();
        assert_eq!(cfg.section("optim").unwrap().selector(), Some("adam"));
    }

    #[test]
    fn nested_selectors_resolve_outer_first() {
        let cfg = resolve(
            &model_schema(),
            &input(vec![cli(&[
                ("model.backbone.depth", "101"),
                ("model.backbone", "resnet"),
                ("model", "segformer"),
            ])]),
        )
        .unwrap();
        assert_eq!(cfg.section("model").unwrap().selector(), Some("segformer"));
        assert_eq!(
            cfg.section("model.backbone").unwrap().selector(),
            Some("resnet")
        );
        assert_eq!(cfg.get("model.backbone.depth"), Some(&json!(101)));
    }

    #[test]
    fn inner_path_on_unselected_variant_is_unknown() {
        let err = resolve(
            &model_schema(),
            &input(vec![cli(&[("model.backbone.depth", "101")])]),
        )
        .unwrap_err();
        assert!(matches!(err, NestfigError::UnknownField { .. }));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = resolve(&train_schema(), &input(vec![cli(&[("epoch", "3")])])).unwrap_err();
        match err {
            NestfigError::UnknownField { path, input } => {
                assert_eq!(path, "epoch");
                assert_eq!(input, "3");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn lenient_file_keys_are_ignored() {
        let cfg = resolve(
            &train_schema(),
            &input(vec![file(json!({
                "__doc__": "anchors and notes",
                "notes.intro": "text",
                "epochs": 2,
            }))]),
        )
        .unwrap();
        assert_eq!(cfg.get("epochs"), Some(&json!(2)));
    }

    #[test]
    fn dotted_file_keys_still_apply_when_known() {
        let cfg = resolve(
            &train_schema(),
            &input(vec![file(json!({"optim.lr": 0.3}))]),
        )
        .unwrap();
        assert_eq!(cfg.get("optim.lr"), Some(&json!(0.3)));
    }

    #[test]
    fn required_field_enforced() {
        let schema = Schema::builder("R")
            .field("x", Field::required_value())
            .build()
            .unwrap();
        let err = resolve(&schema, &ResolveInput::default()).unwrap_err();
        assert!(matches!(err, NestfigError::MissingRequiredField { ref path } if path == "x"));

        let ok = resolve(&schema, &input(vec![cli(&[("x", "5")])])).unwrap();
        assert_eq!(ok.get("x"), Some(&json!(5)));
    }

    #[test]
    fn required_field_satisfied_by_default_override() {
        let schema = Schema::builder("R")
            .field("x", Field::required_value())
            .build()
            .unwrap();
        let cfg = resolve(
            &schema,
            &input(vec![layer(Source::Defaults, &[("x", Input::Native(json!(1)))])]),
        )
        .unwrap();
        assert_eq!(cfg.get("x"), Some(&json!(1)));
        assert!(!cfg.is_explicit("x"));
    }

    #[test]
    fn subconfig_without_default_needs_selector() {
        let schema = Schema::builder("S")
            .subconfig(
                "optim",
                SubConfig::without_default().choice("sgd", crate::fixtures::test::sgd()),
            )
            .build()
            .unwrap();
        let err = resolve(&schema, &ResolveInput::default()).unwrap_err();
        assert!(matches!(err, NestfigError::MissingRequiredField { ref path } if path == "optim"));
        let cfg = resolve(&schema, &input(vec![cli(&[("optim", "sgd")])])).unwrap();
        assert_eq!(cfg.get("optim.momentum"), Some(&json!(0.9)));
    }

    #[test]
    fn selector_overrides_can_be_disabled() {
        let locked = ResolveInput {
            layers: vec![cli(&[("optim", "sgd")])],
            allow_selector_overrides: false,
            ..ResolveInput::default()
        };
        let err = resolve(&train_schema(), &locked).unwrap_err();
        assert!(matches!(err, NestfigError::SelectorOverridesDisabled { .. }));

        let from_defaults = ResolveInput {
            layers: vec![layer(Source::Defaults, &[("optim", Input::text("sgd"))])],
            allow_selector_overrides: false,
            ..ResolveInput::default()
        };
        let cfg = resolve(&train_schema(), &from_defaults).unwrap();
        assert_eq!(cfg.section("optim").unwrap().selector(), Some("sgd"));
    }

    #[test]
    fn aliases_route_to_canonical_leaf() {
        let cfg = resolve(&train_schema(), &input(vec![cli(&[("n_epochs", "7")])])).unwrap();
        assert_eq!(cfg.get("epochs"), Some(&json!(7)));
    }

    #[test]
    fn cast_errors_name_the_path() {
        let err = resolve(&train_schema(), &input(vec![cli(&[("epochs", "many")])])).unwrap_err();
        assert!(matches!(err, NestfigError::Cast { ref path, .. } if path == "epochs"));
    }

    #[test]
    fn dict_leaf_addressed_by_subpath() {
        let schema = Schema::builder("S")
            .value("params", json!({"a": 1, "b": 2}))
            .build()
            .unwrap();
        let cfg = resolve(
            &schema,
            &input(vec![cli(&[("params.a", "10"), ("params.c.d", "x")])]),
        )
        .unwrap();
        assert_eq!(
            cfg.get("params"),
            Some(&json!({"a": 10, "b": 2, "c": {"d": "x"}}))
        );
    }

    #[test]
    fn higher_layer_dict_replaces_whole_value() {
        let schema = Schema::builder("S")
            .value("params", json!({"a": 1}))
            .build()
            .unwrap();
        let cfg = resolve(
            &schema,
            &input(vec![
                file(json!({"params": {"a": 5, "b": 6}})),
                cli(&[("params", "{'z': 0}")]),
            ]),
        )
        .unwrap();
        assert_eq!(cfg.get("params"), Some(&json!({"z": 0})));
    }

    #[test]
    fn file_mapping_replaces_dict_default() {
        let schema = Schema::builder("S")
            .value("params", json!({"a": 1}))
            .build()
            .unwrap();
        let cfg = resolve(&schema, &input(vec![file(json!({"params": {"z": 0}}))])).unwrap();
        assert_eq!(cfg.get("params"), Some(&json!({"z": 0})));

        let cfg = resolve(&schema, &input(vec![file(json!({"params.z": 0}))]));
        assert!(matches!(cfg, Err(NestfigError::UnknownField { .. })));

        let cfg = resolve(
            &schema,
            &input(vec![layer(Source::Kwargs, &[("params.z", Input::Native(json!(0)))])]),
        )
        .unwrap();
        assert_eq!(cfg.get("params"), Some(&json!({"a": 1, "z": 0})));
    }

    #[test]
    fn dict_leaf_survives_dump_and_load() {
        let schema = Schema::builder("S")
            .value("params", json!({"a": 1}))
            .build()
            .unwrap();
        let cfg = resolve(&schema, &input(vec![cli(&[("params", "{'z': 0}")])])).unwrap();
        for format in [Format::Json, Format::Yaml, Format::Toml] {
            let text = cfg.dumps(format).unwrap();
            let back = Config::loads(&schema, &text, format).unwrap();
            assert_eq!(back, cfg, "{format:?}");
        }
    }

    #[test]
    fn dotted_keys_past_scalar_leaf_are_unknown() {
        let err = resolve(
            &train_schema(),
            &input(vec![layer(Source::Kwargs, &[("name.typo", Input::Native(json!(5)))])]),
        )
        .unwrap_err();
        assert!(matches!(err, NestfigError::UnknownField { ref path, .. } if path == "name.typo"));

        let err = resolve(&train_schema(), &input(vec![cli(&[("epochs.x", "1")])])).unwrap_err();
        assert!(matches!(err, NestfigError::UnknownField { ref path, .. } if path == "epochs.x"));
    }

    #[test]
    fn mapping_for_smart_leaf_is_taken_whole() {
        let cfg = resolve(
            &train_schema(),
            &input(vec![file(json!({"data_path": {"train": "/a", "val": "/b"}}))]),
        )
        .unwrap();
        assert_eq!(cfg.get("data_path"), Some(&json!({"train": "/a", "val": "/b"})));
    }

    #[test]
    fn namespace_names_resolve_selectors() {
        let ns = Namespace::new().with(crate::fixtures::test::rmsprop());
        let cfg = resolve(
            &train_schema(),
            &ResolveInput {
                layers: vec![cli(&[("optim", "RmsProp")])],
                namespace: ns,
                allow_selector_overrides: true,
            },
        )
        .unwrap();
        assert_eq!(cfg.section("optim").unwrap().selector(), Some("RmsProp"));
        assert_eq!(cfg.get("optim.alpha"), Some(&json!(0.99)));
    }

    #[test]
    fn realization_lists_effective_tree() {
        let r = realize(
            &model_schema(),
            &input(vec![cli(&[("model", "segformer")])]),
        )
        .unwrap();
        let nodes: Vec<String> = r.nodes().iter().map(|n| join(&n.path)).collect();
        assert_eq!(nodes, ["model", "model.backbone"]);
        let leaves: Vec<String> = r.leaves().iter().map(|l| join(&l.path)).collect();
        assert_eq!(leaves, ["model.num_classes", "model.backbone.width"]);
    }
}
