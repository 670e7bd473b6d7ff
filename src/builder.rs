use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::Config;
use crate::error::NestfigError;
use crate::file;
use crate::flatten;
use crate::merge::{self, Layer};
use crate::overrides;
use crate::registry::{ConfigType, Namespace, schema_of};
use crate::resolve::{self, ResolveInput};
use crate::schema::Schema;
use crate::smartcast::Input;
use crate::types::{Format, Source, SpecialAction};

/// Entry point for building a nestfig configuration.
pub struct Nestfig;

impl Nestfig {
    pub fn builder(schema: Arc<Schema>) -> NestfigBuilder {
        NestfigBuilder::new(schema)
    }

    /// Builder for a declared [`ConfigType`], using its cached schema.
    pub fn builder_for<T: ConfigType>() -> Result<NestfigBuilder, NestfigError> {
        Ok(NestfigBuilder::new(schema_of::<T>()?))
    }
}

#[derive(Debug, Clone)]
enum FileSource {
    Path(PathBuf),
    Text(String, Format),
    Data(Value),
}

/// Builder for configuring and loading layered configuration.
///
/// Each method feeds one of the four layers, lowest precedence first:
///
/// - **Defaults**: the schema itself, plus [`default_override()`](Self::default_override).
/// - **File**: [`file_path()`](Self::file_path), [`file_text()`](Self::file_text),
///   [`file_data()`](Self::file_data), and `--config` on the command line.
///   All of them are deep-merged in that order into one layer.
/// - **Kwargs**: [`kwarg()`](Self::kwarg), [`kwargs()`](Self::kwargs),
///   [`kwargs_from()`](Self::kwargs_from).
/// - **CLI**: [`argv()`](Self::argv).
pub struct NestfigBuilder {
    schema: Arc<Schema>,
    defaults: Layer,
    files: Vec<FileSource>,
    kwargs: Layer,
    argv: Option<Vec<String>>,
    namespace: Namespace,
    special_options: bool,
    allow_selector_overrides: bool,
    deferred_error: Option<NestfigError>,
}

impl NestfigBuilder {
    fn new(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            defaults: Layer::new(Source::Defaults),
            files: Vec::new(),
            kwargs: Layer::new(Source::Kwargs),
            argv: None,
            namespace: Namespace::default(),
            special_options: true,
            allow_selector_overrides: true,
            deferred_error: None,
        }
    }

    /// Replace a default for this load only. The value does not count as
    /// explicitly set. A sub-config path takes a selector.
    pub fn default_override<V: Into<Value>>(mut self, key: &str, value: V) -> Self {
        self.defaults.push(key, Input::Native(value.into()));
        self
    }

    /// Add a config file. The format follows the extension (YAML otherwise).
    pub fn file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.files.push(FileSource::Path(path.into()));
        self
    }

    /// Add config file contents that were loaded elsewhere.
    pub fn file_text(mut self, text: &str, format: Format) -> Self {
        self.files
            .push(FileSource::Text(text.to_string(), format));
        self
    }

    /// Add already-decoded file data (a nested or dotted mapping).
    pub fn file_data(mut self, data: Value) -> Self {
        self.files.push(FileSource::Data(data));
        self
    }

    /// Add a keyword override. `None` values are ignored (useful for optional clap args).
    pub fn kwarg<V: Into<Value>>(mut self, key: &str, value: Option<V>) -> Self {
        if let Some(v) = value {
            self.kwargs.push(key, Input::Native(v.into()));
        }
        self
    }

    /// Add a keyword override as untyped text, smart-cast like a CLI value.
    pub fn kwarg_text(mut self, key: &str, text: &str) -> Self {
        self.kwargs.push(key, Input::text(text));
        self
    }

    /// Add keyword overrides from a nested or dotted mapping.
    pub fn kwargs(mut self, data: Value) -> Self {
        match data {
            Value::Object(map) => self.kwargs.push_map(&map),
            _ => {
                self.deferred_error.get_or_insert(NestfigError::NotAMapping {
                    what: "keyword overrides".into(),
                });
            }
        }
        self
    }

    /// Add keyword overrides from any serializable source, auto-matching by field name.
    ///
    /// Serializes `source` into flat key-value pairs, skips `None` values, and keeps
    /// only keys that match fields, field aliases or selectors of the schema. A
    /// mapping member that lands on a dict field is kept whole. Non-matching keys are
    /// silently ignored, so clap-only fields like `command` or `verbose` are
    /// automatically excluded.
    ///
    /// Works with clap-derived structs, `HashMap`s, or anything implementing `Serialize`.
    pub fn kwargs_from<S: Serialize>(mut self, source: &S) -> Self {
        let value = match serde_json::to_value(source) {
            Ok(value) => value,
            Err(e) => {
                self.deferred_error.get_or_insert(NestfigError::Serialize {
                    format: "json",
                    reason: e.to_string(),
                });
                return self;
            }
        };
        let Value::Object(map) = value else {
            self.deferred_error.get_or_insert(NestfigError::NotAMapping {
                what: "keyword source".into(),
            });
            return self;
        };
        let valid = overrides::valid_paths(&self.schema);
        for entry in flatten::flatten_levels(&map) {
            if !entry.value.is_null() && valid.accepts(&entry) {
                self.kwargs.push_flat(entry, false);
            }
        }
        self
    }

    /// Command-line tokens, starting with the binary name.
    pub fn argv<I, T>(mut self, argv: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.argv = Some(argv.into_iter().map(Into::into).collect());
        self
    }

    /// Extra schemas a selector may name when no `choices` key matches.
    pub fn namespace(mut self, namespace: Namespace) -> Self {
        self.namespace = namespace;
        self
    }

    /// Add `--config`, `--dump` and `--dumps` to the command line (default: `true`).
    pub fn special_options(mut self, enabled: bool) -> Self {
        self.special_options = enabled;
        self
    }

    /// Allow files, kwargs and the command line to pick sub-config variants
    /// (default: `true`). When disabled only defaults may.
    pub fn allow_selector_overrides(mut self, allow: bool) -> Self {
        self.allow_selector_overrides = allow;
        self
    }

    fn file_map(&self, extra: Option<&PathBuf>) -> Result<Map<String, Value>, NestfigError> {
        let mut merged = Map::new();
        for source in &self.files {
            let map = match source {
                FileSource::Path(path) => file::read_file(path)?,
                FileSource::Text(text, format) => file::parse(text, *format, "config text")?,
                FileSource::Data(Value::Object(map)) => map.clone(),
                FileSource::Data(_) => {
                    return Err(NestfigError::NotAMapping {
                        what: "file data".into(),
                    });
                }
            };
            merged = merge::deep_merge(merged, map);
        }
        if let Some(path) = extra {
            merged = merge::deep_merge(merged, file::read_file(path)?);
        }
        Ok(merged)
    }

    /// Build the `ResolveInput` from current builder state, with the command
    /// line parsed against the effective schema.
    fn build_input(&mut self) -> Result<(ResolveInput, Option<SpecialAction>), NestfigError> {
        if let Some(err) = self.deferred_error.take() {
            return Err(err);
        }

        let mut input = ResolveInput {
            layers: vec![self.defaults.clone(), self.kwargs.clone()],
            namespace: self.namespace.clone(),
            allow_selector_overrides: self.allow_selector_overrides,
        };

        let Some(argv) = &self.argv else {
            input.layers.push(Layer::from_file_map(&self.file_map(None)?));
            return Ok((input, None));
        };

        #[cfg(feature = "clap")]
        {
            use crate::cli::{self, CliOptions};

            let options = CliOptions {
                special_options: self.special_options,
            };
            let pre = cli::prescan(argv, &options);
            input
                .layers
                .push(Layer::from_file_map(&self.file_map(pre.config_file.as_ref())?));

            let mut provisional = input.clone();
            provisional.layers.push(pre.layer);
            let realization = resolve::realize(&self.schema, &provisional)?;
            let outcome = cli::parse(&realization, &options, argv)?;
            debug!(action = ?outcome.action, "command line handled");
            input.layers.push(outcome.layer);
            Ok((input, outcome.action))
        }

        #[cfg(not(feature = "clap"))]
        {
            debug!(tokens = argv.len(), "command line ignored without the clap feature");
            input.layers.push(Layer::from_file_map(&self.file_map(None)?));
            Ok((input, None))
        }
    }

    /// Load and resolve the configuration through all layers.
    pub fn load(self) -> Result<Config, NestfigError> {
        self.load_with_action().map(|(config, _)| config)
    }

    /// Like [`load`](Self::load), also returning a `--dump`/`--dumps` request
    /// for the caller to act on (see [`ops::handle`](crate::ops::handle)).
    pub fn load_with_action(mut self) -> Result<(Config, Option<SpecialAction>), NestfigError> {
        let (input, action) = self.build_input()?;
        let config = resolve::resolve(&self.schema, &input)?;
        Ok((config, action))
    }
}
