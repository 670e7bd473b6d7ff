//! Field descriptors: everything the engine knows about one leaf parameter.

use serde_json::Value;

use crate::error::NestfigError;
use crate::smartcast::{self, Input, SplitMode, ValueType};

/// How a field behaves when its flag is given without a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlagKind {
    /// A value is always required (`--name value`).
    #[default]
    Off,
    /// `--name` means `true`; `--no-name` means `false`.
    Toggle,
    /// Every occurrence of `--name` adds one.
    Counter,
}

/// Descriptor of one leaf configuration parameter.
///
/// Built with chained setters, then handed to
/// [`SchemaBuilder::field`](crate::SchemaBuilder::field):
///
/// ```
/// use nestfig::{Field, ValueType};
///
/// let lr = Field::new(0.001)
///     .ty(ValueType::Float)
///     .help("Learning rate")
///     .alias("learning_rate");
/// assert_eq!(lr.aliases(), ["learning_rate"]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub(crate) default: Value,
    ty: ValueType,
    split: SplitMode,
    help: String,
    choices: Vec<Value>,
    aliases: Vec<String>,
    short_aliases: Vec<char>,
    flag: FlagKind,
    position: Option<usize>,
    required: bool,
    group: Option<String>,
    mutex_group: Option<String>,
    tags: Vec<String>,
}

impl Field {
    pub fn new(default: impl Into<Value>) -> Self {
        Self {
            default: default.into(),
            ty: ValueType::Smart,
            split: SplitMode::Auto,
            help: String::new(),
            choices: Vec::new(),
            aliases: Vec::new(),
            short_aliases: Vec::new(),
            flag: FlagKind::Off,
            position: None,
            required: false,
            group: None,
            mutex_group: None,
            tags: Vec::new(),
        }
    }

    /// A field with a `null` default, failing resolution unless supplied.
    pub fn required_value() -> Self {
        Self::new(Value::Null).required(true)
    }

    pub fn ty(mut self, ty: ValueType) -> Self {
        self.ty = ty;
        self
    }

    pub fn split(mut self, split: SplitMode) -> Self {
        self.split = split;
        self
    }

    pub fn help(mut self, help: &str) -> Self {
        self.help = help.to_string();
        self
    }

    pub fn choices<I, V>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.choices = choices.into_iter().map(Into::into).collect();
        self
    }

    /// Add an alternate name. Reads and writes through the alias route to
    /// this field; on the command line it becomes an extra `--alias` flag.
    pub fn alias(mut self, alias: &str) -> Self {
        self.aliases.push(alias.to_string());
        self
    }

    pub fn short(mut self, short: char) -> Self {
        self.short_aliases.push(short);
        self
    }

    /// Shorthand for `.flag_kind(FlagKind::Toggle)`.
    pub fn flag(self) -> Self {
        self.flag_kind(FlagKind::Toggle)
    }

    /// Shorthand for `.flag_kind(FlagKind::Counter)`.
    pub fn counter(self) -> Self {
        self.flag_kind(FlagKind::Counter)
    }

    pub fn flag_kind(mut self, kind: FlagKind) -> Self {
        self.flag = kind;
        self
    }

    pub fn position(mut self, position: usize) -> Self {
        self.position = Some(position);
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn group(mut self, group: &str) -> Self {
        self.group = Some(group.to_string());
        self
    }

    pub fn mutex_group(mut self, group: &str) -> Self {
        self.mutex_group = Some(group.to_string());
        self
    }

    /// Free-form metadata. The engine carries tags but never reads them.
    pub fn tag(mut self, tag: &str) -> Self {
        self.tags.push(tag.to_string());
        self
    }

    pub fn default_value(&self) -> &Value {
        &self.default
    }

    pub fn value_type(&self) -> ValueType {
        self.ty
    }

    /// Whether dotted keys may reach inside this leaf's value.
    pub(crate) fn accepts_subkeys(&self) -> bool {
        self.ty == ValueType::Dict || self.default.is_object()
    }

    pub fn help_text(&self) -> &str {
        &self.help
    }

    pub fn allowed(&self) -> &[Value] {
        &self.choices
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn short_aliases(&self) -> &[char] {
        &self.short_aliases
    }

    pub fn flag_behavior(&self) -> FlagKind {
        self.flag
    }

    pub fn positional(&self) -> Option<usize> {
        self.position
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn group_name(&self) -> Option<&str> {
        self.group.as_deref()
    }

    pub fn mutex_group_name(&self) -> Option<&str> {
        self.mutex_group.as_deref()
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Whether comma splitting applies to text given for this field.
    pub fn allows_split(&self) -> bool {
        self.ty == ValueType::List || self.split.allows(&self.default)
    }

    /// Cast `input` for the field at dotted `path`, then check `choices`.
    pub fn cast(&self, path: &str, input: &Input) -> Result<Value, NestfigError> {
        let value = smartcast::cast(input, self.ty, self.allows_split()).map_err(|failure| {
            NestfigError::Cast {
                path: path.to_string(),
                input: input.describe(),
                expected: failure.expected.to_string(),
                reason: failure.reason,
            }
        })?;

        if !self.choices.is_empty() && !value.is_null() && !self.choices.contains(&value) {
            let allowed: Vec<String> = self.choices.iter().map(Value::to_string).collect();
            return Err(NestfigError::Cast {
                path: path.to_string(),
                input: input.describe(),
                expected: format!("one of [{}]", allowed.join(", ")),
                reason: "value is not an allowed choice".into(),
            });
        }
        Ok(value)
    }
}

impl From<Value> for Field {
    fn from(default: Value) -> Self {
        Field::new(default)
    }
}
