use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
#[cfg_attr(feature = "rich-errors", derive(miette::Diagnostic))]
pub enum NestfigError {
    #[error("Cannot cast '{input}' for '{path}' to {expected}: {reason}")]
    #[cfg_attr(feature = "rich-errors", diagnostic(code(nestfig::cast)))]
    Cast {
        path: String,
        input: String,
        expected: String,
        reason: String,
    },

    #[error("Unknown configuration key '{path}' (value: {input})")]
    #[cfg_attr(
        feature = "rich-errors",
        diagnostic(code(nestfig::unknown_field), help("check the spelling or the selected variant"))
    )]
    UnknownField { path: String, input: String },

    #[error("Required field '{path}' was not provided")]
    #[cfg_attr(feature = "rich-errors", diagnostic(code(nestfig::missing_required)))]
    MissingRequiredField { path: String },

    #[error("Conflicting selectors for '{path}': '{sugar}' vs '{path}.__class__={canonical}'")]
    #[cfg_attr(feature = "rich-errors", diagnostic(code(nestfig::selector_conflict)))]
    SelectorConflict {
        path: String,
        sugar: String,
        canonical: String,
    },

    #[error("Cannot resolve selector '{selector}' for '{path}' (known: {known:?})")]
    #[cfg_attr(feature = "rich-errors", diagnostic(code(nestfig::unresolved_selector)))]
    UnresolvedSelector {
        path: String,
        selector: String,
        known: Vec<String>,
    },

    #[error("Fields '{first}' and '{second}' both claim positional slot {position}")]
    #[cfg_attr(feature = "rich-errors", diagnostic(code(nestfig::ambiguous_positional)))]
    AmbiguousPositionalFlag {
        position: usize,
        first: String,
        second: String,
    },

    #[error("Alias '{alias}' in schema '{schema}' collides with '{existing}'")]
    #[cfg_attr(feature = "rich-errors", diagnostic(code(nestfig::alias_collision)))]
    AliasCollision {
        schema: String,
        alias: String,
        existing: String,
    },

    #[error("'{name}' is reserved and cannot be declared in schema '{schema}'")]
    #[cfg_attr(feature = "rich-errors", diagnostic(code(nestfig::reserved_name)))]
    ReservedName { schema: String, name: String },

    #[error("Invalid field name '{name}' in schema '{schema}': {reason}")]
    InvalidName {
        schema: String,
        name: String,
        reason: String,
    },

    #[error("Selector '{selector}' is registered twice for '{field}' in schema '{schema}'")]
    DuplicateChoice {
        schema: String,
        field: String,
        selector: String,
    },

    #[error("Selecting a variant for '{path}' is disabled; enable allow_selector_overrides() on the builder")]
    SelectorOverridesDisabled { path: String },

    #[error("Expected a mapping at the top level of {what}")]
    NotAMapping { what: String },

    #[error("Failed to parse {what} as {format}: {reason}")]
    Parse {
        what: String,
        format: &'static str,
        reason: String,
    },

    #[error("Failed to render configuration as {format}: {reason}")]
    Serialize {
        format: &'static str,
        reason: String,
    },

    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[cfg(feature = "clap")]
    #[error(transparent)]
    Cli(#[from] clap::Error),
}
