//! Typed, layered configuration with selectable nested sub-configs. Declare a
//! schema, hand it a command line, and go.
//!
//! Nestfig resolves one configuration tree from four sources (schema
//! defaults, a config file, keyword overrides, and the command line) and
//! lets parts of that tree be *swapped*: a field like `optim` can hold an
//! `adam` or an `sgd` sub-config, chosen by a selector in any layer.
//!
//! ```
//! use nestfig::{Field, Nestfig, Schema, SubConfig};
//!
//! let adam = Schema::builder("Adam").value("lr", 0.001).build()?;
//! let sgd = Schema::builder("Sgd").value("lr", 0.01).value("momentum", 0.9).build()?;
//! let train = Schema::builder("Train")
//!     .field("epochs", Field::new(10))
//!     .subconfig("optim", SubConfig::new(adam.clone()).choice("adam", adam).choice("sgd", sgd))
//!     .build()?;
//!
//! let config = Nestfig::builder(train)
//!     .argv(["train", "--optim", "sgd", "--optim.momentum", "0.8"])
//!     .load()?;
//! assert_eq!(config["optim.momentum"], 0.8);
//! assert_eq!(config["epochs"], 10);
//! # Ok::<(), nestfig::NestfigError>(())
//! ```
//!
//! # Design: schema as source of truth
//!
//! A [`Schema`] is an ordered set of named entries. Each entry is either a
//! [`Field`] (a leaf with a default, a value type, and CLI metadata) or a
//! [`SubConfig`] (a slot whose schema is picked at load time). Everything
//! else derives from that one definition: the mapping view, the generated
//! `clap::Command`, `--dump` output, and the `get`/`list` helpers in [`ops`].
//!
//! Schemas are immutable and shared behind `Arc`. Types that implement
//! [`ConfigType`] get their schema built once and cached by
//! [`schema_of()`]; schemas can also be built inline with
//! [`Schema::builder()`].
//!
//! Sub-configs are selected, not instantiated. The result of loading is a
//! [`Config`]: the same tree, with every selector resolved and every leaf
//! cast. A typed struct is one call away with [`Config::view()`].
//!
//! # Layer precedence
//!
//! ```text
//! Schema defaults       Field::new(..), .default_override()
//!        ↑ overridden by
//! Config file           .file_path(), .file_text(), --config
//!        ↑ overridden by
//! Keyword overrides     .kwarg(), .kwargs(), .kwargs_from()
//!        ↑ overridden by
//! Command line          .argv()
//! ```
//!
//! Every layer is **sparse**. A layer only names the keys it overrides; the
//! rest fall through. A key set by any layer above the defaults counts as
//! *explicit* (see [`Config::explicit_keys()`]).
//!
//! # Selectors before leaves
//!
//! Resolution runs in two passes. The selector pass walks the tree top down
//! and decides which variant every sub-config holds, using the highest layer
//! that names one. Only then are leaves assigned, against the schema those
//! selectors produced. So `--optim.momentum 0.8` is valid exactly when some
//! layer picked `sgd`, whichever layer that was.
//!
//! A selector is written either as the sugar form `optim: sgd` or as the
//! canonical form `optim: {__class__: sgd}`. Using both forms with
//! different values in one layer is a [`SelectorConflict`](NestfigError::SelectorConflict).
//! The selector text is matched against the `choices` keys, then against
//! the schema names visible to the slot (choices, the default, and the
//! builder's [`Namespace`]). An unmatched selector falls back to the default
//! with a warning, unless the slot is [`strict`](SubConfig::strict).
//!
//! # Smart casting
//!
//! Text from the command line (and from [`kwarg_text()`](NestfigBuilder::kwarg_text))
//! is cast by the field's [`ValueType`]. The default, `Smart`, tries in
//! order:
//!
//! 1. A literal: numbers, quoted strings, `True`/`False`/`None`, lists,
//!    tuples and dicts.
//! 2. A top-level comma list (`1,2,3`), when the field allows splitting.
//! 3. `true`/`false` in any case.
//! 4. The text itself.
//!
//! Values that are already typed (from files, kwargs, or defaults) pass
//! through `Smart` unchanged.
//!
//! # Command line
//!
//! The `cli` module (behind the `clap` Cargo feature, on by default) builds
//! a `clap::Command` from the *effective* tree, so help output lists the
//! fields of the variants actually selected. Leaves become `--dotted.path`
//! options, with aliases, short flags, toggles (`--use_amp`,
//! `--no-use_amp`), counters (`-vvv`), positionals, help headings, and
//! mutually exclusive groups taken from the [`Field`].
//!
//! Three special options are added unless disabled with
//! [`special_options(false)`](NestfigBuilder::special_options):
//!
//! - `--config <path>` merges one more file into the file layer.
//! - `--dump <path>` and `--dumps` are returned from
//!   [`load_with_action()`](NestfigBuilder::load_with_action) as a
//!   [`SpecialAction`] for the caller to run with [`ops::handle()`].
//!
//! To use nestfig without clap:
//!
//! ```toml
//! nestfig = { version = "...", default-features = false }
//! ```
//!
//! # Keyword overrides
//!
//! [`kwargs_from(source)`](NestfigBuilder::kwargs_from) serializes any
//! `Serialize` value, skips `None` values, and keeps only keys that name a
//! field or selector somewhere in the schema. Pass an entire clap struct and
//! its non-config fields are silently ignored.
//!
//! # Error handling
//!
//! All fallible operations return [`NestfigError`]. Messages name the dotted
//! path and the offending input. Enable the `rich-errors` feature for
//! [miette](https://docs.rs/miette) diagnostics with codes and help text.

pub mod error;
pub mod flatten;
pub mod ops;
pub mod types;

mod builder;
#[cfg(feature = "clap")]
pub mod cli;
mod config;
mod field;
mod file;
mod literal;
pub(crate) mod merge;
mod overrides;
mod registry;
mod resolve;
mod schema;
mod smartcast;

#[cfg(test)]
mod fixtures;

pub use builder::{Nestfig, NestfigBuilder};
pub use config::{Config, Item};
pub use error::NestfigError;
pub use field::{Field, FlagKind};
pub use literal::{LiteralError, parse_literal};
pub use merge::{Assignment, Layer};
pub use ops::ConfigResult;
pub use registry::{ConfigType, Namespace, schema_of};
pub use resolve::{LeafSlot, NodeSlot, Realization, ResolveInput, defaults, realize, resolve};
pub use schema::{Declared, Entry, SELECTOR_KEY, Schema, SchemaBuilder, SubConfig, normalize};
pub use smartcast::{CastFailure, Input, SplitMode, ValueType, cast, smartcast};
pub use types::{Format, Source, SpecialAction};
