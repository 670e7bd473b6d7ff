//! Clap adapter for nestfig.
//!
//! This module is the **optional integration layer** between the
//! framework-agnostic core and the [clap](https://docs.rs/clap) CLI parser.
//! It is compiled only when the `clap` Cargo feature is enabled (on by
//! default).
//!
//! Unlike a derive-based CLI, the command is generated at runtime from the
//! *effective* schema tree, so the flags on offer depend on which sub-config
//! variants were selected:
//!
//! 1. [`prescan`] picks selector-looking options and `--config` out of argv
//!    without clap, so the selector pass can run first.
//! 2. [`command`] turns the resulting [`Realization`] into a `clap::Command`:
//!    one `--dotted.path` option per leaf (plus aliases, shorts, `--no-flag`
//!    negations and positionals), `--node` / `--node.__class__` per
//!    sub-config, and the special `--config`, `--dump`, `--dumps` options.
//! 3. [`parse`] runs clap and converts what was *explicitly* given on the
//!    command line into a [`Layer`] with [`Source::Cli`].

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgGroup, ArgMatches, Command};
use serde_json::Value;
use tracing::debug;

use crate::error::NestfigError;
use crate::field::FlagKind;
use crate::flatten::join;
use crate::merge::Layer;
use crate::resolve::{LeafSlot, Realization};
use crate::schema::SELECTOR_KEY;
use crate::smartcast::Input;
use crate::types::{Source, SpecialAction};

const CONFIG: &str = "config";
const DUMP: &str = "dump";
const DUMPS: &str = "dumps";

/// Marks a bare occurrence of a counter flag.
const TICK: &str = "\u{1}tick";

/// Options shared by the argv helpers.
#[derive(Debug, Clone)]
pub struct CliOptions {
    /// Add `--config`, `--dump` and `--dumps`.
    pub special_options: bool,
}

impl Default for CliOptions {
    fn default() -> Self {
        Self {
            special_options: true,
        }
    }
}

/// What [`prescan`] found before clap runs.
#[derive(Debug, Clone, PartialEq)]
pub struct Prescan {
    /// Every `--name value` pair, as raw text. Only the selectors among them
    /// matter to the selector pass.
    pub layer: Layer,
    pub config_file: Option<PathBuf>,
}

/// Everything explicitly given on the command line.
#[derive(Debug, Clone, PartialEq)]
pub struct CliOutcome {
    pub layer: Layer,
    pub config_file: Option<PathBuf>,
    pub action: Option<SpecialAction>,
}

fn looks_negative_number(token: &str) -> bool {
    token
        .strip_prefix('-')
        .and_then(|rest| rest.chars().next())
        .is_some_and(|c| c.is_ascii_digit() || c == '.')
}

/// Collect `--name=value` and `--name value` pairs from `argv` (which starts
/// with the binary name). Stops at `--`.
pub fn prescan(argv: &[String], options: &CliOptions) -> Prescan {
    let mut layer = Layer::new(Source::Cli);
    let mut config_file = None;
    let mut tokens = argv.iter().skip(1).peekable();

    while let Some(token) = tokens.next() {
        if token == "--" {
            break;
        }
        let Some(body) = token.strip_prefix("--") else {
            continue;
        };
        let (name, value) = match body.split_once('=') {
            Some((name, value)) => (name, Some(value.to_string())),
            None => {
                let takes_next = tokens
                    .peek()
                    .is_some_and(|next| !next.starts_with('-') || looks_negative_number(next));
                (body, if takes_next { tokens.next().cloned() } else { None })
            }
        };
        let Some(value) = value else { continue };
        if options.special_options && name == CONFIG {
            config_file = Some(PathBuf::from(value));
            continue;
        }
        layer.push(name, Input::Text(value));
    }

    Prescan { layer, config_file }
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn leaf_help(slot: &LeafSlot) -> String {
    let field = &slot.field;
    let mut help = field.help_text().to_string();
    let mut push = |part: String| {
        if !help.is_empty() {
            help.push(' ');
        }
        help.push_str(&part);
    };
    if !field.default_value().is_null() {
        push(format!("[default: {}]", display(field.default_value())));
    }
    if !field.allowed().is_empty() {
        let allowed: Vec<String> = field.allowed().iter().map(display).collect();
        push(format!("[choices: {}]", allowed.join(", ")));
    }
    if field.is_required() {
        push("[required]".to_string());
    }
    help
}

fn positional_id(id: &str) -> String {
    format!("{id}@pos")
}

fn negation_id(id: &str) -> String {
    format!("{id}@no")
}

fn special_id(name: &str) -> String {
    format!("@{name}")
}

/// Build the command for an effective schema tree.
pub fn command(realization: &Realization, options: &CliOptions) -> Command {
    let root = realization.root();
    let mut cmd = Command::new(root.name().to_lowercase());
    if !root.description().is_empty() {
        cmd = cmd.about(root.description().to_string());
    }

    let mut longs: HashSet<String> = HashSet::from(["help".to_string()]);
    let mut shorts: HashSet<char> = HashSet::from(['h']);
    let mut mutex: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut positionals: Vec<(usize, usize, LeafSlot)> = Vec::new();

    for node in realization.nodes() {
        let id = join(&node.path);
        let mut known = node.sub.known_selectors();
        if known.is_empty() {
            known.push(node.chosen.name().to_string());
        }
        let mut help = node.sub.help_text().to_string();
        if !help.is_empty() {
            help.push(' ');
        }
        help.push_str(&format!(
            "[selected: {}] [variants: {}]",
            node.sub.selector_for(&node.chosen),
            known.join(", ")
        ));
        longs.insert(id.clone());
        cmd = cmd.arg(
            Arg::new(id.clone())
                .long(id.clone())
                .value_name("VARIANT")
                .help(help)
                .action(ArgAction::Append),
        );

        let canonical = format!("{id}.{SELECTOR_KEY}");
        longs.insert(canonical.clone());
        cmd = cmd.arg(
            Arg::new(canonical.clone())
                .long(canonical)
                .value_name("VARIANT")
                .hide(true)
                .action(ArgAction::Append),
        );
    }

    for (order, slot) in realization.leaves().into_iter().enumerate() {
        let id = join(&slot.path);
        let field = &slot.field;
        let name = slot.path.last().cloned().unwrap_or_default();
        longs.insert(id.clone());

        let mut arg = Arg::new(id.clone())
            .long(id.clone())
            .value_name(name.to_uppercase())
            .help(leaf_help(&slot))
            .action(ArgAction::Append);

        let prefix = &slot.path[..slot.path.len() - 1];
        for alias in field.aliases() {
            let mut aliased = prefix.to_vec();
            aliased.push(alias.clone());
            let long = join(&aliased);
            if longs.insert(long.clone()) {
                arg = arg.visible_alias(long);
            } else {
                debug!(%long, "alias already taken on the command line");
            }
        }

        let mut first_short = true;
        for &short in field.short_aliases() {
            if !shorts.insert(short) {
                debug!(%short, path = %id, "short flag already taken");
                continue;
            }
            arg = if first_short {
                arg.short(short)
            } else {
                arg.visible_short_alias(short)
            };
            first_short = false;
        }

        arg = match field.flag_behavior() {
            FlagKind::Off => arg.num_args(1).allow_negative_numbers(true),
            FlagKind::Toggle => arg
                .num_args(0..=1)
                .require_equals(true)
                .default_missing_value("true"),
            FlagKind::Counter => arg
                .num_args(0..=1)
                .require_equals(true)
                .default_missing_value(TICK),
        };

        if let Some(group) = field.group_name() {
            arg = arg.help_heading(group.to_string());
        }
        if let Some(group) = field.mutex_group_name() {
            mutex.entry(group.to_string()).or_default().push(id.clone());
        }
        cmd = cmd.arg(arg);

        if field.flag_behavior() == FlagKind::Toggle {
            let long = format!("no-{id}");
            if longs.insert(long.clone()) {
                cmd = cmd.arg(
                    Arg::new(negation_id(&id))
                        .long(long)
                        .num_args(0..=1)
                        .require_equals(true)
                        .default_missing_value("false")
                        .hide(true)
                        .action(ArgAction::Append),
                );
            }
        }

        if let Some(position) = field.positional() {
            positionals.push((position, order, slot.clone()));
        }
    }

    positionals.sort_by_key(|(position, order, _)| (*position, *order));
    for (index, (_, _, slot)) in positionals.into_iter().enumerate() {
        let id = join(&slot.path);
        let mut arg = Arg::new(positional_id(&id))
            .index(index + 1)
            .value_name(slot.path.last().cloned().unwrap_or_default().to_uppercase())
            .help(leaf_help(&slot))
            .required(false)
            .action(ArgAction::Set);
        if let Some(group) = slot.field.group_name() {
            arg = arg.help_heading(group.to_string());
        }
        cmd = cmd.arg(arg);
    }

    for (group, ids) in mutex {
        cmd = cmd.group(ArgGroup::new(format!("mutex@{group}")).args(ids).multiple(false));
    }

    if options.special_options {
        if longs.insert(CONFIG.to_string()) {
            cmd = cmd.arg(
                Arg::new(special_id(CONFIG))
                    .long(CONFIG)
                    .value_name("PATH")
                    .help("Load configuration from a YAML, JSON or TOML file")
                    .action(ArgAction::Set),
            );
        }
        if longs.insert(DUMP.to_string()) {
            cmd = cmd.arg(
                Arg::new(special_id(DUMP))
                    .long(DUMP)
                    .value_name("PATH")
                    .help("Write the resolved configuration to a file")
                    .action(ArgAction::Set),
            );
        }
        if longs.insert(DUMPS.to_string()) {
            cmd = cmd.arg(
                Arg::new(special_id(DUMPS))
                    .long(DUMPS)
                    .help("Print the resolved configuration as YAML")
                    .action(ArgAction::SetTrue),
            );
        }
    }

    cmd
}

/// Help text for the effective tree, showing the selected variants.
pub fn render_help(realization: &Realization, options: &CliOptions) -> String {
    command(realization, options).render_help().to_string()
}

/// Values of `id` given on the command line, with their argv indices.
fn given(matches: &ArgMatches, id: &str) -> Vec<(usize, String)> {
    let Ok(Some(values)) = matches.try_get_many::<String>(id) else {
        return Vec::new();
    };
    if matches.value_source(id) != Some(ValueSource::CommandLine) {
        return Vec::new();
    }
    match matches.indices_of(id) {
        Some(indices) => indices.zip(values.cloned()).collect(),
        None => Vec::new(),
    }
}

fn counter_value(path: &str, mut occurrences: Vec<(usize, String)>) -> Result<Value, NestfigError> {
    occurrences.sort_by_key(|(index, _)| *index);
    let mut count: i64 = 0;
    for (_, value) in occurrences {
        if value == TICK {
            count += 1;
        } else {
            count = value.trim().parse().map_err(|_| NestfigError::Cast {
                path: path.to_string(),
                input: value.clone(),
                expected: "integer".into(),
                reason: "counter flags take a whole number".into(),
            })?;
        }
    }
    Ok(Value::from(count))
}

/// Parse `argv` against the command for `realization`.
pub fn parse(
    realization: &Realization,
    options: &CliOptions,
    argv: &[String],
) -> Result<CliOutcome, NestfigError> {
    let matches = command(realization, options).try_get_matches_from(argv)?;
    let mut layer = Layer::new(Source::Cli);

    for node in realization.nodes() {
        let id = join(&node.path);
        if let Some((_, value)) = given(&matches, &id).pop() {
            layer.push_path(node.path.clone(), Input::Text(value));
        }
        let canonical = format!("{id}.{SELECTOR_KEY}");
        if let Some((_, value)) = given(&matches, &canonical).pop() {
            let mut path = node.path.clone();
            path.push(SELECTOR_KEY.to_string());
            layer.push_path(path, Input::Text(value));
        }
    }

    for slot in realization.leaves() {
        let id = join(&slot.path);
        let mut flagged = given(&matches, &id);
        let input = match slot.field.flag_behavior() {
            FlagKind::Counter if !flagged.is_empty() => Some(Input::Native(counter_value(&id, flagged)?)),
            FlagKind::Toggle => {
                flagged.extend(
                    given(&matches, &negation_id(&id))
                        .into_iter()
                        .map(|(index, _)| (index, "false".to_string())),
                );
                flagged.sort_by_key(|(index, _)| *index);
                flagged.pop().map(|(_, value)| Input::Text(value))
            }
            _ => flagged.pop().map(|(_, value)| Input::Text(value)),
        };

        let input = match input {
            Some(input) => Some(input),
            None if slot.field.positional().is_some() => given(&matches, &positional_id(&id))
                .pop()
                .map(|(_, value)| Input::Text(value)),
            None => None,
        };
        if let Some(input) = input {
            layer.push_path(slot.path.clone(), input);
        }
    }

    let mut config_file = None;
    let mut action = None;
    if options.special_options {
        config_file = matches
            .try_get_one::<String>(&special_id(CONFIG))
            .ok()
            .flatten()
            .map(PathBuf::from);
        if let Ok(Some(path)) = matches.try_get_one::<String>(&special_id(DUMP)) {
            action = Some(SpecialAction::Dump {
                path: PathBuf::from(path),
            });
        } else if matches.try_get_one::<bool>(&special_id(DUMPS)).ok().flatten() == Some(&true) {
            action = Some(SpecialAction::Dumps);
        }
    }

    debug!(entries = layer.entries.len(), "parsed command line");
    Ok(CliOutcome {
        layer,
        config_file,
        action,
    })
}
