//! Key paths a keyword source may target.
//!
//! Used by [`kwargs_from`](crate::NestfigBuilder::kwargs_from) to drop
//! members of a serialized struct that have no counterpart in the schema.

use std::collections::HashSet;
use std::sync::Arc;

use crate::flatten::{FlatEntry, join};
use crate::schema::{Entry, SELECTOR_KEY, Schema};

/// Dotted paths that can be assigned in a schema.
#[derive(Debug, Clone, Default)]
pub struct KeyPaths {
    leaves: HashSet<String>,
    selectors: HashSet<String>,
}

impl KeyPaths {
    /// Whether `dotted` names a leaf (or one of its aliases) or a selector.
    pub fn contains(&self, dotted: &str) -> bool {
        self.leaves.contains(dotted) || self.selectors.contains(dotted)
    }

    /// Whether a flattened member of a serialized source lands in the schema:
    /// its full path is known, or it sits inside a mapping written at a leaf.
    pub fn accepts(&self, entry: &FlatEntry) -> bool {
        self.contains(&join(&entry.path))
            || entry
                .levels
                .iter()
                .any(|&level| level > 0 && self.leaves.contains(&join(&entry.path[..level])))
    }
}

/// Collect every dotted path that can be assigned in `schema`.
///
/// Leaves of every sub-config variant are included, so `"optim.momentum"`
/// is valid even when the default optimizer has no momentum. Leaf aliases
/// are included under their own spelling. Sub-config nodes contribute their
/// selector path twice: `"optim"` and `"optim.__class__"`.
pub fn valid_paths(schema: &Arc<Schema>) -> KeyPaths {
    let mut paths = KeyPaths::default();
    collect(schema, "", &mut paths, 0);
    paths
}

const MAX_DEPTH: usize = 32;

fn dotted(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

fn collect(schema: &Schema, prefix: &str, paths: &mut KeyPaths, depth: usize) {
    if depth > MAX_DEPTH {
        return;
    }
    for (name, entry) in schema.entries() {
        let path = dotted(prefix, name);
        match entry {
            Entry::Leaf(field) => {
                for alias in field.aliases() {
                    paths.leaves.insert(dotted(prefix, alias));
                }
                paths.leaves.insert(path);
            }
            Entry::Sub(sub) => {
                paths.selectors.insert(format!("{path}.{SELECTOR_KEY}"));
                let variants = sub.default_schema().into_iter().chain(sub.choices().map(|(_, s)| s));
                for variant in variants {
                    collect(variant, &path, paths, depth + 1);
                }
                paths.selectors.insert(path);
            }
        }
    }
}
