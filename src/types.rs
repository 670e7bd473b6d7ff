use std::path::{Path, PathBuf};

/// Text formats understood by the file adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    Json,
    #[default]
    Yaml,
    Toml,
}

impl Format {
    /// Infer the format from a file extension. Unknown extensions fall back
    /// to YAML, which is also a superset of JSON for plain data.
    pub fn from_path(path: &Path) -> Format {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("json") => Format::Json,
            Some("toml") => Format::Toml,
            _ => Format::Yaml,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Yaml => "yaml",
            Format::Toml => "toml",
        }
    }
}

/// The four data layers, in ascending precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Source {
    Defaults,
    File,
    Kwargs,
    Cli,
}

impl Source {
    /// Whether a value from this layer counts as explicitly set.
    pub fn is_explicit(self) -> bool {
        !matches!(self, Source::Defaults)
    }
}

/// An introspection request found on the command line (`--dump`, `--dumps`).
///
/// The engine never performs these itself; the caller decides what to do,
/// usually via [`ops::handle`](crate::ops::handle).
#[derive(Debug, Clone, PartialEq)]
pub enum SpecialAction {
    Dump { path: PathBuf },
    Dumps,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_from_extension() {
        assert_eq!(Format::from_path(Path::new("a/b.json")), Format::Json);
        assert_eq!(Format::from_path(Path::new("a/b.JSON")), Format::Json);
        assert_eq!(Format::from_path(Path::new("b.toml")), Format::Toml);
        assert_eq!(Format::from_path(Path::new("b.yml")), Format::Yaml);
        assert_eq!(Format::from_path(Path::new("noext")), Format::Yaml);
    }

    #[test]
    fn sources_are_ordered_by_precedence() {
        assert!(Source::Defaults < Source::File);
        assert!(Source::File < Source::Kwargs);
        assert!(Source::Kwargs < Source::Cli);
        assert!(!Source::Defaults.is_explicit());
        assert!(Source::Cli.is_explicit());
    }
}
