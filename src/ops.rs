//! Config operations: dump requests, key lookup, listing, and result types.
//!
//! Provides the logic behind `--dump`, `--dumps`, and the get/list
//! introspection helpers, plus the `ConfigResult` enum that callers use to
//! display results.

use std::fmt;
use std::path::PathBuf;

use serde_json::Value;

use crate::config::Config;
use crate::error::NestfigError;
use crate::file;
use crate::types::{Format, SpecialAction};

/// Result of a config operation. Returned to the caller for display.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigResult {
    /// Serialized configuration text.
    Text(String),
    /// Confirmation that the configuration was written to a file.
    Written { path: PathBuf },
    /// A key's resolved value and its help text.
    KeyValue {
        key: String,
        value: String,
        doc: Vec<String>,
    },
    /// All resolved configuration key-value pairs.
    Listing { entries: Vec<(String, String)> },
}

impl fmt::Display for ConfigResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigResult::Text(t) => write!(f, "{t}"),
            ConfigResult::Written { path } => {
                write!(f, "Config written to {}", path.display())
            }
            ConfigResult::KeyValue { key, value, doc } => {
                for line in doc {
                    writeln!(f, "# {line}")?;
                }
                write!(f, "{key} = {value}")
            }
            ConfigResult::Listing { entries } => {
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{key} = {value}")?;
                }
                Ok(())
            }
        }
    }
}

/// Carry out a `--dump` or `--dumps` request.
///
/// `--dump` picks the format from the file extension (YAML when unknown);
/// `--dumps` always renders YAML.
pub fn handle(config: &Config, action: &SpecialAction) -> Result<ConfigResult, NestfigError> {
    match action {
        SpecialAction::Dump { path } => {
            file::write_file(path, &config.to_value(), Format::from_path(path))?;
            Ok(ConfigResult::Written { path: path.clone() })
        }
        SpecialAction::Dumps => config.dumps(Format::Yaml).map(ConfigResult::Text),
    }
}

/// Get a config value by dotted key, including the field's help text.
///
/// Section keys render as a one-line JSON mapping with their selector.
pub fn get_value(config: &Config, key: &str) -> Result<ConfigResult, NestfigError> {
    let value = match (config.get(key), config.section(key)) {
        (Some(value), _) => format_value(value),
        (None, Some(section)) => section.to_value().to_string(),
        (None, None) => {
            return Err(NestfigError::UnknownField {
                path: key.into(),
                input: String::new(),
            });
        }
    };

    let doc = config
        .field(key)
        .map(|field| field.help_text())
        .or_else(|| config.section(key).map(|s| s.schema().description()))
        .map(|text| text.lines().map(str::to_string).collect())
        .unwrap_or_default();

    Ok(ConfigResult::KeyValue {
        key: key.into(),
        value,
        doc,
    })
}

/// List all resolved config values as flattened dotted key-value pairs.
pub fn list_values(config: &Config) -> ConfigResult {
    let entries = config
        .to_flat()
        .into_iter()
        .map(|(key, value)| {
            let display = if value.is_null() {
                "<not set>".to_string()
            } else {
                format_value(&value)
            };
            (key, display)
        })
        .collect();
    ConfigResult::Listing { entries }
}

/// Format a value for display. Strings are shown bare.
fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::train_schema;
    use crate::resolve::defaults;
    use serde_json::json;
    use tempfile::TempDir;

    fn test_config() -> Config {
        defaults(&train_schema()).unwrap()
    }

    #[test]
    fn get_flat_key() {
        match get_value(&test_config(), "epochs").unwrap() {
            ConfigResult::KeyValue { value, doc, .. } => {
                assert_eq!(value, "10");
                assert_eq!(doc, ["Number of epochs"]);
            }
            other => panic!("Expected KeyValue, got {other:?}"),
        }
    }

    #[test]
    fn get_nested_key_and_alias() {
        let config = test_config();
        match get_value(&config, "optim.lr").unwrap() {
            ConfigResult::KeyValue { value, doc, .. } => {
                assert_eq!(value, "0.001");
                assert_eq!(doc, ["Learning rate"]);
            }
            other => panic!("Expected KeyValue, got {other:?}"),
        }
        assert!(get_value(&config, "n_epochs").is_ok());
    }

    #[test]
    fn get_section_shows_selector() {
        match get_value(&test_config(), "optim").unwrap() {
            ConfigResult::KeyValue { value, doc, .. } => {
                assert!(value.starts_with(r#"{"__class__":"adam""#), "{value}");
                assert_eq!(doc, ["Adam optimizer"]);
            }
            other => panic!("Expected KeyValue, got {other:?}"),
        }
    }

    #[test]
    fn get_nonexistent_key() {
        let result = get_value(&test_config(), "nonexistent");
        assert!(matches!(result, Err(NestfigError::UnknownField { .. })));
    }

    #[test]
    fn list_values_includes_selectors_and_unset() {
        let ConfigResult::Listing { entries } = list_values(&test_config()) else {
            panic!("Expected Listing");
        };
        let keys: Vec<&str> = entries.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys[0], "epochs");
        assert!(keys.contains(&"optim.__class__"));
        assert!(keys.contains(&"optim.beta1"));
        let data = entries.iter().find(|(k, _)| k == "data_path").unwrap();
        assert_eq!(data.1, "<not set>");
        let name = entries.iter().find(|(k, _)| k == "name").unwrap();
        assert_eq!(name.1, "run");
    }

    #[test]
    fn dumps_renders_yaml() {
        let ConfigResult::Text(text) = handle(&test_config(), &SpecialAction::Dumps).unwrap() else {
            panic!("Expected Text");
        };
        assert!(text.contains("__class__: adam"));
        let back = Config::loads(&train_schema(), &text, Format::Yaml).unwrap();
        assert_eq!(back, test_config());
    }

    #[test]
    fn dump_writes_by_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out/config.json");
        let result = handle(&test_config(), &SpecialAction::Dump { path: path.clone() }).unwrap();
        assert_eq!(result, ConfigResult::Written { path: path.clone() });
        let map = file::read_file(&path).unwrap();
        assert_eq!(map["optim"]["__class__"], json!("adam"));
    }

    #[test]
    fn listing_display_format() {
        let result = ConfigResult::Listing {
            entries: vec![("epochs".into(), "10".into()), ("name".into(), "run".into())],
        };
        assert_eq!(format!("{result}"), "epochs = 10\nname = run");
    }

    #[test]
    fn key_value_display_format() {
        let result = ConfigResult::KeyValue {
            key: "epochs".into(),
            value: "10".into(),
            doc: vec!["Number of epochs".into()],
        };
        assert_eq!(format!("{result}"), "# Number of epochs\nepochs = 10");
    }
}
