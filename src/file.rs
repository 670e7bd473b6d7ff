//! Text adapters between config files and nested data.
//!
//! Files are decoded into a `serde_json` mapping regardless of their format,
//! so the rest of the pipeline sees one data model. The top level of every
//! file must be a mapping; an empty file counts as an empty mapping.
//!
//! | Format | Read            | Write                        |
//! |--------|-----------------|------------------------------|
//! | JSON   | `serde_json`    | pretty-printed               |
//! | YAML   | `serde_yaml`    | block style                  |
//! | TOML   | `toml`          | `null` values are left out   |

use std::path::Path;

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::NestfigError;
use crate::types::Format;

/// Decode `text` into a mapping. `what` names the source in error messages.
pub fn parse(text: &str, format: Format, what: &str) -> Result<Map<String, Value>, NestfigError> {
    let parse_err = |reason: String| NestfigError::Parse {
        what: what.to_string(),
        format: format.name(),
        reason,
    };

    let value: Value = match format {
        Format::Json if text.trim().is_empty() => Value::Null,
        Format::Json => serde_json::from_str(text).map_err(|e| parse_err(e.to_string()))?,
        Format::Yaml => serde_yaml::from_str(text).map_err(|e| parse_err(e.to_string()))?,
        Format::Toml => {
            let table: toml::Table = toml::from_str(text).map_err(|e| parse_err(e.to_string()))?;
            serde_json::to_value(table).map_err(|e| parse_err(e.to_string()))?
        }
    };

    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        _ => Err(NestfigError::NotAMapping {
            what: what.to_string(),
        }),
    }
}

/// Read and decode a config file, picking the format from its extension.
pub fn read_file(path: &Path) -> Result<Map<String, Value>, NestfigError> {
    let text = std::fs::read_to_string(path).map_err(|e| NestfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let format = Format::from_path(path);
    debug!(path = %path.display(), format = format.name(), "read config file");
    parse(&text, format, &path.display().to_string())
}

/// Encode nested data as text.
pub fn render(value: &Value, format: Format) -> Result<String, NestfigError> {
    let ser_err = |reason: String| NestfigError::Serialize {
        format: format.name(),
        reason,
    };
    match format {
        Format::Json => serde_json::to_string_pretty(value)
            .map(|mut s| {
                s.push('\n');
                s
            })
            .map_err(|e| ser_err(e.to_string())),
        Format::Yaml => serde_yaml::to_string(value).map_err(|e| ser_err(e.to_string())),
        Format::Toml => {
            let stripped = strip_nulls(value)
                .ok_or_else(|| ser_err("TOML has no null inside arrays".to_string()))?;
            toml::to_string(&stripped).map_err(|e| ser_err(e.to_string()))
        }
    }
}

/// Drop `null` members of mappings. `None` if an array holds a `null`.
fn strip_nulls(value: &Value) -> Option<Value> {
    match value {
        Value::Object(map) => {
            let mut out = Map::new();
            for (k, v) in map {
                if v.is_null() {
                    continue;
                }
                out.insert(k.clone(), strip_nulls(v)?);
            }
            Some(Value::Object(out))
        }
        Value::Array(items) => items
            .iter()
            .map(|v| if v.is_null() { None } else { strip_nulls(v) })
            .collect::<Option<Vec<_>>>()
            .map(Value::Array),
        other => Some(other.clone()),
    }
}

/// Render `value` and write it to `path`, creating parent directories.
pub fn write_file(path: &Path, value: &Value, format: Format) -> Result<(), NestfigError> {
    let text = render(value, format)?;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| NestfigError::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    std::fs::write(path, text).map_err(|e| NestfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}
