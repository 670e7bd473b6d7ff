//! Smart casting: turn untyped text into the best-guess typed value.
//!
//! Command-line input always arrives as text. When a field declares no type
//! ([`ValueType::Smart`], the default) the text goes through, in order:
//!
//! 1. the restricted literal grammar in [`literal`](crate::literal)
//!    (`3`, `0.5`, `None`, `[1, 'a']`, `{'k': 1}`, ...),
//! 2. a top-level comma split when splitting is enabled
//!    (`a,b,1,c` → `["a", "b", 1, "c"]`),
//! 3. case-insensitive `true` / `false`,
//! 4. otherwise the original string, untouched.
//!
//! Fields with a concrete type are parsed strictly instead and report a
//! [`CastFailure`] when the input does not fit.

use serde_json::{Number, Value};

use crate::literal::parse_literal;

/// Declared type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueType {
    /// Infer per value.
    #[default]
    Smart,
    Str,
    Int,
    Float,
    Bool,
    List,
    Dict,
}

impl ValueType {
    pub fn name(self) -> &'static str {
        match self {
            ValueType::Smart => "smart",
            ValueType::Str => "string",
            ValueType::Int => "integer",
            ValueType::Float => "float",
            ValueType::Bool => "boolean",
            ValueType::List => "list",
            ValueType::Dict => "dict",
        }
    }
}

/// Whether smart casting may split comma separated text into a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SplitMode {
    On,
    Off,
    /// Split only when the field's default is already a list.
    #[default]
    Auto,
}

impl SplitMode {
    pub fn allows(self, default: &Value) -> bool {
        match self {
            SplitMode::On => true,
            SplitMode::Off => false,
            SplitMode::Auto => default.is_array(),
        }
    }
}

/// A raw value handed to the caster.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    /// Untyped text, e.g. a command-line token.
    Text(String),
    /// Already-typed data, e.g. decoded from a file or passed in code.
    Native(Value),
}

impl Input {
    pub fn text(s: impl Into<String>) -> Self {
        Input::Text(s.into())
    }

    /// The literal as a user would recognise it in an error message.
    pub fn describe(&self) -> String {
        match self {
            Input::Text(t) => t.clone(),
            Input::Native(Value::String(s)) => s.clone(),
            Input::Native(v) => v.to_string(),
        }
    }

    /// Turn the input into a value without any declared type.
    pub fn into_value(self) -> Value {
        match self {
            Input::Text(t) => smartcast(&t, false),
            Input::Native(v) => v,
        }
    }
}

impl From<Value> for Input {
    fn from(v: Value) -> Self {
        Input::Native(v)
    }
}

/// Why a value could not be cast. The caller attaches the field path.
#[derive(Debug, Clone, PartialEq)]
pub struct CastFailure {
    pub expected: &'static str,
    pub reason: String,
}

impl CastFailure {
    fn new(ty: ValueType, reason: impl Into<String>) -> Self {
        Self {
            expected: ty.name(),
            reason: reason.into(),
        }
    }
}

/// Best-guess conversion of `text`. Never fails: the fallback is the text.
pub fn smartcast(text: &str, allow_split: bool) -> Value {
    if let Ok(value) = parse_literal(text) {
        return value;
    }
    if allow_split && let Some(pieces) = split_top_level(text) {
        return Value::Array(pieces.into_iter().map(|p| smartcast(p, false)).collect());
    }
    let trimmed = text.trim();
    if trimmed.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    Value::String(text.to_string())
}

/// Split on commas that sit outside quotes and brackets. Returns `None` when
/// there is no such comma. Pieces are trimmed and empty pieces dropped.
fn split_top_level(text: &str) -> Option<Vec<&str>> {
    let mut cuts = Vec::new();
    let mut depth: usize = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '[' | '(' | '{' => depth += 1,
            ']' | ')' | '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => cuts.push(i),
            _ => {}
        }
    }

    if cuts.is_empty() {
        return None;
    }
    let mut pieces = Vec::with_capacity(cuts.len() + 1);
    let mut start = 0;
    for cut in cuts {
        pieces.push(&text[start..cut]);
        start = cut + 1;
    }
    pieces.push(&text[start..]);
    Some(
        pieces
            .into_iter()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect(),
    )
}

/// Cast `input` to `ty`. `null` passes through every type.
pub fn cast(input: &Input, ty: ValueType, allow_split: bool) -> Result<Value, CastFailure> {
    if matches!(input, Input::Native(Value::Null)) {
        return Ok(Value::Null);
    }
    match ty {
        ValueType::Smart => Ok(match input {
            Input::Text(t) => smartcast(t, allow_split),
            Input::Native(v) => v.clone(),
        }),
        ValueType::Str => cast_str(input),
        ValueType::Int => cast_int(input),
        ValueType::Float => cast_float(input),
        ValueType::Bool => cast_bool(input),
        ValueType::List => cast_list(input),
        ValueType::Dict => cast_dict(input),
    }
}

fn cast_str(input: &Input) -> Result<Value, CastFailure> {
    match input {
        Input::Text(t) => Ok(Value::String(t.clone())),
        Input::Native(Value::String(s)) => Ok(Value::String(s.clone())),
        Input::Native(Value::Number(n)) => Ok(Value::String(n.to_string())),
        Input::Native(Value::Bool(b)) => Ok(Value::String(b.to_string())),
        Input::Native(_) => Err(CastFailure::new(
            ValueType::Str,
            "containers cannot be used as strings",
        )),
    }
}

fn parse_int(text: &str) -> Result<Value, CastFailure> {
    let t = text.trim();
    if let Ok(i) = t.parse::<i64>() {
        return Ok(Value::from(i));
    }
    if let Ok(u) = t.parse::<u64>() {
        return Ok(Value::from(u));
    }
    Err(CastFailure::new(ValueType::Int, "invalid integer literal"))
}

fn cast_int(input: &Input) -> Result<Value, CastFailure> {
    match input {
        Input::Text(t) | Input::Native(Value::String(t)) => parse_int(t),
        Input::Native(Value::Number(n)) if n.is_i64() || n.is_u64() => Ok(Value::Number(n.clone())),
        Input::Native(Value::Number(n)) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 => {
                Ok(Value::from(f as i64))
            }
            _ => Err(CastFailure::new(ValueType::Int, "float has a fractional part")),
        },
        Input::Native(Value::Bool(b)) => Ok(Value::from(i64::from(*b))),
        Input::Native(_) => Err(CastFailure::new(ValueType::Int, "not a number")),
    }
}

fn float_value(f: f64) -> Result<Value, CastFailure> {
    Number::from_f64(f)
        .map(Value::Number)
        .ok_or_else(|| CastFailure::new(ValueType::Float, "non-finite float"))
}

fn cast_float(input: &Input) -> Result<Value, CastFailure> {
    match input {
        Input::Text(t) | Input::Native(Value::String(t)) => {
            let f: f64 = t
                .trim()
                .parse()
                .map_err(|_| CastFailure::new(ValueType::Float, "invalid float literal"))?;
            float_value(f)
        }
        Input::Native(Value::Number(n)) => match n.as_f64() {
            Some(f) => float_value(f),
            None => Err(CastFailure::new(ValueType::Float, "number out of range")),
        },
        Input::Native(Value::Bool(b)) => float_value(if *b { 1.0 } else { 0.0 }),
        Input::Native(_) => Err(CastFailure::new(ValueType::Float, "not a number")),
    }
}

fn parse_bool(text: &str) -> Result<Value, CastFailure> {
    let t = text.trim();
    if t.eq_ignore_ascii_case("true") || t == "1" {
        Ok(Value::Bool(true))
    } else if t.eq_ignore_ascii_case("false") || t == "0" {
        Ok(Value::Bool(false))
    } else {
        Err(CastFailure::new(ValueType::Bool, "expected true/false or 1/0"))
    }
}

fn cast_bool(input: &Input) -> Result<Value, CastFailure> {
    match input {
        Input::Text(t) | Input::Native(Value::String(t)) => parse_bool(t),
        Input::Native(Value::Bool(b)) => Ok(Value::Bool(*b)),
        Input::Native(Value::Number(n)) => match n.as_i64() {
            Some(0) => Ok(Value::Bool(false)),
            Some(1) => Ok(Value::Bool(true)),
            _ => Err(CastFailure::new(ValueType::Bool, "only 0 and 1 are booleans")),
        },
        Input::Native(_) => Err(CastFailure::new(ValueType::Bool, "not a boolean")),
    }
}

fn cast_list(input: &Input) -> Result<Value, CastFailure> {
    match input {
        Input::Text(t) if t.trim().is_empty() => Ok(Value::Array(Vec::new())),
        Input::Text(t) => match smartcast(t, true) {
            Value::Array(items) => Ok(Value::Array(items)),
            Value::Object(_) => Err(CastFailure::new(ValueType::List, "got a dict")),
            other => Ok(Value::Array(vec![other])),
        },
        Input::Native(Value::Array(items)) => Ok(Value::Array(items.clone())),
        Input::Native(Value::Object(_)) => Err(CastFailure::new(ValueType::List, "got a dict")),
        Input::Native(other) => Ok(Value::Array(vec![other.clone()])),
    }
}

fn cast_dict(input: &Input) -> Result<Value, CastFailure> {
    match input {
        Input::Text(t) | Input::Native(Value::String(t)) => match parse_literal(t) {
            Ok(Value::Object(map)) => Ok(Value::Object(map)),
            Ok(_) => Err(CastFailure::new(ValueType::Dict, "literal is not a dict")),
            Err(e) => Err(CastFailure::new(ValueType::Dict, e.to_string())),
        },
        Input::Native(Value::Object(map)) => Ok(Value::Object(map.clone())),
        Input::Native(_) => Err(CastFailure::new(ValueType::Dict, "not a dict")),
    }
}
