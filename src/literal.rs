//! Restricted literal evaluator used by the smart caster.
//!
//! Only data is accepted: numbers, quoted strings, `True`/`False`/`None`
//! (and their JSON spellings `true`/`false`/`null`), plus lists, tuples, sets
//! and dicts built from those. There are no names, calls, operators or
//! attribute lookups in the grammar, so no input can cause code to run.
//!
//! Tuples and sets are returned as arrays. A parenthesized single value
//! without a trailing comma is just that value, as in `(3)`.

use serde_json::{Map, Number, Value};

/// Maximum bracket nesting before the parser gives up.
const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason} at offset {offset}")]
pub struct LiteralError {
    pub offset: usize,
    pub reason: &'static str,
}

/// Parse `text` as a single literal. Surrounding whitespace is allowed,
/// anything else after the literal is an error.
pub fn parse_literal(text: &str) -> Result<Value, LiteralError> {
    let mut parser = Parser {
        chars: text.chars().collect(),
        pos: 0,
        depth: 0,
    };
    let value = parser.value()?;
    parser.skip_ws();
    if parser.pos != parser.chars.len() {
        return Err(parser.err("trailing characters"));
    }
    Ok(value)
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
    depth: usize,
}

type Parsed<T> = Result<T, LiteralError>;

impl Parser {
    fn err(&self, reason: &'static str) -> LiteralError {
        LiteralError {
            offset: self.pos,
            reason,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn value(&mut self) -> Parsed<Value> {
        self.skip_ws();
        match self.peek() {
            None => Err(self.err("unexpected end of input")),
            Some('[') => self.nested(|p| {
                p.pos += 1;
                let (items, _) = p.items(']')?;
                Ok(Value::Array(items))
            }),
            Some('(') => self.nested(|p| {
                p.pos += 1;
                let (mut items, saw_comma) = p.items(')')?;
                if items.len() == 1 && !saw_comma {
                    Ok(items.remove(0))
                } else {
                    Ok(Value::Array(items))
                }
            }),
            Some('{') => self.nested(|p| {
                p.pos += 1;
                p.brace()
            }),
            Some('"') | Some('\'') => self.string().map(Value::String),
            Some(c) if c.is_ascii_digit() || matches!(c, '.' | '+' | '-') => self.number(),
            Some(c) if c.is_alphabetic() || c == '_' => self.keyword(),
            Some(_) => Err(self.err("unexpected character")),
        }
    }

    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Parsed<T>) -> Parsed<T> {
        if self.depth >= MAX_DEPTH {
            return Err(self.err("nesting too deep"));
        }
        self.depth += 1;
        let out = f(self);
        self.depth -= 1;
        out
    }

    /// Comma separated values up to `close`. Returns whether any comma was seen.
    fn items(&mut self, close: char) -> Parsed<(Vec<Value>, bool)> {
        let mut items = Vec::new();
        let mut saw_comma = false;
        loop {
            self.skip_ws();
            if self.eat(close) {
                return Ok((items, saw_comma));
            }
            items.push(self.value()?);
            self.skip_ws();
            if self.eat(',') {
                saw_comma = true;
                continue;
            }
            if self.eat(close) {
                return Ok((items, saw_comma));
            }
            return Err(self.err("expected ',' or closing bracket"));
        }
    }

    /// Either a dict (`{k: v, ...}`) or a set (`{a, b}`); `{}` is an empty dict.
    fn brace(&mut self) -> Parsed<Value> {
        self.skip_ws();
        if self.eat('}') {
            return Ok(Value::Object(Map::new()));
        }
        let first = self.value()?;
        self.skip_ws();
        if self.eat(':') {
            let mut map = Map::new();
            let mut key = first;
            loop {
                let value = self.value()?;
                map.insert(self.dict_key(key)?, value);
                self.skip_ws();
                if self.eat('}') {
                    return Ok(Value::Object(map));
                }
                if !self.eat(',') {
                    return Err(self.err("expected ',' or '}'"));
                }
                self.skip_ws();
                if self.eat('}') {
                    return Ok(Value::Object(map));
                }
                key = self.value()?;
                self.skip_ws();
                if !self.eat(':') {
                    return Err(self.err("expected ':'"));
                }
            }
        }

        let mut items = vec![first];
        loop {
            self.skip_ws();
            if self.eat('}') {
                break;
            }
            if !self.eat(',') {
                return Err(self.err("expected ',' or '}'"));
            }
            self.skip_ws();
            if self.eat('}') {
                break;
            }
            let item = self.value()?;
            if !items.contains(&item) {
                items.push(item);
            }
        }
        Ok(Value::Array(items))
    }

    fn dict_key(&self, key: Value) -> Parsed<String> {
        match key {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Null => Ok("null".to_string()),
            Value::Array(_) | Value::Object(_) => Err(self.err("unhashable dict key")),
        }
    }

    fn string(&mut self) -> Parsed<String> {
        let quote = self.bump().ok_or_else(|| self.err("expected quote"))?;
        let mut out = String::new();
        loop {
            let c = self.bump().ok_or_else(|| self.err("unterminated string"))?;
            if c == quote {
                return Ok(out);
            }
            match c {
                '\n' => return Err(self.err("unterminated string")),
                '\\' => {
                    let esc = self.bump().ok_or_else(|| self.err("unterminated string"))?;
                    match esc {
                        'n' => out.push('\n'),
                        't' => out.push('\t'),
                        'r' => out.push('\r'),
                        '0' => out.push('\0'),
                        '\\' | '\'' | '"' => out.push(esc),
                        '\n' => {}
                        'x' => out.push(self.hex_escape(2)?),
                        'u' => out.push(self.hex_escape(4)?),
                        'U' => out.push(self.hex_escape(8)?),
                        other => {
                            out.push('\\');
                            out.push(other);
                        }
                    }
                }
                other => out.push(other),
            }
        }
    }

    fn hex_escape(&mut self, len: usize) -> Parsed<char> {
        let mut code = 0u32;
        for _ in 0..len {
            let digit = self
                .bump()
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| self.err("invalid escape"))?;
            code = code * 16 + digit;
        }
        char::from_u32(code).ok_or_else(|| self.err("invalid code point"))
    }

    fn keyword(&mut self) -> Parsed<Value> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        let word: String = self.chars[start..self.pos].iter().collect();
        match word.as_str() {
            "True" | "true" => Ok(Value::Bool(true)),
            "False" | "false" => Ok(Value::Bool(false)),
            "None" | "null" => Ok(Value::Null),
            _ => {
                self.pos = start;
                Err(self.err("names are not literals"))
            }
        }
    }

    fn digits(&mut self, radix: u32) -> usize {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_digit(radix)) {
            self.pos += 1;
        }
        self.pos - start
    }

    fn number(&mut self) -> Parsed<Value> {
        let start = self.pos;
        let negative = match self.peek() {
            Some('-') => {
                self.pos += 1;
                true
            }
            Some('+') => {
                self.pos += 1;
                false
            }
            _ => false,
        };

        if self.peek() == Some('0') {
            let radix = match self.peek_at(1) {
                Some('x' | 'X') => Some(16),
                Some('o' | 'O') => Some(8),
                Some('b' | 'B') => Some(2),
                _ => None,
            };
            if let Some(radix) = radix {
                self.pos += 2;
                let digits_start = self.pos;
                if self.digits(radix) == 0 {
                    return Err(self.err("missing digits after radix prefix"));
                }
                let digits: String = self.chars[digits_start..self.pos].iter().collect();
                let magnitude = u64::from_str_radix(&digits, radix)
                    .map_err(|_| self.err("integer out of range"))?;
                return self.integer(negative, magnitude);
            }
        }

        let int_start = self.pos;
        let int_digits = self.digits(10);
        let mut is_float = false;
        let mut frac_digits = 0;
        if self.peek() == Some('.') {
            is_float = true;
            self.pos += 1;
            frac_digits = self.digits(10);
        }
        if int_digits == 0 && frac_digits == 0 {
            return Err(self.err("expected digits"));
        }
        if int_digits > 1 && self.chars[int_start] == '0' {
            return Err(self.err("leading zeros in decimal literal"));
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let exp_digit = match self.peek_at(1) {
                Some('+' | '-') => self.peek_at(2),
                other => other,
            };
            if matches!(exp_digit, Some(c) if c.is_ascii_digit()) {
                is_float = true;
                self.pos += 1;
                if matches!(self.peek(), Some('+' | '-')) {
                    self.pos += 1;
                }
                self.digits(10);
            }
        }

        let text: String = self.chars[start..self.pos].iter().collect();
        if is_float {
            let f: f64 = text.parse().map_err(|_| self.err("invalid float"))?;
            return Number::from_f64(f)
                .map(Value::Number)
                .ok_or_else(|| self.err("float out of range"));
        }

        let digits: String = self.chars[int_start..self.pos].iter().collect();
        let magnitude: u64 = digits
            .parse()
            .map_err(|_| self.err("integer out of range"))?;
        self.integer(negative, magnitude)
    }

    fn integer(&self, negative: bool, magnitude: u64) -> Parsed<Value> {
        if !negative {
            return Ok(Value::from(magnitude));
        }
        if magnitude > i64::MAX as u64 + 1 {
            return Err(self.err("integer out of range"));
        }
        Ok(Value::from((-(magnitude as i128)) as i64))
    }
}
