//! Safe evaluator for Python literal syntax
//!
//! Accepts exactly what `ast.literal_eval` accepts for the value types in
//! [`Value`]: numbers (with a leading sign), strings and bytes (all prefixes
//! and quote styles, implicit concatenation), `True`/`False`/`None`, `...`,
//! lists, tuples, sets, `set()` and dicts. Names, calls and operators are
//! rejected, so reading a document never executes anything.
//!
//! ## Grammar
//!
//! ```text
//! literal   ::= signed | string+ | bytes+ | name | '...' | list | tuple | dict | set
//! signed    ::= ('-' | '+')* number
//! list      ::= '[' ( literal ( ',' literal )* ','? )? ']'
//! tuple     ::= '(' ( literal ',' ( literal ( ',' literal )* ','? )? )? ')'
//! dict      ::= '{' ( literal ':' literal ( ',' literal ':' literal )* ','? )? '}'
//! set       ::= '{' literal ( ',' literal )* ','? '}' | 'set' '(' ')'
//! ```

use super::Value;
use crate::constants::literal::MAX_NESTING;

/// Error produced when text is not a valid literal
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid literal at position {pos}: {message}")]
pub struct LiteralError {
    /// Character offset in the input
    pub pos: usize,
    pub message: String,
}

/// Parses a complete literal; trailing non-whitespace is an error
pub fn parse_literal(text: &str) -> Result<Value, LiteralError> {
    let mut parser = Parser::new(text);
    let value = parser.parse_value()?;
    parser.skip_ws();
    if let Some(ch) = parser.peek() {
        return Err(parser.error(format!("unexpected trailing character '{}'", ch)));
    }
    Ok(value)
}

/// Recursive descent parser, single character lookahead
struct Parser {
    input: Vec<char>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            pos: 0,
            depth: 0,
        }
    }

    fn error(&self, message: impl Into<String>) -> LiteralError {
        LiteralError {
            pos: self.pos,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.input.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn starts_with(&self, s: &str) -> bool {
        s.chars()
            .enumerate()
            .all(|(i, c)| self.peek_at(i) == Some(c))
    }

    /// Skips whitespace, comments and explicit line continuations
    fn skip_ws(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => self.pos += 1,
                Some('#') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                Some('\\') if matches!(self.peek_at(1), Some('\n')) => self.pos += 2,
                _ => break,
            }
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), LiteralError> {
        self.skip_ws();
        match self.advance() {
            Some(c) if c == expected => Ok(()),
            Some(c) => {
                self.pos -= 1;
                Err(self.error(format!("expected '{}', found '{}'", expected, c)))
            }
            None => Err(self.error(format!("expected '{}', found end of input", expected))),
        }
    }

    /// Parses one container a level deeper, bounded by [`MAX_NESTING`]
    fn nested(&mut self, parse: fn(&mut Self) -> Result<Value, LiteralError>) -> Result<Value, LiteralError> {
        if self.depth >= MAX_NESTING {
            return Err(self.error(format!("containers nested deeper than {} levels", MAX_NESTING)));
        }
        self.depth += 1;
        let value = parse(self);
        self.depth -= 1;
        value
    }

    fn parse_value(&mut self) -> Result<Value, LiteralError> {
        self.skip_ws();
        match self.peek() {
            None => Err(self.error("unexpected end of input")),
            Some('[') => self.nested(Self::parse_list),
            Some('(') => self.nested(Self::parse_tuple),
            Some('{') => self.nested(Self::parse_brace),
            Some('-') | Some('+') => self.parse_signed(),
            Some(c) if c.is_ascii_digit() => self.parse_number(),
            Some('.') if self.starts_with("...") => {
                self.pos += 3;
                Ok(Value::Ellipsis)
            }
            Some('.') if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => {
                self.parse_number()
            }
            Some('\'') | Some('"') => self.parse_strings(),
            Some(c) if c.is_alphabetic() || c == '_' => self.parse_name_or_prefixed(),
            Some(c) => Err(self.error(format!("unexpected character '{}'", c))),
        }
    }

    fn parse_signed(&mut self) -> Result<Value, LiteralError> {
        let mut negative = false;
        while let Some(c) = self.peek() {
            match c {
                '-' => negative = !negative,
                '+' => {}
                _ => break,
            }
            self.pos += 1;
            self.skip_ws();
        }
        let start = self.pos;
        let value = match self.peek() {
            Some(c) if c.is_ascii_digit() || c == '.' => self.parse_number()?,
            _ => return Err(self.error("unary sign must be followed by a number")),
        };
        if !negative {
            return Ok(value);
        }
        match value {
            Value::Int(i) => i.checked_neg().map(Value::Int).ok_or(LiteralError {
                pos: start,
                message: "integer out of range".to_string(),
            }),
            Value::Float(f) => Ok(Value::Float(-f)),
            _ => Err(self.error("unary sign must be followed by a number")),
        }
    }

    fn parse_number(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        if self.peek() == Some('0') {
            let radix = match self.peek_at(1) {
                Some('x') | Some('X') => Some(16),
                Some('o') | Some('O') => Some(8),
                Some('b') | Some('B') => Some(2),
                _ => None,
            };
            if let Some(radix) = radix {
                self.pos += 2;
                let digits = self.take_digits(|c| c.is_digit(radix));
                if digits.is_empty() {
                    return Err(self.error("missing digits after radix prefix"));
                }
                return i64::from_str_radix(&digits, radix)
                    .map(Value::Int)
                    .map_err(|_| LiteralError {
                        pos: start,
                        message: "integer out of range".to_string(),
                    });
            }
        }

        let mut text = self.take_digits(|c| c.is_ascii_digit());
        let mut is_float = false;
        if self.peek() == Some('.') && self.peek_at(1) != Some('.') {
            is_float = true;
            self.pos += 1;
            text.push('.');
            text.push_str(&self.take_digits(|c| c.is_ascii_digit()));
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            let sign_offset = usize::from(matches!(self.peek_at(1), Some('+') | Some('-')));
            if self
                .peek_at(1 + sign_offset)
                .is_some_and(|c| c.is_ascii_digit())
            {
                is_float = true;
                text.push('e');
                self.pos += 1;
                if sign_offset == 1 {
                    if let Some(sign) = self.advance() {
                        text.push(sign);
                    }
                }
                text.push_str(&self.take_digits(|c| c.is_ascii_digit()));
            }
        }
        if matches!(self.peek(), Some('j') | Some('J')) {
            return Err(self.error("complex numbers are not supported"));
        }

        if is_float {
            text.parse::<f64>().map(Value::Float).map_err(|_| LiteralError {
                pos: start,
                message: format!("invalid float '{}'", text),
            })
        } else {
            if text.len() > 1 && text.starts_with('0') && text.chars().any(|c| c != '0') {
                return Err(LiteralError {
                    pos: start,
                    message: "leading zeros in decimal integer literals are not permitted"
                        .to_string(),
                });
            }
            text.parse::<i64>().map(Value::Int).map_err(|_| LiteralError {
                pos: start,
                message: "integer out of range".to_string(),
            })
        }
    }

    /// Collects digits accepted by `accept`, dropping single underscores between them
    fn take_digits(&mut self, accept: impl Fn(char) -> bool) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if accept(c) {
                out.push(c);
                self.pos += 1;
            } else if c == '_' && !out.is_empty() && self.peek_at(1).is_some_and(&accept) {
                self.pos += 1;
            } else {
                break;
            }
        }
        out
    }

    fn parse_name_or_prefixed(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                name.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }

        if matches!(self.peek(), Some('\'') | Some('"')) && is_string_prefix(&name) {
            self.pos = start;
            return self.parse_strings();
        }

        match name.as_str() {
            "True" => Ok(Value::Bool(true)),
            "False" => Ok(Value::Bool(false)),
            "None" => Ok(Value::None),
            "set" => {
                self.expect('(')?;
                self.expect(')')?;
                Ok(Value::Set(Vec::new()))
            }
            _ => Err(LiteralError {
                pos: start,
                message: format!("name '{}' is not a literal", name),
            }),
        }
    }

    /// Parses one or more adjacent string (or bytes) literals, concatenating them
    fn parse_strings(&mut self) -> Result<Value, LiteralError> {
        let mut text = String::new();
        let mut bytes: Vec<u8> = Vec::new();
        let mut kind: Option<bool> = None;

        loop {
            self.skip_ws();
            let start = self.pos;
            let mut prefix = String::new();
            while let Some(c) = self.peek() {
                if c.is_ascii_alphabetic() && prefix.len() < 2 {
                    prefix.push(c);
                    self.pos += 1;
                } else {
                    break;
                }
            }
            if !matches!(self.peek(), Some('\'') | Some('"')) || !is_string_prefix(&prefix) {
                self.pos = start;
                if kind.is_none() {
                    return Err(self.error("expected a string literal"));
                }
                break;
            }

            let lower = prefix.to_ascii_lowercase();
            let is_bytes = lower.contains('b');
            let raw = lower.contains('r');
            match kind {
                Some(previous) if previous != is_bytes => {
                    return Err(self.error("cannot mix bytes and nonbytes literals"));
                }
                _ => kind = Some(is_bytes),
            }

            let body = self.parse_quoted(raw, is_bytes)?;
            if is_bytes {
                for c in body.chars() {
                    bytes.push(c as u32 as u8);
                }
            } else {
                text.push_str(&body);
            }
        }

        if kind == Some(true) {
            Ok(Value::Bytes(bytes))
        } else {
            Ok(Value::Str(text))
        }
    }

    /// Parses a quoted body; for bytes every char of the result is < 256
    fn parse_quoted(&mut self, raw: bool, is_bytes: bool) -> Result<String, LiteralError> {
        let quote = match self.advance() {
            Some(q) => q,
            None => return Err(self.error("expected a quote")),
        };
        let triple = self.peek() == Some(quote) && self.peek_at(1) == Some(quote);
        if triple {
            self.pos += 2;
        }

        let mut out = String::new();
        loop {
            let c = match self.advance() {
                Some(c) => c,
                None => return Err(self.error("unterminated string literal")),
            };
            if c == quote {
                if !triple {
                    break;
                }
                if self.peek() == Some(quote) && self.peek_at(1) == Some(quote) {
                    self.pos += 2;
                    break;
                }
                out.push(c);
                continue;
            }
            if c == '\n' && !triple {
                return Err(self.error("unterminated string literal"));
            }
            if is_bytes && !c.is_ascii() {
                return Err(self.error("bytes can only contain ASCII literal characters"));
            }
            if c != '\\' {
                out.push(c);
                continue;
            }

            let escaped = match self.advance() {
                Some(e) => e,
                None => return Err(self.error("unterminated string literal")),
            };
            if raw {
                out.push('\\');
                out.push(escaped);
                continue;
            }
            match escaped {
                '\n' => {}
                '\\' => out.push('\\'),
                '\'' => out.push('\''),
                '"' => out.push('"'),
                'a' => out.push('\u{07}'),
                'b' => out.push('\u{08}'),
                'f' => out.push('\u{0c}'),
                'n' => out.push('\n'),
                'r' => out.push('\r'),
                't' => out.push('\t'),
                'v' => out.push('\u{0b}'),
                'x' => out.push(self.parse_hex_escape(2)?),
                'u' if !is_bytes => out.push(self.parse_hex_escape(4)?),
                'U' if !is_bytes => out.push(self.parse_hex_escape(8)?),
                'N' if !is_bytes => {
                    return Err(self.error("named unicode escapes are not supported"));
                }
                '0'..='7' => {
                    let mut code = escaped.to_digit(8).unwrap_or(0);
                    for _ in 0..2 {
                        match self.peek().and_then(|d| d.to_digit(8)) {
                            Some(d) => {
                                code = code * 8 + d;
                                self.pos += 1;
                            }
                            None => break,
                        }
                    }
                    let ch = if is_bytes { code & 0xff } else { code };
                    out.push(char::from_u32(ch).ok_or_else(|| self.error("invalid octal escape"))?);
                }
                other => {
                    out.push('\\');
                    out.push(other);
                }
            }
        }
        Ok(out)
    }

    fn parse_hex_escape(&mut self, digits: usize) -> Result<char, LiteralError> {
        let mut code = 0u32;
        for _ in 0..digits {
            let d = self
                .advance()
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| self.error("truncated hex escape"))?;
            code = code * 16 + d;
        }
        char::from_u32(code).ok_or_else(|| self.error("illegal unicode character"))
    }

    /// Parses comma separated literals up to `close`, returning the items and
    /// whether a separating comma was seen
    fn parse_items(&mut self, close: char) -> Result<(Vec<Value>, bool), LiteralError> {
        let mut items = Vec::new();
        let mut saw_comma = false;
        loop {
            self.skip_ws();
            if self.peek() == Some(close) {
                self.pos += 1;
                return Ok((items, saw_comma));
            }
            items.push(self.parse_value()?);
            self.skip_ws();
            match self.peek() {
                Some(',') => {
                    saw_comma = true;
                    self.pos += 1;
                }
                Some(c) if c == close => {
                    self.pos += 1;
                    return Ok((items, saw_comma));
                }
                Some(c) => {
                    return Err(self.error(format!("expected ',' or '{}', found '{}'", close, c)))
                }
                None => return Err(self.error(format!("expected '{}'", close))),
            }
        }
    }

    fn parse_list(&mut self) -> Result<Value, LiteralError> {
        self.expect('[')?;
        let (items, _) = self.parse_items(']')?;
        Ok(Value::List(items))
    }

    fn parse_tuple(&mut self) -> Result<Value, LiteralError> {
        self.expect('(')?;
        let (mut items, saw_comma) = self.parse_items(')')?;
        if items.len() == 1 && !saw_comma {
            // parenthesized expression, not a tuple
            return Ok(items.remove(0));
        }
        Ok(Value::Tuple(items))
    }

    fn parse_brace(&mut self) -> Result<Value, LiteralError> {
        self.expect('{')?;
        self.skip_ws();
        if self.peek() == Some('}') {
            self.pos += 1;
            return Ok(Value::Dict(Vec::new()));
        }

        let first_pos = self.pos;
        let first = self.parse_value()?;
        self.skip_ws();
        if self.peek() != Some(':') {
            // set display
            let mut items = vec![first];
            if self.peek() == Some(',') {
                self.pos += 1;
                let (rest, _) = self.parse_items('}')?;
                items.extend(rest);
            } else {
                self.expect('}')?;
            }
            let mut unique: Vec<Value> = Vec::with_capacity(items.len());
            for item in items {
                if !item.is_hashable() {
                    return Err(LiteralError {
                        pos: first_pos,
                        message: format!("unhashable type: '{}'", item.type_name()),
                    });
                }
                if !unique.contains(&item) {
                    unique.push(item);
                }
            }
            return Ok(Value::Set(unique));
        }

        let mut pairs: Vec<(Value, Value)> = Vec::new();
        let mut key = first;
        let mut key_pos = first_pos;
        loop {
            if !key.is_hashable() {
                return Err(LiteralError {
                    pos: key_pos,
                    message: format!("unhashable type: '{}'", key.type_name()),
                });
            }
            self.expect(':')?;
            let value = self.parse_value()?;
            // later duplicates win, keeping the first position like Python
            match pairs.iter_mut().find(|(k, _)| *k == key) {
                Some(existing) => existing.1 = value,
                None => pairs.push((key, value)),
            }
            self.skip_ws();
            match self.advance() {
                Some(',') => {
                    self.skip_ws();
                    if self.peek() == Some('}') {
                        self.pos += 1;
                        break;
                    }
                }
                Some('}') => break,
                Some(c) => {
                    self.pos -= 1;
                    return Err(self.error(format!("expected ',' or '}}', found '{}'", c)));
                }
                None => return Err(self.error("expected '}'")),
            }
            key_pos = self.pos;
            key = self.parse_value()?;
        }
        Ok(Value::Dict(pairs))
    }
}

fn is_string_prefix(prefix: &str) -> bool {
    matches!(
        prefix.to_ascii_lowercase().as_str(),
        "" | "r" | "u" | "b" | "br" | "rb"
    )
}
