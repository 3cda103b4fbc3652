//! `repr` rendering and canonical pretty formatting

use std::fmt::Write as _;

use super::Value;

/// Default line width used by [`pformat`]
pub const PFORMAT_WIDTH: usize = 79;

const INDENT: &str = "    ";

impl Value {
    /// Python `repr` of the value
    pub fn repr(&self) -> String {
        let mut out = String::new();
        write_repr(self, &mut out, false);
        out
    }

    /// `repr` with dict keys and set members sorted, so equal values always
    /// render identically
    pub fn canonical_repr(&self) -> String {
        let mut out = String::new();
        write_repr(self, &mut out, true);
        out
    }

    /// Python `str` of the value; only strings differ from `repr`
    pub fn to_py_str(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            other => other.repr(),
        }
    }
}

fn sorted_items(items: &[Value]) -> Vec<&Value> {
    let mut sorted: Vec<&Value> = items.iter().collect();
    sorted.sort_by_cached_key(|v| v.canonical_repr());
    sorted
}

fn sorted_pairs(items: &[(Value, Value)]) -> Vec<&(Value, Value)> {
    let mut sorted: Vec<&(Value, Value)> = items.iter().collect();
    sorted.sort_by_cached_key(|(k, _)| k.canonical_repr());
    sorted
}

fn write_repr(value: &Value, out: &mut String, canonical: bool) {
    match value {
        Value::None => out.push_str("None"),
        Value::Bool(true) => out.push_str("True"),
        Value::Bool(false) => out.push_str("False"),
        Value::Int(i) => {
            let _ = write!(out, "{}", i);
        }
        Value::Float(f) => out.push_str(&float_repr(*f)),
        Value::Str(s) => out.push_str(&str_repr(s)),
        Value::Bytes(b) => out.push_str(&bytes_repr(b)),
        Value::List(items) => {
            out.push('[');
            write_seq(items.iter(), out, canonical);
            out.push(']');
        }
        Value::Tuple(items) => {
            out.push('(');
            write_seq(items.iter(), out, canonical);
            if items.len() == 1 {
                out.push(',');
            }
            out.push(')');
        }
        Value::Set(items) if items.is_empty() => out.push_str("set()"),
        Value::Set(items) => {
            out.push('{');
            if canonical {
                write_seq(sorted_items(items).into_iter(), out, canonical);
            } else {
                write_seq(items.iter(), out, canonical);
            }
            out.push('}');
        }
        Value::Dict(items) => {
            out.push('{');
            let pairs: Vec<&(Value, Value)> = if canonical {
                sorted_pairs(items)
            } else {
                items.iter().collect()
            };
            for (i, (key, val)) in pairs.into_iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_repr(key, out, canonical);
                out.push_str(": ");
                write_repr(val, out, canonical);
            }
            out.push('}');
        }
        Value::Ellipsis => out.push_str("Ellipsis"),
        Value::Callable(c) => {
            let _ = write!(out, "<function {}>", c.name());
        }
    }
}

fn write_seq<'a>(items: impl Iterator<Item = &'a Value>, out: &mut String, canonical: bool) {
    for (i, item) in items.enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_repr(item, out, canonical);
    }
}

/// Python float repr: shortest round-trip digits, positional notation for
/// exponents in `[-4, 16)`, scientific otherwise
pub fn float_repr(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if f == 0.0 {
        return if f.is_sign_negative() { "-0.0" } else { "0.0" }.to_string();
    }

    // `{:e}` yields the shortest round-trip mantissa, e.g. "1.2345e6"
    let sci = format!("{:e}", f);
    let (mantissa, exponent) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };
    let negative = mantissa.starts_with('-');
    let digits: String = mantissa.chars().filter(|c| c.is_ascii_digit()).collect();
    let sign = if negative { "-" } else { "" };

    if (-4..16).contains(&exponent) {
        let point = exponent + 1;
        let body = if point <= 0 {
            format!("0.{}{}", "0".repeat((-point) as usize), digits)
        } else if (point as usize) >= digits.len() {
            format!("{}{}.0", digits, "0".repeat(point as usize - digits.len()))
        } else {
            let (int_part, frac_part) = digits.split_at(point as usize);
            format!("{}.{}", int_part, frac_part)
        };
        format!("{}{}", sign, body)
    } else {
        let (first, rest) = digits.split_at(1);
        let mantissa = if rest.is_empty() {
            first.to_string()
        } else {
            format!("{}.{}", first, rest)
        };
        let exp_sign = if exponent < 0 { '-' } else { '+' };
        format!("{}{}e{}{:02}", sign, mantissa, exp_sign, exponent.abs())
    }
}

fn str_repr(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_control() => {
                let code = c as u32;
                if code < 0x100 {
                    let _ = write!(out, "\\x{:02x}", code);
                } else if code < 0x10000 {
                    let _ = write!(out, "\\u{:04x}", code);
                } else {
                    let _ = write!(out, "\\U{:08x}", code);
                }
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

fn bytes_repr(bytes: &[u8]) -> String {
    let quote = if bytes.contains(&b'\'') && !bytes.contains(&b'"') {
        b'"'
    } else {
        b'\''
    };
    let mut out = String::from("b");
    out.push(quote as char);
    for &b in bytes {
        match b {
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            b if b == quote => {
                out.push('\\');
                out.push(b as char);
            }
            0x20..=0x7e => out.push(b as char),
            b => {
                let _ = write!(out, "\\x{:02x}", b);
            }
        }
    }
    out.push(quote as char);
    out
}

/// Canonical multi-line rendering used for documents
///
/// Containers whose canonical repr fits in the remaining width stay on one
/// line; others are broken one item per line with a trailing comma. Dict keys
/// and set members are sorted.
pub fn pformat(value: &Value) -> String {
    let mut out = String::new();
    write_pretty(value, &mut out, 0, PFORMAT_WIDTH);
    out
}

fn write_pretty(value: &Value, out: &mut String, level: usize, width: usize) {
    let inline = value.canonical_repr();
    let available = width.saturating_sub(level * INDENT.len());
    if inline.len() <= available {
        out.push_str(&inline);
        return;
    }

    let inner = INDENT.repeat(level + 1);
    let outer = INDENT.repeat(level);
    match value {
        Value::List(items) | Value::Tuple(items) if !items.is_empty() => {
            let (open, close) = if matches!(value, Value::List(_)) {
                ('[', ']')
            } else {
                ('(', ')')
            };
            out.push(open);
            out.push('\n');
            for item in items {
                out.push_str(&inner);
                write_pretty(item, out, level + 1, width);
                out.push_str(",\n");
            }
            out.push_str(&outer);
            out.push(close);
        }
        Value::Set(items) if !items.is_empty() => {
            out.push_str("{\n");
            for item in sorted_items(items) {
                out.push_str(&inner);
                write_pretty(item, out, level + 1, width);
                out.push_str(",\n");
            }
            out.push_str(&outer);
            out.push('}');
        }
        Value::Dict(items) if !items.is_empty() => {
            out.push_str("{\n");
            for (key, val) in sorted_pairs(items) {
                out.push_str(&inner);
                out.push_str(&key.canonical_repr());
                out.push_str(": ");
                write_pretty(val, out, level + 1, width);
                out.push_str(",\n");
            }
            out.push_str(&outer);
            out.push('}');
        }
        _ => out.push_str(&inline),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::literal::parse_literal;

    #[test]
    fn test_float_repr_matches_python() {
        assert_eq!(float_repr(1.0), "1.0");
        assert_eq!(float_repr(0.1), "0.1");
        assert_eq!(float_repr(-2.5), "-2.5");
        assert_eq!(float_repr(1e16), "1e+16");
        assert_eq!(float_repr(1.5e-7), "1.5e-07");
        assert_eq!(float_repr(0.0001), "0.0001");
        assert_eq!(float_repr(123456.789), "123456.789");
        assert_eq!(float_repr(1e15), "1000000000000000.0");
    }

    #[test]
    fn test_str_repr_quote_choice() {
        assert_eq!(Value::str("hi").repr(), "'hi'");
        assert_eq!(Value::str("it's").repr(), "\"it's\"");
        assert_eq!(Value::str("a'b\"c").repr(), "'a\\'b\"c'");
        assert_eq!(Value::str("tab\there").repr(), "'tab\\there'");
        assert_eq!(Value::str("\u{1}").repr(), "'\\x01'");
    }

    #[test]
    fn test_container_repr() {
        assert_eq!(Value::Tuple(vec![Value::Int(1)]).repr(), "(1,)");
        assert_eq!(Value::Tuple(vec![]).repr(), "()");
        assert_eq!(Value::Set(vec![]).repr(), "set()");
        assert_eq!(
            Value::dict([("b", Value::Int(2)), ("a", Value::Int(1))]).repr(),
            "{'b': 2, 'a': 1}"
        );
        assert_eq!(
            Value::dict([("b", Value::Int(2)), ("a", Value::Int(1))]).canonical_repr(),
            "{'a': 1, 'b': 2}"
        );
        assert_eq!(Value::Bytes(b"a\x00'".to_vec()).repr(), "b\"a\\x00'\"");
    }

    #[test]
    fn test_repr_reads_back() {
        let samples = [
            "[1, -2.5, 'x', b'y', None, True, (), (1,), {1, 2}, {'k': [3]}]",
            "{'nested': {'deep': [{'deeper': ('a', 'b')}]}}",
            "'quote \\' and \" both'",
        ];
        for sample in samples {
            let value = parse_literal(sample).unwrap();
            assert_eq!(parse_literal(&value.repr()).unwrap(), value);
        }
    }

    #[test]
    fn test_pformat_breaks_long_containers() {
        let long_list = Value::List((0..40i64).map(Value::Int).collect());
        let doc = Value::dict([("items", long_list.clone()), ("name", Value::str("x"))]);
        let text = pformat(&doc);
        assert!(text.starts_with("{\n    'items': [\n        0,\n"));
        assert!(text.ends_with("    'name': 'x',\n}"));
        assert_eq!(parse_literal(&text).unwrap(), doc);
    }
}
