//! Python literal values
//!
//! Everything that flows through the graph, sits in a widget or is stored in a
//! `.ndz` document is a [`Value`]. The submodules provide a safe literal
//! evaluator ([`parse_literal`]), `repr` rendering and the operator semantics
//! used by operator nodes.

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

pub mod call;
pub mod ops;
pub mod parser;
pub mod repr;

pub use call::{CallArgs, CallError, CallableFn, CallableValue};
pub use parser::{parse_literal, LiteralError};
pub use repr::pformat;

/// An owned Python value
#[derive(Debug, Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    Set(Vec<Value>),
    /// Insertion-ordered mapping
    Dict(Vec<(Value, Value)>),
    Ellipsis,
    Callable(CallableValue),
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    /// Builds a dict from string keys
    pub fn dict<K, I>(items: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Dict(
            items
                .into_iter()
                .map(|(key, value)| (Value::Str(key.into()), value))
                .collect(),
        )
    }

    /// Name of the Python type of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Set(_) => "set",
            Value::Dict(_) => "dict",
            Value::Ellipsis => "ellipsis",
            Value::Callable(_) => "function",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    /// Python truthiness
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Bytes(b) => !b.is_empty(),
            Value::List(items) | Value::Tuple(items) | Value::Set(items) => !items.is_empty(),
            Value::Dict(items) => !items.is_empty(),
            Value::Ellipsis | Value::Callable(_) => true,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer value; bools count as ints like in Python
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// Numeric value as a float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_) | Value::Bool(_))
    }

    /// Items of a mapping; only dicts are mappings
    pub fn as_mapping(&self) -> Option<&[(Value, Value)]> {
        match self {
            Value::Dict(items) => Some(items),
            _ => None,
        }
    }

    /// Items of a finite sequence-like container (list, tuple, set, str chars are excluded)
    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) | Value::Tuple(items) | Value::Set(items) => Some(items),
            _ => None,
        }
    }

    /// Looks up a string key in a dict
    pub fn get_key(&self, key: &str) -> Option<&Value> {
        self.as_mapping()?
            .iter()
            .find(|(k, _)| k.as_str() == Some(key))
            .map(|(_, v)| v)
    }

    /// Whether the value may be used as a dict key or set member
    pub fn is_hashable(&self) -> bool {
        match self {
            Value::None
            | Value::Bool(_)
            | Value::Int(_)
            | Value::Float(_)
            | Value::Str(_)
            | Value::Bytes(_)
            | Value::Ellipsis
            | Value::Callable(_) => true,
            Value::Tuple(items) => items.iter().all(Value::is_hashable),
            Value::List(_) | Value::Set(_) | Value::Dict(_) => false,
        }
    }

    /// Whether `repr` of this value can be read back by the literal evaluator
    /// and yields an equal value
    pub fn is_literal(&self) -> bool {
        match parse_literal(&self.repr()) {
            Ok(parsed) => parsed == *self,
            Err(_) => false,
        }
    }

    /// Iterates the value the way Python's `iter()` would, producing owned items
    pub fn iterate(&self) -> Result<Vec<Value>, CallError> {
        match self {
            Value::List(items) | Value::Tuple(items) | Value::Set(items) => Ok(items.clone()),
            Value::Dict(items) => Ok(items.iter().map(|(k, _)| k.clone()).collect()),
            Value::Str(s) => Ok(s.chars().map(|c| Value::Str(c.to_string())).collect()),
            Value::Bytes(b) => Ok(b.iter().map(|byte| Value::Int(i64::from(*byte))).collect()),
            other => Err(CallError::type_error(format!(
                "'{}' object is not iterable",
                other.type_name()
            ))),
        }
    }
}

fn unordered_eq(a: &[Value], b: &[Value]) -> bool {
    a.len() == b.len() && a.iter().all(|item| b.contains(item))
}

fn mapping_eq(a: &[(Value, Value)], b: &[(Value, Value)]) -> bool {
    a.len() == b.len()
        && a.iter().all(|(key, value)| {
            b.iter()
                .find(|(other_key, _)| other_key == key)
                .is_some_and(|(_, other_value)| other_value == value)
        })
}

/// Structural equality: variants must match, sets and dicts ignore order.
/// Python's looser `==` (e.g. `1 == 1.0 == True`) lives in [`ops::py_eq`].
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) | (Value::Ellipsis, Value::Ellipsis) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::List(a), Value::List(b)) | (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::Set(a), Value::Set(b)) => unordered_eq(a, b),
            (Value::Dict(a), Value::Dict(b)) => mapping_eq(a, b),
            (Value::Callable(a), Value::Callable(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::None, Into::into)
    }
}

/// JSON view of a value: tuples and sets become arrays, dict keys are
/// stringified with `str` semantics for non-string keys
impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::None => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Str(s) => serializer.serialize_str(s),
            Value::Bytes(b) => serializer.serialize_bytes(b),
            Value::List(items) | Value::Tuple(items) | Value::Set(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Dict(items) => {
                let mut map = serializer.serialize_map(Some(items.len()))?;
                for (key, value) in items {
                    match key {
                        Value::Str(s) => map.serialize_entry(s, value)?,
                        other => map.serialize_entry(&other.repr(), value)?,
                    }
                }
                map.end()
            }
            Value::Ellipsis => serializer.serialize_str("..."),
            Value::Callable(c) => serializer.serialize_str(&format!("<function {}>", c.name())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_equality_ignores_dict_order() {
        let a = Value::dict([("a", Value::Int(1)), ("b", Value::Int(2))]);
        let b = Value::dict([("b", Value::Int(2)), ("a", Value::Int(1))]);
        assert_eq!(a, b);
        assert_ne!(Value::Int(1), Value::Float(1.0));
        assert_ne!(Value::Bool(true), Value::Int(1));
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::None.is_truthy());
        assert!(!Value::List(vec![]).is_truthy());
        assert!(Value::str("x").is_truthy());
        assert!(!Value::Float(0.0).is_truthy());
    }

    #[test]
    fn test_is_literal() {
        assert!(Value::Tuple(vec![Value::Int(1)]).is_literal());
        assert!(Value::dict([("k", Value::List(vec![Value::None]))]).is_literal());
        let func = Value::Callable(CallableValue::new("f", |_| Ok(Value::None)));
        assert!(!func.is_literal());
        assert!(!Value::Float(f64::INFINITY).is_literal());
    }

    #[test]
    fn test_json_serialization() {
        let value = Value::dict([
            ("items", Value::Tuple(vec![Value::Int(1), Value::str("a")])),
            ("flag", Value::Bool(false)),
        ]);
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, r#"{"items":[1,"a"],"flag":false}"#);
    }
}
