//! Python operator semantics over [`Value`]

use std::cmp::Ordering;

use super::{CallError, Value};
use crate::constants::literal::REPEAT_LIMIT;

/// Binary operators available to operator nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    TrueDiv,
    FloorDiv,
    Mod,
    Pow,
    MatMul,
    LShift,
    RShift,
    BitAnd,
    BitOr,
    BitXor,
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Is,
    IsNot,
    In,
    NotIn,
    GetItem,
}

/// Unary operators available to operator nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Pos,
    Invert,
    Not,
}

fn unsupported(symbol: &str, a: &Value, b: &Value) -> CallError {
    CallError::type_error(format!(
        "unsupported operand type(s) for {}: '{}' and '{}'",
        symbol,
        a.type_name(),
        b.type_name()
    ))
}

enum Num {
    Int(i64),
    Float(f64),
}

fn num(value: &Value) -> Option<Num> {
    match value {
        Value::Int(i) => Some(Num::Int(*i)),
        Value::Bool(b) => Some(Num::Int(i64::from(*b))),
        Value::Float(f) => Some(Num::Float(*f)),
        _ => None,
    }
}

fn overflow() -> CallError {
    CallError::new("OverflowError", "integer result out of range")
}

/// Integer arithmetic with float promotion
fn arith(
    a: &Value,
    b: &Value,
    int_op: impl Fn(i64, i64) -> Result<Value, CallError>,
    float_op: impl Fn(f64, f64) -> Result<Value, CallError>,
) -> Option<Result<Value, CallError>> {
    let result = match (num(a)?, num(b)?) {
        (Num::Int(x), Num::Int(y)) => int_op(x, y),
        (Num::Int(x), Num::Float(y)) => float_op(x as f64, y),
        (Num::Float(x), Num::Int(y)) => float_op(x, y as f64),
        (Num::Float(x), Num::Float(y)) => float_op(x, y),
    };
    Some(result)
}

/// Repetition count for a sequence of `len` elements, bounded by [`REPEAT_LIMIT`]
fn repeat_count(len: usize, times: i64) -> Result<usize, CallError> {
    if len == 0 || times <= 0 {
        return Ok(0);
    }
    let times = usize::try_from(times).map_err(|_| overflow())?;
    let total = len.checked_mul(times).ok_or_else(overflow)?;
    if total > REPEAT_LIMIT {
        return Err(CallError::new("MemoryError", "repeated sequence is too large"));
    }
    Ok(times)
}

fn repeat(items: &[Value], times: i64) -> Result<Vec<Value>, CallError> {
    let times = repeat_count(items.len(), times)?;
    let mut out = Vec::with_capacity(items.len() * times);
    for _ in 0..times {
        out.extend(items.iter().cloned());
    }
    Ok(out)
}

fn py_floor_div(x: i64, y: i64) -> Result<i64, CallError> {
    if y == 0 {
        return Err(CallError::zero_division());
    }
    let q = x.checked_div(y).ok_or_else(overflow)?;
    if (x % y != 0) && ((x < 0) != (y < 0)) {
        Ok(q - 1)
    } else {
        Ok(q)
    }
}

fn py_mod(x: i64, y: i64) -> Result<i64, CallError> {
    if y == 0 {
        return Err(CallError::new("ZeroDivisionError", "integer modulo by zero"));
    }
    let r = x.checked_rem(y).ok_or_else(overflow)?;
    if r != 0 && ((r < 0) != (y < 0)) {
        Ok(r + y)
    } else {
        Ok(r)
    }
}

fn py_fmod(x: f64, y: f64) -> Result<f64, CallError> {
    if y == 0.0 {
        return Err(CallError::new("ZeroDivisionError", "float modulo"));
    }
    let r = x % y;
    if r != 0.0 && ((r < 0.0) != (y < 0.0)) {
        Ok(r + y)
    } else {
        Ok(r)
    }
}

/// Python `==`: numbers compare across int/float/bool, containers recurse
pub fn py_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::List(x), Value::List(y)) | (Value::Tuple(x), Value::Tuple(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(p, q)| py_eq(p, q))
        }
        (Value::Set(x), Value::Set(y)) => {
            x.len() == y.len() && x.iter().all(|p| y.iter().any(|q| py_eq(p, q)))
        }
        (Value::Dict(x), Value::Dict(y)) => {
            x.len() == y.len()
                && x.iter().all(|(k, v)| {
                    y.iter()
                        .find(|(k2, _)| py_eq(k, k2))
                        .is_some_and(|(_, v2)| py_eq(v, v2))
                })
        }
        _ => match (num(a), num(b)) {
            (Some(Num::Int(x)), Some(Num::Int(y))) => x == y,
            (Some(x), Some(y)) => {
                let fx = match x {
                    Num::Int(i) => i as f64,
                    Num::Float(f) => f,
                };
                let fy = match y {
                    Num::Int(i) => i as f64,
                    Num::Float(f) => f,
                };
                fx == fy
            }
            _ => a == b,
        },
    }
}

/// Python ordering comparison (`<` and friends)
pub fn py_compare(a: &Value, b: &Value) -> Result<Ordering, CallError> {
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => Ok(x.cmp(y)),
        (Value::Bytes(x), Value::Bytes(y)) => Ok(x.cmp(y)),
        (Value::List(x), Value::List(y)) | (Value::Tuple(x), Value::Tuple(y)) => {
            for (p, q) in x.iter().zip(y) {
                if !py_eq(p, q) {
                    return py_compare(p, q);
                }
            }
            Ok(x.len().cmp(&y.len()))
        }
        _ => match (num(a), num(b)) {
            (Some(Num::Int(x)), Some(Num::Int(y))) => Ok(x.cmp(&y)),
            (Some(_), Some(_)) => {
                let (x, y) = (a.as_float().unwrap_or(0.0), b.as_float().unwrap_or(0.0));
                x.partial_cmp(&y).ok_or_else(|| {
                    CallError::value_error("comparison involving nan is undefined")
                })
            }
            _ => Err(CallError::type_error(format!(
                "'<' not supported between instances of '{}' and '{}'",
                a.type_name(),
                b.type_name()
            ))),
        },
    }
}

/// Python `is`: singletons and small scalars compare by value, containers are
/// never identical unless structurally equal callables
fn py_is(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::None, Value::None) | (Value::Ellipsis, Value::Ellipsis) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Callable(x), Value::Callable(y)) => x == y,
        _ => false,
    }
}

/// Python `in`
pub fn py_contains(container: &Value, item: &Value) -> Result<bool, CallError> {
    match container {
        Value::Str(s) => match item {
            Value::Str(needle) => Ok(s.contains(needle.as_str())),
            other => Err(CallError::type_error(format!(
                "'in <string>' requires string as left operand, not {}",
                other.type_name()
            ))),
        },
        Value::Dict(items) => Ok(items.iter().any(|(k, _)| py_eq(k, item))),
        Value::List(items) | Value::Tuple(items) | Value::Set(items) => {
            Ok(items.iter().any(|v| py_eq(v, item)))
        }
        Value::Bytes(b) => match item.as_int() {
            Some(byte) => Ok(b.iter().any(|x| i64::from(*x) == byte)),
            None => Err(CallError::type_error("a bytes-like object is required")),
        },
        other => Err(CallError::type_error(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

fn normalize_index(index: i64, len: usize, what: &str) -> Result<usize, CallError> {
    let len = len as i64;
    let actual = if index < 0 { index + len } else { index };
    if actual < 0 || actual >= len {
        Err(CallError::index_error(format!("{} index out of range", what)))
    } else {
        Ok(actual as usize)
    }
}

/// Python `container[key]`
pub fn py_getitem(container: &Value, key: &Value) -> Result<Value, CallError> {
    match container {
        Value::List(items) | Value::Tuple(items) => {
            let what = if matches!(container, Value::List(_)) { "list" } else { "tuple" };
            let index = key.as_int().ok_or_else(|| {
                CallError::type_error(format!(
                    "{} indices must be integers, not {}",
                    what,
                    key.type_name()
                ))
            })?;
            Ok(items[normalize_index(index, items.len(), what)?].clone())
        }
        Value::Str(s) => {
            let index = key.as_int().ok_or_else(|| {
                CallError::type_error("string indices must be integers")
            })?;
            let chars: Vec<char> = s.chars().collect();
            Ok(Value::Str(chars[normalize_index(index, chars.len(), "string")?].to_string()))
        }
        Value::Bytes(b) => {
            let index = key
                .as_int()
                .ok_or_else(|| CallError::type_error("byte indices must be integers"))?;
            Ok(Value::Int(i64::from(b[normalize_index(index, b.len(), "index")?])))
        }
        Value::Dict(items) => items
            .iter()
            .find(|(k, _)| py_eq(k, key))
            .map(|(_, v)| v.clone())
            .ok_or_else(|| CallError::key_error(key.repr())),
        other => Err(CallError::type_error(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

/// Applies a binary operator
pub fn binary_op(op: BinaryOp, a: &Value, b: &Value) -> Result<Value, CallError> {
    match op {
        BinaryOp::Add => match (a, b) {
            (Value::Str(x), Value::Str(y)) => Ok(Value::Str(format!("{}{}", x, y))),
            (Value::Bytes(x), Value::Bytes(y)) => Ok(Value::Bytes([x.as_slice(), y].concat())),
            (Value::List(x), Value::List(y)) => Ok(Value::List([x.as_slice(), y].concat())),
            (Value::Tuple(x), Value::Tuple(y)) => Ok(Value::Tuple([x.as_slice(), y].concat())),
            _ => arith(
                a,
                b,
                |x, y| x.checked_add(y).map(Value::Int).ok_or_else(overflow),
                |x, y| Ok(Value::Float(x + y)),
            )
            .unwrap_or_else(|| Err(unsupported("+", a, b))),
        },
        BinaryOp::Sub => arith(
            a,
            b,
            |x, y| x.checked_sub(y).map(Value::Int).ok_or_else(overflow),
            |x, y| Ok(Value::Float(x - y)),
        )
        .unwrap_or_else(|| Err(unsupported("-", a, b))),
        BinaryOp::Mul => match (a, b) {
            (Value::Str(s), n) | (n, Value::Str(s)) if matches!(n, Value::Int(_) | Value::Bool(_)) => {
                let times = repeat_count(s.len(), n.as_int().unwrap_or(0))?;
                Ok(Value::Str(s.repeat(times)))
            }
            (Value::List(items), n) | (n, Value::List(items))
                if matches!(n, Value::Int(_) | Value::Bool(_)) =>
            {
                repeat(items, n.as_int().unwrap_or(0)).map(Value::List)
            }
            (Value::Tuple(items), n) | (n, Value::Tuple(items))
                if matches!(n, Value::Int(_) | Value::Bool(_)) =>
            {
                repeat(items, n.as_int().unwrap_or(0)).map(Value::Tuple)
            }
            _ => arith(
                a,
                b,
                |x, y| x.checked_mul(y).map(Value::Int).ok_or_else(overflow),
                |x, y| Ok(Value::Float(x * y)),
            )
            .unwrap_or_else(|| Err(unsupported("*", a, b))),
        },
        BinaryOp::TrueDiv => arith(
            a,
            b,
            |x, y| {
                if y == 0 {
                    Err(CallError::zero_division())
                } else {
                    Ok(Value::Float(x as f64 / y as f64))
                }
            },
            |x, y| {
                if y == 0.0 {
                    Err(CallError::new("ZeroDivisionError", "float division by zero"))
                } else {
                    Ok(Value::Float(x / y))
                }
            },
        )
        .unwrap_or_else(|| Err(unsupported("/", a, b))),
        BinaryOp::FloorDiv => arith(
            a,
            b,
            |x, y| py_floor_div(x, y).map(Value::Int),
            |x, y| {
                if y == 0.0 {
                    Err(CallError::new("ZeroDivisionError", "float floor division by zero"))
                } else {
                    Ok(Value::Float((x / y).floor()))
                }
            },
        )
        .unwrap_or_else(|| Err(unsupported("//", a, b))),
        BinaryOp::Mod => arith(
            a,
            b,
            |x, y| py_mod(x, y).map(Value::Int),
            |x, y| py_fmod(x, y).map(Value::Float),
        )
        .unwrap_or_else(|| Err(unsupported("%", a, b))),
        BinaryOp::Pow => arith(
            a,
            b,
            |x, y| {
                if y < 0 {
                    Ok(Value::Float((x as f64).powf(y as f64)))
                } else {
                    let exp = u32::try_from(y).map_err(|_| overflow())?;
                    x.checked_pow(exp).map(Value::Int).ok_or_else(overflow)
                }
            },
            |x, y| Ok(Value::Float(x.powf(y))),
        )
        .unwrap_or_else(|| Err(unsupported("**", a, b))),
        BinaryOp::MatMul => Err(unsupported("@", a, b)),
        BinaryOp::LShift | BinaryOp::RShift | BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor => {
            bitwise(op, a, b)
        }
        BinaryOp::And => Ok(if a.is_truthy() { b.clone() } else { a.clone() }),
        BinaryOp::Or => Ok(if a.is_truthy() { a.clone() } else { b.clone() }),
        BinaryOp::Eq => Ok(Value::Bool(py_eq(a, b))),
        BinaryOp::Ne => Ok(Value::Bool(!py_eq(a, b))),
        BinaryOp::Lt => py_compare(a, b).map(|o| Value::Bool(o == Ordering::Less)),
        BinaryOp::Le => py_compare(a, b).map(|o| Value::Bool(o != Ordering::Greater)),
        BinaryOp::Gt => py_compare(a, b).map(|o| Value::Bool(o == Ordering::Greater)),
        BinaryOp::Ge => py_compare(a, b).map(|o| Value::Bool(o != Ordering::Less)),
        BinaryOp::Is => Ok(Value::Bool(py_is(a, b))),
        BinaryOp::IsNot => Ok(Value::Bool(!py_is(a, b))),
        BinaryOp::In => py_contains(b, a).map(Value::Bool),
        BinaryOp::NotIn => py_contains(b, a).map(|found| Value::Bool(!found)),
        BinaryOp::GetItem => py_getitem(a, b),
    }
}

fn bitwise(op: BinaryOp, a: &Value, b: &Value) -> Result<Value, CallError> {
    let symbol = match op {
        BinaryOp::LShift => "<<",
        BinaryOp::RShift => ">>",
        BinaryOp::BitAnd => "&",
        BinaryOp::BitOr => "|",
        _ => "^",
    };
    if let (Value::Bool(x), Value::Bool(y)) = (a, b) {
        match op {
            BinaryOp::BitAnd => return Ok(Value::Bool(*x & *y)),
            BinaryOp::BitOr => return Ok(Value::Bool(*x | *y)),
            BinaryOp::BitXor => return Ok(Value::Bool(*x ^ *y)),
            _ => {}
        }
    }
    let (x, y) = match (a, b) {
        (Value::Int(_) | Value::Bool(_), Value::Int(_) | Value::Bool(_)) => {
            (a.as_int().unwrap_or(0), b.as_int().unwrap_or(0))
        }
        _ => return Err(unsupported(symbol, a, b)),
    };
    let result = match op {
        BinaryOp::LShift => {
            if y < 0 {
                return Err(CallError::value_error("negative shift count"));
            }
            u32::try_from(y)
                .ok()
                .and_then(|shift| x.checked_shl(shift))
                .filter(|r| r >> y.min(63) == x)
                .ok_or_else(overflow)?
        }
        BinaryOp::RShift => {
            if y < 0 {
                return Err(CallError::value_error("negative shift count"));
            }
            x >> y.min(63)
        }
        BinaryOp::BitAnd => x & y,
        BinaryOp::BitOr => x | y,
        _ => x ^ y,
    };
    Ok(Value::Int(result))
}

/// Applies a unary operator
pub fn unary_op(op: UnaryOp, a: &Value) -> Result<Value, CallError> {
    let bad = |symbol: &str| {
        CallError::type_error(format!(
            "bad operand type for unary {}: '{}'",
            symbol,
            a.type_name()
        ))
    };
    match op {
        UnaryOp::Not => Ok(Value::Bool(!a.is_truthy())),
        UnaryOp::Neg => match num(a) {
            Some(Num::Int(i)) => i.checked_neg().map(Value::Int).ok_or_else(overflow),
            Some(Num::Float(f)) => Ok(Value::Float(-f)),
            None => Err(bad("-")),
        },
        UnaryOp::Pos => match num(a) {
            Some(Num::Int(i)) => Ok(Value::Int(i)),
            Some(Num::Float(f)) => Ok(Value::Float(f)),
            None => Err(bad("+")),
        },
        UnaryOp::Invert => match a {
            Value::Int(_) | Value::Bool(_) => Ok(Value::Int(!a.as_int().unwrap_or(0))),
            _ => Err(bad("~")),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arithmetic_promotion() {
        assert_eq!(binary_op(BinaryOp::Add, &Value::Int(3), &Value::Int(4)).unwrap(), Value::Int(7));
        assert_eq!(
            binary_op(BinaryOp::Add, &Value::Int(1), &Value::Float(0.5)).unwrap(),
            Value::Float(1.5)
        );
        assert_eq!(
            binary_op(BinaryOp::TrueDiv, &Value::Int(7), &Value::Int(2)).unwrap(),
            Value::Float(3.5)
        );
        assert_eq!(
            binary_op(BinaryOp::FloorDiv, &Value::Int(-7), &Value::Int(2)).unwrap(),
            Value::Int(-4)
        );
        assert_eq!(binary_op(BinaryOp::Mod, &Value::Int(-7), &Value::Int(3)).unwrap(), Value::Int(2));
        assert_eq!(
            binary_op(BinaryOp::Pow, &Value::Int(2), &Value::Int(-1)).unwrap(),
            Value::Float(0.5)
        );
    }

    #[test]
    fn test_sequence_ops() {
        assert_eq!(
            binary_op(BinaryOp::Add, &Value::str("ab"), &Value::str("cd")).unwrap(),
            Value::str("abcd")
        );
        assert_eq!(
            binary_op(BinaryOp::Mul, &Value::Int(2), &Value::str("ab")).unwrap(),
            Value::str("abab")
        );
        let list = Value::List(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(
            binary_op(BinaryOp::GetItem, &list, &Value::Int(-1)).unwrap(),
            Value::Int(2)
        );
        assert_eq!(
            binary_op(BinaryOp::In, &Value::Float(2.0), &list).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_repetition_is_bounded() {
        let list = Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        let err = binary_op(BinaryOp::Mul, &list, &Value::Int(1 << 62)).unwrap_err();
        assert_eq!(err.kind, "MemoryError");
        let err = binary_op(BinaryOp::Mul, &Value::Int(i64::MAX), &list).unwrap_err();
        assert_eq!(err.kind, "OverflowError");
        let err = binary_op(BinaryOp::Mul, &Value::Int(1 << 40), &Value::str("ab")).unwrap_err();
        assert_eq!(err.kind, "MemoryError");
        let err = binary_op(BinaryOp::Mul, &Value::Tuple(vec![Value::None]), &Value::Int(i64::MAX)).unwrap_err();
        assert_eq!(err.kind, "MemoryError");

        assert_eq!(
            binary_op(BinaryOp::Mul, &Value::List(vec![]), &Value::Int(i64::MAX)).unwrap(),
            Value::List(vec![])
        );
        assert_eq!(binary_op(BinaryOp::Mul, &list, &Value::Int(-3)).unwrap(), Value::List(vec![]));
        assert_eq!(
            binary_op(BinaryOp::Mul, &Value::str("ab"), &Value::Bool(true)).unwrap(),
            Value::str("ab")
        );
    }

    #[test]
    fn test_errors() {
        let err = binary_op(BinaryOp::Add, &Value::Int(1), &Value::str("a")).unwrap_err();
        assert_eq!(err.kind, "TypeError");
        let err = binary_op(BinaryOp::TrueDiv, &Value::Int(1), &Value::Int(0)).unwrap_err();
        assert_eq!(err.kind, "ZeroDivisionError");
        let err = binary_op(BinaryOp::GetItem, &Value::dict([("a", Value::None)]), &Value::str("b"))
            .unwrap_err();
        assert_eq!(err.kind, "KeyError");
    }

    #[test]
    fn test_identity_and_comparison() {
        assert_eq!(binary_op(BinaryOp::Is, &Value::None, &Value::None).unwrap(), Value::Bool(true));
        let list = Value::List(vec![]);
        assert_eq!(binary_op(BinaryOp::Is, &list, &list).unwrap(), Value::Bool(false));
        assert_eq!(
            binary_op(BinaryOp::Lt, &Value::Int(1), &Value::Float(1.5)).unwrap(),
            Value::Bool(true)
        );
        assert!(binary_op(BinaryOp::Lt, &Value::Int(1), &Value::str("a")).is_err());
        assert_eq!(unary_op(UnaryOp::Neg, &Value::Int(5)).unwrap(), Value::Int(-5));
        assert_eq!(unary_op(UnaryOp::Not, &Value::List(vec![])).unwrap(), Value::Bool(true));
    }
}
