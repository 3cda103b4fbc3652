use std::cmp::Ordering;
use std::io::Write;

use super::{float_arg, spread_or_single};
use crate::literal::ops::{binary_op, py_compare, py_eq, BinaryOp};
use crate::literal::{CallArgs, CallError, Value};
use crate::nodes::factory::{CallableDef, CallableKind, CallableRegistry};
use crate::nodes::signature::{ParamDecl, SignatureDecl};
use crate::nodes::types::PyType;

/// Longest list `range` is allowed to materialize
const RANGE_LIMIT: i64 = 10_000_000;

pub(super) fn register(registry: &mut CallableRegistry) {
    let mut add = |name: &str, params: Vec<ParamDecl>, func: fn(&CallArgs) -> Result<Value, CallError>| {
        registry.register(
            CallableKind::Builtin,
            name,
            CallableDef::builtin(name, SignatureDecl::new(params), func),
        );
    };

    add(
        "print",
        vec![
            ParamDecl::var_positional("objects"),
            ParamDecl::keyword_only("sep").with_default(" "),
            ParamDecl::keyword_only("end").with_default("\n"),
        ],
        print,
    );
    add("len", vec![ParamDecl::positional("obj")], len);
    add(
        "sum",
        vec![ParamDecl::positional("iterable"), ParamDecl::positional("start").with_default(0)],
        sum,
    );
    add("max", vec![ParamDecl::var_positional("args")], max);
    add("min", vec![ParamDecl::var_positional("args")], min);
    add("abs", vec![ParamDecl::positional("x")], abs);
    add(
        "round",
        vec![
            ParamDecl::positional("number"),
            ParamDecl::positional("ndigits").with_default(Value::None),
        ],
        round,
    );
    add(
        "sorted",
        vec![
            ParamDecl::positional("iterable"),
            ParamDecl::keyword_only("reverse").with_default(false),
        ],
        sorted,
    );
    add("str", vec![ParamDecl::positional("object").with_default("")], to_str);
    add("int", vec![ParamDecl::positional("x").with_default(0)], to_int);
    add("float", vec![ParamDecl::positional("x").with_default(0.0)], to_float);
    add("bool", vec![ParamDecl::positional("x").with_default(false)], to_bool);
    add(
        "list",
        vec![ParamDecl::positional("iterable").with_default(Value::Tuple(vec![]))],
        |args| Ok(Value::List(iterable_or_empty(args)?)),
    );
    add(
        "tuple",
        vec![ParamDecl::positional("iterable").with_default(Value::Tuple(vec![]))],
        |args| Ok(Value::Tuple(iterable_or_empty(args)?)),
    );
    add(
        "dict",
        vec![
            ParamDecl::positional("iterable").with_default(Value::Tuple(vec![])),
            ParamDecl::var_keyword("kwargs"),
        ],
        dict,
    );
    add(
        "range",
        vec![
            ParamDecl::positional("start").with_hint(PyType::Int),
            ParamDecl::positional("stop").with_default(Value::None),
            ParamDecl::positional("step").with_default(1),
        ],
        range,
    );
    add("repr", vec![ParamDecl::positional("obj")], |args| {
        Ok(Value::Str(args.require(0, "obj")?.repr()))
    });
    add("reversed", vec![ParamDecl::positional("sequence")], reversed);
}

fn print(args: &CallArgs) -> Result<Value, CallError> {
    let text_of = |name: &str, fallback: &str| match args.kwarg(name) {
        None | Some(Value::None) => Ok(fallback.to_string()),
        Some(Value::Str(text)) => Ok(text.clone()),
        Some(other) => Err(CallError::type_error(format!(
            "{} must be None or a string, not {}",
            name,
            other.type_name()
        ))),
    };
    let sep = text_of("sep", " ")?;
    let end = text_of("end", "\n")?;
    let line: Vec<String> = args.positional.iter().map(Value::to_py_str).collect();

    let mut stdout = std::io::stdout().lock();
    write!(stdout, "{}{}", line.join(&sep), end)
        .and_then(|_| stdout.flush())
        .map_err(|err| CallError::new("OSError", err.to_string()))?;
    Ok(Value::None)
}

fn len(args: &CallArgs) -> Result<Value, CallError> {
    let length = match args.require(0, "obj")? {
        Value::Str(text) => text.chars().count(),
        Value::Bytes(bytes) => bytes.len(),
        Value::List(items) | Value::Tuple(items) | Value::Set(items) => items.len(),
        Value::Dict(items) => items.len(),
        other => {
            return Err(CallError::type_error(format!(
                "object of type '{}' has no len()",
                other.type_name()
            )))
        }
    };
    Ok(Value::from(length))
}

fn sum(args: &CallArgs) -> Result<Value, CallError> {
    let start = args.get(1, "start").cloned().unwrap_or(Value::Int(0));
    if matches!(start, Value::Str(_)) {
        return Err(CallError::type_error(
            "sum() can't sum strings [use ''.join(seq) instead]",
        ));
    }
    args.require(0, "iterable")?
        .iterate()?
        .iter()
        .try_fold(start, |total, item| binary_op(BinaryOp::Add, &total, item))
}

fn extreme(args: &CallArgs, func: &str, wanted: Ordering) -> Result<Value, CallError> {
    let items = spread_or_single(args)?;
    let mut iter = items.into_iter();
    let mut best = iter
        .next()
        .ok_or_else(|| CallError::value_error(format!("{}() arg is an empty sequence", func)))?;
    for item in iter {
        if py_compare(&item, &best)? == wanted {
            best = item;
        }
    }
    Ok(best)
}

fn max(args: &CallArgs) -> Result<Value, CallError> {
    extreme(args, "max", Ordering::Greater)
}

fn min(args: &CallArgs) -> Result<Value, CallError> {
    extreme(args, "min", Ordering::Less)
}

fn abs(args: &CallArgs) -> Result<Value, CallError> {
    match args.require(0, "x")? {
        Value::Int(i) => i
            .checked_abs()
            .map(Value::Int)
            .ok_or_else(|| CallError::new("OverflowError", "integer result out of range")),
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::Float(f) => Ok(Value::Float(f.abs())),
        other => Err(CallError::type_error(format!(
            "bad operand type for abs(): '{}'",
            other.type_name()
        ))),
    }
}

fn float_to_int(f: f64) -> Result<i64, CallError> {
    if f.is_nan() {
        return Err(CallError::value_error("cannot convert float NaN to integer"));
    }
    if f.is_infinite() || f.abs() >= 9.2e18 {
        return Err(CallError::new(
            "OverflowError",
            "cannot convert float infinity to integer",
        ));
    }
    Ok(f as i64)
}

fn round(args: &CallArgs) -> Result<Value, CallError> {
    let number = args.require(0, "number")?;
    let ndigits = match args.get(1, "ndigits") {
        None | Some(Value::None) => None,
        Some(value) => Some(value.as_int().ok_or_else(|| {
            CallError::type_error(format!(
                "'{}' object cannot be interpreted as an integer",
                value.type_name()
            ))
        })?),
    };
    match (number, ndigits) {
        (Value::Int(_) | Value::Bool(_), None) => Ok(Value::Int(number.as_int().unwrap_or(0))),
        (Value::Int(i), Some(digits)) if digits >= 0 => Ok(Value::Int(*i)),
        (Value::Int(i), Some(digits)) => {
            let factor = 10f64.powi((-digits).min(18) as i32);
            let rounded = ((*i as f64) / factor).round_ties_even() * factor;
            Ok(Value::Int(float_to_int(rounded)?))
        }
        (Value::Float(f), None) => Ok(Value::Int(float_to_int(f.round_ties_even())?)),
        (Value::Float(f), Some(digits)) => {
            let factor = 10f64.powi(digits.clamp(-308, 308) as i32);
            Ok(Value::Float((f * factor).round_ties_even() / factor))
        }
        (other, _) => Err(CallError::type_error(format!(
            "type {} doesn't define __round__ method",
            other.type_name()
        ))),
    }
}

fn sorted(args: &CallArgs) -> Result<Value, CallError> {
    let mut items = args.require(0, "iterable")?.iterate()?;
    let reverse = args.kwarg("reverse").is_some_and(Value::is_truthy);
    let mut failure = None;
    items.sort_by(|a, b| {
        let (left, right) = if reverse { (b, a) } else { (a, b) };
        match py_compare(left, right) {
            Ok(ordering) => ordering,
            Err(err) => {
                failure.get_or_insert(err);
                Ordering::Equal
            }
        }
    });
    match failure {
        Some(err) => Err(err),
        None => Ok(Value::List(items)),
    }
}

fn to_str(args: &CallArgs) -> Result<Value, CallError> {
    Ok(Value::Str(
        args.get(0, "object").map(Value::to_py_str).unwrap_or_default(),
    ))
}

fn to_int(args: &CallArgs) -> Result<Value, CallError> {
    match args.get(0, "x").unwrap_or(&Value::Int(0)) {
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::Float(f) => float_to_int(f.trunc()).map(Value::Int),
        Value::Str(text) => text
            .trim()
            .replace('_', "")
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| {
                CallError::value_error(format!(
                    "invalid literal for int() with base 10: {}",
                    Value::str(text.as_str()).repr()
                ))
            }),
        other => Err(CallError::type_error(format!(
            "int() argument must be a string or a real number, not '{}'",
            other.type_name()
        ))),
    }
}

fn to_float(args: &CallArgs) -> Result<Value, CallError> {
    match args.get(0, "x").unwrap_or(&Value::Float(0.0)) {
        Value::Str(text) => text.trim().parse::<f64>().map(Value::Float).map_err(|_| {
            CallError::value_error(format!(
                "could not convert string to float: {}",
                Value::str(text.as_str()).repr()
            ))
        }),
        _ => float_arg(args, 0, "x", "float").map(Value::Float),
    }
}

fn to_bool(args: &CallArgs) -> Result<Value, CallError> {
    Ok(Value::Bool(args.get(0, "x").is_some_and(Value::is_truthy)))
}

fn iterable_or_empty(args: &CallArgs) -> Result<Vec<Value>, CallError> {
    match args.get(0, "iterable") {
        Some(iterable) => iterable.iterate(),
        None => Ok(Vec::new()),
    }
}

fn dict_insert(items: &mut Vec<(Value, Value)>, key: Value, value: Value) -> Result<(), CallError> {
    if !key.is_hashable() {
        return Err(CallError::type_error(format!(
            "unhashable type: '{}'",
            key.type_name()
        )));
    }
    match items.iter_mut().find(|(existing, _)| py_eq(existing, &key)) {
        Some(slot) => slot.1 = value,
        None => items.push((key, value)),
    }
    Ok(())
}

fn dict(args: &CallArgs) -> Result<Value, CallError> {
    let mut items: Vec<(Value, Value)> = Vec::new();
    if let Some(source) = args.arg(0) {
        if let Some(pairs) = source.as_mapping() {
            for (key, value) in pairs {
                dict_insert(&mut items, key.clone(), value.clone())?;
            }
        } else {
            for (index, element) in source.iterate()?.into_iter().enumerate() {
                let pair = element.iterate().map_err(|_| {
                    CallError::type_error(format!(
                        "cannot convert dictionary update sequence element #{} to a sequence",
                        index
                    ))
                })?;
                let [key, value]: [Value; 2] = pair.try_into().map_err(|pair: Vec<Value>| {
                    CallError::value_error(format!(
                        "dictionary update sequence element #{} has length {}; 2 is required",
                        index,
                        pair.len()
                    ))
                })?;
                dict_insert(&mut items, key, value)?;
            }
        }
    }
    for (key, value) in &args.keywords {
        dict_insert(&mut items, Value::str(key.as_str()), value.clone())?;
    }
    Ok(Value::Dict(items))
}

fn int_arg(value: &Value) -> Result<i64, CallError> {
    match value {
        Value::Int(i) => Ok(*i),
        Value::Bool(b) => Ok(i64::from(*b)),
        other => Err(CallError::type_error(format!(
            "'{}' object cannot be interpreted as an integer",
            other.type_name()
        ))),
    }
}

fn range(args: &CallArgs) -> Result<Value, CallError> {
    let first = int_arg(args.require(0, "start")?)?;
    let (start, stop) = match args.get(1, "stop") {
        None | Some(Value::None) => (0, first),
        Some(stop) => (first, int_arg(stop)?),
    };
    let step = match args.get(2, "step") {
        Some(step) => int_arg(step)?,
        None => 1,
    };
    if step == 0 {
        return Err(CallError::value_error("range() arg 3 must not be zero"));
    }

    let span = if step > 0 {
        (stop as i128 - start as i128 + step as i128 - 1) / step as i128
    } else {
        (start as i128 - stop as i128 - step as i128 - 1) / -(step as i128)
    };
    let count = span.max(0);
    if count > RANGE_LIMIT as i128 {
        return Err(CallError::new("MemoryError", "range is too large to materialize"));
    }
    Ok(Value::List(
        (0..count as i64).map(|i| Value::Int(start + i * step)).collect(),
    ))
}

fn reversed(args: &CallArgs) -> Result<Value, CallError> {
    let mut items = match args.require(0, "sequence")? {
        value @ (Value::List(_) | Value::Tuple(_) | Value::Str(_) | Value::Bytes(_) | Value::Dict(_)) => {
            value.iterate()?
        }
        other => {
            return Err(CallError::type_error(format!(
                "'{}' object is not reversible",
                other.type_name()
            )))
        }
    };
    items.reverse();
    Ok(Value::List(items))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: CallArgs) -> Result<Value, CallError> {
        let mut registry = CallableRegistry::new();
        register(&mut registry);
        registry.get(CallableKind::Builtin, name).unwrap().call(&args)
    }

    fn ints(values: &[i64]) -> Value {
        Value::List(values.iter().copied().map(Value::Int).collect())
    }

    #[test]
    fn test_len_and_sum() {
        assert_eq!(call("len", CallArgs::positional(vec![Value::str("héllo")])).unwrap(), Value::Int(5));
        assert_eq!(call("sum", CallArgs::positional(vec![ints(&[1, 2, 3])])).unwrap(), Value::Int(6));
        assert_eq!(call("len", CallArgs::positional(vec![Value::Int(3)])).unwrap_err().kind, "TypeError");
    }

    #[test]
    fn test_max_min_accept_iterable_or_args() {
        assert_eq!(call("max", CallArgs::positional(vec![ints(&[3, 9, 2])])).unwrap(), Value::Int(9));
        assert_eq!(
            call("min", CallArgs::positional(vec![Value::Int(4), Value::Float(1.5)])).unwrap(),
            Value::Float(1.5)
        );
        assert_eq!(call("max", CallArgs::positional(vec![ints(&[])])).unwrap_err().kind, "ValueError");
    }

    #[test]
    fn test_round_half_even() {
        assert_eq!(call("round", CallArgs::positional(vec![Value::Float(2.5)])).unwrap(), Value::Int(2));
        assert_eq!(call("round", CallArgs::positional(vec![Value::Float(3.5)])).unwrap(), Value::Int(4));
        assert_eq!(
            call("round", CallArgs::positional(vec![Value::Float(1.2345), Value::Int(2)])).unwrap(),
            Value::Float(1.23)
        );
    }

    #[test]
    fn test_sorted_reverse_and_errors() {
        let mut args = CallArgs::positional(vec![ints(&[3, 1, 2])]);
        assert_eq!(call("sorted", args.clone()).unwrap(), ints(&[1, 2, 3]));
        args.push_keyword("reverse", Value::Bool(true));
        assert_eq!(call("sorted", args).unwrap(), ints(&[3, 2, 1]));

        let mixed = Value::List(vec![Value::Int(1), Value::str("a")]);
        assert_eq!(call("sorted", CallArgs::positional(vec![mixed])).unwrap_err().kind, "TypeError");
    }

    #[test]
    fn test_conversions() {
        assert_eq!(call("int", CallArgs::positional(vec![Value::str(" 42 ")])).unwrap(), Value::Int(42));
        assert_eq!(call("int", CallArgs::positional(vec![Value::Float(-2.7)])).unwrap(), Value::Int(-2));
        assert_eq!(call("float", CallArgs::positional(vec![Value::str("2.5")])).unwrap(), Value::Float(2.5));
        assert_eq!(call("str", CallArgs::positional(vec![Value::Int(7)])).unwrap(), Value::str("7"));
        assert_eq!(call("bool", CallArgs::positional(vec![ints(&[])])).unwrap(), Value::Bool(false));
        assert_eq!(
            call("tuple", CallArgs::positional(vec![Value::str("ab")])).unwrap(),
            Value::Tuple(vec![Value::str("a"), Value::str("b")])
        );
    }

    #[test]
    fn test_dict_merges_keywords() {
        let pairs = Value::List(vec![Value::Tuple(vec![Value::str("a"), Value::Int(1)])]);
        let mut args = CallArgs::positional(vec![pairs]);
        args.push_keyword("b", Value::Int(2));
        let result = call("dict", args).unwrap();
        assert_eq!(result, Value::dict([("a", Value::Int(1)), ("b", Value::Int(2))]));
    }

    #[test]
    fn test_range() {
        assert_eq!(call("range", CallArgs::positional(vec![Value::Int(3)])).unwrap(), ints(&[0, 1, 2]));
        assert_eq!(
            call(
                "range",
                CallArgs::positional(vec![Value::Int(5), Value::Int(0), Value::Int(-2)])
            )
            .unwrap(),
            ints(&[5, 3, 1])
        );
        assert_eq!(
            call("range", CallArgs::positional(vec![Value::Int(1), Value::Int(2), Value::Int(0)]))
                .unwrap_err()
                .kind,
            "ValueError"
        );
    }

    #[test]
    fn test_reversed() {
        assert_eq!(call("reversed", CallArgs::positional(vec![ints(&[1, 2])])).unwrap(), ints(&[2, 1]));
        let set = Value::Set(vec![Value::Int(1)]);
        assert_eq!(call("reversed", CallArgs::positional(vec![set])).unwrap_err().kind, "TypeError");
    }
}
