use super::float_arg;
use crate::literal::{pformat, CallArgs, CallError, Value};
use crate::nodes::factory::{CallableDef, CallableKind, CallableRegistry};
use crate::nodes::signature::{ParamDecl, SignatureDecl};

pub(super) fn register(registry: &mut CallableRegistry) {
    let mut add = |id: &str,
                   import_text: &str,
                   params: Vec<ParamDecl>,
                   func: fn(&CallArgs) -> Result<Value, CallError>| {
        let short_name = id.rsplit('.').next().unwrap_or(id);
        let def = CallableDef::new(short_name, SignatureDecl::new(params), func)
            .with_stlib_import(import_text)
            .with_call_format(id);
        registry.register(CallableKind::Stdlib, id, def);
    };

    add("math.sqrt", "import math", vec![ParamDecl::positional("x")], sqrt);
    add("math.floor", "import math", vec![ParamDecl::positional("x")], |args| {
        integral(args, "floor", f64::floor)
    });
    add("math.ceil", "import math", vec![ParamDecl::positional("x")], |args| {
        integral(args, "ceil", f64::ceil)
    });
    add(
        "math.hypot",
        "import math",
        vec![ParamDecl::var_positional("coordinates")],
        hypot,
    );
    add(
        "statistics.mean",
        "import statistics",
        vec![ParamDecl::positional("data")],
        mean,
    );
    add(
        "os.path.join",
        "import os",
        vec![ParamDecl::positional("a"), ParamDecl::var_positional("p")],
        path_join,
    );
    add(
        "pprint.pformat",
        "import pprint",
        vec![ParamDecl::positional("object")],
        |args| {
            let object = args.require(0, "object")?;
            Ok(Value::Str(pformat(object)))
        },
    );
}

fn sqrt(args: &CallArgs) -> Result<Value, CallError> {
    let x = float_arg(args, 0, "x", "sqrt")?;
    if x < 0.0 {
        return Err(CallError::value_error("math domain error"));
    }
    Ok(Value::Float(x.sqrt()))
}

fn integral(args: &CallArgs, func: &str, op: fn(f64) -> f64) -> Result<Value, CallError> {
    match args.require(0, "x")? {
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        _ => {
            let x = op(float_arg(args, 0, "x", func)?);
            if x.is_nan() {
                Err(CallError::value_error("cannot convert float NaN to integer"))
            } else if !x.is_finite() || x.abs() >= 9.2e18 {
                Err(CallError::new(
                    "OverflowError",
                    "cannot convert float infinity to integer",
                ))
            } else {
                Ok(Value::Int(x as i64))
            }
        }
    }
}

fn hypot(args: &CallArgs) -> Result<Value, CallError> {
    let mut total = 0.0;
    for index in 0..args.positional.len() {
        let x = float_arg(args, index, "coordinates", "hypot")?;
        total += x * x;
    }
    Ok(Value::Float(total.sqrt()))
}

fn mean(args: &CallArgs) -> Result<Value, CallError> {
    let data = args.require(0, "data")?.iterate()?;
    if data.is_empty() {
        return Err(CallError::new(
            "StatisticsError",
            "mean requires at least one data point",
        ));
    }
    if let Some(ints) = data.iter().map(Value::as_int).collect::<Option<Vec<i64>>>() {
        let total: i128 = ints.iter().map(|i| i128::from(*i)).sum();
        let count = ints.len() as i128;
        if total % count == 0 {
            return Ok(Value::Int((total / count) as i64));
        }
        return Ok(Value::Float(total as f64 / count as f64));
    }
    let mut total = 0.0;
    for item in &data {
        total += item.as_float().ok_or_else(|| {
            CallError::type_error(format!(
                "can't convert type '{}' to numerator/denominator",
                item.type_name()
            ))
        })?;
    }
    Ok(Value::Float(total / data.len() as f64))
}

fn path_join(args: &CallArgs) -> Result<Value, CallError> {
    let mut joined = String::new();
    for (index, part) in args.positional.iter().enumerate() {
        let Value::Str(part) = part else {
            return Err(CallError::type_error(format!(
                "expected str, bytes or os.PathLike object, not {}",
                part.type_name()
            )));
        };
        if part.starts_with('/') || index == 0 {
            joined = part.clone();
        } else if joined.is_empty() || joined.ends_with('/') {
            joined.push_str(part);
        } else {
            joined.push('/');
            joined.push_str(part);
        }
    }
    if args.positional.is_empty() {
        return Err(CallError::type_error("missing required argument: 'a'"));
    }
    Ok(Value::Str(joined))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(id: &str, values: Vec<Value>) -> Result<Value, CallError> {
        let mut registry = CallableRegistry::new();
        register(&mut registry);
        registry
            .get(CallableKind::Stdlib, id)
            .unwrap()
            .call(&CallArgs::positional(values))
    }

    #[test]
    fn test_sqrt_domain() {
        assert_eq!(call("math.sqrt", vec![Value::Int(9)]).unwrap(), Value::Float(3.0));
        assert_eq!(call("math.sqrt", vec![Value::Int(-1)]).unwrap_err().kind, "ValueError");
        assert_eq!(call("math.sqrt", vec![Value::str("9")]).unwrap_err().kind, "TypeError");
    }

    #[test]
    fn test_floor_ceil_return_ints() {
        assert_eq!(call("math.floor", vec![Value::Float(-1.5)]).unwrap(), Value::Int(-2));
        assert_eq!(call("math.ceil", vec![Value::Float(1.2)]).unwrap(), Value::Int(2));
        assert_eq!(
            call("math.floor", vec![Value::Float(f64::INFINITY)]).unwrap_err().kind,
            "OverflowError"
        );
    }

    #[test]
    fn test_mean_stays_exact_for_ints() {
        let data = Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(call("statistics.mean", vec![data]).unwrap(), Value::Int(2));
        let data = Value::List(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(call("statistics.mean", vec![data]).unwrap(), Value::Float(1.5));
        let empty = Value::List(vec![]);
        assert_eq!(call("statistics.mean", vec![empty]).unwrap_err().kind, "StatisticsError");
    }

    #[test]
    fn test_path_join() {
        let joined = call("os.path.join", vec![Value::str("a"), Value::str("b/"), Value::str("c")]);
        assert_eq!(joined.unwrap(), Value::str("a/b/c"));
        let absolute = call("os.path.join", vec![Value::str("a"), Value::str("/root")]);
        assert_eq!(absolute.unwrap(), Value::str("/root"));
    }

    #[test]
    fn test_exported_call_name() {
        let mut registry = CallableRegistry::new();
        register(&mut registry);
        let def = registry.get(CallableKind::Stdlib, "math.hypot").unwrap();
        assert_eq!(def.call_name(), "math.hypot");
        assert_eq!(def.stlib_import_text.as_deref(), Some("import math"));
    }
}
