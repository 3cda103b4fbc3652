use crate::literal::ops::py_getitem;
use crate::literal::{CallArgs, CallError, Value};
use crate::nodes::factory::{CallableDef, CallableKind, CallableRegistry};
use crate::nodes::signature::{ParamDecl, SignatureDecl};
use crate::nodes::types::PyType;

pub(super) fn register(registry: &mut CallableRegistry) {
    let mut add = |name: &str,
                   template: &str,
                   params: Vec<ParamDecl>,
                   func: fn(&CallArgs) -> Result<Value, CallError>| {
        let def = CallableDef::new(name, SignatureDecl::new(params), func).with_substitution(template);
        registry.register(CallableKind::Capsule, name, def);
    };

    add(
        "tuple_from_args",
        "tuple($args)",
        vec![ParamDecl::var_positional("args")],
        |args| Ok(Value::Tuple(args.positional.clone())),
    );
    add(
        "list_from_args",
        "list($args)",
        vec![ParamDecl::var_positional("args")],
        |args| Ok(Value::List(args.positional.clone())),
    );
    add(
        "dict_from_kwargs",
        "dict($kwargs)",
        vec![ParamDecl::var_keyword("kwargs")],
        |args| {
            Ok(Value::Dict(
                args.keywords
                    .iter()
                    .map(|(key, value)| (Value::str(key.as_str()), value.clone()))
                    .collect(),
            ))
        },
    );
    add(
        "return_untouched",
        "$obj",
        vec![ParamDecl::positional("obj")],
        |args| args.require(0, "obj").cloned(),
    );
    add(
        "get_at_int",
        "$obj[$index]",
        vec![
            ParamDecl::positional("obj"),
            ParamDecl::positional("index").with_hint(PyType::Int).with_default(0),
        ],
        |args| py_getitem(args.require(0, "obj")?, args.get(1, "index").unwrap_or(&Value::Int(0))),
    );
    add(
        "get_at_string",
        "$obj[$key]",
        vec![
            ParamDecl::positional("obj"),
            ParamDecl::positional("key").with_hint(PyType::Str).with_default(""),
        ],
        |args| py_getitem(args.require(0, "obj")?, args.require(1, "key")?),
    );
    add(
        "perform_call",
        "$func(*$args, **$kwargs)",
        vec![
            ParamDecl::positional("func"),
            ParamDecl::var_positional("args"),
            ParamDecl::var_keyword("kwargs"),
        ],
        perform_call,
    );
}

fn perform_call(args: &CallArgs) -> Result<Value, CallError> {
    let Some(Value::Callable(func)) = args.arg(0) else {
        let got = args.arg(0).map_or("nothing", Value::type_name);
        return Err(CallError::type_error(format!("'{}' object is not callable", got)));
    };
    let forwarded = CallArgs {
        positional: args.positional[1..].to_vec(),
        keywords: args.keywords.clone(),
    };
    func.call(&forwarded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::literal::CallableValue;

    fn registry() -> CallableRegistry {
        let mut registry = CallableRegistry::new();
        register(&mut registry);
        registry
    }

    #[test]
    fn test_every_capsule_has_a_template() {
        let registry = registry();
        for id in registry.ids(CallableKind::Capsule) {
            let def = registry.get(CallableKind::Capsule, id).unwrap();
            assert!(def.substitution.is_some(), "{}", id);
            assert!(!def.is_importable());
        }
    }

    #[test]
    fn test_get_at_int() {
        let def = registry().get(CallableKind::Capsule, "get_at_int").unwrap();
        let list = Value::List(vec![Value::Int(10), Value::Int(20)]);
        let args = CallArgs::positional(vec![list.clone(), Value::Int(-1)]);
        assert_eq!(def.call(&args).unwrap(), Value::Int(20));
        let args = CallArgs::positional(vec![list, Value::Int(5)]);
        assert_eq!(def.call(&args).unwrap_err().kind, "IndexError");
    }

    #[test]
    fn test_perform_call_forwards_arguments() {
        let def = registry().get(CallableKind::Capsule, "perform_call").unwrap();
        let summer = CallableValue::new("add", |args: &CallArgs| {
            let total: i64 = args.positional.iter().filter_map(Value::as_int).sum();
            let bonus = args.kwarg("bonus").and_then(Value::as_int).unwrap_or(0);
            Ok(Value::Int(total + bonus))
        });
        let mut args = CallArgs::positional(vec![Value::Callable(summer), Value::Int(1), Value::Int(2)]);
        args.push_keyword("bonus", Value::Int(10));
        assert_eq!(def.call(&args).unwrap(), Value::Int(13));

        let args = CallArgs::positional(vec![Value::Int(1)]);
        assert_eq!(def.call(&args).unwrap_err().kind, "TypeError");
    }

    #[test]
    fn test_dict_from_kwargs() {
        let def = registry().get(CallableKind::Capsule, "dict_from_kwargs").unwrap();
        let mut args = CallArgs::new();
        args.push_keyword("a", Value::Int(1));
        assert_eq!(def.call(&args).unwrap(), Value::dict([("a", Value::Int(1))]));
    }
}
