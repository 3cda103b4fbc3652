use crate::literal::{parse_literal, CallArgs, CallError, Value};
use crate::nodes::factory::{CallableDef, CallableKind, CallableRegistry};
use crate::nodes::signature::{Annotation, ParamDecl, SignatureDecl};
use crate::nodes::types::PyType;

fn viz_outputs(text: &str) -> Annotation {
    // Annotation text is a fixed literal; a parse failure falls back to a single output
    parse_literal(text).map_or(Annotation::Empty, Annotation::Literal)
}

pub(super) fn register(registry: &mut CallableRegistry) {
    let view_repr = CallableDef::new(
        "view_repr",
        SignatureDecl::new(vec![ParamDecl::positional("obj")])
            .returning(viz_outputs("[{'name': 'value'}, {'name': 'repr_text', 'type': 'str', 'viz': 'side'}]")),
        view_repr,
    )
    .with_substitution(
        "$target = {'value': $obj, 'repr_text': repr($obj)}\nprint($target['repr_text'])",
    );
    registry.register(CallableKind::GenViewer, "view_repr", view_repr);

    let view_text = CallableDef::new(
        "view_text",
        SignatureDecl::new(vec![
            ParamDecl::positional("text").with_hint(PyType::Str).with_default(""),
            ParamDecl::positional("max_lines")
                .with_annotation(Annotation::preset("positive_integer"))
                .with_default(10),
        ])
        .returning(viz_outputs(
            "[{'name': 'text', 'type': 'str'}, {'name': 'preview', 'type': 'str', 'viz': 'side'}]",
        )),
        view_text,
    )
    .with_substitution(
        "$target = {'text': $text, 'preview': '\\n'.join($text.splitlines()[:$max_lines])}\nprint($target['preview'])",
    );
    registry.register(CallableKind::GenViewer, "view_text", view_text);
}

fn view_repr(args: &CallArgs) -> Result<Value, CallError> {
    let obj = args.require(0, "obj")?;
    Ok(Value::dict([
        ("value", obj.clone()),
        ("repr_text", Value::Str(obj.repr())),
    ]))
}

fn view_text(args: &CallArgs) -> Result<Value, CallError> {
    let text = match args.get(0, "text") {
        Some(Value::Str(text)) => text.clone(),
        Some(other) => {
            return Err(CallError::type_error(format!(
                "text must be a string, not '{}'",
                other.type_name()
            )))
        }
        None => String::new(),
    };
    let max_lines = args.get(1, "max_lines").and_then(Value::as_int).unwrap_or(10);
    if max_lines < 1 {
        return Err(CallError::value_error("max_lines must be a positive integer"));
    }
    let preview: Vec<&str> = text.lines().take(max_lines as usize).collect();
    Ok(Value::dict([
        ("text", Value::Str(text.clone())),
        ("preview", Value::Str(preview.join("\n"))),
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::signature::{SignatureRecord, VizKind};

    #[test]
    fn test_viewers_declare_side_outputs() {
        let mut registry = CallableRegistry::new();
        register(&mut registry);
        for id in ["view_repr", "view_text"] {
            let def = registry.get(CallableKind::GenViewer, id).unwrap();
            let record = SignatureRecord::from_decl(id, &def.signature).unwrap();
            assert!(record.is_multi_output());
            assert!(record.outputs.iter().any(|o| o.viz == Some(VizKind::Side)));
            assert!(def.substitution.as_ref().unwrap().is_statement());
        }
    }

    #[test]
    fn test_view_text_truncates() {
        let args = CallArgs::positional(vec![Value::str("a\nb\nc"), Value::Int(2)]);
        let result = view_text(&args).unwrap();
        assert_eq!(result.get_key("preview"), Some(&Value::str("a\nb")));
        let args = CallArgs::positional(vec![Value::str("a"), Value::Int(0)]);
        assert_eq!(view_text(&args).unwrap_err().kind, "ValueError");
    }

    #[test]
    fn test_view_repr() {
        let args = CallArgs::positional(vec![Value::str("x")]);
        let result = view_repr(&args).unwrap();
        assert_eq!(result.get_key("repr_text"), Some(&Value::str("'x'")));
    }
}
