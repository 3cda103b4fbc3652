//! Annotation presets
//!
//! Short string keys that stand for a full widget annotation (parameters) or
//! a list of output items (return annotations).

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::literal::Value;
use crate::nodes::signature::OutputDef;
use crate::nodes::types::{PyType, TypeHint};

/// Widget annotation a preset key expands to
#[derive(Debug, Clone, PartialEq)]
pub struct ParamPreset {
    pub widget_name: &'static str,
    pub widget_kwargs: Vec<(String, Value)>,
    pub type_hint: TypeHint,
}

fn preset(widget_name: &'static str, kwargs: Vec<(&str, Value)>, type_hint: TypeHint) -> ParamPreset {
    ParamPreset {
        widget_name,
        widget_kwargs: kwargs
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect(),
        type_hint,
    }
}

fn int_hint() -> Value {
    Value::Tuple(vec![Value::str("int")])
}

static PARAM_PRESETS: Lazy<HashMap<&'static str, ParamPreset>> = Lazy::new(|| {
    let str_hint = || TypeHint::of(PyType::Str);
    let optional_int = || TypeHint::union([PyType::Int, PyType::NoneType]);
    let mut presets = HashMap::new();

    presets.insert("python_literal", preset("literal_entry", vec![], TypeHint::NotSpecified));
    presets.insert(
        "python_multiline_literal",
        preset("literal_display", vec![], TypeHint::NotSpecified),
    );
    presets.insert(
        "python_literal_string",
        preset(
            "string_entry",
            vec![("validation_command", Value::str("literal_eval"))],
            str_hint(),
        ),
    );
    presets.insert(
        "python_literal_text_string",
        preset(
            "text_display",
            vec![
                ("validation_command", Value::str("literal_eval")),
                ("syntax_highlighting", Value::str("python")),
            ],
            str_hint(),
        ),
    );
    presets.insert(
        "natural_number",
        preset(
            "int_float_entry",
            vec![("min_value", Value::Int(0)), ("numeric_classes_hint", int_hint())],
            TypeHint::of(PyType::Int),
        ),
    );
    presets.insert(
        "natural_number_or_none",
        preset(
            "int_float_entry",
            vec![
                ("min_value", Value::Int(0)),
                ("numeric_classes_hint", int_hint()),
                ("allow_none", Value::Bool(true)),
            ],
            optional_int(),
        ),
    );
    presets.insert(
        "positive_integer",
        preset(
            "int_float_entry",
            vec![("min_value", Value::Int(1)), ("numeric_classes_hint", int_hint())],
            TypeHint::of(PyType::Int),
        ),
    );
    presets.insert(
        "positive_integer_or_none",
        preset(
            "int_float_entry",
            vec![
                ("min_value", Value::Int(1)),
                ("numeric_classes_hint", int_hint()),
                ("allow_none", Value::Bool(true)),
            ],
            optional_int(),
        ),
    );

    let path_families: [(&[&str], &'static str); 6] = [
        (&["path", "file", "filepath", "file_path", "dirpath", "directory"], "path_preview"),
        (&["text_path", "text_filepath", "text_file_path"], "text_preview"),
        (&["image_path", "image_filepath", "image_file_path"], "image_preview"),
        (&["font_path", "font_filepath", "font_file_path"], "font_preview"),
        (&["audio_path", "audio_filepath", "audio_file_path"], "audio_preview"),
        (&["video_path", "video_filepath", "video_file_path"], "video_preview"),
    ];
    for (keys, widget_name) in path_families {
        for key in keys {
            presets.insert(*key, preset(widget_name, vec![], str_hint()));
        }
    }

    presets.insert("text", preset("text_display", vec![], str_hint()));
    presets.insert("text_string", preset("text_display", vec![], str_hint()));
    presets
});

/// Widget preset for a parameter annotation key
pub fn param_preset(key: &str) -> Option<&'static ParamPreset> {
    PARAM_PRESETS.get(key)
}

/// Output items for a return annotation key
pub fn output_preset(key: &str) -> Option<Vec<OutputDef>> {
    let (name, ty) = match key {
        "iterator" => ("iterator", PyType::Iterator),
        "tuple" => ("a_tuple", PyType::Tuple),
        _ => return None,
    };
    Some(vec![OutputDef {
        name: name.to_string(),
        type_hint: TypeHint::of(ty),
        viz: None,
    }])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_aliases_share_widget() {
        for key in ["path", "file", "filepath"] {
            assert_eq!(param_preset(key).unwrap().widget_name, "path_preview");
        }
        assert_eq!(param_preset("image_file_path").unwrap().widget_name, "image_preview");
        assert_eq!(param_preset("audio_path").unwrap().widget_name, "audio_preview");
    }

    #[test]
    fn test_number_presets() {
        let preset = param_preset("positive_integer_or_none").unwrap();
        assert_eq!(preset.widget_name, "int_float_entry");
        assert!(preset.type_hint.includes(&PyType::NoneType));
        assert!(preset
            .widget_kwargs
            .iter()
            .any(|(key, value)| key == "min_value" && *value == Value::Int(1)));
    }

    #[test]
    fn test_unknown_keys() {
        assert!(param_preset("no_such_preset").is_none());
        assert!(output_preset("python_literal").is_none());
    }
}
