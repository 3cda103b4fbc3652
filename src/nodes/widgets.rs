//! Widget metadata and widget values
//!
//! The editor draws widgets; the core only needs to know which widget a
//! parameter gets ([`resolve_widget_meta`]) and what value it currently
//! holds ([`Widget`]).

use std::collections::BTreeMap;

use crate::error::{GraphError, ValidationError};
use crate::literal::{parse_literal, Value};
use crate::nodes::presets::param_preset;
use crate::nodes::signature::{Annotation, SignatureRecord};
use crate::nodes::types::{PyType, TypeHint};

/// Which widget represents a parameter, and how it is configured
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetMeta {
    pub widget_name: String,
    pub widget_kwargs: Vec<(String, Value)>,
}

impl WidgetMeta {
    pub fn new(widget_name: impl Into<String>) -> Self {
        Self {
            widget_name: widget_name.into(),
            widget_kwargs: Vec::new(),
        }
    }

    pub fn with_kwarg(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.set_kwarg(key, value.into());
        self
    }

    pub fn kwarg(&self, key: &str) -> Option<&Value> {
        self.widget_kwargs
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value)
    }

    pub fn set_kwarg(&mut self, key: &str, value: Value) {
        match self.widget_kwargs.iter_mut().find(|(name, _)| name == key) {
            Some(slot) => slot.1 = value,
            None => self.widget_kwargs.push((key.to_string(), value)),
        }
    }

    /// Document form: `{'widget_name': ..., 'widget_kwargs': {...}}`
    pub fn to_value(&self) -> Value {
        Value::dict([
            ("widget_name", Value::str(&self.widget_name)),
            ("widget_kwargs", Value::dict(self.widget_kwargs.clone())),
        ])
    }

    pub fn from_value(value: &Value) -> Result<Self, String> {
        let widget_name = match value.get_key("widget_name") {
            Some(Value::Str(name)) if !name.is_empty() => name.clone(),
            _ => return Err("widget data needs a non-empty 'widget_name'".to_string()),
        };
        let widget_kwargs = match value.get_key("widget_kwargs") {
            None => Vec::new(),
            Some(kwargs) => string_keyed(kwargs)?,
        };
        Ok(Self {
            widget_name,
            widget_kwargs,
        })
    }
}

fn string_keyed(mapping: &Value) -> Result<Vec<(String, Value)>, String> {
    let items = mapping
        .as_mapping()
        .ok_or_else(|| format!("expected a dict, got {}", mapping.type_name()))?;
    items
        .iter()
        .map(|(key, value)| match key {
            Value::Str(key) => Ok((key.clone(), value.clone())),
            other => Err(format!("widget kwarg keys must be strings, got {}", other.repr())),
        })
        .collect()
}

/// Decides which widget, if any, represents a parameter
///
/// Parameters without a default get no widget; they must be fed through
/// their socket.
pub fn resolve_widget_meta(
    param: &str,
    annotation: &Annotation,
    type_hint: &TypeHint,
    default: Option<&Value>,
) -> Result<Option<WidgetMeta>, ValidationError> {
    let Some(default) = default else {
        return Ok(None);
    };
    let invalid = |reason: String| ValidationError::InvalidWidgetAnnotation {
        param: param.to_string(),
        reason,
    };

    // explicit widget annotation
    if let Annotation::Literal(value) = annotation {
        if let Some(Value::Str(widget_name)) = value.get_key("widget_name") {
            if !widget_name.is_empty() {
                let mut meta = WidgetMeta::new(widget_name.clone());
                if let Some(kwargs) = value.get_key("widget_kwargs") {
                    meta.widget_kwargs = string_keyed(kwargs).map_err(invalid)?;
                }
                meta.set_kwarg("value", default.clone());
                finish_meta(&mut meta, type_hint, default).map_err(invalid)?;
                return Ok(Some(meta));
            }
        }
    }

    if let Annotation::Preset(keys) = annotation {
        if let Some(preset) = keys.iter().find_map(|key| param_preset(key)) {
            let mut meta = WidgetMeta {
                widget_name: preset.widget_name.to_string(),
                widget_kwargs: preset.widget_kwargs.clone(),
            };
            meta.set_kwarg("value", default.clone());
            finish_meta(&mut meta, &preset.type_hint, default).map_err(invalid)?;
            return Ok(Some(meta));
        }
    }

    if !default.is_literal() {
        return Ok(Some(WidgetMeta::new("default_holder").with_kwarg("value", default.clone())));
    }

    let meta = match (type_hint, default) {
        (TypeHint::Type(PyType::Str), Value::Str(_)) => WidgetMeta::new("string_entry"),
        (TypeHint::Type(PyType::Bool), Value::Bool(_)) => WidgetMeta::new("check_button"),
        _ => match special_widget(type_hint, default) {
            Some(meta) => meta,
            None => WidgetMeta::new("default_holder"),
        },
    };
    Ok(Some(meta.with_kwarg("value", default.clone())))
}

/// Widget metadata of every non-variable parameter of a signature that gets
/// a widget
pub fn resolve_signature_widgets(
    signature: &SignatureRecord,
) -> Result<BTreeMap<String, WidgetMeta>, ValidationError> {
    let mut metas = BTreeMap::new();
    for param in signature.parameters.iter().filter(|p| !p.kind.is_variable()) {
        let meta = resolve_widget_meta(
            &param.name,
            &param.annotation,
            &param.type_hint,
            param.default.as_ref(),
        )?;
        if let Some(meta) = meta {
            metas.insert(param.name.clone(), meta);
        }
    }
    Ok(metas)
}

/// Tri-state tray, numeric entry and literal entry combinations
fn special_widget(type_hint: &TypeHint, default: &Value) -> Option<WidgetMeta> {
    let allows_none = type_hint.includes(&PyType::NoneType);
    let members = type_hint.non_none_members();

    if allows_none
        && members == [&PyType::Bool]
        && matches!(default, Value::Bool(_) | Value::None)
    {
        return Some(WidgetMeta::new("ternary_tray"));
    }

    let numeric = !members.is_empty()
        && members
            .iter()
            .all(|ty| matches!(ty, PyType::Int | PyType::Float));
    let default_fits = match default {
        Value::Int(_) => members.contains(&&PyType::Int) || members.contains(&&PyType::Float),
        Value::Float(_) => members.contains(&&PyType::Float),
        Value::None => allows_none,
        _ => false,
    };
    if numeric && default_fits {
        let classes = members.iter().map(|ty| Value::str(ty.name())).collect();
        return Some(
            WidgetMeta::new("int_float_entry")
                .with_kwarg("numeric_classes_hint", Value::Tuple(classes))
                .with_kwarg("allow_none", allows_none),
        );
    }

    let literal_types = !members.is_empty()
        && members.iter().all(|ty| {
            matches!(
                ty,
                PyType::List | PyType::Tuple | PyType::Dict | PyType::Set | PyType::Bytes
            )
        });
    let none_only = members.is_empty() && allows_none;
    if literal_types || none_only {
        return Some(WidgetMeta::new("literal_entry"));
    }
    None
}

/// Fills in and checks the kwargs some widgets derive from the type hint
fn finish_meta(meta: &mut WidgetMeta, type_hint: &TypeHint, default: &Value) -> Result<(), String> {
    match meta.widget_name.as_str() {
        "int_float_entry" => {
            let classes = match meta.kwarg("numeric_classes_hint") {
                Some(hint) => numeric_classes(hint)?,
                None => {
                    let mut derived: Vec<String> = type_hint
                        .non_none_members()
                        .into_iter()
                        .filter(|ty| matches!(ty, PyType::Int | PyType::Float))
                        .map(|ty| ty.name().to_string())
                        .collect();
                    if derived.is_empty() {
                        derived = match default {
                            Value::Int(_) => vec!["int".to_string()],
                            Value::Float(_) => vec!["float".to_string()],
                            _ => vec!["int".to_string(), "float".to_string()],
                        };
                    }
                    derived
                }
            };
            let allow_none = match meta.kwarg("allow_none") {
                Some(Value::Bool(flag)) => *flag,
                Some(other) => return Err(format!("'allow_none' must be a bool, got {}", other.repr())),
                None => type_hint.includes(&PyType::NoneType) || default.is_none(),
            };
            meta.set_kwarg(
                "numeric_classes_hint",
                Value::Tuple(classes.into_iter().map(Value::Str).collect()),
            );
            meta.set_kwarg("allow_none", Value::Bool(allow_none));
            Widget::from_meta(meta).map_err(|err| err.to_string())?;
        }
        "color_button" => {
            if meta.kwarg("color_format").is_none() {
                let format = if type_hint.includes(&PyType::Str) || matches!(default, Value::Str(_)) {
                    "hex_string"
                } else if type_hint.includes(&PyType::Tuple) || matches!(default, Value::Tuple(_)) {
                    "rgb_tuple"
                } else {
                    return Err("color_button needs a str or tuple type".to_string());
                };
                meta.set_kwarg("color_format", Value::str(format));
            }
            Widget::from_meta(meta).map_err(|err| err.to_string())?;
        }
        _ => {}
    }
    Ok(())
}

fn numeric_classes(hint: &Value) -> Result<Vec<String>, String> {
    let items: Vec<Value> = match hint {
        Value::Str(_) => vec![hint.clone()],
        Value::Tuple(items) | Value::List(items) => items.clone(),
        other => return Err(format!("invalid numeric_classes_hint {}", other.repr())),
    };
    let mut classes = Vec::new();
    for item in items {
        match item.as_str() {
            Some(name @ ("int" | "float")) => {
                if !classes.iter().any(|c: &String| c == name) {
                    classes.push(name.to_string());
                }
            }
            _ => return Err(format!("invalid numeric class {}", item.repr())),
        }
    }
    if classes.is_empty() {
        return Err("numeric_classes_hint is empty".to_string());
    }
    Ok(classes)
}

/// Format of values held by a colour button
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorFormat {
    HexString,
    RgbTuple,
}

/// Behaviour of a widget, derived from its name and kwargs
#[derive(Debug, Clone, PartialEq)]
pub enum WidgetKind {
    StringEntry { literal_validated: bool },
    TextDisplay { literal_validated: bool },
    CheckButton,
    TernaryTray,
    IntFloatEntry {
        accepts_int: bool,
        accepts_float: bool,
        allow_none: bool,
        min: Option<f64>,
        max: Option<f64>,
    },
    LiteralEntry,
    LiteralDisplay,
    ColorButton(ColorFormat),
    /// Path previews (`path_preview`, `image_preview`, ...)
    Preview,
    /// Read-only holder for defaults that are not literals
    DefaultHolder,
    /// Widget unknown to the core; accepts anything
    Custom,
}

impl WidgetKind {
    fn from_meta(meta: &WidgetMeta) -> Result<Self, String> {
        let literal_validated = matches!(
            meta.kwarg("validation_command"),
            Some(Value::Str(command)) if command == "literal_eval"
        );
        let kind = match meta.widget_name.as_str() {
            "string_entry" => WidgetKind::StringEntry { literal_validated },
            "text_display" => WidgetKind::TextDisplay { literal_validated },
            "check_button" => WidgetKind::CheckButton,
            "ternary_tray" => WidgetKind::TernaryTray,
            "int_float_entry" => {
                let classes = match meta.kwarg("numeric_classes_hint") {
                    Some(hint) => numeric_classes(hint)?,
                    None => vec!["int".to_string(), "float".to_string()],
                };
                let bound = |key: &str| meta.kwarg(key).and_then(Value::as_float);
                WidgetKind::IntFloatEntry {
                    accepts_int: classes.iter().any(|c| c == "int"),
                    accepts_float: classes.iter().any(|c| c == "float"),
                    allow_none: meta.kwarg("allow_none").and_then(Value::as_bool).unwrap_or(false),
                    min: bound("min_value"),
                    max: bound("max_value"),
                }
            }
            "literal_entry" => WidgetKind::LiteralEntry,
            "literal_display" => WidgetKind::LiteralDisplay,
            "color_button" => match meta.kwarg("color_format").and_then(Value::as_str) {
                Some("rgb_tuple") => WidgetKind::ColorButton(ColorFormat::RgbTuple),
                Some("hex_string") | None => WidgetKind::ColorButton(ColorFormat::HexString),
                Some(other) => return Err(format!("unknown color_format '{}'", other)),
            },
            "default_holder" => WidgetKind::DefaultHolder,
            name if name.ends_with("_preview") => WidgetKind::Preview,
            _ => WidgetKind::Custom,
        };
        Ok(kind)
    }
}

/// A widget embedded in a socket: its configuration plus its current value
#[derive(Debug, Clone, PartialEq)]
pub struct Widget {
    name: String,
    kwargs: Vec<(String, Value)>,
    kind: WidgetKind,
    value: Value,
}

impl Widget {
    /// Builds a widget from metadata; the initial value is the `value` kwarg
    pub fn from_meta(meta: &WidgetMeta) -> Result<Self, GraphError> {
        let kind = WidgetKind::from_meta(meta).map_err(|reason| GraphError::InvalidWidgetValue {
            widget: meta.widget_name.clone(),
            expected: "valid widget kwargs".to_string(),
            got: reason,
        })?;
        let mut widget = Self {
            name: meta.widget_name.clone(),
            kwargs: meta
                .widget_kwargs
                .iter()
                .filter(|(key, _)| key != "value")
                .cloned()
                .collect(),
            kind,
            value: Value::None,
        };
        let initial = meta.kwarg("value").cloned().unwrap_or(Value::None);
        widget.check(&initial)?;
        widget.value = initial;
        Ok(widget)
    }

    /// Reads the document form written by [`Widget::to_data`]
    pub fn from_data(data: &Value) -> Result<Self, String> {
        let meta = WidgetMeta::from_value(data)?;
        Self::from_meta(&meta).map_err(|err| err.to_string())
    }

    /// Shorthand for a literal entry holding `value`
    pub fn literal_entry(value: Value) -> Result<Self, GraphError> {
        Self::from_meta(&WidgetMeta::new("literal_entry").with_kwarg("value", value))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &WidgetKind {
        &self.kind
    }

    pub fn get(&self) -> &Value {
        &self.value
    }

    /// Replaces the value after checking it fits the widget
    pub fn set(&mut self, value: Value) -> Result<(), GraphError> {
        if self.kind == WidgetKind::DefaultHolder && value != self.value {
            return Err(self.rejection(&value));
        }
        self.check(&value)?;
        self.value = value;
        Ok(())
    }

    /// Type of values the widget holds
    pub fn expected_type(&self) -> TypeHint {
        match &self.kind {
            WidgetKind::StringEntry { .. } | WidgetKind::TextDisplay { .. } | WidgetKind::Preview => {
                TypeHint::of(PyType::Str)
            }
            WidgetKind::CheckButton => TypeHint::of(PyType::Bool),
            WidgetKind::TernaryTray => TypeHint::union([PyType::Bool, PyType::NoneType]),
            WidgetKind::IntFloatEntry {
                accepts_int,
                accepts_float,
                allow_none,
                ..
            } => {
                let mut types = Vec::new();
                if *accepts_int {
                    types.push(PyType::Int);
                }
                if *accepts_float {
                    types.push(PyType::Float);
                }
                if *allow_none {
                    types.push(PyType::NoneType);
                }
                TypeHint::union(types)
            }
            WidgetKind::ColorButton(ColorFormat::HexString) => TypeHint::of(PyType::Str),
            WidgetKind::ColorButton(ColorFormat::RgbTuple) => TypeHint::of(PyType::Tuple),
            WidgetKind::DefaultHolder => TypeHint::of(PyType::of(&self.value)),
            WidgetKind::LiteralEntry | WidgetKind::LiteralDisplay | WidgetKind::Custom => {
                TypeHint::NotSpecified
            }
        }
    }

    /// Metadata describing the widget with its current value
    pub fn meta(&self) -> WidgetMeta {
        let mut meta = WidgetMeta {
            widget_name: self.name.clone(),
            widget_kwargs: self.kwargs.clone(),
        };
        meta.set_kwarg("value", self.value.clone());
        meta
    }

    /// Document form, see [`WidgetMeta::to_value`]
    pub fn to_data(&self) -> Value {
        self.meta().to_value()
    }

    fn rejection(&self, value: &Value) -> GraphError {
        GraphError::InvalidWidgetValue {
            widget: self.name.clone(),
            expected: self.expected_type().to_string(),
            got: value.repr(),
        }
    }

    fn check(&self, value: &Value) -> Result<(), GraphError> {
        let ok = match &self.kind {
            WidgetKind::StringEntry { literal_validated } | WidgetKind::TextDisplay { literal_validated } => {
                match value {
                    Value::Str(text) => !literal_validated || parse_literal(text).is_ok(),
                    _ => false,
                }
            }
            WidgetKind::Preview => matches!(value, Value::Str(_)),
            WidgetKind::CheckButton => matches!(value, Value::Bool(_)),
            WidgetKind::TernaryTray => matches!(value, Value::Bool(_) | Value::None),
            WidgetKind::IntFloatEntry {
                accepts_int,
                accepts_float,
                allow_none,
                min,
                max,
            } => match value {
                Value::None => *allow_none,
                Value::Int(i) if *accepts_int || *accepts_float => {
                    within(*i as f64, *min, *max)
                }
                Value::Float(f) if *accepts_float => within(*f, *min, *max),
                _ => false,
            },
            WidgetKind::LiteralEntry | WidgetKind::LiteralDisplay => value.is_literal(),
            WidgetKind::ColorButton(ColorFormat::HexString) => {
                matches!(value, Value::Str(text) if is_hex_color(text))
            }
            WidgetKind::ColorButton(ColorFormat::RgbTuple) => match value {
                Value::Tuple(items) => {
                    (items.len() == 3 || items.len() == 4)
                        && items
                            .iter()
                            .all(|c| matches!(c, Value::Int(v) if (0..=255).contains(v)))
                }
                _ => false,
            },
            WidgetKind::DefaultHolder | WidgetKind::Custom => true,
        };
        if ok {
            Ok(())
        } else {
            Err(self.rejection(value))
        }
    }
}

fn within(value: f64, min: Option<f64>, max: Option<f64>) -> bool {
    min.map_or(true, |min| value >= min) && max.map_or(true, |max| value <= max)
}

fn is_hex_color(text: &str) -> bool {
    text.strip_prefix('#').is_some_and(|digits| {
        (digits.len() == 6 || digits.len() == 8) && digits.chars().all(|c| c.is_ascii_hexdigit())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(annotation: Annotation, hint: TypeHint, default: Value) -> WidgetMeta {
        resolve_widget_meta("p", &annotation, &hint, Some(&default))
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_no_default_no_widget() {
        let meta = resolve_widget_meta("p", &Annotation::Empty, &TypeHint::NotSpecified, None).unwrap();
        assert!(meta.is_none());
    }

    #[test]
    fn test_explicit_widget_annotation() {
        let annotation = Annotation::Literal(
            parse_literal("{'widget_name': 'int_float_entry', 'widget_kwargs': {'min_value': 0}, 'type': 'float'}")
                .unwrap(),
        );
        let meta = resolve(annotation, TypeHint::of(PyType::Float), Value::Float(1.5));
        assert_eq!(meta.widget_name, "int_float_entry");
        assert_eq!(meta.kwarg("value"), Some(&Value::Float(1.5)));
        assert_eq!(
            meta.kwarg("numeric_classes_hint"),
            Some(&Value::Tuple(vec![Value::str("float")]))
        );
        assert_eq!(meta.kwarg("allow_none"), Some(&Value::Bool(false)));
    }

    #[test]
    fn test_invalid_numeric_hint_rejected() {
        let annotation = Annotation::Literal(
            parse_literal("{'widget_name': 'int_float_entry', 'widget_kwargs': {'numeric_classes_hint': ('str',)}}")
                .unwrap(),
        );
        let result = resolve_widget_meta("p", &annotation, &TypeHint::NotSpecified, Some(&Value::Int(1)));
        assert!(matches!(result, Err(ValidationError::InvalidWidgetAnnotation { .. })));
    }

    #[test]
    fn test_color_format_from_type() {
        let annotation = Annotation::Literal(parse_literal("{'widget_name': 'color_button'}").unwrap());
        let meta = resolve(annotation.clone(), TypeHint::of(PyType::Str), Value::str("#ff0000"));
        assert_eq!(meta.kwarg("color_format"), Some(&Value::str("hex_string")));

        let rgb = Value::Tuple(vec![Value::Int(255), Value::Int(0), Value::Int(0)]);
        let meta = resolve(annotation, TypeHint::of(PyType::Tuple), rgb);
        assert_eq!(meta.kwarg("color_format"), Some(&Value::str("rgb_tuple")));
    }

    #[test]
    fn test_preset_annotation() {
        let meta = resolve(
            Annotation::preset("natural_number"),
            TypeHint::of(PyType::Int),
            Value::Int(3),
        );
        assert_eq!(meta.widget_name, "int_float_entry");
        assert_eq!(meta.kwarg("min_value"), Some(&Value::Int(0)));

        let alternatives = Annotation::Preset(vec!["unknown".into(), "image_path".into()]);
        let meta = resolve(alternatives, TypeHint::of(PyType::Str), Value::str("a.png"));
        assert_eq!(meta.widget_name, "image_preview");
    }

    #[test]
    fn test_fallback_rules() {
        let str_meta = resolve(Annotation::Empty, TypeHint::of(PyType::Str), Value::str(" "));
        assert_eq!(str_meta.widget_name, "string_entry");

        let bool_meta = resolve(Annotation::Empty, TypeHint::of(PyType::Bool), Value::Bool(true));
        assert_eq!(bool_meta.widget_name, "check_button");

        let tri = resolve(
            Annotation::Empty,
            TypeHint::union([PyType::Bool, PyType::NoneType]),
            Value::None,
        );
        assert_eq!(tri.widget_name, "ternary_tray");

        let number = resolve(Annotation::Empty, TypeHint::of(PyType::Int), Value::Int(2));
        assert_eq!(number.widget_name, "int_float_entry");

        let list = resolve(Annotation::Empty, TypeHint::of(PyType::List), Value::List(vec![]));
        assert_eq!(list.widget_name, "literal_entry");

        let mismatch = resolve(Annotation::Empty, TypeHint::of(PyType::Str), Value::Int(2));
        assert_eq!(mismatch.widget_name, "default_holder");
    }

    #[test]
    fn test_non_literal_default_gets_holder() {
        let func = Value::Callable(crate::literal::CallableValue::new("f", |_| Ok(Value::None)));
        let meta = resolve(Annotation::Empty, TypeHint::of(PyType::Callable), func);
        assert_eq!(meta.widget_name, "default_holder");
    }

    #[test]
    fn test_widget_set_validates() {
        let meta = WidgetMeta::new("int_float_entry")
            .with_kwarg("numeric_classes_hint", Value::Tuple(vec![Value::str("int")]))
            .with_kwarg("min_value", 0)
            .with_kwarg("value", 1);
        let mut widget = Widget::from_meta(&meta).unwrap();
        assert!(widget.set(Value::Int(5)).is_ok());
        assert!(widget.set(Value::Int(-1)).is_err());
        assert!(widget.set(Value::Float(0.5)).is_err());
        assert!(widget.set(Value::None).is_err());
        assert_eq!(widget.get(), &Value::Int(5));
        assert_eq!(widget.expected_type(), TypeHint::of(PyType::Int));
    }

    #[test]
    fn test_widget_data_round_trip() {
        let widget = Widget::literal_entry(Value::List(vec![Value::Int(1)])).unwrap();
        let data = widget.to_data();
        assert_eq!(Widget::from_data(&data).unwrap(), widget);
        assert_eq!(data.get_key("widget_name"), Some(&Value::str("literal_entry")));
    }

    #[test]
    fn test_default_holder_is_read_only() {
        let mut widget =
            Widget::from_meta(&WidgetMeta::new("default_holder").with_kwarg("value", 1)).unwrap();
        assert!(widget.set(Value::Int(1)).is_ok());
        assert!(widget.set(Value::Int(2)).is_err());
    }
}
