//! Signature records
//!
//! Callables declare their parameters and return annotation as data
//! ([`SignatureDecl`]); [`SignatureRecord::from_decl`] turns a declaration
//! into the record shared by every node that uses the callable. The return
//! annotation mini-language is parsed here, once per callable.

use crate::error::ValidationError;
use crate::literal::Value;
use crate::nodes::types::{PyType, TypeHint};

/// Name of the single output of callables without a structured return annotation
pub const DEFAULT_OUTPUT_NAME: &str = "output";

/// Parameter kind, in Python's terms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    /// Positional-only or positional-or-keyword
    Positional,
    KeywordOnly,
    /// `*args`
    VarPositional,
    /// `**kwargs`
    VarKeyword,
}

impl ParamKind {
    pub fn is_variable(&self) -> bool {
        matches!(self, ParamKind::VarPositional | ParamKind::VarKeyword)
    }
}

/// Parameter or return annotation, written as data
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Annotation {
    #[default]
    Empty,
    /// A plain type or union of types
    Hint(TypeHint),
    /// A preset key (one string) or alternative preset keys (tuple of strings)
    Preset(Vec<String>),
    /// Literal annotation: a widget mapping or a list of output items
    Literal(Value),
}

impl Annotation {
    pub fn hint(ty: PyType) -> Self {
        Annotation::Hint(TypeHint::of(ty))
    }

    pub fn preset(key: &str) -> Self {
        Annotation::Preset(vec![key.to_string()])
    }
}

/// Declared parameter of a callable
#[derive(Debug, Clone, PartialEq)]
pub struct ParamDecl {
    pub name: String,
    pub kind: ParamKind,
    pub annotation: Annotation,
    pub default: Option<Value>,
}

impl ParamDecl {
    fn new(name: &str, kind: ParamKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            annotation: Annotation::Empty,
            default: None,
        }
    }

    pub fn positional(name: &str) -> Self {
        Self::new(name, ParamKind::Positional)
    }

    pub fn keyword_only(name: &str) -> Self {
        Self::new(name, ParamKind::KeywordOnly)
    }

    pub fn var_positional(name: &str) -> Self {
        Self::new(name, ParamKind::VarPositional)
    }

    pub fn var_keyword(name: &str) -> Self {
        Self::new(name, ParamKind::VarKeyword)
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_annotation(mut self, annotation: Annotation) -> Self {
        self.annotation = annotation;
        self
    }

    pub fn with_hint(self, ty: PyType) -> Self {
        self.with_annotation(Annotation::hint(ty))
    }
}

/// Declared signature of a callable
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SignatureDecl {
    pub params: Vec<ParamDecl>,
    pub returns: Annotation,
}

impl SignatureDecl {
    pub fn new(params: Vec<ParamDecl>) -> Self {
        Self {
            params,
            returns: Annotation::Empty,
        }
    }

    pub fn returning(mut self, returns: Annotation) -> Self {
        self.returns = returns;
        self
    }
}

/// How an output is shown by viewer nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VizKind {
    Side,
    Loop,
}

impl VizKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VizKind::Side => "side",
            VizKind::Loop => "loop",
        }
    }
}

/// Resolved parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub kind: ParamKind,
    pub default: Option<Value>,
    pub type_hint: TypeHint,
    pub annotation: Annotation,
}

/// Resolved output
#[derive(Debug, Clone, PartialEq)]
pub struct OutputDef {
    pub name: String,
    pub type_hint: TypeHint,
    pub viz: Option<VizKind>,
}

/// Parameters and ordered outputs of a callable
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureRecord {
    pub parameters: Vec<Parameter>,
    pub outputs: Vec<OutputDef>,
}

impl SignatureRecord {
    /// Resolves a declaration, validating its return annotation
    pub fn from_decl(callable: &str, decl: &SignatureDecl) -> Result<Self, ValidationError> {
        let parameters = decl
            .params
            .iter()
            .map(|param| Parameter {
                name: param.name.clone(),
                kind: param.kind,
                default: param.default.clone(),
                type_hint: resolve_param_type(&param.annotation, param.default.as_ref()),
                annotation: param.annotation.clone(),
            })
            .collect();

        Ok(Self {
            parameters,
            outputs: parse_outputs(callable, &decl.returns)?,
        })
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|param| param.name == name)
    }

    pub fn output(&self, name: &str) -> Option<&OutputDef> {
        self.outputs.iter().find(|output| output.name == name)
    }

    /// Whether return values must be split into several named outputs
    pub fn is_multi_output(&self) -> bool {
        self.outputs.len() > 1
    }

    pub fn variable_parameters(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter().filter(|param| param.kind.is_variable())
    }
}

/// Type of a parameter: its annotation when it names one, otherwise the type
/// of its default
fn resolve_param_type(annotation: &Annotation, default: Option<&Value>) -> TypeHint {
    let from_annotation = match annotation {
        Annotation::Hint(hint) => Some(hint.clone()),
        Annotation::Literal(value) => value.get_key("type").map(TypeHint::from_value),
        Annotation::Preset(keys) => keys
            .iter()
            .find_map(|key| super::presets::param_preset(key))
            .map(|preset| preset.type_hint.clone()),
        Annotation::Empty => None,
    };
    from_annotation
        .or_else(|| default.map(|value| TypeHint::of(PyType::of(value))))
        .unwrap_or_default()
}

fn parse_outputs(callable: &str, returns: &Annotation) -> Result<Vec<OutputDef>, ValidationError> {
    let single = |type_hint: TypeHint| {
        vec![OutputDef {
            name: DEFAULT_OUTPUT_NAME.to_string(),
            type_hint,
            viz: None,
        }]
    };

    match returns {
        Annotation::Empty => Ok(single(TypeHint::NotSpecified)),
        Annotation::Hint(hint) => Ok(single(hint.clone())),
        Annotation::Preset(keys) => match keys.iter().find_map(|key| super::presets::output_preset(key)) {
            Some(outputs) => Ok(outputs),
            None => Ok(single(TypeHint::from_value(&Value::str(keys.join(", "))))),
        },
        Annotation::Literal(value) => match output_items(value) {
            Some(items) => parse_output_items(callable, items),
            None => Ok(single(TypeHint::from_value(value))),
        },
    }
}

/// Items of a return annotation that follows the mini-language: a non-empty
/// list of mappings that all carry a `name`
fn output_items(value: &Value) -> Option<&[Value]> {
    let Value::List(items) = value else {
        return None;
    };
    let well_formed = !items.is_empty()
        && items
            .iter()
            .all(|item| item.as_mapping().is_some() && item.get_key("name").is_some());
    well_formed.then_some(items.as_slice())
}

fn parse_output_items(callable: &str, items: &[Value]) -> Result<Vec<OutputDef>, ValidationError> {
    let invalid = |reason: String| ValidationError::InvalidReturnAnnotation {
        callable: callable.to_string(),
        reason,
    };

    let mut outputs: Vec<OutputDef> = Vec::with_capacity(items.len());
    for item in items {
        let name = match item.get_key("name") {
            Some(Value::Str(name)) if is_identifier(name) => name.clone(),
            Some(other) => {
                return Err(invalid(format!(
                    "output name {} is not a valid identifier",
                    other.repr()
                )))
            }
            None => return Err(invalid("output item without a name".to_string())),
        };
        if outputs.iter().any(|output| output.name == name) {
            return Err(invalid(format!("output name '{}' is repeated", name)));
        }

        let viz = match item.get_key("viz") {
            None | Some(Value::None) => None,
            Some(Value::Str(kind)) if kind == "side" => Some(VizKind::Side),
            Some(Value::Str(kind)) if kind == "loop" => Some(VizKind::Loop),
            Some(other) => {
                return Err(invalid(format!(
                    "output '{}' has unknown viz {}",
                    name,
                    other.repr()
                )))
            }
        };

        outputs.push(OutputDef {
            name,
            type_hint: item.get_key("type").map(TypeHint::from_value).unwrap_or_default(),
            viz,
        });
    }
    Ok(outputs)
}

const PYTHON_KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global",
    "if", "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return",
    "try", "while", "with", "yield",
];

/// Whether `name` is a valid Python identifier that is not a keyword
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first == '_' || first.is_alphabetic())
        && chars.all(|c| c == '_' || c.is_alphanumeric())
        && !PYTHON_KEYWORDS.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::literal::parse_literal;

    fn decl_returning(text: &str) -> SignatureDecl {
        SignatureDecl::new(vec![]).returning(Annotation::Literal(parse_literal(text).unwrap()))
    }

    #[test]
    fn test_default_single_output() {
        let record = SignatureRecord::from_decl("f", &SignatureDecl::new(vec![])).unwrap();
        assert_eq!(record.outputs.len(), 1);
        assert_eq!(record.outputs[0].name, DEFAULT_OUTPUT_NAME);
        assert!(!record.is_multi_output());
    }

    #[test]
    fn test_multi_output_annotation_keeps_order() {
        let decl = decl_returning(
            "[{'name': 'quotient', 'type': 'int'}, {'name': 'remainder', 'viz': 'side'}]",
        );
        let record = SignatureRecord::from_decl("divmod", &decl).unwrap();
        let names: Vec<&str> = record.outputs.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, ["quotient", "remainder"]);
        assert_eq!(record.outputs[0].type_hint, TypeHint::of(PyType::Int));
        assert_eq!(record.outputs[1].viz, Some(VizKind::Side));
        assert!(record.is_multi_output());
    }

    #[test]
    fn test_invalid_output_names_rejected() {
        for text in [
            "[{'name': 'a'}, {'name': 'a'}]",
            "[{'name': 'not valid'}]",
            "[{'name': 'class'}]",
            "[{'name': 3}]",
            "[{'name': 'a', 'viz': 'sideways'}]",
        ] {
            let result = SignatureRecord::from_decl("f", &decl_returning(text));
            assert!(
                matches!(result, Err(ValidationError::InvalidReturnAnnotation { .. })),
                "{} should be rejected",
                text
            );
        }
    }

    #[test]
    fn test_non_grammar_annotation_is_single_output() {
        let decl = decl_returning("[1, 2]");
        let record = SignatureRecord::from_decl("f", &decl).unwrap();
        assert_eq!(record.outputs.len(), 1);
        assert_eq!(record.outputs[0].name, DEFAULT_OUTPUT_NAME);
    }

    #[test]
    fn test_output_presets() {
        let decl = SignatureDecl::new(vec![]).returning(Annotation::preset("iterator"));
        let record = SignatureRecord::from_decl("f", &decl).unwrap();
        assert_eq!(record.outputs[0].name, "iterator");
        assert_eq!(record.outputs[0].type_hint, TypeHint::of(PyType::Iterator));

        let decl = SignatureDecl::new(vec![]).returning(Annotation::preset("tuple"));
        let record = SignatureRecord::from_decl("f", &decl).unwrap();
        assert_eq!(record.outputs[0].name, "a_tuple");
    }

    #[test]
    fn test_parameter_types() {
        let decl = SignatureDecl::new(vec![
            ParamDecl::positional("text").with_hint(PyType::Str),
            ParamDecl::positional("count").with_default(3),
            ParamDecl::positional("size").with_annotation(Annotation::preset("natural_number")),
            ParamDecl::var_positional("rest"),
        ]);
        let record = SignatureRecord::from_decl("f", &decl).unwrap();
        assert_eq!(record.parameters[0].type_hint, TypeHint::of(PyType::Str));
        assert_eq!(record.parameters[1].type_hint, TypeHint::of(PyType::Int));
        assert_eq!(record.parameters[2].type_hint, TypeHint::of(PyType::Int));
        assert_eq!(record.parameters[3].type_hint, TypeHint::NotSpecified);
        assert_eq!(record.variable_parameters().count(), 1);
    }

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("value_1"));
        assert!(is_identifier("_private"));
        assert!(!is_identifier("1value"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("lambda"));
    }
}
