//! Operator definitions
//!
//! An operator node is keyed by the Python source of its operation
//! (`"a + b"`, `"-a"`, `"a[b]"`, ...). Its parameters are the operand letters
//! found in that id.

use std::collections::BTreeMap;
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::export::template::SubstitutionTemplate;
use crate::literal::ops::{binary_op, unary_op, BinaryOp, UnaryOp};
use crate::literal::{CallArgs, CallError, CallableValue, Value};
use crate::nodes::signature::{
    Annotation, OutputDef, ParamKind, Parameter, SignatureRecord, DEFAULT_OUTPUT_NAME,
};
use crate::nodes::types::TypeHint;

/// Letters that stand for operands in operator ids
const OPERAND_MASK: [char; 2] = ['a', 'b'];

/// Output name of operator nodes in callable mode
pub const OPERATION_OUTPUT_NAME: &str = "operation";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Binary(BinaryOp),
    Unary(UnaryOp),
}

/// A Python operator usable by operator nodes
#[derive(Debug, Clone, PartialEq)]
pub struct OperatorDef {
    pub id: &'static str,
    pub operation: Operation,
    params: Vec<String>,
    signature: Arc<SignatureRecord>,
}

impl OperatorDef {
    fn new(id: &'static str, operation: Operation) -> Self {
        let mut params: Vec<String> = Vec::new();
        for letter in operand_letters(id) {
            if !params.iter().any(|param| param == letter) {
                params.push(letter.to_string());
            }
        }
        let signature = Arc::new(operator_signature(&params));
        Self {
            id,
            operation,
            params,
            signature,
        }
    }

    /// Operand names in order of appearance
    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn apply(&self, operands: &[Value]) -> Result<Value, CallError> {
        let operand = |index: usize| {
            operands.get(index).ok_or_else(|| {
                CallError::type_error(format!(
                    "operation '{}' expects {} operands, got {}",
                    self.id,
                    self.params.len(),
                    operands.len()
                ))
            })
        };
        match self.operation {
            Operation::Binary(op) => binary_op(op, operand(0)?, operand(1)?),
            Operation::Unary(op) => unary_op(op, operand(0)?),
        }
    }

    /// Signature shared by every node using this operator
    pub fn signature(&self) -> Arc<SignatureRecord> {
        Arc::clone(&self.signature)
    }

    /// The operation as a callable value taking the operands positionally
    pub fn callable_value(&'static self) -> CallableValue {
        CallableValue::new(OPERATION_OUTPUT_NAME, move |args: &CallArgs| self.apply(&args.positional))
    }

    /// Expression template with one `$` slot per operand
    pub fn template(&self) -> SubstitutionTemplate {
        SubstitutionTemplate::new(substitute_operands(self.id, |letter| format!("${}", letter)))
    }

    /// Source of an equivalent lambda, used when the node is in callable mode
    pub fn lambda_source(&self) -> String {
        format!("(lambda {}: {})", self.params.join(", "), self.id)
    }
}

/// One positional parameter per operand and a single untyped output
fn operator_signature(params: &[String]) -> SignatureRecord {
    SignatureRecord {
        parameters: params
            .iter()
            .map(|name| Parameter {
                name: name.clone(),
                kind: ParamKind::Positional,
                default: None,
                type_hint: TypeHint::NotSpecified,
                annotation: Annotation::Empty,
            })
            .collect(),
        outputs: vec![OutputDef {
            name: DEFAULT_OUTPUT_NAME.to_string(),
            type_hint: TypeHint::NotSpecified,
            viz: None,
        }],
    }
}

/// Rewrites every standalone operand letter of `id`
fn substitute_operands(id: &str, replace: impl Fn(&str) -> String) -> String {
    let mut out = String::with_capacity(id.len() * 2);
    let mut word = String::new();
    let flush = |word: &mut String, out: &mut String| {
        if word.len() == 1 && word.chars().all(|c| OPERAND_MASK.contains(&c)) {
            out.push_str(&replace(word));
        } else {
            out.push_str(word);
        }
        word.clear();
    };
    for c in id.chars() {
        if c.is_alphanumeric() || c == '_' {
            word.push(c);
        } else {
            flush(&mut word, &mut out);
            out.push(c);
        }
    }
    flush(&mut word, &mut out);
    out
}

/// Operand letters of an id; keywords such as `and` or `not` don't count
fn operand_letters(id: &str) -> impl Iterator<Item = &str> {
    id.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|word| word.len() == 1 && word.chars().all(|c| OPERAND_MASK.contains(&c)))
}

static OPERATORS: Lazy<BTreeMap<&'static str, OperatorDef>> = Lazy::new(|| {
    use BinaryOp::*;
    use UnaryOp::*;

    let binary = [
        ("a + b", Add),
        ("a - b", Sub),
        ("a * b", Mul),
        ("a / b", TrueDiv),
        ("a // b", FloorDiv),
        ("a % b", Mod),
        ("a ** b", Pow),
        ("a @ b", MatMul),
        ("a << b", LShift),
        ("a >> b", RShift),
        ("a & b", BitAnd),
        ("a | b", BitOr),
        ("a ^ b", BitXor),
        ("a and b", And),
        ("a or b", Or),
        ("a == b", Eq),
        ("a != b", Ne),
        ("a < b", Lt),
        ("a <= b", Le),
        ("a > b", Gt),
        ("a >= b", Ge),
        ("a is b", Is),
        ("a is not b", IsNot),
        ("a in b", In),
        ("a not in b", NotIn),
        ("a[b]", GetItem),
    ];
    let unary = [("-a", Neg), ("+a", Pos), ("~a", Invert), ("not a", Not)];

    binary
        .into_iter()
        .map(|(id, op)| (id, OperatorDef::new(id, Operation::Binary(op))))
        .chain(
            unary
                .into_iter()
                .map(|(id, op)| (id, OperatorDef::new(id, Operation::Unary(op)))),
        )
        .collect()
});

/// Looks an operator up by id
pub fn operator(id: &str) -> Option<&'static OperatorDef> {
    OPERATORS.get(id)
}

/// Every operator id, sorted
pub fn operator_ids() -> impl Iterator<Item = &'static str> {
    OPERATORS.keys().copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_from_mask() {
        assert_eq!(operator("a + b").unwrap().params(), ["a", "b"]);
        assert_eq!(operator("not a").unwrap().params(), ["a"]);
        assert_eq!(operator("a and b").unwrap().params(), ["a", "b"]);
        assert_eq!(operator("a not in b").unwrap().params(), ["a", "b"]);
        assert!(operator("a ++ b").is_none());
    }

    #[test]
    fn test_apply() {
        let add = operator("a + b").unwrap();
        assert_eq!(add.apply(&[Value::Int(3), Value::Int(4)]).unwrap(), Value::Int(7));
        let neg = operator("-a").unwrap();
        assert_eq!(neg.apply(&[Value::Float(2.0)]).unwrap(), Value::Float(-2.0));
        assert_eq!(add.apply(&[Value::Int(3)]).unwrap_err().kind, "TypeError");
    }

    #[test]
    fn test_template_keeps_keywords() {
        let rendered = operator("a not in b").unwrap().template();
        assert_eq!(rendered.text(), "$a not in $b");
        assert_eq!(operator("a[b]").unwrap().template().text(), "$a[$b]");
        assert_eq!(operator("not a").unwrap().lambda_source(), "(lambda a: not a)");
    }

    #[test]
    fn test_callable_value() {
        let callable = operator("a * b").unwrap().callable_value();
        let args = CallArgs::positional(vec![Value::str("ab"), Value::Int(2)]);
        assert_eq!(callable.call(&args).unwrap(), Value::str("abab"));
    }

    #[test]
    fn test_signature_record() {
        let record = operator("a - b").unwrap().signature();
        assert_eq!(record.parameters.len(), 2);
        assert_eq!(record.outputs[0].name, DEFAULT_OUTPUT_NAME);
        assert!(Arc::ptr_eq(&record, &operator("a - b").unwrap().signature()));
        assert_eq!(operator("not a").unwrap().signature().parameters.len(), 1);
    }
}
