//! Type hints and the type-codename registry
//!
//! Socket types are hints only. Their codename is a display tag used to
//! style sockets and segments; nothing checks values against it.

use std::collections::BTreeSet;
use std::fmt;

use crate::literal::Value;

/// Python types known to the codename registry
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PyType {
    Str,
    Bool,
    Int,
    Float,
    Complex,
    Dict,
    List,
    Tuple,
    Set,
    Bytes,
    Iterable,
    Iterator,
    Callable,
    NoneType,
    /// Any other type, kept by name
    Named(String),
}

impl PyType {
    pub fn from_name(name: &str) -> Self {
        match name {
            "str" => PyType::Str,
            "bool" => PyType::Bool,
            "int" => PyType::Int,
            "float" => PyType::Float,
            "complex" => PyType::Complex,
            "dict" => PyType::Dict,
            "list" => PyType::List,
            "tuple" => PyType::Tuple,
            "set" => PyType::Set,
            "bytes" => PyType::Bytes,
            "Iterable" => PyType::Iterable,
            "Iterator" => PyType::Iterator,
            "Callable" | "function" => PyType::Callable,
            "None" | "NoneType" => PyType::NoneType,
            other => PyType::Named(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            PyType::Str => "str",
            PyType::Bool => "bool",
            PyType::Int => "int",
            PyType::Float => "float",
            PyType::Complex => "complex",
            PyType::Dict => "dict",
            PyType::List => "list",
            PyType::Tuple => "tuple",
            PyType::Set => "set",
            PyType::Bytes => "bytes",
            PyType::Iterable => "Iterable",
            PyType::Iterator => "Iterator",
            PyType::Callable => "Callable",
            PyType::NoneType => "None",
            PyType::Named(name) => name,
        }
    }

    /// Type of a runtime value
    pub fn of(value: &Value) -> Self {
        match value {
            Value::None => PyType::NoneType,
            Value::Bool(_) => PyType::Bool,
            Value::Int(_) => PyType::Int,
            Value::Float(_) => PyType::Float,
            Value::Str(_) => PyType::Str,
            Value::Bytes(_) => PyType::Bytes,
            Value::List(_) => PyType::List,
            Value::Tuple(_) => PyType::Tuple,
            Value::Set(_) => PyType::Set,
            Value::Dict(_) => PyType::Dict,
            Value::Callable(_) => PyType::Callable,
            Value::Ellipsis => PyType::Named("ellipsis".to_string()),
        }
    }

    fn codename(&self) -> TypeCodename {
        match self {
            PyType::Str => TypeCodename::Str,
            PyType::Bool => TypeCodename::Bool,
            PyType::Int | PyType::Float | PyType::Complex => TypeCodename::Number,
            PyType::Dict => TypeCodename::Dict,
            PyType::List => TypeCodename::List,
            PyType::Tuple => TypeCodename::Tuple,
            PyType::Iterable => TypeCodename::Iterable,
            PyType::Iterator => TypeCodename::Iterator,
            _ => TypeCodename::Other,
        }
    }
}

/// A parameter or output type hint
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum TypeHint {
    #[default]
    NotSpecified,
    Type(PyType),
    /// Union-like hint, e.g. `(int, float)` or `(int, None)`
    Union(BTreeSet<PyType>),
}

impl TypeHint {
    pub fn of(ty: PyType) -> Self {
        TypeHint::Type(ty)
    }

    pub fn union(types: impl IntoIterator<Item = PyType>) -> Self {
        let set: BTreeSet<PyType> = types.into_iter().collect();
        match set.len() {
            0 => TypeHint::NotSpecified,
            1 => set
                .into_iter()
                .next()
                .map_or(TypeHint::NotSpecified, TypeHint::Type),
            _ => TypeHint::Union(set),
        }
    }

    /// Reads a hint written as data: a type name or a tuple of type names
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Str(name) => TypeHint::Type(PyType::from_name(name)),
            Value::None => TypeHint::Type(PyType::NoneType),
            Value::Tuple(items) | Value::List(items) | Value::Set(items) => {
                TypeHint::union(items.iter().map(|item| match item {
                    Value::Str(name) => PyType::from_name(name),
                    Value::None => PyType::NoneType,
                    other => PyType::Named(other.repr()),
                }))
            }
            other => TypeHint::Type(PyType::Named(other.repr())),
        }
    }

    /// Hint written back as data, the inverse of [`TypeHint::from_value`]
    pub fn to_value(&self) -> Value {
        match self {
            TypeHint::NotSpecified => Value::None,
            TypeHint::Type(ty) => Value::str(ty.name()),
            TypeHint::Union(types) => {
                Value::Tuple(types.iter().map(|ty| Value::str(ty.name())).collect())
            }
        }
    }

    /// Whether the hint admits values of `ty`
    pub fn includes(&self, ty: &PyType) -> bool {
        match self {
            TypeHint::NotSpecified => false,
            TypeHint::Type(own) => own == ty,
            TypeHint::Union(types) => types.contains(ty),
        }
    }

    /// Members of the hint, `None` excluded
    pub fn non_none_members(&self) -> Vec<&PyType> {
        match self {
            TypeHint::NotSpecified => Vec::new(),
            TypeHint::Type(ty) => vec![ty].into_iter().filter(|t| **t != PyType::NoneType).collect(),
            TypeHint::Union(types) => types.iter().filter(|t| **t != PyType::NoneType).collect(),
        }
    }

    /// Display codename of the hint
    ///
    /// A union takes the codename shared by all its non-`None` members, or
    /// `other` when they disagree.
    pub fn codename(&self) -> TypeCodename {
        match self {
            TypeHint::NotSpecified => TypeCodename::NotSpecified,
            TypeHint::Type(ty) => ty.codename(),
            TypeHint::Union(_) => {
                let members = self.non_none_members();
                let Some(first) = members.first() else {
                    return TypeCodename::Other;
                };
                let codename = first.codename();
                if members.iter().all(|ty| ty.codename() == codename) {
                    codename
                } else {
                    TypeCodename::Other
                }
            }
        }
    }
}

impl fmt::Display for TypeHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeHint::NotSpecified => write!(f, "not specified"),
            TypeHint::Type(ty) => write!(f, "{}", ty.name()),
            TypeHint::Union(types) => {
                let names: Vec<&str> = types.iter().map(PyType::name).collect();
                write!(f, "({})", names.join(", "))
            }
        }
    }
}

/// Display tag attached to every socket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeCodename {
    Str,
    Bool,
    Dict,
    Number,
    List,
    Tuple,
    Iterable,
    Iterator,
    NotSpecified,
    Other,
}

impl TypeCodename {
    pub const ALL: [TypeCodename; 10] = [
        TypeCodename::Str,
        TypeCodename::Bool,
        TypeCodename::Dict,
        TypeCodename::Number,
        TypeCodename::List,
        TypeCodename::Tuple,
        TypeCodename::Iterable,
        TypeCodename::Iterator,
        TypeCodename::NotSpecified,
        TypeCodename::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TypeCodename::Str => "str",
            TypeCodename::Bool => "bool",
            TypeCodename::Dict => "dict",
            TypeCodename::Number => "number",
            TypeCodename::List => "list",
            TypeCodename::Tuple => "tuple",
            TypeCodename::Iterable => "iterable",
            TypeCodename::Iterator => "iterator",
            TypeCodename::NotSpecified => "not_specified",
            TypeCodename::Other => "other",
        }
    }

    /// Parses a stored codename; unknown tags read as `other`
    pub fn parse(name: &str) -> Self {
        Self::ALL
            .iter()
            .copied()
            .find(|codename| codename.as_str() == name)
            .unwrap_or(TypeCodename::Other)
    }
}

impl fmt::Display for TypeCodename {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
