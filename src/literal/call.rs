//! Calling convention shared by registered callables and callable values

use std::fmt;
use std::sync::Arc;

use super::Value;

/// Arguments handed to a callable after the engine resolved every parameter
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    pub positional: Vec<Value>,
    pub keywords: Vec<(String, Value)>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates arguments from positional values only
    pub fn positional(values: Vec<Value>) -> Self {
        Self {
            positional: values,
            keywords: Vec::new(),
        }
    }

    pub fn push(&mut self, value: Value) {
        self.positional.push(value);
    }

    pub fn push_keyword(&mut self, name: impl Into<String>, value: Value) {
        self.keywords.push((name.into(), value));
    }

    /// Positional argument at `index`
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.positional.get(index)
    }

    /// Keyword argument by name
    pub fn kwarg(&self, name: &str) -> Option<&Value> {
        self.keywords
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// Positional argument at `index`, falling back to the keyword `name`
    pub fn get(&self, index: usize, name: &str) -> Option<&Value> {
        self.arg(index).or_else(|| self.kwarg(name))
    }

    /// Like [`CallArgs::get`] but reports a Python-style `TypeError` when absent
    pub fn require(&self, index: usize, name: &str) -> Result<&Value, CallError> {
        self.get(index, name).ok_or_else(|| {
            CallError::type_error(format!("missing required argument: '{}'", name))
        })
    }

    pub fn len(&self) -> usize {
        self.positional.len() + self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keywords.is_empty()
    }
}

/// Error raised by a callable; `kind` mirrors the Python exception class name
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct CallError {
    pub kind: String,
    pub message: String,
}

impl CallError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new("TypeError", message)
    }

    pub fn value_error(message: impl Into<String>) -> Self {
        Self::new("ValueError", message)
    }

    pub fn index_error(message: impl Into<String>) -> Self {
        Self::new("IndexError", message)
    }

    pub fn key_error(message: impl Into<String>) -> Self {
        Self::new("KeyError", message)
    }

    pub fn zero_division() -> Self {
        Self::new("ZeroDivisionError", "division by zero")
    }
}

/// Function body of a [`CallableValue`] or registered callable
pub type CallableFn = dyn Fn(&CallArgs) -> Result<Value, CallError> + Send + Sync;

/// A callable carried inside a [`Value`]
#[derive(Clone)]
pub struct CallableValue {
    name: Arc<str>,
    func: Arc<CallableFn>,
}

impl CallableValue {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&CallArgs) -> Result<Value, CallError> + Send + Sync + 'static,
    {
        let name: String = name.into();
        Self {
            name: Arc::from(name),
            func: Arc::new(func),
        }
    }

    /// Wraps an already shared function body
    pub fn from_shared(name: impl Into<String>, func: Arc<CallableFn>) -> Self {
        let name: String = name.into();
        Self {
            name: Arc::from(name),
            func,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, args: &CallArgs) -> Result<Value, CallError> {
        (self.func)(args)
    }
}

impl fmt::Debug for CallableValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<function {}>", self.name)
    }
}

impl PartialEq for CallableValue {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.func, &other.func)
    }
}
