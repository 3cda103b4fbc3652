//! Bundled callables
//!
//! Rust renditions of the Python callables every installation offers:
//! built-ins, a selection of the standard library, capsules (small helpers
//! exported through substitution templates) and generic viewers.

mod builtins;
mod capsules;
mod stdlib;
mod viewers;

use crate::literal::{CallArgs, CallError, Value};
use crate::nodes::factory::CallableRegistry;

/// Registers every bundled callable
pub fn register_defaults(registry: &mut CallableRegistry) {
    builtins::register(registry);
    stdlib::register(registry);
    capsules::register(registry);
    viewers::register(registry);
}

/// Numeric argument as a float, with Python's error message
fn float_arg(args: &CallArgs, index: usize, name: &str, func: &str) -> Result<f64, CallError> {
    let value = args.require(index, name)?;
    value.as_float().ok_or_else(|| {
        CallError::type_error(format!(
            "{}() argument must be a real number, not '{}'",
            func,
            value.type_name()
        ))
    })
}

/// Items passed either as a single iterable or as several positional arguments
fn spread_or_single(args: &CallArgs) -> Result<Vec<Value>, CallError> {
    match args.positional.as_slice() {
        [single] => single.iterate(),
        many => Ok(many.to_vec()),
    }
}
