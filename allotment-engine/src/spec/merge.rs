//! Common merges for directive values.

use crate::Value;

/// Keeps the larger of the two values.
pub fn max(a: &Value, b: &Value) -> Value {
    a.max(b)
}

/// Adds the two values.
pub fn sum(a: &Value, b: &Value) -> Value {
    a.sum(b)
}

/// Keeps the first value.
pub fn first(a: &Value, _: &Value) -> Value {
    a.clone()
}
