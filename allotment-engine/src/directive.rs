//! Directives that are either known up front or computed from a run-time
//! context.

use std::fmt;
use std::sync::Arc;

use crate::Result;
use crate::Value;

/// A function that computes a directive from a context.
type Function<C> = dyn Fn(&C) -> Result<Value> + Send + Sync;

/// A directive whose value is computed from a run-time context.
///
/// The function is shared between clones. Two deferred directives are only
/// equal when they share the same function.
pub struct Deferred<C>(Arc<Function<C>>);

impl<C> Deferred<C> {
    /// Creates a new deferred directive from a function.
    pub fn new(function: impl Fn(&C) -> Value + Send + Sync + 'static) -> Self {
        Self(Arc::new(move |context: &C| Ok(function(context))))
    }

    /// Creates a new deferred directive from a function that may fail.
    pub(crate) fn fallible(function: impl Fn(&C) -> Result<Value> + Send + Sync + 'static) -> Self {
        Self(Arc::new(function))
    }

    /// Calls the function with the provided context.
    pub fn call(&self, context: &C) -> Result<Value> {
        (self.0)(context)
    }
}

impl<C> Clone for Deferred<C> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<C> PartialEq for Deferred<C> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<C> fmt::Debug for Deferred<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Deferred").finish_non_exhaustive()
    }
}

/// A directive as stored within a [`DirectiveSet`](crate::DirectiveSet).
pub enum Directive<C> {
    /// A concrete value.
    Literal(Value),

    /// A value that is computed from a context of type `C` when the set is
    /// [evaluated](crate::DirectiveSet::evaluate).
    Deferred(Deferred<C>),
}

impl<C> Directive<C> {
    /// Creates a deferred directive from a function.
    pub fn deferred(function: impl Fn(&C) -> Value + Send + Sync + 'static) -> Self {
        Self::Deferred(Deferred::new(function))
    }

    /// Attempts to get a reference to the inner literal value.
    pub fn as_literal(&self) -> Option<&Value> {
        match self {
            Self::Literal(value) => Some(value),
            Self::Deferred(_) => None,
        }
    }

    /// Consumes `self` and attempts to return the inner literal value.
    pub fn into_literal(self) -> Option<Value> {
        match self {
            Self::Literal(value) => Some(value),
            Self::Deferred(_) => None,
        }
    }

    /// Whether or not the directive still needs a context to be resolved.
    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred(_))
    }

    /// Gets the literal value, calling the function with `context` if the
    /// directive is deferred.
    pub fn resolve(&self, context: &C) -> Result<Value> {
        match self {
            Self::Literal(value) => Ok(value.clone()),
            Self::Deferred(function) => function.call(context),
        }
    }
}

impl<C> Clone for Directive<C> {
    fn clone(&self) -> Self {
        match self {
            Self::Literal(value) => Self::Literal(value.clone()),
            Self::Deferred(function) => Self::Deferred(function.clone()),
        }
    }
}

impl<C> PartialEq for Directive<C> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Literal(a), Self::Literal(b)) => a == b,
            (Self::Deferred(a), Self::Deferred(b)) => a == b,
            _ => false,
        }
    }
}

impl<C> fmt::Debug for Directive<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Self::Deferred(function) => function.fmt(f),
        }
    }
}

impl<C, T: Into<Value>> From<T> for Directive<C> {
    fn from(value: T) -> Self {
        Self::Literal(value.into())
    }
}

impl<C> From<Deferred<C>> for Directive<C> {
    fn from(function: Deferred<C>) -> Self {
        Self::Deferred(function)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literals_resolve_to_themselves() {
        let directive: Directive<u32> = Directive::from(4);
        assert_eq!(directive.resolve(&10).unwrap(), Value::Integer(4));
        assert_eq!(directive.as_literal(), Some(&Value::Integer(4)));
        assert!(!directive.is_deferred());
    }

    #[test]
    fn deferred_directives_call_their_function() {
        let directive: Directive<u32> =
            Directive::deferred(|i: &u32| Value::from(f64::from(*i) / 10.0));
        assert!(directive.is_deferred());
        assert_eq!(directive.as_literal(), None);
        assert_eq!(directive.resolve(&3).unwrap(), Value::Float(0.3));
    }

    #[test]
    fn clones_share_the_function() {
        let directive: Directive<()> = Directive::deferred(|_| Value::from(1));
        let other: Directive<()> = Directive::deferred(|_| Value::from(1));

        assert_eq!(directive, directive.clone());
        assert_ne!(directive, other);
    }
}
