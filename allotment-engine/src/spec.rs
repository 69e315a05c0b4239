//! Descriptors for named directives.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::Error;
use crate::Result;
use crate::Value;
use crate::error::Rejection;

mod builder;
pub mod merge;
pub mod standard;

pub use builder::Builder;

/// A function that validates (and normalizes) a value.
pub(crate) type Validator =
    Arc<dyn Fn(&Value) -> std::result::Result<Value, Rejection> + Send + Sync>;

/// A function that combines two values of the same directive.
pub(crate) type Merger = Arc<dyn Fn(&Value, &Value) -> Value + Send + Sync>;

/// A function that recomputes a value from the values of its siblings.
pub(crate) type Finalizer = Arc<dyn Fn(&Value, &Siblings) -> Value + Send + Sync>;

/// A read-only view of every directive in a set, handed to finalizers.
///
/// Deferred directives are present but have no value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Siblings {
    /// The values keyed by directive name.
    values: IndexMap<String, Option<Value>>,
}

impl Siblings {
    /// Gets the literal value of a directive.
    ///
    /// Returns [`None`] if the directive is unknown or still deferred.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name).and_then(Option::as_ref)
    }

    /// Whether or not the directive exists but still needs a context to be
    /// resolved.
    pub fn is_deferred(&self, name: &str) -> bool {
        matches!(self.values.get(name), Some(None))
    }

    /// Whether or not the directive exists.
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }
}

impl<K, V> FromIterator<(K, V)> for Siblings
where
    K: Into<String>,
    V: Into<Option<Value>>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        }
    }
}

/// An immutable descriptor of a named directive.
///
/// A spec knows the default of its directive, how to validate a new value,
/// how to combine two values when the underlying operations run serially or
/// in parallel, and how to recompute its value from the rest of the set after
/// an aggregation.
///
/// Specs are shared (through an [`Arc`]) between every set they are
/// registered with.
pub struct DirectiveSpec {
    /// The name.
    name: String,

    /// The (validated) default value.
    default: Value,

    /// The validator.
    validator: Option<Validator>,

    /// The merge applied to operations that run one after another.
    serial: Merger,

    /// The merge applied to operations that run concurrently.
    parallel: Merger,

    /// The finalizer.
    finalizer: Option<Finalizer>,
}

impl DirectiveSpec {
    /// Gets a [`Builder`] for a spec with the provided name and default.
    pub fn builder(name: impl Into<String>, default: impl Into<Value>) -> Builder {
        Builder::new(name.into(), default.into())
    }

    /// Gets the name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gets the default value.
    pub fn default(&self) -> &Value {
        &self.default
    }

    /// Validates a value, returning the normalized value on success.
    pub fn validate(&self, value: &Value) -> Result<Value> {
        match &self.validator {
            Some(validator) => validator(value).map_err(|source| Error::Validation {
                name: self.name.clone(),
                source,
            }),
            None => Ok(value.clone()),
        }
    }

    /// Combines two values for operations that run one after another.
    pub fn merge_serial(&self, a: &Value, b: &Value) -> Value {
        (self.serial)(a, b)
    }

    /// Combines two values for operations that run concurrently.
    pub fn merge_parallel(&self, a: &Value, b: &Value) -> Value {
        (self.parallel)(a, b)
    }

    /// Recomputes a value from the values of the other directives.
    ///
    /// Specs without a finalizer return `value` unchanged.
    pub fn finalize(&self, value: &Value, siblings: &Siblings) -> Value {
        match &self.finalizer {
            Some(finalizer) => finalizer(value, siblings),
            None => value.clone(),
        }
    }

    /// Whether or not a finalizer is registered.
    pub fn has_finalizer(&self) -> bool {
        self.finalizer.is_some()
    }
}

impl fmt::Debug for DirectiveSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectiveSpec")
            .field("name", &self.name)
            .field("default", &self.default)
            .field("finalizer", &self.finalizer.is_some())
            .finish_non_exhaustive()
    }
}
