//! Builders for a [`DirectiveSpec`].

use std::sync::Arc;

use tracing::trace;

use crate::Result;
use crate::Value;
use crate::error::Rejection;
use crate::spec::DirectiveSpec;
use crate::spec::Finalizer;
use crate::spec::Merger;
use crate::spec::Siblings;
use crate::spec::Validator;
use crate::spec::merge;

/// A builder for a [`DirectiveSpec`].
pub struct Builder {
    /// The name.
    name: String,

    /// The default value.
    default: Value,

    /// The validator.
    validator: Option<Validator>,

    /// The serial merge.
    serial: Option<Merger>,

    /// The parallel merge.
    parallel: Option<Merger>,

    /// The finalizer.
    finalizer: Option<Finalizer>,
}

impl Builder {
    /// Creates a new [`Builder`].
    pub(crate) fn new(name: String, default: Value) -> Self {
        Self {
            name,
            default,
            validator: None,
            serial: None,
            parallel: None,
            finalizer: None,
        }
    }

    /// Sets the validator for the [`Builder`].
    ///
    /// The validator returns the value to store, which lets it normalize its
    /// input (e.g., converting an integer to a float).
    ///
    /// # Notes
    ///
    /// This will silently overwrite any previous validator provided to the
    /// builder.
    pub fn validator(
        mut self,
        validator: impl Fn(&Value) -> std::result::Result<Value, Rejection> + Send + Sync + 'static,
    ) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Sets the serial merge for the [`Builder`].
    ///
    /// If no serial merge is provided, [`merge::first`] is used.
    ///
    /// # Notes
    ///
    /// This will silently overwrite any previous serial merge provided to the
    /// builder.
    pub fn serial(mut self, merge: impl Fn(&Value, &Value) -> Value + Send + Sync + 'static) -> Self {
        self.serial = Some(Arc::new(merge));
        self
    }

    /// Sets the parallel merge for the [`Builder`].
    ///
    /// If no parallel merge is provided, [`merge::first`] is used.
    ///
    /// # Notes
    ///
    /// This will silently overwrite any previous parallel merge provided to
    /// the builder.
    pub fn parallel(
        mut self,
        merge: impl Fn(&Value, &Value) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.parallel = Some(Arc::new(merge));
        self
    }

    /// Sets the finalizer for the [`Builder`].
    ///
    /// # Notes
    ///
    /// This will silently overwrite any previous finalizer provided to the
    /// builder.
    pub fn finalizer(
        mut self,
        finalizer: impl Fn(&Value, &Siblings) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.finalizer = Some(Arc::new(finalizer));
        self
    }

    /// Consumes `self` and attempts to build a [`DirectiveSpec`].
    ///
    /// The default value is run through the validator and stored in its
    /// normalized form; a default that the validator refuses is an error.
    pub fn try_build(self) -> Result<DirectiveSpec> {
        let mut spec = DirectiveSpec {
            name: self.name,
            default: self.default,
            validator: self.validator,
            serial: self.serial.unwrap_or_else(|| Arc::new(merge::first) as Merger),
            parallel: self.parallel.unwrap_or_else(|| Arc::new(merge::first) as Merger),
            finalizer: self.finalizer,
        };

        spec.default = spec.validate(&spec.default)?;
        trace!(name = %spec.name, default = %spec.default, "built directive spec");

        Ok(spec)
    }
}
