//! Errors raised while declaring, merging, and resolving directives.

use thiserror::Error;

/// The reason a validator refused a value.
#[derive(Error, Clone, Debug, PartialEq)]
pub enum Rejection {
    /// The value has the wrong type.
    #[error("expected {expected}, found {found}")]
    Type {
        /// A description of what was expected.
        expected: &'static str,

        /// The type that was found.
        found: &'static str,
    },

    /// The value has the right type but lies outside of the accepted domain.
    #[error("{0}")]
    Domain(String),
}

impl Rejection {
    /// Creates an out-of-domain rejection.
    pub fn domain(message: impl Into<String>) -> Self {
        Self::Domain(message.into())
    }
}

/// An error related to directives.
#[derive(Error, Debug)]
pub enum Error {
    /// A value was refused by the validator of a directive.
    #[error("invalid value for directive `{name}`: {source}")]
    Validation {
        /// The name of the directive.
        name: String,

        /// Why the value was refused.
        #[source]
        source: Rejection,
    },

    /// No directive exists with the provided name.
    #[error("unknown directive `{0}`")]
    Unknown(String),

    /// A spec with the same name was already registered.
    #[error("a directive named `{0}` is already registered")]
    Duplicate(String),

    /// Deferred directives remain but no context was provided to resolve
    /// them.
    #[error("directives require a context to be resolved: {}", .0.join(", "))]
    Unresolved(Vec<String>),
}

impl Error {
    /// Whether or not this is a [validation error](Error::Validation).
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}

/// A [`Result`](std::result::Result) with an [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
