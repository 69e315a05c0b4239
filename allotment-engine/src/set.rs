//! Sets of directives.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use allotment_config::Defaults;
use indexmap::IndexMap;
use tracing::debug;
use tracing::trace;

use crate::Deferred;
use crate::Directive;
use crate::DirectiveSpec;
use crate::Error;
use crate::Result;
use crate::Value;
use crate::spec::Siblings;
use crate::spec::standard;

/// How the directives of two units of work are combined.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Merge {
    /// The incoming values replace the current ones.
    #[default]
    Override,

    /// The units run one after another.
    Serial,

    /// The units run concurrently.
    Parallel,
}

impl Merge {
    /// Combines two values of a directive.
    ///
    /// [`Merge::Override`] always keeps the incoming value `b`.
    pub fn apply(self, spec: &DirectiveSpec, a: &Value, b: &Value) -> Value {
        match self {
            Self::Override => b.clone(),
            Self::Serial => spec.merge_serial(a, b),
            Self::Parallel => spec.merge_parallel(a, b),
        }
    }
}

/// A set of directives.
///
/// Directives backed by a registered [`DirectiveSpec`] are validated on the
/// way in and read as the spec's default until a value is stored. Any other
/// directive is free-form: it is stored verbatim and takes no part in
/// merging or finalization.
///
/// Iteration yields every registered spec (in registration order) followed by
/// the free-form directives (in insertion order).
///
/// `C` is the context that deferred directives are resolved against (e.g., a
/// job record).
pub struct DirectiveSet<C = ()> {
    /// The registered specs.
    specs: IndexMap<String, Arc<DirectiveSpec>>,

    /// The values stored for spec-backed directives.
    values: IndexMap<String, Directive<C>>,

    /// The free-form directives.
    extra: IndexMap<String, Directive<C>>,
}

impl<C: 'static> DirectiveSet<C> {
    /// Creates a new set from a collection of specs.
    ///
    /// Returns an error if two specs share a name.
    pub fn new<I, S>(specs: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<DirectiveSpec>>,
    {
        let mut set = Self::default();

        for spec in specs {
            set.add_spec(spec)?;
        }

        Ok(set)
    }

    /// Creates a new set with every [standard spec](standard::specs).
    pub fn standard(defaults: &Defaults) -> Result<Self> {
        Self::new(standard::specs(defaults)?)
    }

    /// Creates a new set from a collection of specs and sets each of the
    /// provided entries.
    pub fn with_entries<I, S, E, K, V>(specs: I, entries: E) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<DirectiveSpec>>,
        E: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Directive<C>>,
    {
        let mut set = Self::new(specs)?;

        for (name, directive) in entries {
            set.set(name, directive)?;
        }

        Ok(set)
    }

    /// Registers a spec.
    ///
    /// A free-form directive already stored under the same name is adopted by
    /// the spec, which means that a literal value must pass validation. If it
    /// does not, the set is left unchanged.
    pub fn add_spec(&mut self, spec: impl Into<Arc<DirectiveSpec>>) -> Result<()> {
        let spec = spec.into();
        let name = spec.name().to_owned();

        if self.specs.contains_key(&name) {
            return Err(Error::Duplicate(name));
        }

        if let Some(existing) = self.extra.get(&name) {
            let adopted = match existing {
                Directive::Literal(value) => Directive::Literal(spec.validate(value)?),
                deferred => deferred.clone(),
            };

            self.extra.shift_remove(&name);
            self.values.insert(name.clone(), adopted);
        }

        debug!(name = %name, "registered directive spec");
        self.specs.insert(name, spec);
        Ok(())
    }

    /// Gets the spec registered under `name` (if it exists).
    pub fn spec(&self, name: &str) -> Option<&Arc<DirectiveSpec>> {
        self.specs.get(name)
    }

    /// Gets the registered specs in registration order.
    pub fn specs(&self) -> impl Iterator<Item = &Arc<DirectiveSpec>> {
        self.specs.values()
    }

    /// Gets a directive.
    ///
    /// A spec-backed directive with nothing stored reads as the spec's
    /// default. Returns an error if the directive is unknown.
    pub fn get(&self, name: &str) -> Result<Cow<'_, Directive<C>>> {
        match self.specs.get(name) {
            Some(spec) => Ok(self.stored_or_default(spec)),
            None => self
                .extra
                .get(name)
                .map(Cow::Borrowed)
                .ok_or_else(|| Error::Unknown(name.to_owned())),
        }
    }

    /// Gets the literal value of a directive.
    ///
    /// Returns an error if the directive is unknown or still deferred.
    pub fn value(&self, name: &str) -> Result<Cow<'_, Value>> {
        match self.get(name)? {
            Cow::Borrowed(Directive::Literal(value)) => Ok(Cow::Borrowed(value)),
            Cow::Owned(Directive::Literal(value)) => Ok(Cow::Owned(value)),
            _ => Err(Error::Unresolved(vec![name.to_owned()])),
        }
    }

    /// Sets a directive.
    ///
    /// Literal values for spec-backed directives are validated and stored in
    /// their normalized form. If validation fails, the set is left unchanged.
    /// Deferred values are validated when they are
    /// [evaluated](Self::evaluate).
    pub fn set(&mut self, name: impl Into<String>, directive: impl Into<Directive<C>>) -> Result<()> {
        let name = name.into();
        let directive = directive.into();

        match self.specs.get(&name) {
            Some(spec) => {
                let directive = match directive {
                    Directive::Literal(value) => Directive::Literal(spec.validate(&value)?),
                    deferred => deferred,
                };

                self.values.insert(name, directive);
            }
            None => {
                self.extra.insert(name, directive);
            }
        }

        Ok(())
    }

    /// Removes a stored directive, returning it.
    ///
    /// A spec-backed directive reverts to its default; a free-form directive
    /// is gone. Returns an error if nothing is stored under `name`.
    pub fn delete(&mut self, name: &str) -> Result<Directive<C>> {
        let removed = if self.specs.contains_key(name) {
            self.values.shift_remove(name)
        } else {
            self.extra.shift_remove(name)
        };

        removed.ok_or_else(|| Error::Unknown(name.to_owned()))
    }

    /// Whether or not a directive with this name is known.
    pub fn contains(&self, name: &str) -> bool {
        self.specs.contains_key(name) || self.extra.contains_key(name)
    }

    /// Gets the number of known directives.
    pub fn len(&self) -> usize {
        self.specs.len() + self.extra.len()
    }

    /// Whether or not the set knows no directives at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Gets the names of every known directive.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.specs
            .keys()
            .chain(self.extra.keys())
            .map(String::as_str)
    }

    /// Gets every known directive along with its current value.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Cow<'_, Directive<C>>)> + '_ {
        self.specs
            .iter()
            .map(|(name, spec)| (name.as_str(), self.stored_or_default(spec)))
            .chain(
                self.extra
                    .iter()
                    .map(|(name, directive)| (name.as_str(), Cow::Borrowed(directive))),
            )
    }

    /// Merges another set into this one.
    ///
    /// With [`Merge::Override`], every directive known to `other` (defaults
    /// included) replaces the value in `self`.
    ///
    /// With [`Merge::Serial`] or [`Merge::Parallel`], every spec-backed
    /// directive of `self` is combined with `other`'s value for it (or the
    /// spec's default, if `other` does not know it) and the set is then
    /// [finalized](Self::finalize). Directives of `other` that have no spec in
    /// `self` replace the free-form values in `self`.
    ///
    /// If a `context` is provided, deferred operands are resolved before they
    /// are combined. Otherwise the combination itself is deferred until the
    /// set is [evaluated](Self::evaluate).
    ///
    /// `other` is never modified. The update is not atomic: if an error is
    /// returned, some directives may already have been merged.
    pub fn update(
        &mut self,
        other: &DirectiveSet<C>,
        merge: Merge,
        context: Option<&C>,
    ) -> Result<()> {
        let entries = other
            .iter()
            .map(|(name, directive)| (name.to_owned(), directive.into_owned()))
            .collect();

        self.apply(entries, merge, context)
    }

    /// Merges a plain mapping of directives into this one.
    ///
    /// This behaves as [`update()`](Self::update) with the difference that
    /// spec-backed directives missing from `entries` are combined with their
    /// default.
    pub fn update_from<I, K, V>(&mut self, entries: I, merge: Merge, context: Option<&C>) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Directive<C>>,
    {
        let entries = entries
            .into_iter()
            .map(|(name, directive)| (name.into(), directive.into()))
            .collect();

        self.apply(entries, merge, context)
    }

    /// Applies the incoming entries with the provided merge.
    fn apply(
        &mut self,
        mut entries: IndexMap<String, Directive<C>>,
        merge: Merge,
        context: Option<&C>,
    ) -> Result<()> {
        if merge == Merge::Override {
            for (name, directive) in entries {
                self.set(name, directive)?;
            }

            return Ok(());
        }

        debug!(
            ?merge,
            incoming = entries.len(),
            context = context.is_some(),
            "aggregating directives"
        );

        let specs = self.specs.values().cloned().collect::<Vec<_>>();
        for spec in specs {
            let current = self.stored_or_default(&spec).into_owned();
            let incoming = match entries.shift_remove(spec.name()) {
                Some(Directive::Literal(value)) => Directive::Literal(spec.validate(&value)?),
                Some(deferred) => deferred,
                None => Directive::Literal(spec.default().clone()),
            };

            let combined = combine(&spec, current, incoming, merge, context)?;
            self.values.insert(spec.name().to_owned(), combined);
        }

        for (name, directive) in entries {
            self.extra.insert(name, directive);
        }

        self.finalize()
    }

    /// Recomputes every spec-backed directive from the values of the others.
    ///
    /// Specs are finalized in registration order and each one observes the
    /// results of the ones before it. Deferred directives are skipped.
    pub fn finalize(&mut self) -> Result<()> {
        let specs = self
            .specs
            .values()
            .filter(|spec| spec.has_finalizer())
            .cloned()
            .collect::<Vec<_>>();

        for spec in specs {
            let Directive::Literal(value) = self.stored_or_default(&spec).into_owned() else {
                continue;
            };

            let finalized = spec.validate(&spec.finalize(&value, &self.siblings()))?;
            if finalized != value {
                trace!(name = spec.name(), from = %value, to = %finalized, "finalized directive");
                self.values
                    .insert(spec.name().to_owned(), Directive::Literal(finalized));
            }
        }

        Ok(())
    }

    /// Resolves every deferred spec-backed directive against `context`.
    ///
    /// Each result is validated before it replaces the deferred directive.
    /// If anything was resolved, the set is then [finalized](Self::finalize)
    /// so that derived directives observe the resolved values. Without a
    /// context, an error is returned if any deferred spec-backed directive
    /// remains. Free-form directives are never resolved.
    ///
    /// Evaluating a set without deferred directives does nothing.
    pub fn evaluate(&mut self, context: Option<&C>) -> Result<()> {
        let Some(context) = context else {
            let unresolved = self.unresolved();
            if unresolved.is_empty() {
                return Ok(());
            }

            return Err(Error::Unresolved(unresolved));
        };

        debug!(deferred = self.unresolved().len(), "evaluating directives");

        let mut resolved = 0;
        for (name, spec) in &self.specs {
            let Some(directive) = self.values.get_mut(name) else {
                continue;
            };

            let Directive::Deferred(function) = directive else {
                continue;
            };

            let value = spec.validate(&function.call(context)?)?;
            trace!(name = %name, %value, "resolved deferred directive");
            *directive = Directive::Literal(value);
            resolved += 1;
        }

        if resolved > 0 {
            self.finalize()?;
        }

        Ok(())
    }

    /// Gets the names of the spec-backed directives that are still deferred.
    pub fn unresolved(&self) -> Vec<String> {
        self.specs
            .keys()
            .filter(|name| self.values.get(*name).is_some_and(Directive::is_deferred))
            .cloned()
            .collect()
    }

    /// Creates a [`HashMap`] representation of the literal directives.
    ///
    /// This is intended for substitution into submission scripts. Free-form
    /// deferred directives are skipped; deferred spec-backed directives are
    /// an error.
    pub fn to_hashmap(&self) -> Result<HashMap<String, String>> {
        let unresolved = self.unresolved();
        if !unresolved.is_empty() {
            return Err(Error::Unresolved(unresolved));
        }

        Ok(self
            .iter()
            .filter_map(|(name, directive)| {
                directive
                    .as_literal()
                    .map(|value| (name.to_owned(), value.to_string()))
            })
            .collect())
    }

    /// Gets the stored value of a spec-backed directive or its default.
    fn stored_or_default(&self, spec: &DirectiveSpec) -> Cow<'_, Directive<C>> {
        match self.values.get(spec.name()) {
            Some(directive) => Cow::Borrowed(directive),
            None => Cow::Owned(Directive::Literal(spec.default().clone())),
        }
    }

    /// Takes a snapshot of every directive for the finalizers.
    fn siblings(&self) -> Siblings {
        self.iter()
            .map(|(name, directive)| (name, directive.as_literal().cloned()))
            .collect()
    }
}

/// Combines two values of a spec-backed directive.
fn combine<C: 'static>(
    spec: &Arc<DirectiveSpec>,
    current: Directive<C>,
    incoming: Directive<C>,
    merge: Merge,
    context: Option<&C>,
) -> Result<Directive<C>> {
    let (current, incoming) = match (current, incoming, context) {
        (Directive::Literal(a), Directive::Literal(b), _) => (a, b),
        (a, b, Some(context)) => (
            spec.validate(&a.resolve(context)?)?,
            spec.validate(&b.resolve(context)?)?,
        ),
        (a, b, None) => {
            trace!(name = spec.name(), "deferring merge until evaluation");
            let spec = spec.clone();
            return Ok(Directive::Deferred(Deferred::fallible(move |context| {
                let current = spec.validate(&a.resolve(context)?)?;
                let incoming = spec.validate(&b.resolve(context)?)?;
                Ok(merge.apply(&spec, &current, &incoming))
            })));
        }
    };

    let merged = merge.apply(spec, &current, &incoming);
    trace!(name = spec.name(), a = %current, b = %incoming, to = %merged, "merged directive");
    Ok(Directive::Literal(spec.validate(&merged)?))
}

impl<C> Default for DirectiveSet<C> {
    fn default() -> Self {
        Self {
            specs: Default::default(),
            values: Default::default(),
            extra: Default::default(),
        }
    }
}

impl<C> Clone for DirectiveSet<C> {
    fn clone(&self) -> Self {
        Self {
            specs: self.specs.clone(),
            values: self.values.clone(),
            extra: self.extra.clone(),
        }
    }
}

impl<C: 'static> PartialEq for DirectiveSet<C> {
    fn eq(&self, other: &Self) -> bool {
        self.specs.len() == other.specs.len()
            && self
                .specs
                .iter()
                .zip(other.specs.iter())
                .all(|((a, x), (b, y))| a == b && Arc::ptr_eq(x, y))
            && self.len() == other.len()
            && self
                .iter()
                .all(|(name, directive)| other.get(name).is_ok_and(|theirs| theirs == directive))
    }
}

impl<C: 'static> fmt::Debug for DirectiveSet<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
