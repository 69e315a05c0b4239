//! The directive model that powers Allotment.
//!
//! A [`DirectiveSet`] holds the resource requests of one unit of work (process
//! count, wall-clock limit, memory, and so on). When units are composed, their
//! sets are merged either [serially](Merge::Serial), for units that run one
//! after another, or [in parallel](Merge::Parallel), for units that run
//! concurrently. Each directive's [`DirectiveSpec`] decides how its values
//! combine and how it is recomputed from the others afterwards.
//!
//! Directives may also be [deferred](Directive::Deferred): functions of a
//! run-time context (such as a job record) that are resolved with
//! [`DirectiveSet::evaluate()`] just before the values are handed to a
//! scheduler.
//!
//! ```
//! use allotment_config::Defaults;
//! use allotment_engine::DirectiveSet;
//! use allotment_engine::Merge;
//! use allotment_engine::Value;
//! use allotment_engine::spec::standard::NP;
//! use allotment_engine::spec::standard::WALLTIME;
//!
//! let mut first = DirectiveSet::<()>::standard(&Defaults::default())?;
//! first.set(NP, 4)?;
//! first.set(WALLTIME, 64.0)?;
//!
//! first.update_from([(NP, Value::from(1)), (WALLTIME, Value::from(20.0))], Merge::Serial, None)?;
//!
//! assert_eq!(*first.value(NP)?, Value::Integer(4));
//! assert_eq!(*first.value(WALLTIME)?, Value::Float(84.0));
//! # Ok::<(), allotment_engine::Error>(())
//! ```

pub mod directive;
pub mod error;
pub mod set;
pub mod spec;
pub mod value;

pub use directive::Deferred;
pub use directive::Directive;
pub use error::Error;
pub use error::Rejection;
pub use error::Result;
pub use set::DirectiveSet;
pub use set::Merge;
pub use spec::DirectiveSpec;
pub use value::Value;
