//! The standard directives.
//!
//! | name                 | default    | serial | parallel |
//! |----------------------|------------|--------|----------|
//! | `np`                 | 1          | max    | sum      |
//! | `nranks`             | 0          | max    | sum      |
//! | `ngpu`               | 0          | max    | sum      |
//! | `omp_num_threads`    | 0          | max    | sum      |
//! | `executable`         | configured | first  | first    |
//! | `walltime` (hours)   | 12.0       | sum    | max      |
//! | `memory` (GB)        | 4          | max    | sum      |
//! | `processor_fraction` | 1.0        | first  | first    |
//!
//! Every default may be overridden through [`Defaults`].

use std::sync::Arc;

use allotment_config::Defaults;

use crate::Result;
use crate::Value;
use crate::error::Rejection;
use crate::spec::DirectiveSpec;
use crate::spec::Siblings;
use crate::spec::merge;

/// The name of the process count directive.
pub const NP: &str = "np";

/// The name of the MPI rank count directive.
pub const NRANKS: &str = "nranks";

/// The name of the GPU count directive.
pub const NGPU: &str = "ngpu";

/// The name of the threads-per-process directive.
pub const OMP_NUM_THREADS: &str = "omp_num_threads";

/// The name of the executable directive.
pub const EXECUTABLE: &str = "executable";

/// The name of the wall-clock limit directive (in hours).
pub const WALLTIME: &str = "walltime";

/// The name of the memory directive (in gigabytes).
pub const MEMORY: &str = "memory";

/// The name of the processor fraction directive.
pub const PROCESSOR_FRACTION: &str = "processor_fraction";

/// The default process count.
pub const DEFAULT_NP: i64 = 1;

/// The default wall-clock limit in hours.
pub const DEFAULT_WALLTIME: f64 = 12.0;

/// The default amount of memory in gigabytes.
pub const DEFAULT_MEMORY: i64 = 4;

/// The default processor fraction.
pub const DEFAULT_PROCESSOR_FRACTION: f64 = 1.0;

/// Gets an integer out of a value.
fn integer(value: &Value) -> std::result::Result<i64, Rejection> {
    match value {
        Value::Integer(_) | Value::Float(_) => value
            .as_i64()
            .ok_or_else(|| Rejection::domain(format!("expected a whole number, found {value}"))),
        _ => Err(Rejection::Type {
            expected: "an integer",
            found: value.type_name(),
        }),
    }
}

/// Gets a number out of a value.
fn number(value: &Value) -> std::result::Result<f64, Rejection> {
    match value.as_f64() {
        Some(number) if number.is_nan() => Err(Rejection::domain("expected a number, found NaN")),
        Some(number) => Ok(number),
        None => Err(Rejection::Type {
            expected: "a number",
            found: value.type_name(),
        }),
    }
}

/// Validates an integer greater than zero.
pub fn positive_integer(value: &Value) -> std::result::Result<Value, Rejection> {
    match integer(value)? {
        n if n > 0 => Ok(Value::Integer(n)),
        n => Err(Rejection::domain(format!(
            "expected a positive integer, found {n}"
        ))),
    }
}

/// Validates an integer greater than or equal to zero.
pub fn non_negative_integer(value: &Value) -> std::result::Result<Value, Rejection> {
    match integer(value)? {
        n if n >= 0 => Ok(Value::Integer(n)),
        n => Err(Rejection::domain(format!(
            "expected a non-negative integer, found {n}"
        ))),
    }
}

/// Validates a number greater than or equal to zero, stored as a float.
pub fn non_negative_number(value: &Value) -> std::result::Result<Value, Rejection> {
    match number(value)? {
        n if n >= 0.0 => Ok(Value::Float(n)),
        n => Err(Rejection::domain(format!(
            "expected a non-negative number, found {n}"
        ))),
    }
}

/// Validates a fraction between zero and one (inclusive), stored as a float.
pub fn fraction(value: &Value) -> std::result::Result<Value, Rejection> {
    match number(value)? {
        n if (0.0..=1.0).contains(&n) => Ok(Value::Float(n)),
        n => Err(Rejection::domain(format!(
            "expected a value between 0 and 1, found {n}"
        ))),
    }
}

/// Validates an amount of memory in gigabytes.
///
/// Besides plain numbers, strings with a `g`/`gb` or `m`/`mb` suffix are
/// accepted (e.g., `"512m"` is half a gigabyte). Whole amounts are stored as
/// integers.
pub fn amount_of_memory(value: &Value) -> std::result::Result<Value, Rejection> {
    let gigabytes = match value {
        Value::String(s) => {
            let s = s.trim().to_ascii_lowercase();
            let (digits, scale) = if let Some(digits) = s.strip_suffix("gb") {
                (digits, 1.0)
            } else if let Some(digits) = s.strip_suffix("mb") {
                (digits, 1024.0)
            } else if let Some(digits) = s.strip_suffix('g') {
                (digits, 1.0)
            } else if let Some(digits) = s.strip_suffix('m') {
                (digits, 1024.0)
            } else {
                (s.as_str(), 1.0)
            };

            digits
                .trim()
                .parse::<f64>()
                .map_err(|_| Rejection::domain(format!("invalid amount of memory `{s}`")))?
                / scale
        }
        other => number(other)?,
    };

    if gigabytes.is_nan() || gigabytes < 0.0 {
        return Err(Rejection::domain(format!(
            "expected a non-negative amount of memory, found {gigabytes}"
        )));
    }

    let value = Value::Float(gigabytes);
    Ok(value.as_i64().map(Value::Integer).unwrap_or(value))
}

/// Creates the validator for the executable directive.
///
/// [`Value::Null`] is replaced by `default` instead of being refused.
fn executable_validator(
    default: String,
) -> impl Fn(&Value) -> std::result::Result<Value, Rejection> + Send + Sync + 'static {
    move |value: &Value| match value {
        Value::Null => Ok(Value::String(default.clone())),
        Value::String(path) if path.trim().is_empty() => {
            Err(Rejection::domain("expected a non-empty path"))
        }
        Value::String(path) => Ok(Value::String(path.clone())),
        other => Err(Rejection::Type {
            expected: "a path",
            found: other.type_name(),
        }),
    }
}

/// Raises the process count to cover every thread of every rank.
///
/// Unset (zero) rank and thread counts count as one. An explicit process
/// count at or above `nranks * omp_num_threads` is kept. If either input is
/// still deferred the process count is left alone.
pub fn finalize_np(np: &Value, siblings: &Siblings) -> Value {
    if siblings.is_deferred(NRANKS) || siblings.is_deferred(OMP_NUM_THREADS) {
        return np.clone();
    }

    let at_least_one = |name: &str| {
        siblings
            .get(name)
            .and_then(Value::as_i64)
            .unwrap_or(0)
            .max(1)
    };

    let required = at_least_one(NRANKS).saturating_mul(at_least_one(OMP_NUM_THREADS));
    match np.as_i64() {
        Some(np) => Value::Integer(np.max(required)),
        None => np.clone(),
    }
}

/// Creates the process count spec.
pub fn np(defaults: &Defaults) -> Result<DirectiveSpec> {
    DirectiveSpec::builder(NP, defaults.np().unwrap_or(DEFAULT_NP))
        .validator(positive_integer)
        .serial(merge::max)
        .parallel(merge::sum)
        .finalizer(finalize_np)
        .try_build()
}

/// Creates the MPI rank count spec.
pub fn nranks(defaults: &Defaults) -> Result<DirectiveSpec> {
    count(NRANKS, defaults.nranks())
}

/// Creates the GPU count spec.
pub fn ngpu(defaults: &Defaults) -> Result<DirectiveSpec> {
    count(NGPU, defaults.ngpu())
}

/// Creates the threads-per-process spec.
pub fn omp_num_threads(defaults: &Defaults) -> Result<DirectiveSpec> {
    count(OMP_NUM_THREADS, defaults.omp_num_threads())
}

/// Creates a non-negative count that is maxed serially and summed in
/// parallel.
fn count(name: &str, default: Option<i64>) -> Result<DirectiveSpec> {
    DirectiveSpec::builder(name, default.unwrap_or(0))
        .validator(non_negative_integer)
        .serial(merge::max)
        .parallel(merge::sum)
        .try_build()
}

/// Creates the executable spec.
///
/// The configured executable is both the default and the replacement for a
/// [`Value::Null`].
pub fn executable(defaults: &Defaults) -> Result<DirectiveSpec> {
    let default = defaults.executable().to_owned();

    DirectiveSpec::builder(EXECUTABLE, default.clone())
        .validator(executable_validator(default))
        .serial(merge::first)
        .parallel(merge::first)
        .try_build()
}

/// Creates the wall-clock limit spec.
pub fn walltime(defaults: &Defaults) -> Result<DirectiveSpec> {
    DirectiveSpec::builder(WALLTIME, defaults.walltime().unwrap_or(DEFAULT_WALLTIME))
        .validator(non_negative_number)
        .serial(merge::sum)
        .parallel(merge::max)
        .try_build()
}

/// Creates the memory spec.
pub fn memory(defaults: &Defaults) -> Result<DirectiveSpec> {
    let default = defaults
        .memory()
        .map(Value::from)
        .unwrap_or(Value::Integer(DEFAULT_MEMORY));

    DirectiveSpec::builder(MEMORY, default)
        .validator(amount_of_memory)
        .serial(merge::max)
        .parallel(merge::sum)
        .try_build()
}

/// Creates the processor fraction spec.
pub fn processor_fraction(defaults: &Defaults) -> Result<DirectiveSpec> {
    DirectiveSpec::builder(
        PROCESSOR_FRACTION,
        defaults
            .processor_fraction()
            .unwrap_or(DEFAULT_PROCESSOR_FRACTION),
    )
    .validator(fraction)
    .serial(merge::first)
    .parallel(merge::first)
    .try_build()
}

/// Creates every standard spec in the canonical order.
pub fn specs(defaults: &Defaults) -> Result<Vec<Arc<DirectiveSpec>>> {
    Ok(vec![
        Arc::new(np(defaults)?),
        Arc::new(nranks(defaults)?),
        Arc::new(ngpu(defaults)?),
        Arc::new(omp_num_threads(defaults)?),
        Arc::new(executable(defaults)?),
        Arc::new(walltime(defaults)?),
        Arc::new(memory(defaults)?),
        Arc::new(processor_fraction(defaults)?),
    ])
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn all() -> Vec<Arc<DirectiveSpec>> {
        specs(&Defaults::builder().executable("/usr/bin/python3").build()).unwrap()
    }

    fn spec(name: &str) -> Arc<DirectiveSpec> {
        all().into_iter().find(|spec| spec.name() == name).unwrap()
    }

    #[test]
    fn builtin_defaults() {
        assert_eq!(spec(NP).default(), &Value::Integer(1));
        assert_eq!(spec(NGPU).default(), &Value::Integer(0));
        assert_eq!(spec(NRANKS).default(), &Value::Integer(0));
        assert_eq!(spec(OMP_NUM_THREADS).default(), &Value::Integer(0));
        assert_eq!(spec(EXECUTABLE).default(), &Value::from("/usr/bin/python3"));
        assert_eq!(spec(WALLTIME).default(), &Value::Float(12.0));
        assert_eq!(spec(MEMORY).default(), &Value::Integer(4));
        assert_eq!(spec(PROCESSOR_FRACTION).default(), &Value::Float(1.0));
    }

    #[test]
    fn configured_defaults() {
        let defaults = Defaults::builder()
            .walltime(24.0)
            .memory(8.0)
            .nranks(2)
            .build();

        assert_eq!(walltime(&defaults).unwrap().default(), &Value::Float(24.0));
        assert_eq!(memory(&defaults).unwrap().default(), &Value::Integer(8));
        assert_eq!(nranks(&defaults).unwrap().default(), &Value::Integer(2));
    }

    #[test]
    fn invalid_configured_default_is_an_error() {
        let defaults = Defaults::builder().processor_fraction(2.0).build();
        assert!(specs(&defaults).unwrap_err().is_validation());
    }

    #[test]
    fn defaults_are_valid() {
        for spec in all() {
            assert_eq!(&spec.validate(spec.default()).unwrap(), spec.default());
        }
    }

    #[test]
    fn null_is_refused_except_for_the_executable() {
        for spec in all() {
            let result = spec.validate(&Value::Null);

            if spec.name() == EXECUTABLE {
                assert_eq!(result.unwrap(), Value::from("/usr/bin/python3"));
                continue;
            }

            match result.unwrap_err() {
                crate::Error::Validation {
                    source: Rejection::Type { found, .. },
                    ..
                } => assert_eq!(found, "null"),
                err => panic!("unexpected error: {err}"),
            }
        }
    }

    #[test]
    fn out_of_domain_values_are_refused() {
        assert!(spec(NP).validate(&Value::from(0)).is_err());
        assert!(spec(NP).validate(&Value::from(2.5)).is_err());
        assert!(spec(NRANKS).validate(&Value::from(-1)).is_err());
        assert!(spec(NGPU).validate(&Value::from("two")).is_err());
        assert!(spec(OMP_NUM_THREADS).validate(&Value::from(true)).is_err());
        assert!(spec(EXECUTABLE).validate(&Value::from(3)).is_err());
        assert!(spec(WALLTIME).validate(&Value::from(-0.5)).is_err());
        assert!(spec(MEMORY).validate(&Value::from(-4)).is_err());
        assert!(spec(MEMORY).validate(&Value::from("lots")).is_err());
        assert!(spec(PROCESSOR_FRACTION).validate(&Value::from(1.5)).is_err());
        assert!(spec(PROCESSOR_FRACTION).validate(&Value::from(-0.1)).is_err());
    }

    #[test]
    fn values_are_normalized() {
        assert_eq!(spec(NP).validate(&Value::from(4.0)).unwrap(), Value::Integer(4));
        assert_eq!(spec(WALLTIME).validate(&Value::from(2)).unwrap(), Value::Float(2.0));
        assert_eq!(
            spec(PROCESSOR_FRACTION).validate(&Value::from(1)).unwrap(),
            Value::Float(1.0)
        );
        assert_eq!(spec(MEMORY).validate(&Value::from("16g")).unwrap(), Value::Integer(16));
        assert_eq!(spec(MEMORY).validate(&Value::from("2GB")).unwrap(), Value::Integer(2));

        let half = spec(MEMORY).validate(&Value::from("512m")).unwrap();
        assert_relative_eq!(half.as_f64().unwrap(), 0.5);
    }

    #[test]
    fn serial_merges() {
        let four = Value::from(4);
        let two = Value::from(2);

        assert_eq!(spec(NP).merge_serial(&four, &two), Value::Integer(4));
        assert_eq!(spec(NRANKS).merge_serial(&four, &two), Value::Integer(4));
        assert_eq!(spec(NGPU).merge_serial(&four, &two), Value::Integer(4));
        assert_eq!(spec(OMP_NUM_THREADS).merge_serial(&four, &two), Value::Integer(4));
        assert_eq!(
            spec(EXECUTABLE).merge_serial(&Value::from("Path1"), &Value::from("Path2")),
            Value::from("Path1")
        );
        assert_eq!(
            spec(WALLTIME).merge_serial(&Value::from(4.0), &Value::from(2.0)),
            Value::Float(6.0)
        );
        assert_eq!(spec(MEMORY).merge_serial(&four, &two), Value::Integer(4));
        assert_eq!(
            spec(PROCESSOR_FRACTION).merge_serial(&Value::from(0.4), &Value::from(0.2)),
            Value::Float(0.4)
        );
    }

    #[test]
    fn parallel_merges() {
        let four = Value::from(4);
        let two = Value::from(2);

        assert_eq!(spec(NP).merge_parallel(&four, &two), Value::Integer(6));
        assert_eq!(spec(NRANKS).merge_parallel(&four, &two), Value::Integer(6));
        assert_eq!(spec(NGPU).merge_parallel(&four, &two), Value::Integer(6));
        assert_eq!(spec(OMP_NUM_THREADS).merge_parallel(&four, &two), Value::Integer(6));
        assert_eq!(
            spec(EXECUTABLE).merge_parallel(&Value::from("Path1"), &Value::from("Path2")),
            Value::from("Path1")
        );
        assert_eq!(
            spec(WALLTIME).merge_parallel(&Value::from(4.0), &Value::from(2.0)),
            Value::Float(4.0)
        );
        assert_eq!(spec(MEMORY).merge_parallel(&four, &two), Value::Integer(6));
        assert_eq!(
            spec(PROCESSOR_FRACTION).merge_parallel(&Value::from(0.4), &Value::from(0.2)),
            Value::Float(0.4)
        );
    }

    #[test]
    fn np_covers_ranks_and_threads() {
        let np = spec(NP);

        let siblings = Siblings::from_iter([
            (NRANKS, Value::from(0)),
            (OMP_NUM_THREADS, Value::from(0)),
        ]);
        assert_eq!(np.finalize(&Value::from(2), &siblings), Value::Integer(2));

        let siblings = Siblings::from_iter([
            (NRANKS, Value::from(2)),
            (OMP_NUM_THREADS, Value::from(4)),
        ]);
        assert_eq!(np.finalize(&Value::from(2), &siblings), Value::Integer(8));

        // An explicit count above the product is kept.
        assert_eq!(np.finalize(&Value::from(16), &siblings), Value::Integer(16));

        let siblings = Siblings::from_iter([
            (NRANKS, None),
            (OMP_NUM_THREADS, Some(Value::from(4))),
        ]);
        assert_eq!(np.finalize(&Value::from(2), &siblings), Value::Integer(2));
    }
}
