//! Configuration options related to the default values of the standard
//! directives.

use anyhow::Result;
use anyhow::bail;
use bon::Builder;
use serde::Deserialize;
use serde::Serialize;

/// The executable used when none is configured.
#[cfg(not(windows))]
pub const DEFAULT_EXECUTABLE: &str = "/bin/sh";

/// The executable used when none is configured.
#[cfg(windows)]
pub const DEFAULT_EXECUTABLE: &str = "cmd.exe";

/// Overrides for the defaults of the standard directives.
///
/// Every field is optional; anything left unset falls back to the built-in
/// default of the corresponding directive. The keys intentionally match the
/// directive names so that the same spelling works in configuration files,
/// in environment variables, and when setting directives directly.
#[derive(Builder, Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
#[builder(builder_type = Builder)]
pub struct Defaults {
    /// The number of processes.
    np: Option<i64>,

    /// The number of MPI ranks.
    nranks: Option<i64>,

    /// The number of GPUs.
    ngpu: Option<i64>,

    /// The number of threads per process.
    omp_num_threads: Option<i64>,

    /// The executable used to run the work.
    ///
    /// This replaces any lookup of the running interpreter: whatever is
    /// configured here is what the `executable` directive falls back to.
    #[builder(into)]
    executable: Option<String>,

    /// The wall-clock limit in hours.
    walltime: Option<f64>,

    /// The amount of memory in gigabytes.
    memory: Option<f64>,

    /// The share of a processor to use.
    processor_fraction: Option<f64>,
}

impl Defaults {
    /// Gets the default number of processes (if configured).
    pub fn np(&self) -> Option<i64> {
        self.np
    }

    /// Gets the default number of MPI ranks (if configured).
    pub fn nranks(&self) -> Option<i64> {
        self.nranks
    }

    /// Gets the default number of GPUs (if configured).
    pub fn ngpu(&self) -> Option<i64> {
        self.ngpu
    }

    /// Gets the default number of threads per process (if configured).
    pub fn omp_num_threads(&self) -> Option<i64> {
        self.omp_num_threads
    }

    /// Gets the configured executable.
    ///
    /// Falls back to [`DEFAULT_EXECUTABLE`] when nothing is configured.
    pub fn executable(&self) -> &str {
        self.executable.as_deref().unwrap_or(DEFAULT_EXECUTABLE)
    }

    /// Gets the default wall-clock limit in hours (if configured).
    pub fn walltime(&self) -> Option<f64> {
        self.walltime
    }

    /// Gets the default amount of memory in gigabytes (if configured).
    pub fn memory(&self) -> Option<f64> {
        self.memory
    }

    /// Gets the default processor fraction (if configured).
    pub fn processor_fraction(&self) -> Option<f64> {
        self.processor_fraction
    }

    /// Validates the configured defaults.
    pub fn validate(&self) -> Result<()> {
        if let Some(np) = self.np {
            if np < 1 {
                bail!("`np` must be a positive integer, found {np}");
            }
        }

        for (name, value) in [
            ("nranks", self.nranks),
            ("ngpu", self.ngpu),
            ("omp_num_threads", self.omp_num_threads),
        ] {
            if let Some(value) = value {
                if value < 0 {
                    bail!("`{name}` must be a non-negative integer, found {value}");
                }
            }
        }

        for (name, value) in [("walltime", self.walltime), ("memory", self.memory)] {
            if let Some(value) = value {
                if value.is_nan() || value < 0.0 {
                    bail!("`{name}` must be a non-negative number, found {value}");
                }
            }
        }

        if let Some(fraction) = self.processor_fraction {
            if !(0.0..=1.0).contains(&fraction) {
                bail!("`processor_fraction` must be between 0 and 1, found {fraction}");
            }
        }

        if let Some(executable) = &self.executable {
            if executable.trim().is_empty() {
                bail!("`executable` must not be empty");
            }
        }

        Ok(())
    }
}
