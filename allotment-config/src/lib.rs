//! Configuration used within Allotment.
//!
//! A few notes on the structure of this crate.
//!
//! * Configuration objects are typically considered immutable and are only able
//!   to be constructed programmatically through the use of one of the builders
//!   (each configuration object should have an associated builder).
//! * Nothing here is looked up from the running process. Values such as the
//!   default executable are read from configuration and handed to the engine
//!   explicitly.

use std::path::Path;
use std::path::PathBuf;

use anyhow::Result;
use bon::Builder;
use config::ConfigBuilder;
use config::ConfigError;
use config::Environment;
use config::File;
use config::builder::DefaultState;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

mod defaults;

pub use defaults::DEFAULT_EXECUTABLE;
pub use defaults::Defaults;

/// The file name used when looking for configuration files for Allotment.
pub const FILE_NAME: &str = "allotment.toml";

/// The environment variable pointing at an additional configuration file.
pub const CONFIG_ENV: &str = "ALLOTMENT_CONFIG";

/// The prefix for environment variables that override configuration values.
///
/// Nested keys are separated by a double underscore (e.g.,
/// `ALLOTMENT_DEFAULTS__WALLTIME=24`).
pub const ENV_PREFIX: &str = "ALLOTMENT";

/// A global configuration object for Allotment.
///
/// When loading, the default sources that are automatically included are:
///
/// * `<CONFIG DIR>/allotment/allotment.toml`.
/// * `<CWD>/allotment.toml`.
/// * If the environment variable is present, the file pointed to by
///   `ALLOTMENT_CONFIG`.
///
/// Environment variables prefixed with `ALLOTMENT_` are applied last.
///
/// Notably, a configuration object may not be valid. You'll need to use the
/// [`validate()`](Config::validate) method to ensure the config is valid.
#[derive(Builder, Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case", default)]
#[builder(builder_type = Builder)]
pub struct Config {
    /// The directive defaults.
    #[builder(default)]
    defaults: Defaults,
}

impl Config {
    /// Validates the configuration object.
    pub fn validate(&self) -> Result<()> {
        self.defaults.validate()
    }

    /// Gets the directive defaults.
    pub fn defaults(&self) -> &Defaults {
        &self.defaults
    }

    /// Consumes `self` and returns the directive defaults.
    pub fn into_defaults(self) -> Defaults {
        self.defaults
    }

    /// Gets a builder with the default sources preloaded.
    pub fn default_sources() -> ConfigBuilder<DefaultState> {
        let mut builder = config::Config::builder();

        #[cfg(target_os = "macos")]
        {
            if let Some(home) = dirs::home_dir() {
                builder = builder.add_source(
                    File::from(home.join(".config").join("allotment").join(FILE_NAME))
                        .required(false),
                );
            }
        }
        #[cfg(not(target_os = "macos"))]
        {
            if let Some(config_home) = dirs::config_dir() {
                builder = builder.add_source(
                    File::from(config_home.join("allotment").join(FILE_NAME)).required(false),
                );
            }
        }

        if let Ok(mut path) = std::env::current_dir() {
            path.push(FILE_NAME);
            builder = builder.add_source(File::from(path).required(false));
        }

        if let Ok(config_file) = std::env::var(CONFIG_ENV) {
            builder = builder.add_source(File::from(PathBuf::from(config_file)).required(false));
        }

        builder
    }

    /// Loads a [`Config`] from the default set of sources.
    ///
    /// The default set of sources are loaded first (see the docs for [`Config`]
    /// for the listed default sources).
    pub fn load() -> Result<Self, ConfigError> {
        Self::extract(Self::default_sources())
    }

    /// Loads the global configuration from a set of sources.
    ///
    /// The default set of sources are loaded first (see the docs for [`Config`]
    /// for the listed default sources). After that, any sources provided in the
    /// `paths` argument are searched. Environment variables still take
    /// precedence over every file.
    pub fn load_with_paths<I, S>(paths: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<Path>,
    {
        let mut builder = Self::default_sources();

        for path in paths {
            builder = builder.add_source(File::from(path.as_ref()));
        }

        Self::extract(builder)
    }

    /// Applies the environment overrides and deserializes the result.
    fn extract(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let config: Self = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        debug!(defaults = ?config.defaults, "loaded configuration");
        Ok(config)
    }

    /// Loads a config from a test fixture.
    #[cfg(test)]
    pub fn fixture(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut full_path = PathBuf::from(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/test/fixtures/config/",
        ));

        full_path.push(path);

        config::Config::builder()
            .add_source(File::from(full_path))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::*;

    #[test]
    fn loading_file_returns_valid_defaults() {
        let config = Config::fixture("example.toml").unwrap();
        config.validate().unwrap();

        let defaults = config.defaults();
        assert_eq!(defaults.executable(), "/opt/conda/bin/python");
        assert_eq!(defaults.walltime(), Some(24.0));
        assert_eq!(defaults.memory(), Some(16.0));
        assert_eq!(defaults.processor_fraction(), Some(0.5));
        assert_eq!(defaults.np(), None);
    }

    #[test]
    fn empty_file_uses_builtin_defaults() {
        let config = Config::fixture("empty.toml").unwrap();
        config.validate().unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.defaults().executable(), DEFAULT_EXECUTABLE);
    }

    #[test]
    fn out_of_range_fraction() {
        let config = Config::fixture("invalid_fraction.toml").unwrap();
        let err = config.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "`processor_fraction` must be between 0 and 1, found 1.5"
        );
    }

    #[test]
    fn unknown_directive_defaults_are_rejected() {
        assert!(Config::fixture("unknown_directive.toml").is_err());
    }

    #[test]
    fn explicit_paths_are_loaded() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[defaults]\nnranks = 4\nomp_num_threads = 2").unwrap();

        let config = Config::load_with_paths([file.path()]).unwrap();
        assert_eq!(config.defaults().nranks(), Some(4));
        assert_eq!(config.defaults().omp_num_threads(), Some(2));
    }

    #[test]
    fn builder_matches_deserialized() {
        let config = Config::builder()
            .defaults(Defaults::builder().walltime(24.0).build())
            .build();

        assert_eq!(config.defaults().walltime(), Some(24.0));
        assert_eq!(config.into_defaults().memory(), None);
    }
}
