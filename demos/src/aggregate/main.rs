//! An example that combines the directives of several operations.
//!
//! Every operation listed in the input file gets its own directive set. The
//! sets are then folded, in order, into the first one using the requested
//! merge and the final directives are printed.
//!
//! You can run this command with the following command:
//! ```bash
//! cargo run --bin aggregate -- demos/operations.toml --merge parallel
//! ```

use std::path::PathBuf;

use allotment::Config;
use allotment::DirectiveSet;
use allotment::engine::Merge;
use allotment::engine::Value;
use anyhow::Context as _;
use anyhow::Result;
use anyhow::bail;
use clap::Parser;
use clap::ValueEnum;
use indexmap::IndexMap;
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

/// How the operations are composed.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum Composition {
    /// The operations run one after another.
    Serial,

    /// The operations run concurrently.
    Parallel,
}

impl From<Composition> for Merge {
    fn from(composition: Composition) -> Self {
        match composition {
            Composition::Serial => Merge::Serial,
            Composition::Parallel => Merge::Parallel,
        }
    }
}

#[derive(Debug, Parser)]
#[allow(missing_docs)]
pub struct Args {
    /// The file listing the operations.
    operations: PathBuf,

    /// How the operations are composed.
    #[arg(short, long, value_enum, default_value_t = Composition::Serial)]
    merge: Composition,

    /// Additional configuration files.
    #[arg(short, long)]
    config: Vec<PathBuf>,
}

/// An operation as listed in the input file.
#[derive(Debug, Deserialize)]
struct Operation {
    /// The name of the operation.
    name: String,

    /// The directives requested by the operation.
    #[serde(default)]
    directives: IndexMap<String, Value>,
}

/// The input file.
#[derive(Debug, Deserialize)]
struct Operations {
    /// The operations in the order they are composed.
    operations: Vec<Operation>,
}

/// Starting point for the aggregation.
fn run(args: Args) -> Result<()> {
    let config = Config::load_with_paths(&args.config).context("failed to load configuration")?;
    config.validate()?;

    let contents = std::fs::read_to_string(&args.operations).with_context(|| {
        format!(
            "failed to read operations from `{path}`",
            path = args.operations.display()
        )
    })?;
    let Operations { operations } = toml::from_str(&contents).context("invalid operations file")?;

    let mut operations = operations.into_iter();
    let Some(first) = operations.next() else {
        bail!("no operations were provided");
    };

    let mut combined: DirectiveSet = DirectiveSet::standard(config.defaults())?;
    combined
        .update_from(first.directives, Merge::Override, None)
        .with_context(|| format!("invalid directives for operation `{}`", first.name))?;

    for operation in operations {
        let mut directives: DirectiveSet = DirectiveSet::standard(config.defaults())?;
        directives
            .update_from(operation.directives, Merge::Override, None)
            .with_context(|| format!("invalid directives for operation `{}`", operation.name))?;

        info!(operation = %operation.name, merge = ?args.merge, "composing operation");
        combined.update(&directives, args.merge.into(), None)?;
    }

    combined.evaluate(None)?;

    for (name, directive) in combined.iter() {
        match directive.as_literal() {
            Some(value) => println!("{name} = {value}"),
            None => println!("{name} = <deferred>"),
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    run(args)
}
