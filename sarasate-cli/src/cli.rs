//! Contains structures and functionality for the binary
use std::{path::PathBuf, time::Duration};

use sarasate::execution_parameters::{EngineParameters, FailurePolicy, DEFAULT_OUTPUT_RELATION};

/// Default time budget of a single oracle call in milliseconds.
const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Possible settings for printing result relations.
#[derive(clap::ValueEnum, Clone, Copy, Default, Debug, PartialEq, Eq)]
pub(crate) enum Format {
    /// Aligned table with a header
    #[default]
    Table,
    /// One JSON object per result, in the format of the data file
    Json,
}

/// Cli Arguments related to logging
#[derive(clap::Args, Debug)]
pub(crate) struct LoggingArgs {
    /// Increase log verbosity (multiple uses increase verbosity further)
    #[arg(short, long, action = clap::builder::ArgAction::Count, group = "verbosity")]
    verbose: u8,
    /// Reduce log verbosity to show only errors (equivalent to --log error)
    #[arg(short, long, group = "verbosity")]
    quiet: bool,
    /// Set log verbosity (default is "warn")
    #[arg(long = "log", value_parser=clap::builder::PossibleValuesParser::new(["error", "warn", "info", "debug", "trace"]), group = "verbosity")]
    log_level: Option<String>,
}

impl LoggingArgs {
    /// Initialising Logging
    ///
    /// Sets the logging verbosity to the given log-level in the following order:
    ///  * `Info`, `Debug`, `Trace`; depending on the count of `-v`
    ///  * `Error` when `-q` is used
    ///  * The `SARASATE_LOG` environment variable value
    ///  * `Warn` otherwise
    pub(crate) fn initialize_logging(&self) {
        let mut builder = env_logger::Builder::new();

        // Default log level
        builder.filter_level(log::LevelFilter::Warn);

        builder.parse_env("SARASATE_LOG");
        if let Some(ref level) = self.log_level {
            builder.parse_filters(level);
        } else if self.quiet {
            builder.filter_level(log::LevelFilter::Error);
        } else if self.verbose > 0 {
            builder.filter_level(match self.verbose {
                1 => log::LevelFilter::Info,
                2 => log::LevelFilter::Debug,
                3 => log::LevelFilter::Trace,
                _ => log::LevelFilter::Warn,
            });
        }
        builder.init();
    }
}

/// Cli arguments related to the engine
#[derive(Debug, clap::Args)]
pub(crate) struct EngineArgs {
    /// Relation the results are materialized into
    #[arg(short, long = "output", default_value = DEFAULT_OUTPUT_RELATION)]
    output_relation: String,
    /// Time budget of a single oracle call in milliseconds
    #[arg(long = "timeout-ms", default_value_t = DEFAULT_TIMEOUT_MS)]
    timeout_ms: u64,
    /// Keep rows the oracle could not decide instead of aborting the query
    #[arg(long = "fail-open")]
    fail_open: bool,
    /// Normalize rows on a single thread
    #[arg(long = "sequential")]
    sequential: bool,
}

impl EngineArgs {
    /// Creates the engine parameters for the current options
    pub(crate) fn parameters(&self) -> EngineParameters {
        let mut parameters = EngineParameters::default();
        parameters
            .set_output_relation(self.output_relation.clone())
            .set_oracle_timeout(Duration::from_millis(self.timeout_ms))
            .set_failure_policy(if self.fail_open {
                FailurePolicy::FailOpen
            } else {
                FailurePolicy::FailClosed
            })
            .set_parallel_normalization(!self.sequential);

        parameters
    }
}

/// Sarasate CLI
#[derive(clap::Parser, Debug)]
#[command(author, version, about)]
pub struct CliApp {
    /// JSON file with the relations to query
    #[arg(short, long = "data", value_parser)]
    pub(crate) data: PathBuf,
    /// One or more queries, executed in the given order
    #[arg(required = true)]
    pub(crate) queries: Vec<String>,
    /// Print the store operations of each query instead of executing it
    #[arg(long = "explain")]
    pub(crate) explain: bool,
    /// How results are printed
    #[arg(long = "format", value_enum, default_value_t)]
    pub(crate) format: Format,
    /// Arguments related to the engine
    #[command(flatten)]
    pub(crate) engine: EngineArgs,
    /// Arguments related to logging
    #[command(flatten)]
    pub(crate) logging: LoggingArgs,
}
