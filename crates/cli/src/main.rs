mod commands;
mod config;
mod tap;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use specbed_runner::FailurePolicy;
use tracing_subscriber::EnvFilter;

use commands::{cmd_plugins, cmd_run, cmd_validate, RunArgs};

/// Environment variable holding the log filter directive.
const LOG_ENV: &str = "SPECBED_LOG";

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Run declarative test specs in isolated testbeds.
#[derive(Parser)]
#[command(name = "specbed", version, about = "Run declarative test specs in isolated testbeds")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Log run progress to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Path to a specbed.toml (default: ./specbed.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run test specs and print a TAP report
    Run {
        /// Spec files or directories containing specs
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Parent directory for per-spec testbeds
        #[arg(long)]
        testbed_dir: Option<PathBuf>,
        /// Scratch directory handed to the provisioner
        #[arg(long)]
        cache_dir: Option<PathBuf>,
        /// Additional directory searched for workload inputs (repeatable)
        #[arg(long = "lib", short = 'L')]
        library_paths: Vec<PathBuf>,
        /// Number of specs to run concurrently
        #[arg(long, short)]
        jobs: Option<usize>,
        /// Write the merged result document to <testbed>/ledger.json
        #[arg(long)]
        ledger: bool,
        /// Failure policy for fingerprinting (isolated or fail-fast)
        #[arg(long)]
        fingerprint_policy: Option<FailurePolicy>,
        /// Failure policy for comparisons (isolated or fail-fast)
        #[arg(long)]
        comparison_policy: Option<FailurePolicy>,
    },

    /// Validate a spec document against the schema and data model
    Validate {
        /// Path to the spec JSON file
        file: PathBuf,
    },

    /// List registered backends, fingerprinters and operators
    Plugins,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Run {
            paths,
            testbed_dir,
            cache_dir,
            library_paths,
            jobs,
            ledger,
            fingerprint_policy,
            comparison_policy,
        } => {
            let args = RunArgs {
                paths,
                config: cli.config,
                overrides: config::Overrides {
                    testbed_dir,
                    cache_dir,
                    library_paths,
                    jobs,
                    fingerprint_policy,
                    comparison_policy,
                },
                ledger,
            };
            let rt = match tokio::runtime::Runtime::new() {
                Ok(rt) => rt,
                Err(e) => {
                    report_error(
                        &format!("failed to create tokio runtime: {}", e),
                        cli.output,
                        cli.quiet,
                    );
                    process::exit(1);
                }
            };
            rt.block_on(cmd_run(args, cli.output, cli.quiet));
        }
        Commands::Validate { file } => {
            cmd_validate(&file, cli.output, cli.quiet);
        }
        Commands::Plugins => {
            cmd_plugins(cli.output);
        }
    }
}

fn init_logging(verbose: bool) {
    let fallback = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Report an error to stderr in the selected format.
pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}
