//! Baton CLI - run a bounded producer/consumer hand-off and verify it.
//!
//! # Usage
//!
//! ```bash
//! # Reference run: 10 items, capacity 3, 100 ms producer, 250 ms consumer
//! baton run
//!
//! # Ping-pong hand-off without delays
//! baton run --capacity 1 --items 1000 --producer-delay-ms 0 --consumer-delay-ms 0
//!
//! # Show the effective configuration
//! baton config --config baton.toml
//! ```

use anyhow::Result;
use baton_cli::commands::{self, ConfigOverrides};
use baton_cli::{output, OutputFormat};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "baton")]
#[command(about = "Baton - bounded producer/consumer hand-off", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log buffer and task events (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output format (human, json)
    #[arg(long, global = true, default_value = "human")]
    format: OutputFormatArg,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormatArg {
    Human,
    Json,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Human => OutputFormat::Human,
            OutputFormatArg::Json => OutputFormat::Json,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the producer and consumer over 1..=items and verify integrity
    Run {
        /// Buffer capacity
        #[arg(long)]
        capacity: Option<usize>,

        /// Number of items to move
        #[arg(long)]
        items: Option<usize>,

        /// Producer delay per item in milliseconds
        #[arg(long)]
        producer_delay_ms: Option<u64>,

        /// Consumer delay per item in milliseconds
        #[arg(long)]
        consumer_delay_ms: Option<u64>,
    },

    /// Print the effective configuration
    Config,
}

fn main() {
    match run() {
        Ok(true) => {}
        Ok(false) => process::exit(2),
        Err(e) => {
            output::error(format!("{:#}", e));
            process::exit(1);
        }
    }
}

fn run() -> Result<bool> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let format = OutputFormat::from(cli.format);

    match cli.command {
        Commands::Run {
            capacity,
            items,
            producer_delay_ms,
            consumer_delay_ms,
        } => {
            let overrides = ConfigOverrides {
                capacity,
                items,
                producer_delay_ms,
                consumer_delay_ms,
            };
            let config = commands::resolve_config(cli.config.as_deref(), &overrides)?;
            commands::run(config, format)
        }

        Commands::Config => {
            let config =
                commands::resolve_config(cli.config.as_deref(), &ConfigOverrides::default())?;
            commands::show_config(&config, format)?;
            Ok(true)
        }
    }
}

/// Filter for the library and CLI targets at each `-v` count. `None` defers
/// to `RUST_LOG`, falling back to warnings only so the report stays readable.
fn log_directive(verbose: u8) -> Option<&'static str> {
    match verbose {
        0 => None,
        1 => Some("warn,baton=info,baton_cli=info"),
        2 => Some("warn,baton=debug,baton_cli=debug"),
        _ => Some("warn,baton=trace,baton_cli=trace"),
    }
}

fn init_logging(verbose: u8) {
    use tracing_subscriber::EnvFilter;

    let filter = match log_directive(verbose) {
        Some(directive) => EnvFilter::new(directive),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };

    // Logs go to stderr so `--format json` output stays parseable.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_thread_names(true)
        .with_target(false)
        .init();
}
