mod cache;
mod commands;
mod config;
mod diagnostics;
mod error;
mod expander;
mod hasher;
mod reference;
mod resolver;
mod rewriter;
mod types;
mod watch;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::commands::{Format, OutputOptions};
use crate::config::Config;

/// Resolve multi-file OpenAPI documents into one dereferenced schema
#[derive(Parser)]
#[command(name = "specweave", version)]
struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    command: Commands,
    /// Config file to use instead of `.specweave.toml` in the working directory.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Extra rewrite rule, applied after the configured ones (repeatable).
    #[arg(long, global = true, value_name = "PATTERN=REPLACEMENT")]
    rewrite: Vec<String>,
    /// Increase log verbosity (-v info, -vv debug). `RUST_LOG` takes precedence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Resolve every document under the given paths and report leftover $refs
    Check {
        /// Documents or directories to check.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Print the handle a document is cached under
    Hash {
        /// Document to hash.
        file: PathBuf,
    },
    /// Resolve an entry document and print the fully dereferenced result
    Resolve {
        /// Entry document.
        file: PathBuf,
        /// Output format.
        #[arg(long, value_enum, default_value_t = Format::Yaml)]
        format: Format,
        /// Write to this file instead of stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Resolve, then re-resolve whenever a file of the reference graph changes
    Watch {
        /// Entry document.
        file: PathBuf,
        /// Output format.
        #[arg(long, value_enum, default_value_t = Format::Yaml)]
        format: Format,
        /// Write to this file instead of stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

/// Install the stderr log subscriber.
fn init_logging(verbosity: u8) {
    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| return EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
    return;
}

/// Load the config file and append command-line rewrite rules.
///
/// # Errors
///
/// Returns config loading errors or `Error::InvalidRewriteRule`.
fn load_config(explicit: Option<&Path>, cli_rules: &[String]) -> Result<Config, error::Error> {
    let mut config = Config::load(Path::new("."), explicit)?;
    for rule in cli_rules {
        config.add_cli_rule(rule)?;
    }
    return Ok(config);
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = load_config(cli.config.as_deref(), &cli.rewrite).and_then(|config| {
        return match cli.command {
            Commands::Check { paths } => commands::check(&paths, &config),
            Commands::Hash { file } => commands::hash(&file).map(|()| return ExitCode::SUCCESS),
            Commands::Resolve { file, format, output } => {
                commands::resolve(&file, &config, &OutputOptions { format, output })
            },
            Commands::Watch { file, format, output } => {
                watch::run(&file, &config, &OutputOptions { format, output })
            },
        };
    });

    return match result {
        Err(e) => {
            diagnostics::print_error(&e);
            ExitCode::from(2)
        },
        Ok(code) => code,
    };
}
