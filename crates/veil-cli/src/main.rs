//! Veil CLI.
//!
//! Checks attribute release policies and runs them against sample requests.
//!
//! # Quick Start
//!
//! ```bash
//! # Validate policy documents
//! veil check policies/release.toml policies/deny.json
//!
//! # Filter attributes for a request
//! veil filter --policies policies/release.toml \
//!     --attributes attributes.json --context request.json --report
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Veil - attribute release policies for identity providers.
#[derive(Parser)]
#[command(name = "veil")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Project directory holding veil.toml (default: current directory).
    #[arg(short = 'C', long, global = true)]
    project: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version information.
    Version,

    /// Load and validate policy documents.
    Check {
        /// Policy documents (.toml or .json). Defaults to the configured files.
        files: Vec<PathBuf>,

        /// Report warnings without failing.
        #[arg(long)]
        lenient: bool,
    },

    /// Filter attributes for one request and print what is released.
    Filter {
        /// Policy documents (.toml or .json). Defaults to the configured files.
        #[arg(short, long, num_args = 1..)]
        policies: Vec<PathBuf>,

        /// JSON file with the candidate attributes.
        #[arg(short, long)]
        attributes: PathBuf,

        /// JSON file with the request context.
        #[arg(short, long)]
        context: PathBuf,

        /// Print per-policy and per-attribute diagnostics with the result.
        #[arg(long)]
        report: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; stdout is reserved for command output
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let project = cli.project.as_deref();

    match cli.command {
        Commands::Version => {
            commands::version::run();
            Ok(())
        }
        Commands::Check { files, lenient } => commands::check::run(project, &files, lenient),
        Commands::Filter {
            policies,
            attributes,
            context,
            report,
        } => commands::filter::run(project, &policies, &attributes, &context, report),
    }
}
