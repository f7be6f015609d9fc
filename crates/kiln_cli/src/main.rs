//! Maintenance tools for the on-disk intermediate store.
//!
//! Provides `kiln stat` for a namespace summary, `kiln verify` for a full
//! integrity and freshness scan, and `kiln gc` for removing entries that no
//! longer validate.

#![warn(missing_docs)]

mod gc;
mod stat;
mod verify;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use kiln_config::load_config;
use kiln_store::IntermediateStore;
use tracing_subscriber::EnvFilter;

/// Asset pipeline maintenance tools.
#[derive(Parser, Debug)]
#[command(name = "kiln", version, about = "Kiln asset pipeline tools")]
pub struct Cli {
    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Project directory containing `kiln.toml`.
    #[arg(long, global = true, default_value = ".")]
    pub project: PathBuf,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Summarize the configured store namespace.
    Stat,
    /// Validate every store entry (framing, checksums, fingerprints).
    Verify(VerifyArgs),
    /// Remove entries that no longer validate.
    Gc(GcArgs),
}

/// Arguments for the `kiln verify` subcommand.
#[derive(Parser, Debug)]
pub struct VerifyArgs {
    /// Output format.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

/// Arguments for the `kiln gc` subcommand.
#[derive(Parser, Debug)]
pub struct GcArgs {
    /// Report what would be removed without touching the store.
    #[arg(long)]
    pub dry_run: bool,
}

/// Report output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable terminal output.
    Text,
    /// Machine-readable JSON output.
    Json,
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = open_store(&cli.project).and_then(|store| match cli.command {
        Command::Stat => stat::run(&store),
        Command::Verify(ref args) => verify::run(&store, args),
        Command::Gc(ref args) => gc::run(&store, args),
    });

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(2);
        }
    }
}

fn open_store(project_dir: &std::path::Path) -> Result<IntermediateStore, Box<dyn std::error::Error>> {
    let config = load_config(project_dir)?;
    let root = if config.store.root.is_absolute() {
        config.store.root.clone()
    } else {
        project_dir.join(&config.store.root)
    };
    let store =
        IntermediateStore::open(&root, &config.pipeline.tool_version, &config.store.config)?;
    Ok(store)
}
