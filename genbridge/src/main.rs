//! genbridge - feed stdin to a code generator and relay its output lines.
//!
//! This is the main entry point, which:
//! - Loads the generator registry from TOML
//! - Reads the complete standard input
//! - Starts the selected generator and relays its lines to stdout
//!
//! Logs go to stderr; stdout carries generator output only.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use genbridge::config::{self, BridgeConfig, GeneratorConfig};
use genbridge::{Bridge, GenerationEngine, ProcessEngine, load_stdin};

/// genbridge - host bridge for code-generation engines
#[derive(Parser, Debug)]
#[command(name = "genbridge")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Run in verbose mode (debug logging on stderr)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Bridge stdin to a registered generator
    Run {
        /// Generator name (defaults to the configured default)
        name: Option<String>,
    },

    /// Bridge stdin to an ad-hoc generator program
    Exec {
        /// Entry point passed to the program (defaults to the program name)
        #[arg(short, long, value_name = "NAME")]
        entry: Option<String>,

        /// Program to run
        program: PathBuf,

        /// Arguments for the program
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// List registered generators
    List {
        /// Output JSON for scripting
        #[arg(long)]
        json: bool,
    },
}

/// One row of `list` output.
#[derive(Serialize)]
struct GeneratorSummary<'a> {
    name: &'a str,
    entry: &'a str,
    program: String,
    enabled: bool,
    default: bool,
}

/// Load configuration from the given path or default locations.
fn load_config(path: Option<PathBuf>) -> Result<BridgeConfig> {
    let config_path = match path {
        Some(path) => path,
        None => {
            let cwd = std::env::current_dir().context("Failed to read current directory")?;
            config::resolve_config_path(&cwd, config::user_config_dir().as_deref())
        }
    };

    debug!("Loading configuration from {}", config_path.display());
    BridgeConfig::load(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))
}

/// Entry for `exec`: a generator defined on the command line.
fn adhoc_generator(entry: Option<String>, program: PathBuf, args: Vec<String>) -> GeneratorConfig {
    let name = program
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "exec".to_string());
    let mut generator = GeneratorConfig::new(name, program, args);
    generator.entry = entry;
    generator
}

async fn bridge_stdin(generator: GeneratorConfig) -> Result<()> {
    let engine = ProcessEngine::new(generator);
    debug!("Selected generator {} ({})", engine.name(), engine.entry_point());

    let input = load_stdin().context("load phase failed")?;
    let report = Bridge::new(engine)
        .run(input, tokio::io::stdout())
        .await
        .map_err(|e| {
            let phase = e.phase();
            anyhow::Error::new(e).context(format!("{phase} phase failed"))
        })?;

    debug!("Run finished: {} line(s), state {}", report.lines, report.state);
    Ok(())
}

fn list_generators(config: &BridgeConfig, json: bool) -> Result<()> {
    let default = config.default_generator().ok().map(|g| g.name.as_str());
    let rows: Vec<GeneratorSummary<'_>> = config
        .generators
        .iter()
        .map(|g| GeneratorSummary {
            name: &g.name,
            entry: g.entry_point(),
            program: g.program.display().to_string(),
            enabled: g.enabled,
            default: default == Some(g.name.as_str()),
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    for row in &rows {
        let marker = if row.default { "*" } else { " " };
        let state = if row.enabled { "" } else { " (disabled)" };
        println!("{marker} {:<16} {:<24} {}{state}", row.name, row.entry, row.program);
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing on stderr
    let log_level = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .init();

    match args.command {
        Command::Run { name } => {
            let config = load_config(args.config)?;
            let generator = config
                .select(name.as_deref())
                .context("Failed to select generator")?
                .clone();
            bridge_stdin(generator).await
        }
        Command::Exec {
            entry,
            program,
            args: program_args,
        } => bridge_stdin(adhoc_generator(entry, program, program_args)).await,
        Command::List { json } => {
            let config = load_config(args.config)?;
            list_generators(&config, json)
        }
    }
}
