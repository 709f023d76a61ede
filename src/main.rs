//! Memsee CLI - interactive explorer for heap dump object graphs

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "memsee")]
#[command(version)]
#[command(about = "Explore heap dump object graphs with SQL")]
#[command(long_about = r#"
Memsee loads newline-delimited JSON heap dumps into SQLite, one generation
per dump, and lets you query them with SQL plus a few shorthands:
  • X^ and X& for the parents and children of X
  • #R.N and #R.col for values from earlier results
  • $name for values defined with `set`

Example usage:
  memsee shell heap.db
  memsee run heap.db "read dump.json" "gc" "select type, count(*) from obj group by type"
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive session, reading commands from stdin
    Shell {
        /// Database to open (or create) before the first command
        database: Option<PathBuf>,
    },

    /// Run commands non-interactively, one per argument
    Run {
        /// Database to open (or create) before the first command
        #[arg(short, long)]
        database: Option<PathBuf>,

        /// Commands, e.g. "select * from obj where size > 1000"
        #[arg(required = true)]
        commands: Vec<String>,
    },

    /// Write a memsee.toml with the default settings
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins when set
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config_path = cli.config.clone().unwrap_or_else(memsee::config::default_config_path);

    match cli.command {
        Some(Commands::Init { force }) => {
            commands::run_init(&config_path, force)?;
        }
        Some(Commands::Run { database, commands: lines }) => {
            let mut app = commands::start(cli.config.as_deref(), database)?;
            commands::run_batch(&mut app, &lines)?;
        }
        Some(Commands::Shell { database }) => {
            let mut app = commands::start(cli.config.as_deref(), database)?;
            commands::run_shell(&mut app)?;
        }
        None => {
            let mut app = commands::start(cli.config.as_deref(), None)?;
            commands::run_shell(&mut app)?;
        }
    }

    Ok(())
}
