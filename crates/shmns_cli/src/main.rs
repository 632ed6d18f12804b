//! shmns CLI
//!
//! Command-line access to shared namespaces.
//!
//! # Commands
//!
//! - `set` / `get` / `remove` - Work with one entry
//! - `clear` - Remove every entry
//! - `list` - Print entry names
//! - `info` - Display size, capacity and attached handles
//!
//! Each command opens the namespace, runs once and closes it. A namespace
//! is destroyed when its last handle closes, so these commands only see
//! data while some other process keeps the namespace open.

mod commands;

use clap::{Parser, Subcommand};
use shmns_core::Config;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Shared-memory namespace tools.
#[derive(Parser)]
#[command(name = "shmns")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Capacity used if this command creates the namespace
    #[arg(global = true, short, long, default_value = "64")]
    capacity: usize,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a value under an entry name
    Set {
        /// Namespace name
        namespace: String,
        /// Entry name
        entry: String,
        /// Value to store
        value: String,
    },

    /// Print the value of an entry
    Get {
        /// Namespace name
        namespace: String,
        /// Entry name
        entry: String,
    },

    /// Remove an entry
    Remove {
        /// Namespace name
        namespace: String,
        /// Entry name
        entry: String,
    },

    /// Remove every entry
    Clear {
        /// Namespace name
        namespace: String,
    },

    /// Print entry names, one per line
    List {
        /// Namespace name
        namespace: String,
    },

    /// Display namespace statistics
    Info {
        /// Namespace name
        namespace: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so values printed on stdout stay clean.
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let target = commands::Target {
        config: Config::new(),
        capacity: cli.capacity,
    };

    let found = match cli.command {
        Commands::Set {
            namespace,
            entry,
            value,
        } => commands::entry::set(&target, &namespace, &entry, value.as_bytes())?,
        Commands::Get { namespace, entry } => commands::entry::get(&target, &namespace, &entry)?,
        Commands::Remove { namespace, entry } => {
            commands::entry::remove(&target, &namespace, &entry)?
        }
        Commands::Clear { namespace } => commands::namespace::clear(&target, &namespace)?,
        Commands::List { namespace } => commands::namespace::list(&target, &namespace)?,
        Commands::Info { namespace, format } => {
            commands::info::run(&target, &namespace, &format)?
        }
        Commands::Version => {
            println!("shmns CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("shmns Core v{}", shmns_core::VERSION);
            true
        }
    };

    Ok(if found {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
