use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Options shared by commands that talk to the services.
#[derive(clap::Args, Debug)]
pub struct ServiceOpts {
    /// Config file (default: ~/.config/runpad/config.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// WebSocket URL of the execution service.
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// Never call the suggestion service.
    #[arg(long, global = true)]
    pub no_suggestions: bool,

    /// Write logs to this file instead of stderr.
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Parser, Debug)]
#[command(
    name = "runpad",
    about = "Run code on a remote execution service with live, interactive output",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub opts: ServiceOpts,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a source file interactively.
    Run {
        /// File to run. Re-read on every Ctrl+R.
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Language to run as (default: inferred from the file extension).
        #[arg(long, short)]
        language: Option<String>,
    },

    /// Ask the suggestion service for a sample program.
    Generate {
        #[arg(value_name = "LANGUAGE")]
        language: String,

        /// Write the program here instead of stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// List supported languages.
    Languages,
}
