use clap::{ Parser, Subcommand };
use std::path::PathBuf;

pub mod commands;
pub mod ui;

#[derive(Parser)]
#[command(
    name = "proofmesh",
    about = "Validates formal statements across several proof assistants and checks them for consistency",
    version,
    author,
    long_about = None
)]
pub struct ProofmeshCli {
    /// Sets the log level (error, warn, info, debug, trace)
    #[arg(short, long, global = true, default_value = "info")]
    pub log_level: String,

    /// Path to the backend registry configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format (text, json)
    #[arg(long, global = true, default_value = "text")]
    pub output_format: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate a request of formal statements and claims
    Validate {
        /// Path to the request file (JSON or YAML)
        #[arg(short, long)]
        request: PathBuf,

        /// Engine settings to use instead of the ones embedded in the request
        #[arg(short, long)]
        assistant_config: Option<PathBuf>,

        /// Write the full report as JSON to this file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Run backends one after another instead of in parallel
        #[arg(long, default_value = "false")]
        sequential: bool,
    },

    /// List configured backends and check that they are installed
    Backends {
        /// Skip the availability check
        #[arg(long, default_value = "false")]
        no_check: bool,
    },

    /// Write a default backend registry configuration
    InitConfig {
        /// Where to write the configuration
        #[arg(default_value = "proofmesh.yaml")]
        output: PathBuf,

        /// Overwrite an existing file without asking
        #[arg(short, long, default_value = "false")]
        force: bool,
    },
}
