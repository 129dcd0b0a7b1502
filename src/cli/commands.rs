
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// k0s-supervisor - keeps node components running
#[derive(Parser, Debug)]
#[command(name = "k0s-supervisor")]
#[command(about = "Supervises long-running node components")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct CliArgs {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Override the configuration file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start all configured components and supervise them until signalled
    Run,

    /// Load and validate the configuration
    CheckConfig,

    /// Print the environment a component would be started with
    Env {
        /// Name of the component
        component: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliResult {
    Success(String),
    Error(String),
}

impl std::fmt::Display for CliResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliResult::Success(msg) => write!(f, "{msg}"),
            CliResult::Error(msg) => write!(f, "Error: {msg}"),
        }
    }
}
