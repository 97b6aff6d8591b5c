use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mape")]
#[command(version = "0.1.0")]
#[command(about = "Autonomic monitor-analyze-plan-execute control loop", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding default.toml and the $MAPE_ENV file
    #[arg(long, env = "MAPE_CONFIG_DIR", default_value = "config", global = true)]
    pub config_dir: PathBuf,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the control loop until Ctrl-C
    Run {
        /// Declarative rules/resources/metrics/SLA file, overrides bootstrap.path
        #[arg(short, long)]
        bootstrap: Option<PathBuf>,
    },
    /// Parse a declarative file and compile its rules and SLA patterns
    Check {
        #[arg(short, long)]
        bootstrap: PathBuf,
    },
}
