use clap::{Parser, Subcommand};

use std::path::PathBuf;

use super::constants::{ENV_CHUNK_SIZE, ENV_CONFIG, ENV_REFERENCE_CPU_UTILIZATION, ENV_TABLES};

#[derive(Parser)]
#[command(name = "usage-normalizer")]
#[command(version, about = "Normalize cloud billing rows into usage records", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to config file
    #[arg(long, short = 'c', global = true, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    /// Replacement knowledge-base JSON (defaults to the embedded tables)
    #[arg(long, global = true, env = ENV_TABLES)]
    pub tables: Option<PathBuf>,

    /// Average CPU utilization assumed for burstable instances, in (0, 1]
    #[arg(long, global = true, env = ENV_REFERENCE_CPU_UTILIZATION)]
    pub reference_cpu_utilization: Option<f64>,

    /// Rows handed to each blocking worker
    #[arg(long, global = true, env = ENV_CHUNK_SIZE, value_parser = parse_chunk_size)]
    pub chunk_size: Option<usize>,
}

/// Parse chunk size from CLI/env string
fn parse_chunk_size(s: &str) -> Result<usize, String> {
    match s.trim().parse::<usize>() {
        Ok(0) => Err("Chunk size must be greater than 0".to_string()),
        Ok(n) => Ok(n),
        Err(_) => Err(format!("Invalid chunk size '{}'", s)),
    }
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Normalize a billing export into JSON-lines usage records
    Normalize {
        /// Billing export JSON ({"columns": [...], "rows": [[...]]})
        #[arg(long, short = 'i')]
        input: PathBuf,

        /// Output file (defaults to stdout)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },
    /// Show the knowledge-base version and table sizes
    Tables,
}

/// Configuration derived from CLI arguments
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub config: Option<PathBuf>,
    pub tables: Option<PathBuf>,
    pub reference_cpu_utilization: Option<f64>,
    pub chunk_size: Option<usize>,
}

/// Parse CLI arguments and return config with command
pub fn parse() -> (CliConfig, Commands) {
    let cli = Cli::parse();
    let config = CliConfig {
        config: cli.config,
        tables: cli.tables,
        reference_cpu_utilization: cli.reference_cpu_utilization,
        chunk_size: cli.chunk_size,
    };
    (config, cli.command)
}
