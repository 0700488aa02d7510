//! Command-line argument parsing.
//!
//! Uses `clap`'s derive API (`clap = { version = "4", features =
//! ["derive"] }`), the same pattern the `hdds-admin` tool uses for its
//! own subcommands. Validation failures print a usage message to
//! stderr and exit 1.

use std::path::PathBuf;

use clap::Parser;

use crate::constants::{DEFAULT_CONCURRENCY, DEFAULT_N_SAMPLES};

/// Drives a completions endpoint under concurrent load and grades each
/// response against a labelled dataset.
#[derive(Debug, Parser)]
#[command(name = "scale-bench", version, about)]
pub struct Cli {
    /// Path to a benchmark config file (YAML).
    pub config: PathBuf,

    /// Completions endpoint, e.g. https://api.openai.com/v1/completions
    #[arg(long)]
    pub base_url: String,

    /// Output line-delimited JSON path.
    #[arg(long)]
    pub outfile: PathBuf,

    /// Number of concurrent dispatcher threads.
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Max dataset rows sampled for this run.
    #[arg(long, default_value_t = DEFAULT_N_SAMPLES)]
    pub n_samples: usize,

    /// Per-request timeout in seconds.
    #[arg(long)]
    pub timeout: Option<u64>,
}
