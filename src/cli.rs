use std::path::PathBuf;

use clap::{ArgAction, Parser};

use crate::record::HashAlgorithm;

#[derive(Parser, Debug)]
#[command(name = "dup-sieve", version)]
#[command(about = "Find duplicate files by content, reading as little data as possible")]
pub struct Cli {
    /// Directories, files or file-name globs (e.g. 'photos/*.jpg') to scan
    #[arg(default_value = ".")]
    pub inputs: Vec<PathBuf>,

    /// Skip files whose size is not strictly greater than this (e.g. 64KB)
    #[arg(long, value_name = "SIZE")]
    pub min_size: Option<String>,

    /// Skip files whose size is not strictly less than this (e.g. 1GB)
    #[arg(long, value_name = "SIZE")]
    pub max_size: Option<String>,

    /// Bytes read from the start of each file for the quick comparison
    #[arg(long, value_name = "SIZE")]
    pub hash_window: Option<String>,

    /// Digest used for both the quick and the full comparison
    #[arg(long, value_enum)]
    pub algorithm: Option<HashAlgorithm>,

    /// Number of parallel threads for hashing (default: number of CPU cores)
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// TOML configuration file; command-line flags take precedence
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Disable progress bars
    #[arg(long)]
    pub no_progress: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}
