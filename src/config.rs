use std::fs;
use std::path::Path;

use log::debug;
use serde::Deserialize;

use crate::cli::Cli;
use crate::duplicates::{DEFAULT_HASH_WINDOW, DetectorConfig, default_threads};
use crate::error::DupError;
use crate::record::HashAlgorithm;
use crate::scanner::SizeRange;
use crate::utils::parse_size;

pub const DEFAULT_MIN_SIZE: u64 = 64 * 1024;
pub const DEFAULT_MAX_SIZE: u64 = 1024 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub min_size: u64,
    pub max_size: u64,
    pub hash_window: u64,
    pub algorithm: HashAlgorithm,
    pub threads: usize,
    pub json: bool,
    pub progress: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_size: DEFAULT_MIN_SIZE,
            max_size: DEFAULT_MAX_SIZE,
            hash_window: DEFAULT_HASH_WINDOW,
            algorithm: HashAlgorithm::default(),
            threads: default_threads(),
            json: false,
            progress: true,
        }
    }
}

/// On-disk form. Sizes are size strings, e.g. `min_size = "64KB"`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    min_size: Option<String>,
    max_size: Option<String>,
    hash_window: Option<String>,
    algorithm: Option<HashAlgorithm>,
    threads: Option<usize>,
    json: Option<bool>,
    progress: Option<bool>,
}

impl Config {
    /// Resolve the configuration for a run. Every failure is a config error.
    pub fn from_cli(cli: &Cli) -> Result<Self, DupError> {
        let mut config = Self::default();
        if let Some(path) = &cli.config {
            config.apply_file(&load_file(path)?)?;
        }

        if let Some(size) = &cli.min_size {
            config.min_size = parse_size(size)?;
        }
        if let Some(size) = &cli.max_size {
            config.max_size = parse_size(size)?;
        }
        if let Some(size) = &cli.hash_window {
            config.hash_window = parse_size(size)?;
        }
        if let Some(algorithm) = cli.algorithm {
            config.algorithm = algorithm;
        }
        if let Some(threads) = cli.threads {
            config.threads = threads;
        }
        config.json |= cli.json;
        if cli.no_progress {
            config.progress = false;
        }

        config.validate()?;
        debug!("Resolved configuration: {config:?}");
        Ok(config)
    }

    fn apply_file(&mut self, file: &FileConfig) -> Result<(), DupError> {
        if let Some(size) = &file.min_size {
            self.min_size = parse_size(size)?;
        }
        if let Some(size) = &file.max_size {
            self.max_size = parse_size(size)?;
        }
        if let Some(size) = &file.hash_window {
            self.hash_window = parse_size(size)?;
        }
        if let Some(algorithm) = file.algorithm {
            self.algorithm = algorithm;
        }
        if let Some(threads) = file.threads {
            self.threads = threads;
        }
        if let Some(json) = file.json {
            self.json = json;
        }
        if let Some(progress) = file.progress {
            self.progress = progress;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), DupError> {
        if self.hash_window == 0 {
            return Err(DupError::config("hash window must be at least 1 byte"));
        }
        if self.threads == 0 {
            return Err(DupError::config("thread count must be at least 1"));
        }
        if self.min_size >= self.max_size {
            return Err(DupError::config(format!(
                "min size ({}) must be less than max size ({})",
                self.min_size, self.max_size
            )));
        }
        Ok(())
    }

    pub fn size_range(&self) -> SizeRange {
        SizeRange::new(self.min_size, self.max_size)
    }

    pub fn detector_config(&self) -> DetectorConfig {
        DetectorConfig::default()
            .with_hash_window(self.hash_window)
            .with_algorithm(self.algorithm)
            .with_threads(self.threads)
            .with_progress(self.progress && !self.json)
    }
}

fn load_file(path: &Path) -> Result<FileConfig, DupError> {
    let content = fs::read_to_string(path).map_err(|e| {
        DupError::config(format!("cannot read config file '{}': {e}", path.display()))
    })?;
    toml::from_str(&content).map_err(|e| {
        DupError::config(format!("cannot parse config file '{}': {e}", path.display()))
    })
}
