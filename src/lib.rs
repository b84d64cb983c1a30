pub mod classify;
pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod logging;
pub mod record;
pub mod report;
pub mod scanner;
pub mod signal;
pub mod utils;

pub use classify::classify;
pub use cli::Cli;
pub use config::Config;
pub use duplicates::{DetectionReport, DetectorConfig, DuplicateDetector, DuplicateGroup, FileWarning};
pub use error::DupError;
pub use record::{Digest, FileIdentity, FileRecord, HashAlgorithm};
pub use scanner::{CandidateFilter, Candidates, SizeRange, collect_candidates};
pub use utils::{format_human_elapsed, parse_size};
