//! Three-pass duplicate detection.
//!
//! Candidates are narrowed by size, then by a hash of the first
//! `hash_window` bytes, then by a hash of the whole content. Each pass is a
//! [`classify`] over the survivors of the previous one, and single-member
//! buckets are dropped after every pass. A file whose hash cannot be read is
//! reported as a [`FileWarning`] and takes no further part in the run.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use indicatif::{HumanBytes, HumanCount, ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use rayon::ThreadPool;
use rayon::prelude::*;
use serde::Serialize;

use crate::classify::classify;
use crate::error::DupError;
use crate::record::{Digest, FileRecord, HashAlgorithm};

pub const DEFAULT_HASH_WINDOW: u64 = 64 * 1024;

#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Bytes read from the start of each file by the partial pass.
    pub hash_window: u64,
    pub algorithm: HashAlgorithm,
    /// Hashing workers. `1` hashes on the calling thread.
    pub threads: usize,
    /// Set to request cancellation; checked before each file is hashed.
    pub shutdown: Option<Arc<AtomicBool>>,
    pub progress: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            hash_window: DEFAULT_HASH_WINDOW,
            algorithm: HashAlgorithm::default(),
            threads: default_threads(),
            shutdown: None,
            progress: false,
        }
    }
}

impl DetectorConfig {
    #[must_use]
    pub fn with_hash_window(mut self, bytes: u64) -> Self {
        self.hash_window = bytes.max(1);
        self
    }

    #[must_use]
    pub fn with_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    #[must_use]
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown = Some(flag);
        self
    }

    #[must_use]
    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.progress = enabled;
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }
}

pub fn default_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Files of distinct identity that share size, partial hash and full hash.
#[derive(Debug)]
pub struct DuplicateGroup {
    /// Full-content digest shared by every member.
    pub digest: Digest,
    pub size: u64,
    pub files: Vec<FileRecord>,
}

impl DuplicateGroup {
    pub fn paths(&self) -> impl Iterator<Item = &std::path::Path> {
        self.files.iter().map(FileRecord::path)
    }

    /// Bytes freed by keeping a single member.
    pub fn reclaimable(&self) -> u64 {
        self.size * (self.files.len() as u64).saturating_sub(1)
    }
}

/// A file dropped from the run because it could not be read.
#[derive(Debug, Clone, Serialize)]
pub struct FileWarning {
    pub path: PathBuf,
    pub message: String,
}

impl From<DupError> for FileWarning {
    fn from(err: DupError) -> Self {
        let path = match &err {
            DupError::Io { path, .. } | DupError::Path { path, .. } => path.clone(),
            _ => PathBuf::new(),
        };
        Self {
            path,
            message: err.to_string(),
        }
    }
}

/// Counters for one pass of the pipeline.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PassStats {
    /// Files that entered the pass.
    pub input: usize,
    /// Files whose key could not be computed.
    pub failed: usize,
    /// Buckets with at least two members after the pass.
    pub buckets: usize,
    /// Files in those buckets.
    pub survivors: usize,
}

#[derive(Debug, Default)]
pub struct DetectionReport {
    pub groups: Vec<DuplicateGroup>,
    pub warnings: Vec<FileWarning>,
    pub size_pass: PassStats,
    pub partial_pass: PassStats,
    pub full_pass: PassStats,
    /// Cancellation was observed; some candidates were never confirmed.
    pub interrupted: bool,
}

impl DetectionReport {
    /// Sum over groups of `size * (members - 1)`.
    pub fn reclaimable_size(&self) -> u64 {
        self.groups.iter().map(DuplicateGroup::reclaimable).sum()
    }

    /// Members beyond the first in every group.
    pub fn duplicate_files(&self) -> usize {
        self.groups.iter().map(|g| g.files.len().saturating_sub(1)).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    Partial,
    Full,
}

impl Pass {
    fn label(self) -> &'static str {
        match self {
            Self::Partial => "Partial-hash pass",
            Self::Full => "Full-hash pass",
        }
    }
}

enum HashOutcome {
    Hashed(Digest),
    Failed(DupError),
    Skipped,
}

pub struct DuplicateDetector {
    config: DetectorConfig,
}

impl DuplicateDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    /// Wrap each path in a [`FileRecord`] and run the pipeline over them.
    ///
    /// Paths that cannot be stat'ed become warnings in the returned report.
    pub fn find_duplicates_in_paths<I, P>(&self, paths: I) -> DetectionReport
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut warnings = Vec::new();
        let mut records = Vec::new();
        for path in paths {
            match FileRecord::new(path, self.config.algorithm) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!("{e}");
                    warnings.push(FileWarning::from(e));
                }
            }
        }
        let mut report = self.find_duplicates(records);
        warnings.append(&mut report.warnings);
        report.warnings = warnings;
        report
    }

    pub fn find_duplicates(&self, files: Vec<FileRecord>) -> DetectionReport {
        let mut report = DetectionReport::default();
        let pool = self.build_pool();

        info!("Analyzing {} files for duplicates", HumanCount(files.len() as u64));
        report.size_pass.input = files.len();
        let by_size: Vec<Vec<FileRecord>> = classify(files, FileRecord::size)
            .into_iter()
            .filter(|(_, bucket)| bucket.len() > 1)
            .map(|(_, bucket)| bucket)
            .collect();
        record_survivors(&mut report.size_pass, by_size.iter().map(Vec::len));
        info!(
            "Size pass: {} files in {} same-size buckets",
            HumanCount(report.size_pass.survivors as u64),
            HumanCount(report.size_pass.buckets as u64)
        );

        let by_partial = self.hash_pass(pool.as_ref(), by_size, Pass::Partial, &mut report);
        let by_full = self.hash_pass(pool.as_ref(), by_partial, Pass::Full, &mut report);

        for bucket in by_full {
            if let Some(group) = distinct_group(bucket) {
                report.groups.push(group);
            }
        }

        info!(
            "Found {} duplicate groups, {} reclaimable",
            HumanCount(report.groups.len() as u64),
            HumanBytes(report.reclaimable_size())
        );
        report
    }

    fn build_pool(&self) -> Option<ThreadPool> {
        if self.config.threads <= 1 {
            return None;
        }
        match rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.threads)
            .build()
        {
            Ok(pool) => Some(pool),
            Err(e) => {
                warn!("Failed to start {} hashing threads ({e}), hashing sequentially", self.config.threads);
                None
            }
        }
    }

    /// Hash every file of every bucket, then split each bucket by digest.
    ///
    /// Buckets are keyed on (parent bucket, digest), so an output bucket is
    /// always a subset of one input bucket.
    fn hash_pass(
        &self,
        pool: Option<&ThreadPool>,
        buckets: Vec<Vec<FileRecord>>,
        pass: Pass,
        report: &mut DetectionReport,
    ) -> Vec<Vec<FileRecord>> {
        let tagged: Vec<(usize, FileRecord)> = buckets
            .into_iter()
            .enumerate()
            .flat_map(|(i, bucket)| bucket.into_iter().map(move |record| (i, record)))
            .collect();
        let stats = match pass {
            Pass::Partial => &mut report.partial_pass,
            Pass::Full => &mut report.full_pass,
        };
        stats.input = tagged.len();
        if tagged.is_empty() {
            debug!("{}: no files to process", pass.label());
            return Vec::new();
        }
        info!("{}: hashing {} files", pass.label(), HumanCount(tagged.len() as u64));

        let pb = self.progress_bar(pass, tagged.len());
        let window = self.config.hash_window;
        let work = |(bucket, record): (usize, FileRecord)| {
            if self.config.is_shutdown_requested() {
                return (bucket, record, HashOutcome::Skipped);
            }
            let result = match pass {
                Pass::Partial => record.partial_hash(window),
                Pass::Full => record.full_hash(),
            };
            pb.inc(1);
            let outcome = match result {
                Ok(digest) => HashOutcome::Hashed(digest),
                Err(e) => HashOutcome::Failed(e),
            };
            (bucket, record, outcome)
        };
        let hashed: Vec<(usize, FileRecord, HashOutcome)> = match pool {
            Some(pool) => pool.install(|| tagged.into_par_iter().map(work).collect()),
            None => tagged.into_iter().map(work).collect(),
        };
        pb.finish_and_clear();

        let mut keyed = Vec::with_capacity(hashed.len());
        let mut skipped = 0usize;
        for (bucket, record, outcome) in hashed {
            match outcome {
                HashOutcome::Hashed(digest) => keyed.push(((bucket, digest), record)),
                HashOutcome::Failed(e) => {
                    warn!("{e}");
                    stats.failed += 1;
                    report.warnings.push(FileWarning::from(e));
                }
                HashOutcome::Skipped => skipped += 1,
            }
        }
        if skipped > 0 {
            info!("{}: interrupted, {} files not hashed", pass.label(), HumanCount(skipped as u64));
            report.interrupted = true;
        }

        let narrowed: Vec<Vec<FileRecord>> = classify(keyed, |(key, _)| *key)
            .into_iter()
            .filter(|(_, bucket)| bucket.len() > 1)
            .map(|(_, bucket)| bucket.into_iter().map(|(_, record)| record).collect())
            .collect();
        record_survivors(stats, narrowed.iter().map(Vec::len));
        info!(
            "{}: {} files remain in {} buckets",
            pass.label(),
            HumanCount(stats.survivors as u64),
            HumanCount(stats.buckets as u64)
        );
        narrowed
    }

    fn progress_bar(&self, pass: Pass, len: usize) -> ProgressBar {
        if !self.config.progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg} ETA: {eta}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb.set_message(pass.label());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }
}

fn record_survivors(stats: &mut PassStats, bucket_sizes: impl Iterator<Item = usize>) {
    for len in bucket_sizes {
        stats.buckets += 1;
        stats.survivors += len;
    }
}

/// Collapse aliases of one file to a single member; `None` if fewer than two remain.
fn distinct_group(bucket: Vec<FileRecord>) -> Option<DuplicateGroup> {
    let digest = bucket.first()?.cached_full_hash()?;
    let size = bucket.first()?.size();
    let mut seen = HashSet::new();
    let mut files = Vec::with_capacity(bucket.len());
    for record in bucket {
        if seen.insert(record.identity().clone()) {
            files.push(record);
        } else {
            debug!("Skipping '{}': same file as an earlier member", record.path().display());
        }
    }
    (files.len() > 1).then_some(DuplicateGroup { digest, size, files })
}
