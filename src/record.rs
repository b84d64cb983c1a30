//! One candidate file and its memoized content fingerprints.
//!
//! A [`FileRecord`] stats its path once when it is created. The partial and
//! full fingerprints are only computed when asked for, and each is computed
//! at most once: later calls return the cached [`Digest`] without touching the
//! file again, even if the file has changed on disk in the meantime.

use std::fmt;
use std::fs::{self, File, Metadata};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use clap::ValueEnum;
use log::debug;
use serde::{Deserialize, Serialize, Serializer};
use sha2::Digest as _;

use crate::error::{DupError, Result};

/// Read size used when streaming a whole file through the full hash.
pub const FULL_HASH_CHUNK: usize = 64 * 1024;

/// Digest algorithm used for both fingerprints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    #[default]
    Blake3,
    Sha256,
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blake3 => f.write_str("blake3"),
            Self::Sha256 => f.write_str("sha256"),
        }
    }
}

enum StreamHasher {
    Blake3(Box<blake3::Hasher>),
    Sha256(sha2::Sha256),
}

impl StreamHasher {
    fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Blake3 => Self::Blake3(Box::new(blake3::Hasher::new())),
            HashAlgorithm::Sha256 => Self::Sha256(sha2::Sha256::new()),
        }
    }

    fn update(&mut self, bytes: &[u8]) {
        match self {
            Self::Blake3(hasher) => {
                hasher.update(bytes);
            }
            Self::Sha256(hasher) => hasher.update(bytes),
        }
    }

    fn finalize(self) -> Digest {
        match self {
            Self::Blake3(hasher) => Digest(*hasher.finalize().as_bytes()),
            Self::Sha256(hasher) => {
                let mut out = [0u8; 32];
                out.copy_from_slice(&hasher.finalize());
                Digest(out)
            }
        }
    }
}

/// A 256-bit content fingerprint. Displays as lowercase hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest([u8; 32]);

impl Digest {
    /// Hash an in-memory buffer with the given algorithm.
    pub fn of_bytes(algorithm: HashAlgorithm, bytes: &[u8]) -> Self {
        let mut hasher = StreamHasher::new(algorithm);
        hasher.update(bytes);
        hasher.finalize()
    }

    pub fn to_hex(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({self})")
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Key that is equal for two records exactly when they name the same file object.
///
/// On Unix this is the (device, inode) pair, so hardlinks and repeated paths
/// collapse to one identity. Elsewhere the canonicalized path is used.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FileIdentity {
    Inode { dev: u64, ino: u64 },
    Path(PathBuf),
}

impl FileIdentity {
    #[cfg(unix)]
    fn from_metadata(_path: &Path, metadata: &Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;
        Self::Inode {
            dev: metadata.dev(),
            ino: metadata.ino(),
        }
    }

    #[cfg(not(unix))]
    fn from_metadata(path: &Path, _metadata: &Metadata) -> Self {
        Self::Path(fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf()))
    }
}

#[derive(Debug)]
pub struct FileRecord {
    path: PathBuf,
    size: u64,
    identity: FileIdentity,
    algorithm: HashAlgorithm,
    partial: OnceLock<Digest>,
    full: OnceLock<Digest>,
    reads: AtomicUsize,
}

impl FileRecord {
    /// Stat `path` and wrap it. Fails with [`DupError::Io`] if the file is not accessible.
    pub fn new(path: impl Into<PathBuf>, algorithm: HashAlgorithm) -> Result<Self> {
        let path = path.into();
        let metadata = fs::metadata(&path).map_err(|e| DupError::io(&path, e))?;
        if !metadata.is_file() {
            return Err(DupError::io(
                &path,
                io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"),
            ));
        }
        let identity = FileIdentity::from_metadata(&path, &metadata);
        Ok(Self {
            path,
            size: metadata.len(),
            identity,
            algorithm,
            partial: OnceLock::new(),
            full: OnceLock::new(),
            reads: AtomicUsize::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size in bytes as reported when the record was created.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn identity(&self) -> &FileIdentity {
        &self.identity
    }

    /// Fingerprint of the first `window` bytes (the whole file if it is shorter).
    ///
    /// Only the first call reads the file. The window of that first call is
    /// the one that sticks; later calls return the cached digest regardless
    /// of the window passed.
    pub fn partial_hash(&self, window: u64) -> Result<Digest> {
        if let Some(digest) = self.partial.get() {
            return Ok(*digest);
        }
        let digest = self.compute_digest(Some(window))?;
        Ok(*self.partial.get_or_init(|| digest))
    }

    /// Fingerprint of the entire content, streamed in [`FULL_HASH_CHUNK`] reads.
    pub fn full_hash(&self) -> Result<Digest> {
        if let Some(digest) = self.full.get() {
            return Ok(*digest);
        }
        let digest = self.compute_digest(None)?;
        Ok(*self.full.get_or_init(|| digest))
    }

    pub fn cached_partial_hash(&self) -> Option<Digest> {
        self.partial.get().copied()
    }

    pub fn cached_full_hash(&self) -> Option<Digest> {
        self.full.get().copied()
    }

    /// How many times this record has opened its file for hashing.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }

    fn compute_digest(&self, limit: Option<u64>) -> Result<Digest> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        let file = File::open(&self.path).map_err(|e| DupError::io(&self.path, e))?;
        let (reader, buf_len): (Box<dyn Read>, usize) = match limit {
            Some(window) => (
                Box::new(file.take(window)),
                usize::try_from(window).map_or(FULL_HASH_CHUNK, |w| w.clamp(1, FULL_HASH_CHUNK)),
            ),
            None => (Box::new(file), FULL_HASH_CHUNK),
        };
        let (digest, total) = stream_digest(self.algorithm, reader, buf_len)
            .map_err(|e| DupError::io(&self.path, e))?;
        debug!(
            "{} hash of '{}': {} ({} bytes)",
            if limit.is_some() { "Partial" } else { "Full" },
            self.path.display(),
            digest,
            total
        );
        Ok(digest)
    }
}

fn stream_digest(
    algorithm: HashAlgorithm,
    mut reader: impl Read,
    buf_len: usize,
) -> io::Result<(Digest, u64)> {
    let mut hasher = StreamHasher::new(algorithm);
    let mut buffer = vec![0u8; buf_len];
    let mut total = 0u64;
    loop {
        let bytes_read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buffer[..bytes_read]);
        total += bytes_read as u64;
    }
    Ok((hasher.finalize(), total))
}
