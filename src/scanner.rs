use std::fs;
use std::path::{Path, PathBuf};

use glob::Pattern;
use indicatif::{HumanBytes, HumanCount, ProgressBar};
use log::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::DupError;

/// Decides whether a file found during the scan becomes a candidate.
pub trait CandidateFilter {
    fn accepts(&self, path: &Path, size: u64) -> bool;
}

impl<F> CandidateFilter for F
where
    F: Fn(&Path, u64) -> bool,
{
    fn accepts(&self, path: &Path, size: u64) -> bool {
        self(path, size)
    }
}

/// Open interval `min < size < max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeRange {
    pub min: u64,
    pub max: u64,
}

impl SizeRange {
    pub fn new(min: u64, max: u64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, size: u64) -> bool {
        size > self.min && size < self.max
    }
}

impl CandidateFilter for SizeRange {
    fn accepts(&self, _path: &Path, size: u64) -> bool {
        self.contains(size)
    }
}

#[derive(Debug, Default)]
pub struct Candidates {
    pub paths: Vec<PathBuf>,
    /// Inputs that could not be used. The remaining inputs were still scanned.
    pub errors: Vec<DupError>,
    pub total_size: u64,
}

/// Collect candidate files from every input. Never fails as a whole.
pub fn collect_candidates<P: AsRef<Path>>(
    inputs: &[P],
    filter: &dyn CandidateFilter,
    show_progress: bool,
) -> Candidates {
    let mut candidates = Candidates::default();
    let pb = if show_progress {
        let pb = ProgressBar::new_spinner();
        pb.set_message("Scanning files and directories...");
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    } else {
        ProgressBar::hidden()
    };

    for input in inputs {
        let input = input.as_ref();
        info!("Scanning {}", input.display());
        if let Err(e) = scan_input(input, filter, &mut candidates, &pb) {
            warn!("{e}");
            candidates.errors.push(e);
        }
    }
    pb.finish_and_clear();

    info!(
        "Found {} candidate files ({})",
        HumanCount(candidates.paths.len() as u64),
        HumanBytes(candidates.total_size)
    );
    candidates
}

fn scan_input(
    input: &Path,
    filter: &dyn CandidateFilter,
    out: &mut Candidates,
    pb: &ProgressBar,
) -> Result<(), DupError> {
    if input.is_dir() {
        walk(input, None, filter, out, pb)?;
        return Ok(());
    }

    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if !is_pattern(&name) {
        let metadata = fs::metadata(input).map_err(|e| DupError::path(input, e.to_string()))?;
        if !metadata.is_file() {
            return Err(DupError::path(input, "not a regular file"));
        }
        offer(input.to_path_buf(), metadata.len(), filter, out);
        return Ok(());
    }

    let pattern = wildcard_pattern(&name)
        .map_err(|e| DupError::path(input, format!("invalid pattern: {e}")))?;
    let dir = match input.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    if !dir.is_dir() {
        return Err(DupError::path(input, format!("'{}' is not a directory", dir.display())));
    }
    let matched = walk(dir, Some(&pattern), filter, out, pb)?;
    if matched == 0 {
        return Err(DupError::path(input, "pattern matched no files"));
    }
    Ok(())
}

/// Only `*` and `?` are wildcards; every other character matches itself.
fn wildcard_pattern(name: &str) -> Result<Pattern, glob::PatternError> {
    let mut escaped = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            '*' | '?' => escaped.push(c),
            _ => escaped.push_str(&Pattern::escape(c.encode_utf8(&mut [0u8; 4]))),
        }
    }
    Pattern::new(&escaped)
}

/// Walk `dir` recursively; returns how many regular files matched `pattern`.
///
/// Fails only when `dir` itself cannot be read.
fn walk(
    dir: &Path,
    pattern: Option<&Pattern>,
    filter: &dyn CandidateFilter,
    out: &mut Candidates,
    pb: &ProgressBar,
) -> Result<usize, DupError> {
    let mut matched = 0;
    for entry in WalkDir::new(dir) {
        pb.tick();
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 || e.path() == Some(dir) => {
                return Err(DupError::path(dir, e.to_string()));
            }
            Err(e) => {
                warn!("Failed to read directory entry: {e}");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(pattern) = pattern {
            if !pattern.matches(&entry.file_name().to_string_lossy()) {
                continue;
            }
        }
        matched += 1;
        match entry.metadata() {
            Ok(metadata) => offer(entry.into_path(), metadata.len(), filter, out),
            Err(e) => warn!("Failed to read metadata for '{}': {e}", entry.path().display()),
        }
    }
    Ok(matched)
}

fn offer(path: PathBuf, size: u64, filter: &dyn CandidateFilter, out: &mut Candidates) {
    if filter.accepts(&path, size) {
        debug!("Candidate: '{}' ({} bytes)", path.display(), size);
        out.total_size += size;
        out.paths.push(path);
    } else {
        debug!("Filtered out: '{}' ({} bytes)", path.display(), size);
    }
}

fn is_pattern(name: &str) -> bool {
    name.contains('*') || name.contains('?')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_file(dir: &Path, name: &str, len: usize) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        File::create(&path).unwrap().write_all(&vec![b'z'; len]).unwrap();
        path
    }

    fn names(candidates: &Candidates) -> Vec<String> {
        let mut names: Vec<String> = candidates
            .paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn size_range_bounds_are_strict() {
        let range = SizeRange::new(1000, 5000);
        assert!(!range.contains(500));
        assert!(!range.contains(1000));
        assert!(range.contains(1001));
        assert!(range.contains(4999));
        assert!(!range.contains(5000));
    }

    #[test]
    fn directory_walk_applies_the_filter() {
        let dir = tempdir().unwrap();
        write_file(dir.path(), "d.bin", 500);
        write_file(dir.path(), "low.bin", 1000);
        write_file(dir.path(), "nested/a.bin", 2000);
        write_file(dir.path(), "high.bin", 5000);

        let found = collect_candidates(&[dir.path()], &SizeRange::new(1000, 5000), false);
        assert_eq!(names(&found), vec!["a.bin"]);
        assert_eq!(found.total_size, 2000);
        assert!(found.errors.is_empty());
    }

    #[test]
    fn glob_matches_file_names_recursively() {
        let dir = tempdir().unwrap();
        write_file(dir.path(), "one.txt", 10);
        write_file(dir.path(), "sub/two.txt", 10);
        write_file(dir.path(), "sub/three.log", 10);

        let input = dir.path().join("*.txt");
        let found = collect_candidates(&[input], &SizeRange::new(0, u64::MAX), false);
        assert_eq!(names(&found), vec!["one.txt", "two.txt"]);
    }

    #[test]
    fn single_file_input() {
        let dir = tempdir().unwrap();
        let file = write_file(dir.path(), "only.bin", 42);
        let found = collect_candidates(&[&file], &SizeRange::new(0, 100), false);
        assert_eq!(found.paths, vec![file]);
    }

    #[test]
    fn bad_inputs_are_reported_and_skipped() {
        let dir = tempdir().unwrap();
        write_file(dir.path(), "keep.bin", 42);
        let inputs = vec![
            dir.path().join("missing.bin"),
            dir.path().join("*.nothing"),
            dir.path().to_path_buf(),
        ];
        let found = collect_candidates(&inputs, &SizeRange::new(0, 100), false);
        assert_eq!(names(&found), vec!["keep.bin"]);
        assert_eq!(found.errors.len(), 2);
        assert!(found.errors.iter().all(|e| matches!(e, DupError::Path { .. })));
    }

    #[test]
    fn brackets_in_names_are_literal() {
        let dir = tempdir().unwrap();
        write_file(dir.path(), "shot[1]a.jpg", 10);
        write_file(dir.path(), "shot1a.jpg", 10);

        let input = dir.path().join("shot[1]*.jpg");
        let found = collect_candidates(&[input], &SizeRange::new(0, 100), false);
        assert_eq!(names(&found), vec!["shot[1]a.jpg"]);
        assert!(found.errors.is_empty());
    }

    #[test]
    fn question_mark_matches_one_character() {
        let dir = tempdir().unwrap();
        write_file(dir.path(), "a1.txt", 10);
        write_file(dir.path(), "a12.txt", 10);
        let found = collect_candidates(&[dir.path().join("a?.txt")], &SizeRange::new(0, 100), false);
        assert_eq!(names(&found), vec!["a1.txt"]);
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_directory_is_a_path_error() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let locked = dir.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        if fs::read_dir(&locked).is_ok() {
            // Permission bits are not enforced for this user (e.g. root).
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let found = collect_candidates(&[&locked], &SizeRange::new(0, 100), false);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        assert!(found.paths.is_empty());
        assert_eq!(found.errors.len(), 1);
        assert!(matches!(&found.errors[0], DupError::Path { path, .. } if path == &locked));
    }

    #[test]
    fn closures_work_as_filters() {
        let dir = tempdir().unwrap();
        write_file(dir.path(), "a.keep", 1);
        write_file(dir.path(), "b.skip", 1);
        let filter = |path: &Path, _size: u64| path.extension().is_some_and(|e| e == "keep");
        let found = collect_candidates(&[dir.path()], &filter, false);
        assert_eq!(names(&found), vec!["a.keep"]);
    }
}
