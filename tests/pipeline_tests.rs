use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use dup_sieve::{
    DetectorConfig, DuplicateDetector, HashAlgorithm, SizeRange, collect_candidates,
};
use tempfile::tempdir;

fn write_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    File::create(&path).unwrap().write_all(content).unwrap();
    path
}

fn detector(algorithm: HashAlgorithm) -> DuplicateDetector {
    DuplicateDetector::new(
        DetectorConfig::default()
            .with_hash_window(64)
            .with_algorithm(algorithm)
            .with_threads(2),
    )
}

fn file_names<'a>(paths: impl Iterator<Item = &'a Path>) -> Vec<String> {
    let mut names: Vec<String> = paths
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn finds_the_single_duplicate_pair() {
    let dir = tempdir().unwrap();
    let x = b"0123456789".repeat(200);
    let mut y = x.clone();
    y[0] = b'#';
    write_file(dir.path(), "A", &x);
    write_file(dir.path(), "B", &x);
    write_file(dir.path(), "C", &y);

    for algorithm in [HashAlgorithm::Blake3, HashAlgorithm::Sha256] {
        let candidates = collect_candidates(&[dir.path()], &SizeRange::new(1000, 5000), false);
        let report = detector(algorithm).find_duplicates_in_paths(candidates.paths);

        assert_eq!(report.groups.len(), 1);
        assert_eq!(file_names(report.groups[0].paths()), vec!["A", "B"]);
        assert_eq!(report.reclaimable_size(), 2000);
        assert!(report.warnings.is_empty());
    }
}

#[test]
fn size_bounds_exclude_boundary_and_small_files() {
    let dir = tempdir().unwrap();
    for name in ["D1", "D2"] {
        write_file(dir.path(), name, &[1u8; 500]);
    }
    for name in ["L1", "L2"] {
        write_file(dir.path(), name, &[2u8; 1000]);
    }
    for name in ["H1", "H2"] {
        write_file(dir.path(), name, &[3u8; 5000]);
    }
    for name in ["M1", "M2"] {
        write_file(dir.path(), name, &[4u8; 1001]);
    }

    let candidates = collect_candidates(&[dir.path()], &SizeRange::new(1000, 5000), false);
    assert_eq!(file_names(candidates.paths.iter().map(PathBuf::as_path)), vec!["M1", "M2"]);

    let report = detector(HashAlgorithm::Blake3).find_duplicates_in_paths(candidates.paths);
    assert_eq!(report.groups.len(), 1);
    assert_eq!(report.reclaimable_size(), 1001);
}

#[test]
fn common_prefix_does_not_make_a_duplicate() {
    let dir = tempdir().unwrap();
    let prefix = [b'p'; 64];
    let mut first = prefix.to_vec();
    first.extend_from_slice(&[b'a'; 1936]);
    let mut second = prefix.to_vec();
    second.extend_from_slice(&[b'b'; 1936]);
    let a = write_file(dir.path(), "a", &first);
    let b = write_file(dir.path(), "b", &second);

    let report = detector(HashAlgorithm::Blake3).find_duplicates_in_paths([a, b]);
    assert!(report.groups.is_empty());
    assert_eq!(report.partial_pass.survivors, 2);
    assert_eq!(report.full_pass.survivors, 0);
}

#[test]
fn overlapping_inputs_do_not_report_a_file_against_itself() {
    let dir = tempdir().unwrap();
    let only = write_file(dir.path(), "only.bin", &[7u8; 3000]);

    let inputs = vec![dir.path().to_path_buf(), only.clone(), dir.path().join("*.bin")];
    let candidates = collect_candidates(&inputs, &SizeRange::new(1000, 5000), false);
    assert_eq!(candidates.paths.len(), 3);

    let report = detector(HashAlgorithm::Blake3).find_duplicates_in_paths(candidates.paths);
    assert!(report.groups.is_empty());
    assert_eq!(report.reclaimable_size(), 0);
}

#[cfg(unix)]
#[test]
fn hardlinked_copy_counts_once() {
    let dir = tempdir().unwrap();
    let a = write_file(dir.path(), "a", &[6u8; 2500]);
    let b = write_file(dir.path(), "b", &[6u8; 2500]);
    fs::hard_link(&a, dir.path().join("a-link")).unwrap();

    let candidates = collect_candidates(&[dir.path()], &SizeRange::new(1000, 5000), false);
    let report = detector(HashAlgorithm::Blake3).find_duplicates_in_paths(candidates.paths);

    assert_eq!(report.groups.len(), 1);
    assert_eq!(report.groups[0].files.len(), 2);
    assert_eq!(report.reclaimable_size(), 2500);
    assert!(report.groups[0].paths().any(|p| p == b));
}

#[test]
fn several_groups_in_one_run() {
    let dir = tempdir().unwrap();
    for i in 0..3 {
        write_file(dir.path(), &format!("red{i}"), &[b'r'; 1500]);
    }
    for i in 0..2 {
        write_file(dir.path(), &format!("blue{i}"), &[b'b'; 1500]);
    }
    write_file(dir.path(), "green", &[b'g'; 1500]);

    let candidates = collect_candidates(&[dir.path()], &SizeRange::new(1000, 5000), false);
    let report = detector(HashAlgorithm::Blake3).find_duplicates_in_paths(candidates.paths);

    let mut groups: Vec<Vec<String>> = report.groups.iter().map(|g| file_names(g.paths())).collect();
    groups.sort();
    assert_eq!(
        groups,
        vec![vec!["blue0", "blue1"], vec!["red0", "red1", "red2"]]
    );
    assert_eq!(report.duplicate_files(), 3);
    assert_eq!(report.reclaimable_size(), 4500);
    assert_eq!(report.size_pass.buckets, 1);
    assert_eq!(report.partial_pass.buckets, 2);
}

#[test]
fn each_file_is_hashed_at_most_once_per_pass() {
    let dir = tempdir().unwrap();
    let paths: Vec<PathBuf> = (0..3)
        .map(|i| write_file(dir.path(), &format!("f{i}"), &[1u8; 1200]))
        .collect();
    let records: Vec<_> = paths
        .iter()
        .map(|p| dup_sieve::FileRecord::new(p, HashAlgorithm::Blake3).unwrap())
        .collect();

    let report = detector(HashAlgorithm::Blake3).find_duplicates(records);
    assert_eq!(report.groups.len(), 1);
    for record in &report.groups[0].files {
        assert_eq!(record.read_count(), 2);
        assert!(record.cached_partial_hash().is_some());
    }
}
