use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;

use colored::Colorize;
use indicatif::{HumanBytes, HumanCount};
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::duplicates::{DetectionReport, DuplicateGroup, FileWarning};
use crate::record::{Digest, HashAlgorithm};
use crate::utils::format_human_elapsed;

#[derive(Serialize)]
struct JsonGroup<'a> {
    digest: Digest,
    size: u64,
    paths: Vec<&'a Path>,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    generated_at: String,
    elapsed_ms: u128,
    algorithm: HashAlgorithm,
    groups: Vec<JsonGroup<'a>>,
    duplicate_files: usize,
    reclaimable_bytes: u64,
    warnings: &'a [FileWarning],
    interrupted: bool,
}

/// Groups with the most reclaimable space first; ties keep discovery order.
fn sorted_groups(report: &DetectionReport) -> Vec<&DuplicateGroup> {
    let mut groups: Vec<&DuplicateGroup> = report.groups.iter().collect();
    groups.sort_by(|a, b| b.reclaimable().cmp(&a.reclaimable()));
    groups
}

pub fn write_text(out: &mut impl Write, report: &DetectionReport, elapsed: Duration) -> io::Result<()> {
    if report.groups.is_empty() {
        writeln!(out, "{}", "No duplicate files found!".green())?;
    }

    for group in sorted_groups(report) {
        writeln!(
            out,
            "{} ({}, {} files)",
            group.digest.to_string().yellow(),
            HumanBytes(group.size),
            group.files.len()
        )?;
        for path in group.paths() {
            writeln!(out, "  {}", path.display())?;
        }
        writeln!(out)?;
    }

    if !report.warnings.is_empty() {
        writeln!(
            out,
            "{}",
            format!("Skipped {} files that could not be read", report.warnings.len()).red()
        )?;
    }
    if report.interrupted {
        writeln!(out, "{}", "Scan interrupted; results are incomplete".red())?;
    }

    let reclaimable = report.reclaimable_size();
    writeln!(
        out,
        "{} duplicate files in {} groups, {} reclaimable ({} bytes) in {}",
        HumanCount(report.duplicate_files() as u64),
        HumanCount(report.groups.len() as u64),
        HumanBytes(reclaimable).to_string().bold(),
        reclaimable,
        format_human_elapsed(elapsed)
    )
}

pub fn write_json(
    out: &mut impl Write,
    report: &DetectionReport,
    algorithm: HashAlgorithm,
    elapsed: Duration,
) -> io::Result<()> {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    let json = JsonReport {
        generated_at: now.format(&Rfc3339).unwrap_or_default(),
        elapsed_ms: elapsed.as_millis(),
        algorithm,
        groups: sorted_groups(report)
            .into_iter()
            .map(|group| JsonGroup {
                digest: group.digest,
                size: group.size,
                paths: group.paths().collect(),
            })
            .collect(),
        duplicate_files: report.duplicate_files(),
        reclaimable_bytes: report.reclaimable_size(),
        warnings: &report.warnings,
        interrupted: report.interrupted,
    };
    serde_json::to_writer_pretty(&mut *out, &json)?;
    writeln!(out)
}
