use std::io::{self, Write};
use std::process;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, error, info};

use dup_sieve::signal::{self, EXIT_CODE_INTERRUPTED};
use dup_sieve::{Cli, Config, DuplicateDetector, collect_candidates, logging, report};

fn main() {
    let cli = Cli::parse();
    logging::init(logging::level_for(cli.verbose, cli.quiet));

    match run(&cli) {
        Ok(code) => process::exit(code),
        Err(e) => {
            error!("{e:#}");
            process::exit(1);
        }
    }
}

fn run(cli: &Cli) -> Result<i32> {
    let start_time = Instant::now();
    info!("Starting {} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    debug!("Command line arguments: {cli:?}");

    let config = Config::from_cli(cli)?;
    let shutdown = signal::install_handler();

    let candidates = collect_candidates(&cli.inputs, &config.size_range(), config.progress && !config.json);
    if !candidates.errors.is_empty() {
        info!("{} inputs were skipped", candidates.errors.len());
    }

    let detector = DuplicateDetector::new(config.detector_config().with_shutdown_flag(shutdown));
    let report = detector.find_duplicates_in_paths(candidates.paths);

    let elapsed = start_time.elapsed();
    let mut stdout = io::stdout().lock();
    if config.json {
        report::write_json(&mut stdout, &report, config.algorithm, elapsed)
    } else {
        report::write_text(&mut stdout, &report, elapsed)
    }
    .and_then(|()| stdout.flush())
    .context("Failed to write report")?;

    if report.interrupted {
        return Ok(EXIT_CODE_INTERRUPTED);
    }
    info!("Program completed successfully in {:.2}s", elapsed.as_secs_f64());
    Ok(0)
}
