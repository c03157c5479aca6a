#![forbid(unsafe_code)]

//! Batch driver for `et-resample`: turns the INI configuration and command
//! line into a validated run, walks the scan root, and feeds every matching
//! file through one [`ResamplePipeline`].

use std::path::{Path, PathBuf};
use std::time::Instant;

use et_io::IoError;
use et_resample::{CarryOverState, ConfigError, FileOutcome, ResamplePipeline};
use thiserror::Error;

mod cli;
mod discover;
mod report;
mod settings;

pub use cli::{CliArgs, USAGE, parse_args};
pub use discover::{
    DEFAULT_FILE_PATTERN, DEFAULT_FILE_TYPES, DiscoveryOptions, discover_files, wildcard_match,
};
pub use report::{FileRecord, FileStatus, RunReport, write_report};
pub use settings::{Overrides, RunSettings, load_settings, settings_from_document};

pub const DEFAULT_CONFIG_FILE: &str = "options.ini";

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("{0}")]
    Usage(String),
    #[error("'{}' is not a directory", .0.display())]
    NotADirectory(PathBuf),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Io(#[from] IoError),
    #[error(transparent)]
    Walk(#[from] walkdir::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Fs(#[from] std::io::Error),
}

/// Run `files` in order through `pipeline`. A file that fails never stops
/// the files after it.
pub fn run_batch(
    files: &[PathBuf],
    pipeline: &ResamplePipeline,
    carry: &mut CarryOverState,
) -> Vec<FileOutcome> {
    files
        .iter()
        .map(|path| pipeline.process_file(path, carry))
        .collect()
}

/// Discover and resample every input file under `root`.
pub fn run(root: &Path, settings: &RunSettings) -> Result<RunReport, RunnerError> {
    let started = Instant::now();
    let files = discover_files(root, &settings.discovery)?;
    if files.is_empty() {
        log::warn!(
            "no '{}' files matching '{}' under '{}'",
            settings.discovery.file_types.join(","),
            settings.discovery.pattern,
            root.display()
        );
    }

    let pipeline = ResamplePipeline::new(settings.config.clone());
    let mut carry = CarryOverState::new(settings.config.carry_over());
    let outcomes = run_batch(&files, &pipeline, &mut carry);

    let elapsed = started.elapsed().as_secs_f64();
    let report = RunReport::new(
        root,
        &settings.config,
        &settings.warnings,
        &outcomes,
        elapsed,
    );

    let prec = settings.config.precision().time;
    log::info!("{} dataframe(s) could not be resampled", report.not_resampled());
    log::info!(
        "resampled {} dataframe(s), skipped {}, failed {} (total {elapsed:.prec$}s)",
        report.written,
        report.skipped,
        report.failed,
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::{Overrides, RunnerError, run, settings_from_document};
    use et_io::parse_ini;

    #[test]
    fn run_rejects_a_missing_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings = settings_from_document(&parse_ini("").expect("ini"), &Overrides::default())
            .expect("settings");
        let err = run(&dir.path().join("nope"), &settings).expect_err("missing root");
        assert!(matches!(err, RunnerError::NotADirectory(_)));
    }

    #[test]
    fn empty_root_produces_empty_report() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("readme.md"), "notes").expect("write");
        let settings = settings_from_document(&parse_ini("").expect("ini"), &Overrides::default())
            .expect("settings");
        let report = run(dir.path(), &settings).expect("run");
        assert!(report.files.is_empty());
        assert_eq!(report.written + report.not_resampled(), 0);
    }
}
