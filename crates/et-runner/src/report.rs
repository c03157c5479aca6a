use std::fs;
use std::path::{Path, PathBuf};

use et_resample::{AggregationConfig, ConfigWarning, FileOutcome, FileStage};
use serde::Serialize;

use crate::RunnerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Written,
    Skipped,
    Failed,
}

/// One line of the run report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileRecord {
    pub input: PathBuf,
    pub status: FileStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    pub overwrote: bool,
    pub rows: usize,
    pub blinks_masked: usize,
    pub absent_columns: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<FileStage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub elapsed_secs: f64,
}

impl From<&FileOutcome> for FileRecord {
    fn from(outcome: &FileOutcome) -> Self {
        let mut record = Self {
            input: outcome.path().to_path_buf(),
            status: FileStatus::Written,
            output: None,
            overwrote: false,
            rows: 0,
            blinks_masked: 0,
            absent_columns: Vec::new(),
            stage: None,
            message: None,
            elapsed_secs: outcome.elapsed().as_secs_f64(),
        };

        match outcome {
            FileOutcome::Written(written) => {
                record.output = Some(written.output.clone());
                record.overwrote = written.overwrote;
                record.rows = written.rows;
                record.blinks_masked = written.resampled.blink.masked_rows;
                record.absent_columns = written.resampled.availability.absent.clone();
            }
            FileOutcome::Skipped { reason, .. } => {
                let et_resample::SkipReason::MissingColumn { stage, .. } = reason;
                record.status = FileStatus::Skipped;
                record.stage = Some(*stage);
                record.message = Some(reason.to_string());
            }
            FileOutcome::Failed { error, .. } => {
                record.status = FileStatus::Failed;
                record.stage = Some(error.failed_stage());
                record.message = Some(error.to_string());
            }
        }
        record
    }
}

/// Summary of a whole run, written with `--report`.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub root: PathBuf,
    pub config: AggregationConfig,
    pub warnings: Vec<ConfigWarning>,
    pub files: Vec<FileRecord>,
    pub written: usize,
    pub skipped: usize,
    pub failed: usize,
    pub elapsed_secs: f64,
}

impl RunReport {
    #[must_use]
    pub fn new(
        root: &Path,
        config: &AggregationConfig,
        warnings: &[ConfigWarning],
        outcomes: &[FileOutcome],
        elapsed_secs: f64,
    ) -> Self {
        let files: Vec<FileRecord> = outcomes.iter().map(FileRecord::from).collect();
        let count = |status: FileStatus| files.iter().filter(|file| file.status == status).count();
        Self {
            root: root.to_path_buf(),
            config: config.clone(),
            warnings: warnings.to_vec(),
            written: count(FileStatus::Written),
            skipped: count(FileStatus::Skipped),
            failed: count(FileStatus::Failed),
            files,
            elapsed_secs,
        }
    }

    /// Files that produced no output.
    #[must_use]
    pub fn not_resampled(&self) -> usize {
        self.skipped + self.failed
    }
}

pub fn write_report(path: &Path, report: &RunReport) -> Result<(), RunnerError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(report)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;
    use std::time::Duration;

    use et_resample::{
        AggregationConfig, BinError, FileOutcome, FileStage, PipelineError, SkipReason,
    };

    use super::{FileRecord, FileStatus, RunReport, write_report};

    fn skipped() -> FileOutcome {
        FileOutcome::Skipped {
            path: PathBuf::from("p03.txt"),
            reason: SkipReason::MissingColumn {
                column: "TRIAL_INDEX".to_owned(),
                stage: FileStage::Loaded,
            },
            elapsed: Duration::from_millis(2),
        }
    }

    fn failed() -> FileOutcome {
        FileOutcome::Failed {
            path: PathBuf::from("p04.txt"),
            error: PipelineError::Bin(BinError::MissingColumn("TRIAL_INDEX".to_owned())),
            elapsed: Duration::from_millis(3),
        }
    }

    #[test]
    fn skipped_record_names_the_missing_column() {
        let record = FileRecord::from(&skipped());
        assert_eq!(record.status, FileStatus::Skipped);
        assert_eq!(record.stage, Some(FileStage::Loaded));
        assert_eq!(
            record.message.as_deref(),
            Some("'TRIAL_INDEX' not found in dataset")
        );
        assert!(record.output.is_none());
    }

    #[test]
    fn failed_record_carries_the_failing_stage() {
        let record = FileRecord::from(&failed());
        assert_eq!(record.status, FileStatus::Failed);
        assert_eq!(record.stage, Some(FileStage::Binned));
        assert!(record.message.is_some());
    }

    #[test]
    fn report_counts_outcomes_by_status() {
        let config = AggregationConfig::builder().build().expect("config");
        let report = RunReport::new(
            &PathBuf::from("data"),
            &config,
            &[],
            &[skipped(), failed(), skipped()],
            0.5,
        );
        assert_eq!(report.written, 0);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.not_resampled(), 3);
    }

    #[test]
    fn write_report_creates_parent_directories() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = AggregationConfig::builder().build().expect("config");
        let report = RunReport::new(dir.path(), &config, &[], &[failed()], 0.1);
        let path = dir.path().join("out").join("nested").join("run.json");

        write_report(&path, &report).expect("write");
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).expect("read")).expect("json");
        assert_eq!(json["failed"], 1);
        assert_eq!(json["files"][0]["stage"], "binned");
        assert!(json["files"][0].get("output").is_none());
    }
}
