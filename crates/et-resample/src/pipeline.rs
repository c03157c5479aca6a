use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use et_frame::{FrameError, Table};
use et_io::{IoError, read_tsv, write_tsv};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::aggregate::{AggregationError, Aggregator, CarryOverState};
use crate::binner::{BinError, TrialBinner};
use crate::config::AggregationConfig;
use crate::mask::{BlinkMasker, BlinkReport, MaskError};
use crate::project::{ColumnAvailability, ColumnProjector};

pub const PROCESSED_SUFFIX: &str = "_processed";

/// `<stem>_processed<.ext>` in the directory of `input`.
#[must_use]
pub fn processed_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut name = format!("{stem}{PROCESSED_SUFFIX}");
    if let Some(ext) = input.extension() {
        name.push('.');
        name.push_str(&ext.to_string_lossy());
    }
    input.with_file_name(name)
}

#[must_use]
pub fn is_processed_output(path: &Path) -> bool {
    path.file_stem()
        .is_some_and(|stem| stem.to_string_lossy().ends_with(PROCESSED_SUFFIX))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStage {
    Loaded,
    BlinkMasked,
    Projected,
    Binned,
    Aggregated,
    Written,
}

impl fmt::Display for FileStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Loaded => "load",
            Self::BlinkMasked => "blink masking",
            Self::Projected => "projection",
            Self::Binned => "binning",
            Self::Aggregated => "aggregation",
            Self::Written => "export",
        })
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("'{column}' not found in dataset (during {stage})")]
    MissingRequiredColumn { column: String, stage: FileStage },
    #[error("failed to read '{}': {source}", path.display())]
    Read { path: PathBuf, source: IoError },
    #[error("failed to write '{}': {source}", path.display())]
    Write { path: PathBuf, source: IoError },
    #[error(transparent)]
    Bin(#[from] BinError),
    #[error(transparent)]
    Aggregation(#[from] AggregationError),
    #[error(transparent)]
    Frame(#[from] FrameError),
}

impl PipelineError {
    /// Stage that was running when the error was raised.
    #[must_use]
    pub fn failed_stage(&self) -> FileStage {
        match self {
            Self::MissingRequiredColumn { stage, .. } => *stage,
            Self::Read { .. } => FileStage::Loaded,
            Self::Write { .. } => FileStage::Written,
            Self::Bin(_) => FileStage::Binned,
            Self::Aggregation(_) => FileStage::Aggregated,
            Self::Frame(_) => FileStage::Projected,
        }
    }
}

impl From<MaskError> for PipelineError {
    fn from(err: MaskError) -> Self {
        match err {
            MaskError::MissingColumn(column) => Self::MissingRequiredColumn {
                column,
                stage: FileStage::BlinkMasked,
            },
            MaskError::Frame(err) => Self::Frame(err),
        }
    }
}

/// In-memory result of one table run.
#[derive(Debug, Clone)]
pub struct Resampled {
    pub table: Table,
    pub blink: BlinkReport,
    pub availability: ColumnAvailability,
    pub trials: usize,
    pub unassigned_rows: usize,
    pub empty_reductions: usize,
}

#[derive(Debug, Clone)]
pub struct WrittenFile {
    pub input: PathBuf,
    pub output: PathBuf,
    /// An earlier output at `output` was replaced.
    pub overwrote: bool,
    pub rows: usize,
    pub resampled: Resampled,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    MissingColumn { column: String, stage: FileStage },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingColumn { column, .. } => write!(f, "'{column}' not found in dataset"),
        }
    }
}

#[derive(Debug)]
pub enum FileOutcome {
    Written(WrittenFile),
    Skipped {
        path: PathBuf,
        reason: SkipReason,
        elapsed: Duration,
    },
    Failed {
        path: PathBuf,
        error: PipelineError,
        elapsed: Duration,
    },
}

impl FileOutcome {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Written(written) => &written.input,
            Self::Skipped { path, .. } | Self::Failed { path, .. } => path,
        }
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        match self {
            Self::Written(written) => written.elapsed,
            Self::Skipped { elapsed, .. } | Self::Failed { elapsed, .. } => *elapsed,
        }
    }
}

/// read → mask → project → bin → aggregate → write, for one file at a time.
#[derive(Debug, Clone)]
pub struct ResamplePipeline {
    config: AggregationConfig,
    masker: BlinkMasker,
    projector: ColumnProjector,
    binner: TrialBinner,
    aggregator: Aggregator,
}

impl ResamplePipeline {
    #[must_use]
    pub fn new(config: AggregationConfig) -> Self {
        Self {
            masker: BlinkMasker::from_config(&config),
            projector: ColumnProjector::new(config.retained_columns()),
            binner: TrialBinner::new(config.group_by(), config.mode().clone()),
            aggregator: Aggregator::new(&config),
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AggregationConfig {
        &self.config
    }

    pub fn resample_table(
        &self,
        table: &Table,
        carry: &mut CarryOverState,
    ) -> Result<Resampled, PipelineError> {
        if !table.has_column(self.config.group_by()) {
            return Err(PipelineError::MissingRequiredColumn {
                column: self.config.group_by().to_owned(),
                stage: FileStage::Loaded,
            });
        }

        let (masked, blink) = self.masker.mask(table)?;
        let projection = self.projector.project(&masked)?;
        let plan = self.binner.plan(&projection.table)?;
        log::info!(
            "Grouped {} trial(s) into {} bin(s) ({})",
            plan.trials.len(),
            plan.bin_count(),
            self.config.mode()
        );
        if plan.unassigned_rows > 0 {
            log::warn!(
                "{} row(s) without a '{}' value were not aggregated",
                plan.unassigned_rows,
                self.config.group_by()
            );
        }

        let aggregated = self
            .aggregator
            .aggregate(&projection.table, &plan, carry)?;
        if aggregated.empty_reductions > 0 {
            log::debug!(
                "{} output value(s) left missing by empty bins",
                aggregated.empty_reductions
            );
        }

        Ok(Resampled {
            table: aggregated.table,
            blink,
            availability: projection.availability,
            trials: plan.trials.len(),
            unassigned_rows: plan.unassigned_rows,
            empty_reductions: aggregated.empty_reductions,
        })
    }

    /// Run one file end to end. Never panics on bad input; every problem is
    /// folded into the outcome.
    pub fn process_file(&self, path: &Path, carry: &mut CarryOverState) -> FileOutcome {
        let started = Instant::now();
        log::info!("Working on '{}'", path.display());

        let outcome = match self.run_file(path, carry, started) {
            Ok(written) => FileOutcome::Written(written),
            Err(PipelineError::MissingRequiredColumn { column, stage }) => {
                log::error!("'{column}' not found in dataset, skipping");
                FileOutcome::Skipped {
                    path: path.to_path_buf(),
                    reason: SkipReason::MissingColumn { column, stage },
                    elapsed: started.elapsed(),
                }
            }
            Err(error) => {
                log::error!("{error}, skipping");
                FileOutcome::Failed {
                    path: path.to_path_buf(),
                    error,
                    elapsed: started.elapsed(),
                }
            }
        };

        log::info!(
            "Total {:.prec$}s",
            outcome.elapsed().as_secs_f64(),
            prec = self.config.precision().time
        );
        outcome
    }

    fn run_file(
        &self,
        path: &Path,
        carry: &mut CarryOverState,
        started: Instant,
    ) -> Result<WrittenFile, PipelineError> {
        let table = read_tsv(path).map_err(|source| PipelineError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let resampled = self.resample_table(&table, carry)?;

        let output = processed_path(path);
        let overwrote = output.is_file();
        write_tsv(&output, &resampled.table).map_err(|source| PipelineError::Write {
            path: output.clone(),
            source,
        })?;
        if overwrote {
            log::warn!("Overwrote '{}'", output.display());
        }

        Ok(WrittenFile {
            input: path.to_path_buf(),
            rows: resampled.table.len(),
            output,
            overwrote,
            resampled,
            elapsed: started.elapsed(),
        })
    }
}
