#![forbid(unsafe_code)]

//! Trial-scoped resampling of eyetracking sample tables.
//!
//! A file goes through a fixed sequence of stages:
//!
//! 1. [`BlinkMasker`] blanks every row flagged in the blink column, keeping
//!    the row (and its trial membership) so bin positions are unaffected.
//! 2. [`ColumnProjector`] keeps the group-by column plus every configured
//!    column that this file actually has.
//! 3. [`TrialBinner`] partitions rows by trial and cuts each trial into bins
//!    according to the [`ResamplingMode`].
//! 4. [`Aggregator`] reduces each (trial, bin) to one output row.
//!
//! [`ResamplePipeline`] wires the stages together and handles reading and
//! writing the tab-separated files.

mod aggregate;
mod binner;
mod config;
mod key;
mod mask;
mod pipeline;
mod project;
mod registry;

pub use aggregate::{Aggregated, AggregationError, Aggregator, CarryOverState, OutputColumn};
pub use binner::{BinAssignment, BinError, BinPlan, TrialBinner, TrialBins, effective_rate};
pub use config::{
    AggregationConfig, AggregationConfigBuilder, CarryOverScope, ColumnAggregation, ConfigError,
    ConfigWarning, DEFAULT_BLINK_COLUMN, DEFAULT_GROUP_BY, DEFAULT_PERCENT_PRECISION,
    DEFAULT_RESAMPLING_COUNT, DEFAULT_RESAMPLING_RATE, DEFAULT_TIME_PRECISION, ReportPrecision,
    ResamplingMode,
};
pub use mask::{BlinkMasker, BlinkReport, MaskError};
pub use pipeline::{
    FileOutcome, FileStage, PROCESSED_SUFFIX, PipelineError, ResamplePipeline, Resampled,
    SkipReason, WrittenFile, is_processed_output, processed_path,
};
pub use project::{ColumnAvailability, ColumnProjector, Projection};
pub use registry::{AggregateFunctionId, AggregateKind, ReduceError, UniqueOccurrences};
