use std::collections::HashSet;
use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::registry::AggregateFunctionId;

pub const DEFAULT_GROUP_BY: &str = "TRIAL_INDEX";
pub const DEFAULT_BLINK_COLUMN: &str = "RIGHT_IN_BLINK";
pub const DEFAULT_RESAMPLING_RATE: NonZeroUsize = NonZeroUsize::new(5).unwrap();
pub const DEFAULT_RESAMPLING_COUNT: NonZeroUsize = NonZeroUsize::new(10).unwrap();
pub const DEFAULT_PERCENT_PRECISION: usize = 3;
pub const DEFAULT_TIME_PRECISION: usize = 5;

/// How bin boundaries are computed inside a trial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ResamplingMode {
    /// `rate` rows per bin, the same for every trial.
    FixedRate { rate: NonZeroUsize },
    /// At most `count` bins per trial; the rows-per-bin is derived per trial.
    FixedCount { count: NonZeroUsize },
    /// Time-interval binning. Parsed so configurations round-trip, but no
    /// binning strategy exists for it yet.
    FixedInterval { interval: String },
}

impl ResamplingMode {
    pub const RATE_CODE: i64 = 0;
    pub const COUNT_CODE: i64 = 1;
    pub const INTERVAL_CODE: i64 = 2;

    /// Select a mode from its `RESAMPLING_MODE` integer. Unknown codes fall
    /// back to `FixedRate` with the default rate and produce a warning.
    #[must_use]
    pub fn from_code(
        code: i64,
        rate: NonZeroUsize,
        count: NonZeroUsize,
        interval: &str,
    ) -> (Self, Option<ConfigWarning>) {
        match code {
            Self::RATE_CODE => (Self::FixedRate { rate }, None),
            Self::COUNT_CODE => (Self::FixedCount { count }, None),
            Self::INTERVAL_CODE => (
                Self::FixedInterval {
                    interval: interval.to_owned(),
                },
                None,
            ),
            other => (
                Self::FixedRate {
                    rate: DEFAULT_RESAMPLING_RATE,
                },
                Some(ConfigWarning::UnknownMode { value: other }),
            ),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::FixedRate { .. } => "fixed_rate",
            Self::FixedCount { .. } => "fixed_count",
            Self::FixedInterval { .. } => "fixed_interval",
        }
    }
}

impl Default for ResamplingMode {
    fn default() -> Self {
        Self::FixedRate {
            rate: DEFAULT_RESAMPLING_RATE,
        }
    }
}

impl fmt::Display for ResamplingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FixedRate { rate } => write!(f, "every {rate} row(s)"),
            Self::FixedCount { count } => write!(f, "{count} bin(s) per trial"),
            Self::FixedInterval { interval } => write!(f, "interval '{interval}'"),
        }
    }
}

/// Lifetime of the `unique_occurrences` carry-over value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CarryOverScope {
    /// Reset at the start of every trial.
    #[default]
    Trial,
    /// Kept across trials and files for the whole run, in processing order.
    Run,
}

impl FromStr for CarryOverScope {
    type Err = ConfigWarning;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "trial" => Ok(Self::Trial),
            "run" => Ok(Self::Run),
            _ => Err(ConfigWarning::UnknownCarryOverScope {
                value: raw.to_owned(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportPrecision {
    /// Decimal places for percentages in progress output.
    pub percent: usize,
    /// Decimal places for durations in seconds.
    pub time: usize,
}

impl Default for ReportPrecision {
    fn default() -> Self {
        Self {
            percent: DEFAULT_PERCENT_PRECISION,
            time: DEFAULT_TIME_PRECISION,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnAggregation {
    column: String,
    functions: Vec<AggregateFunctionId>,
}

impl ColumnAggregation {
    #[must_use]
    pub fn column(&self) -> &str {
        &self.column
    }

    #[must_use]
    pub fn functions(&self) -> &[AggregateFunctionId] {
        &self.functions
    }

    /// Output field name for each function, in order. A column with several
    /// functions, or one named like the group-by column, becomes
    /// `<column>_<function>`.
    pub fn output_names(
        &self,
        group_by: &str,
    ) -> impl Iterator<Item = (String, &AggregateFunctionId)> {
        let suffixed = self.functions.len() > 1 || self.column == group_by;
        self.functions.iter().map(move |function| {
            let name = if suffixed {
                format!("{}_{}", self.column, function.name())
            } else {
                self.column.clone()
            };
            (name, function)
        })
    }
}

/// Recoverable configuration problems. Each one is logged and replaced by a
/// default; none of them stops a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "warning", rename_all = "snake_case")]
pub enum ConfigWarning {
    MissingConfigFile { path: String },
    InvalidInteger { key: String, value: String, default: i64 },
    NonPositive { key: String, value: i64, default: i64 },
    Negative { key: String, value: i64, default: i64 },
    UnknownMode { value: i64 },
    UnknownAggregate { column: String, function: String },
    UnknownCarryOverScope { value: String },
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingConfigFile { path } => {
                write!(f, "config file '{path}' not found, using defaults")
            }
            Self::InvalidInteger {
                key,
                value,
                default,
            } => write!(
                f,
                "'{value}' is not a valid integer for {key}, using default {default}"
            ),
            Self::NonPositive {
                key,
                value,
                default,
            } => write!(f, "{key} must be positive, got {value}; using default {default}"),
            Self::Negative {
                key,
                value,
                default,
            } => write!(f, "{key} cannot be negative, got {value}; using default {default}"),
            Self::UnknownMode { value } => write!(
                f,
                "RESAMPLING_MODE {value} is not 0, 1 or 2; resampling every {DEFAULT_RESAMPLING_RATE} rows"
            ),
            Self::UnknownAggregate { column, function } => write!(
                f,
                "'{function}' for column '{column}' is not a known aggregate type, files using it will fail"
            ),
            Self::UnknownCarryOverScope { value } => write!(
                f,
                "CARRY_OVER_SCOPE '{value}' is not 'trial' or 'run', using 'trial'"
            ),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("group-by column name is empty")]
    EmptyGroupBy,
    #[error("blink column name is empty")]
    EmptyBlinkColumn,
    #[error("aggregation configured for a column with an empty name")]
    EmptyColumnName,
    #[error("resampling mode '{mode}' is not supported yet")]
    UnsupportedMode { mode: &'static str },
    #[error("aggregations produce the output column '{name}' more than once")]
    DuplicateOutputColumn { name: String },
}

/// Validated, immutable resampling configuration shared by every file of a
/// run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationConfig {
    group_by: String,
    blink_column: String,
    aggregations: Vec<ColumnAggregation>,
    mode: ResamplingMode,
    carry_over: CarryOverScope,
    precision: ReportPrecision,
}

impl AggregationConfig {
    #[must_use]
    pub fn builder() -> AggregationConfigBuilder {
        AggregationConfigBuilder::default()
    }

    #[must_use]
    pub fn group_by(&self) -> &str {
        &self.group_by
    }

    #[must_use]
    pub fn blink_column(&self) -> &str {
        &self.blink_column
    }

    #[must_use]
    pub fn aggregations(&self) -> &[ColumnAggregation] {
        &self.aggregations
    }

    #[must_use]
    pub fn mode(&self) -> &ResamplingMode {
        &self.mode
    }

    #[must_use]
    pub fn carry_over(&self) -> CarryOverScope {
        self.carry_over
    }

    #[must_use]
    pub fn precision(&self) -> ReportPrecision {
        self.precision
    }

    #[must_use]
    pub fn functions_for(&self, column: &str) -> Option<&[AggregateFunctionId]> {
        self.aggregations
            .iter()
            .find(|agg| agg.column == column)
            .map(ColumnAggregation::functions)
    }

    /// Group-by column first, then every aggregated column in configuration
    /// order, without repeats.
    #[must_use]
    pub fn retained_columns(&self) -> Vec<String> {
        let mut out = vec![self.group_by.clone()];
        for agg in &self.aggregations {
            if !out.contains(&agg.column) {
                out.push(agg.column.clone());
            }
        }
        out
    }

    /// `(column, identifier)` for every identifier outside the known set.
    pub fn unknown_functions(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.aggregations.iter().flat_map(|agg| {
            agg.functions
                .iter()
                .filter(|id| !id.is_known())
                .map(move |id| (agg.column.as_str(), id.name()))
        })
    }
}

#[derive(Debug, Clone)]
pub struct AggregationConfigBuilder {
    group_by: String,
    blink_column: String,
    aggregations: Vec<ColumnAggregation>,
    mode: ResamplingMode,
    carry_over: CarryOverScope,
    precision: ReportPrecision,
}

impl Default for AggregationConfigBuilder {
    fn default() -> Self {
        Self {
            group_by: DEFAULT_GROUP_BY.to_owned(),
            blink_column: DEFAULT_BLINK_COLUMN.to_owned(),
            aggregations: Vec::new(),
            mode: ResamplingMode::default(),
            carry_over: CarryOverScope::default(),
            precision: ReportPrecision::default(),
        }
    }
}

impl AggregationConfigBuilder {
    #[must_use]
    pub fn group_by(mut self, column: impl Into<String>) -> Self {
        self.group_by = column.into();
        self
    }

    #[must_use]
    pub fn blink_column(mut self, column: impl Into<String>) -> Self {
        self.blink_column = column.into();
        self
    }

    #[must_use]
    pub fn mode(mut self, mode: ResamplingMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn carry_over(mut self, scope: CarryOverScope) -> Self {
        self.carry_over = scope;
        self
    }

    #[must_use]
    pub fn precision(mut self, precision: ReportPrecision) -> Self {
        self.precision = precision;
        self
    }

    /// Append functions for `column`. A column named again keeps its place
    /// and gains the new functions after the existing ones.
    #[must_use]
    pub fn aggregate<I>(mut self, column: impl Into<String>, functions: I) -> Self
    where
        I: IntoIterator<Item = AggregateFunctionId>,
    {
        let column = column.into();
        let functions = functions.into_iter();
        match self.aggregations.iter_mut().find(|agg| agg.column == column) {
            Some(existing) => existing.functions.extend(functions),
            None => self.aggregations.push(ColumnAggregation {
                column,
                functions: functions.collect(),
            }),
        }
        self
    }

    /// Append functions from a comma-separated list such as `mean,median`.
    #[must_use]
    pub fn aggregate_list(self, column: impl Into<String>, list: &str) -> Self {
        let functions = list
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(AggregateFunctionId::parse)
            .collect::<Vec<_>>();
        self.aggregate(column, functions)
    }

    pub fn build(self) -> Result<AggregationConfig, ConfigError> {
        if self.group_by.trim().is_empty() {
            return Err(ConfigError::EmptyGroupBy);
        }
        if self.blink_column.trim().is_empty() {
            return Err(ConfigError::EmptyBlinkColumn);
        }
        if self.aggregations.iter().any(|agg| agg.column.trim().is_empty()) {
            return Err(ConfigError::EmptyColumnName);
        }
        if let ResamplingMode::FixedInterval { .. } = self.mode {
            return Err(ConfigError::UnsupportedMode {
                mode: self.mode.name(),
            });
        }
        let mut outputs = HashSet::from([self.group_by.clone()]);
        for agg in &self.aggregations {
            for (name, _) in agg.output_names(&self.group_by) {
                if !outputs.insert(name.clone()) {
                    return Err(ConfigError::DuplicateOutputColumn { name });
                }
            }
        }

        Ok(AggregationConfig {
            group_by: self.group_by,
            blink_column: self.blink_column,
            aggregations: self.aggregations,
            mode: self.mode,
            carry_over: self.carry_over,
            precision: self.precision,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use super::{
        AggregationConfig, CarryOverScope, ConfigError, ConfigWarning, DEFAULT_RESAMPLING_RATE,
        ResamplingMode,
    };
    use crate::registry::{AggregateFunctionId, AggregateKind};

    fn nz(v: usize) -> NonZeroUsize {
        NonZeroUsize::new(v).expect("non-zero")
    }

    #[test]
    fn defaults_match_eyetracking_exports() {
        let config = AggregationConfig::builder().build().expect("config");
        assert_eq!(config.group_by(), "TRIAL_INDEX");
        assert_eq!(config.blink_column(), "RIGHT_IN_BLINK");
        assert_eq!(
            config.mode(),
            &ResamplingMode::FixedRate {
                rate: DEFAULT_RESAMPLING_RATE
            }
        );
        assert_eq!(config.carry_over(), CarryOverScope::Trial);
        assert_eq!(config.precision().percent, 3);
        assert_eq!(config.precision().time, 5);
    }

    #[test]
    fn retained_columns_start_with_group_by_and_dedupe() {
        let config = AggregationConfig::builder()
            .aggregate_list("RIGHT_GAZE_X", "mean")
            .aggregate_list("TRIAL_INDEX", "first")
            .aggregate_list("RIGHT_PUPIL_SIZE", "max")
            .build()
            .expect("config");

        assert_eq!(
            config.retained_columns(),
            vec!["TRIAL_INDEX", "RIGHT_GAZE_X", "RIGHT_PUPIL_SIZE"]
        );
    }

    #[test]
    fn repeated_column_appends_functions_in_order() {
        let config = AggregationConfig::builder()
            .aggregate_list("X", "mean, median")
            .aggregate_list("Y", "sum")
            .aggregate_list("X", "max")
            .build()
            .expect("config");

        assert_eq!(config.aggregations().len(), 2);
        assert_eq!(config.aggregations()[0].column(), "X");
        assert_eq!(
            config.functions_for("X").expect("X"),
            &[
                AggregateFunctionId::Known(AggregateKind::Mean),
                AggregateFunctionId::Known(AggregateKind::Median),
                AggregateFunctionId::Known(AggregateKind::Max),
            ]
        );
    }

    #[test]
    fn colliding_output_names_are_rejected() {
        let err = AggregationConfig::builder()
            .aggregate_list("X", "mean,max")
            .aggregate_list("X_mean", "first")
            .build()
            .expect_err("X_mean twice");
        assert_eq!(
            err,
            ConfigError::DuplicateOutputColumn {
                name: "X_mean".to_owned()
            }
        );

        let err = AggregationConfig::builder()
            .aggregate_list("X", "mean,mean")
            .build()
            .expect_err("same function twice");
        assert_eq!(
            err,
            ConfigError::DuplicateOutputColumn {
                name: "X_mean".to_owned()
            }
        );
    }

    #[test]
    fn output_names_follow_the_suffix_rule() {
        let config = AggregationConfig::builder()
            .aggregate_list("X", "mean,max")
            .aggregate_list("Y", "sum")
            .aggregate_list("TRIAL_INDEX", "count")
            .build()
            .expect("config");
        let names: Vec<String> = config
            .aggregations()
            .iter()
            .flat_map(|agg| agg.output_names(config.group_by()).map(|(name, _)| name))
            .collect();
        assert_eq!(names, vec!["X_mean", "X_max", "Y", "TRIAL_INDEX_count"]);
    }

    #[test]
    fn unknown_functions_are_kept_and_listed() {
        let config = AggregationConfig::builder()
            .aggregate_list("X", "mean,geomean")
            .build()
            .expect("unknown ids are accepted");

        let unknown: Vec<_> = config.unknown_functions().collect();
        assert_eq!(unknown, vec![("X", "geomean")]);
    }

    #[test]
    fn interval_mode_is_rejected() {
        let (mode, warning) = ResamplingMode::from_code(2, nz(5), nz(10), "100ms");
        assert!(warning.is_none());
        let err = AggregationConfig::builder()
            .mode(mode)
            .build()
            .expect_err("interval unsupported");
        assert_eq!(
            err,
            ConfigError::UnsupportedMode {
                mode: "fixed_interval"
            }
        );
    }

    #[test]
    fn unknown_mode_code_falls_back_to_default_rate() {
        let (mode, warning) = ResamplingMode::from_code(7, nz(3), nz(4), "");
        assert_eq!(
            mode,
            ResamplingMode::FixedRate {
                rate: DEFAULT_RESAMPLING_RATE
            }
        );
        assert_eq!(warning, Some(ConfigWarning::UnknownMode { value: 7 }));

        let (mode, _) = ResamplingMode::from_code(1, nz(3), nz(4), "");
        assert_eq!(mode, ResamplingMode::FixedCount { count: nz(4) });
    }

    #[test]
    fn empty_group_by_is_rejected() {
        let err = AggregationConfig::builder()
            .group_by("  ")
            .build()
            .expect_err("empty");
        assert_eq!(err, ConfigError::EmptyGroupBy);
    }

    #[test]
    fn carry_over_scope_parses_case_insensitively() {
        assert_eq!("Run".parse::<CarryOverScope>(), Ok(CarryOverScope::Run));
        assert_eq!(" trial ".parse::<CarryOverScope>(), Ok(CarryOverScope::Trial));
        assert!("file".parse::<CarryOverScope>().is_err());
    }
}
