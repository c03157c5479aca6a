use std::collections::HashMap;
use std::num::NonZeroUsize;

use et_frame::Table;
use et_types::Scalar;
use thiserror::Error;

use crate::config::ResamplingMode;
use crate::key::ScalarKey;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BinError {
    #[error("group-by column '{0}' not found")]
    MissingColumn(String),
    #[error("resampling mode '{mode}' has no binning strategy")]
    UnsupportedMode { mode: &'static str },
}

/// Rows per bin for a trial of `trial_rows` rows.
///
/// `FixedCount` spreads a trial over at most `count` bins, so the last bin
/// may be short. `FixedInterval` has no row-based rate.
pub fn effective_rate(mode: &ResamplingMode, trial_rows: usize) -> Result<NonZeroUsize, BinError> {
    match mode {
        ResamplingMode::FixedRate { rate } => Ok(*rate),
        ResamplingMode::FixedCount { count } => {
            let rate = trial_rows.div_ceil(count.get()).max(1);
            Ok(NonZeroUsize::new(rate).unwrap_or(NonZeroUsize::MIN))
        }
        ResamplingMode::FixedInterval { .. } => Err(BinError::UnsupportedMode {
            mode: mode.name(),
        }),
    }
}

/// Bin membership of one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinAssignment {
    /// Trial position in first-seen order.
    pub trial: usize,
    pub bin: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrialBins {
    pub key: Scalar,
    pub effective_rate: NonZeroUsize,
    /// Row positions of each bin, in table order.
    pub bins: Vec<Vec<usize>>,
}

impl TrialBins {
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.bins.iter().map(Vec::len).sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinPlan {
    pub trials: Vec<TrialBins>,
    /// Rows of the table the plan was built from.
    pub row_count: usize,
    /// Rows with a missing group-by value. They belong to no trial.
    pub unassigned_rows: usize,
}

impl BinPlan {
    #[must_use]
    pub fn bin_count(&self) -> usize {
        self.trials.iter().map(|trial| trial.bins.len()).sum()
    }

    /// Per-row assignment, `None` for unassigned rows.
    #[must_use]
    pub fn assignments(&self) -> Vec<Option<BinAssignment>> {
        let mut out = vec![None; self.row_count];
        for (trial, bins) in self.trials.iter().enumerate() {
            for (bin, rows) in bins.bins.iter().enumerate() {
                for &row in rows {
                    out[row] = Some(BinAssignment { trial, bin });
                }
            }
        }
        out
    }
}

/// Partitions rows into trials by group-by value and cuts every trial into
/// consecutive bins. Rows of one trial need not be contiguous; their
/// relative order is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialBinner {
    group_by: String,
    mode: ResamplingMode,
}

impl TrialBinner {
    #[must_use]
    pub fn new(group_by: impl Into<String>, mode: ResamplingMode) -> Self {
        Self {
            group_by: group_by.into(),
            mode,
        }
    }

    pub fn plan(&self, table: &Table) -> Result<BinPlan, BinError> {
        if let ResamplingMode::FixedInterval { .. } = self.mode {
            return Err(BinError::UnsupportedMode {
                mode: self.mode.name(),
            });
        }
        let keys = table
            .column(&self.group_by)
            .ok_or_else(|| BinError::MissingColumn(self.group_by.clone()))?
            .values();

        let mut ordering = Vec::<(usize, Vec<usize>)>::new();
        let mut slots = HashMap::<ScalarKey<'_>, usize>::new();
        let mut unassigned_rows = 0;

        for (pos, key) in keys.iter().enumerate() {
            if key.is_missing() {
                unassigned_rows += 1;
                continue;
            }
            let slot = *slots.entry(ScalarKey::from_scalar(key)).or_insert_with(|| {
                ordering.push((pos, Vec::new()));
                ordering.len() - 1
            });
            ordering[slot].1.push(pos);
        }

        let mut trials = Vec::with_capacity(ordering.len());
        for (first_pos, positions) in ordering {
            let rate = effective_rate(&self.mode, positions.len())?;
            let bins = positions
                .chunks(rate.get())
                .map(<[usize]>::to_vec)
                .collect::<Vec<_>>();
            log::debug!(
                "trial {}: {} row(s) in {} bin(s) of {}",
                keys[first_pos],
                positions.len(),
                bins.len(),
                rate
            );
            trials.push(TrialBins {
                key: keys[first_pos].clone(),
                effective_rate: rate,
                bins,
            });
        }

        Ok(BinPlan {
            trials,
            row_count: table.len(),
            unassigned_rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use et_frame::Table;
    use et_types::{NullKind, Scalar};

    use super::{BinAssignment, BinError, TrialBinner, effective_rate};
    use crate::config::ResamplingMode;

    fn nz(v: usize) -> NonZeroUsize {
        NonZeroUsize::new(v).expect("non-zero")
    }

    fn trials(keys: &[i64]) -> Table {
        Table::from_values(vec![(
            "TRIAL_INDEX",
            keys.iter().copied().map(Scalar::Int64).collect(),
        )])
        .expect("table")
    }

    #[test]
    fn fixed_rate_bins_never_cross_trials() {
        let table = trials(&[1, 1, 1, 2, 2, 2, 2, 2]);
        let plan = TrialBinner::new("TRIAL_INDEX", ResamplingMode::FixedRate { rate: nz(2) })
            .plan(&table)
            .expect("plan");

        assert_eq!(plan.trials.len(), 2);
        assert_eq!(plan.trials[0].key, Scalar::Int64(1));
        assert_eq!(plan.trials[0].bins, vec![vec![0, 1], vec![2]]);
        assert_eq!(plan.trials[1].bins, vec![vec![3, 4], vec![5, 6], vec![7]]);
        assert_eq!(plan.bin_count(), 5);
    }

    #[test]
    fn interleaved_trials_keep_first_seen_order() {
        let table = trials(&[7, 3, 7, 3, 7]);
        let plan = TrialBinner::new("TRIAL_INDEX", ResamplingMode::FixedRate { rate: nz(2) })
            .plan(&table)
            .expect("plan");

        assert_eq!(plan.trials[0].key, Scalar::Int64(7));
        assert_eq!(plan.trials[0].bins, vec![vec![0, 2], vec![4]]);
        assert_eq!(plan.trials[1].key, Scalar::Int64(3));
        assert_eq!(plan.trials[1].bins, vec![vec![1, 3]]);
        assert_eq!(
            plan.assignments()[4],
            Some(BinAssignment { trial: 0, bin: 1 })
        );
    }

    #[test]
    fn fixed_count_derives_rate_per_trial() {
        let table = trials(&[1, 1, 1, 1, 1, 1, 1, 2, 2]);
        let plan = TrialBinner::new("TRIAL_INDEX", ResamplingMode::FixedCount { count: nz(3) })
            .plan(&table)
            .expect("plan");

        assert_eq!(plan.trials[0].effective_rate, nz(3));
        assert_eq!(plan.trials[0].bins.len(), 3);
        assert_eq!(plan.trials[1].effective_rate, nz(1));
        assert_eq!(plan.trials[1].bins, vec![vec![7], vec![8]]);
    }

    #[test]
    fn effective_rate_never_drops_below_one() {
        let mode = ResamplingMode::FixedCount { count: nz(10) };
        assert_eq!(effective_rate(&mode, 0), Ok(nz(1)));
        assert_eq!(effective_rate(&mode, 25), Ok(nz(3)));
        let err = effective_rate(
            &ResamplingMode::FixedInterval {
                interval: "10".to_owned(),
            },
            5,
        )
        .expect_err("interval");
        assert_eq!(
            err,
            BinError::UnsupportedMode {
                mode: "fixed_interval"
            }
        );
    }

    #[test]
    fn missing_keys_are_left_unassigned() {
        let table = Table::from_values(vec![(
            "TRIAL_INDEX",
            vec![
                Scalar::Int64(1),
                Scalar::Null(NullKind::Null),
                Scalar::Int64(1),
            ],
        )])
        .expect("table");
        let plan = TrialBinner::new("TRIAL_INDEX", ResamplingMode::FixedRate { rate: nz(5) })
            .plan(&table)
            .expect("plan");

        assert_eq!(plan.unassigned_rows, 1);
        assert_eq!(plan.trials[0].bins, vec![vec![0, 2]]);
        assert_eq!(plan.assignments()[1], None);
    }

    #[test]
    fn missing_group_by_column_is_an_error() {
        let table = trials(&[1]);
        let err = TrialBinner::new("BLOCK", ResamplingMode::default())
            .plan(&table)
            .expect_err("missing");
        assert_eq!(err, BinError::MissingColumn("BLOCK".to_owned()));
    }

    #[test]
    fn empty_table_has_no_trials() {
        let table = trials(&[]);
        let plan = TrialBinner::new("TRIAL_INDEX", ResamplingMode::default())
            .plan(&table)
            .expect("plan");
        assert!(plan.trials.is_empty());
        assert_eq!(plan.bin_count(), 0);
    }
}
