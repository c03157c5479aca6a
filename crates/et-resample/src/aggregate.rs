use std::collections::BTreeMap;

use et_columnar::{Column, ColumnError};
use et_frame::{FrameError, Table};
use et_types::Scalar;
use thiserror::Error;

use crate::binner::BinPlan;
use crate::config::{AggregationConfig, CarryOverScope, ColumnAggregation};
use crate::registry::{AggregateFunctionId, ReduceError, UniqueOccurrences};

/// `unique_occurrences` carry-over slots, one per output column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CarryOverState {
    scope: CarryOverScope,
    slots: BTreeMap<String, UniqueOccurrences>,
}

impl CarryOverState {
    #[must_use]
    pub fn new(scope: CarryOverScope) -> Self {
        Self {
            scope,
            slots: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn scope(&self) -> CarryOverScope {
        self.scope
    }

    /// Called before the first bin of every trial.
    pub fn begin_trial(&mut self) {
        if self.scope == CarryOverScope::Trial {
            self.slots.clear();
        }
    }

    pub fn slot(&mut self, output: &str) -> &mut UniqueOccurrences {
        self.slots.entry(output.to_owned()).or_default()
    }

    #[must_use]
    pub fn last_accepted(&self, output: &str) -> Option<&Scalar> {
        self.slots.get(output).and_then(UniqueOccurrences::last_accepted)
    }
}

/// One field of the output table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputColumn {
    pub name: String,
    pub source: String,
    pub function: AggregateFunctionId,
}

#[derive(Debug, Error)]
pub enum AggregationError {
    #[error(
        "{function} on '{column}' failed in trial {trial}, bin {bin} ({completed_rows} row(s) done): {source}"
    )]
    Reduce {
        column: String,
        function: String,
        trial: String,
        bin: usize,
        completed_rows: usize,
        source: ReduceError,
    },
    #[error(transparent)]
    Column(#[from] ColumnError),
    #[error(transparent)]
    Frame(#[from] FrameError),
}

#[derive(Debug, Clone)]
pub struct Aggregated {
    pub table: Table,
    /// Output cells left missing because their bin had nothing to reduce.
    pub empty_reductions: usize,
    pub bins: usize,
}

/// Reduces every (trial, bin) of a plan to one output row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregator {
    group_by: String,
    aggregations: Vec<ColumnAggregation>,
}

impl Aggregator {
    #[must_use]
    pub fn new(config: &AggregationConfig) -> Self {
        Self {
            group_by: config.group_by().to_owned(),
            aggregations: config.aggregations().to_vec(),
        }
    }

    /// Output fields for `table`, in configuration order. Configured
    /// columns the table lacks are left out.
    #[must_use]
    pub fn output_plan(&self, table: &Table) -> Vec<OutputColumn> {
        let mut out = Vec::new();
        for agg in &self.aggregations {
            if !table.has_column(agg.column()) {
                continue;
            }
            for (name, function) in agg.output_names(&self.group_by) {
                out.push(OutputColumn {
                    name,
                    source: agg.column().to_owned(),
                    function: function.clone(),
                });
            }
        }
        out
    }

    pub fn aggregate(
        &self,
        table: &Table,
        plan: &BinPlan,
        carry: &mut CarryOverState,
    ) -> Result<Aggregated, AggregationError> {
        let outputs = self.output_plan(table);
        let sources: Vec<&Column> = outputs
            .iter()
            .filter_map(|output| table.column(&output.source))
            .collect();

        let row_total = plan.bin_count();
        let mut keys = Vec::with_capacity(row_total);
        let mut fields: Vec<Vec<Scalar>> = vec![Vec::with_capacity(row_total); outputs.len()];
        let mut empty_reductions = 0;
        let mut bin_values = Vec::new();

        for trial in &plan.trials {
            carry.begin_trial();
            for (bin, rows) in trial.bins.iter().enumerate() {
                for ((output, source), field) in
                    outputs.iter().zip(&sources).zip(fields.iter_mut())
                {
                    bin_values.clear();
                    bin_values.extend(
                        rows.iter()
                            .filter_map(|&row| source.value(row))
                            .cloned(),
                    );

                    let reduced = output
                        .function
                        .resolve()
                        .and_then(|kind| {
                            kind.reduce(&bin_values, source.dtype(), carry.slot(&output.name))
                        })
                        .map_err(|source| AggregationError::Reduce {
                            column: output.source.clone(),
                            function: output.function.name().to_owned(),
                            trial: trial.key.to_string(),
                            bin,
                            completed_rows: keys.len(),
                            source,
                        })?;

                    if reduced.is_missing() {
                        empty_reductions += 1;
                    }
                    field.push(reduced);
                }
                keys.push(trial.key.clone());
            }
        }

        let mut columns = Vec::with_capacity(outputs.len() + 1);
        columns.push((self.group_by.clone(), Column::from_values(keys)?));
        for (output, values) in outputs.into_iter().zip(fields) {
            columns.push((output.name, Column::from_values(values)?));
        }

        Ok(Aggregated {
            table: Table::new(columns)?,
            empty_reductions,
            bins: row_total,
        })
    }
}
