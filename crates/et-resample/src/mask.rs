use et_frame::{FrameError, Table};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AggregationConfig;

#[derive(Debug, Error)]
pub enum MaskError {
    #[error("blink column '{0}' not found")]
    MissingColumn(String),
    #[error(transparent)]
    Frame(#[from] FrameError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlinkReport {
    pub masked_rows: usize,
    pub total_rows: usize,
}

impl BlinkReport {
    /// Share of masked rows, 0 for an empty table.
    #[must_use]
    pub fn percent(&self) -> f64 {
        if self.total_rows == 0 {
            return 0.0;
        }
        self.masked_rows as f64 / self.total_rows as f64 * 100.0
    }

    #[must_use]
    pub fn display_percent(&self, precision: usize) -> String {
        format!("{:.precision$}", self.percent())
    }
}

/// Blanks every sample taken during a blink. The row stays in place so bin
/// boundaries are computed over the same positions as the unmasked table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlinkMasker {
    blink_column: String,
    preserve: Vec<String>,
    percent_precision: usize,
}

impl BlinkMasker {
    /// Mask on `blink_column`, leaving the `preserve` columns untouched.
    #[must_use]
    pub fn new(blink_column: impl Into<String>, preserve: Vec<String>) -> Self {
        Self {
            blink_column: blink_column.into(),
            preserve,
            percent_precision: crate::config::DEFAULT_PERCENT_PRECISION,
        }
    }

    #[must_use]
    pub fn from_config(config: &AggregationConfig) -> Self {
        Self {
            blink_column: config.blink_column().to_owned(),
            preserve: vec![config.group_by().to_owned()],
            percent_precision: config.precision().percent,
        }
    }

    #[must_use]
    pub fn blink_column(&self) -> &str {
        &self.blink_column
    }

    pub fn mask(&self, table: &Table) -> Result<(Table, BlinkReport), MaskError> {
        let flags = table
            .column(&self.blink_column)
            .ok_or_else(|| MaskError::MissingColumn(self.blink_column.clone()))?;

        let mask: Vec<bool> = flags
            .values()
            .iter()
            .map(|value| value.as_flag() == Some(true))
            .collect();
        let report = BlinkReport {
            masked_rows: mask.iter().filter(|&&blink| blink).count(),
            total_rows: table.len(),
        };

        let keep: Vec<&str> = self.preserve.iter().map(String::as_str).collect();
        let masked = table.mask_rows(&mask, &keep)?;

        log::info!(
            "Masked {} blink(s) ({}% of total)",
            report.masked_rows,
            report.display_percent(self.percent_precision)
        );
        Ok((masked, report))
    }
}
