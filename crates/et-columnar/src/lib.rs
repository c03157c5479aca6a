#![forbid(unsafe_code)]

//! A typed column of sample values. Every cell has the column's dtype or is
//! that dtype's missing marker.

use et_types::{DType, Scalar, TypeError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    dtype: DType,
    values: Vec<Scalar>,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ColumnError {
    #[error("mask covers {mask} rows, column has {rows}")]
    MaskLength { rows: usize, mask: usize },
    #[error(transparent)]
    Type(#[from] TypeError),
}

impl Column {
    /// Build a column of `dtype`, widening values that are narrower.
    pub fn new(dtype: DType, values: Vec<Scalar>) -> Result<Self, ColumnError> {
        let values = values
            .into_iter()
            .map(|value| value.widen(dtype))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { dtype, values })
    }

    /// Build a column whose dtype is inferred from `values`.
    pub fn from_values(values: Vec<Scalar>) -> Result<Self, ColumnError> {
        let dtype = DType::infer(&values)?;
        Self::new(dtype, values)
    }

    #[must_use]
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn values(&self) -> &[Scalar] {
        &self.values
    }

    #[must_use]
    pub fn value(&self, row: usize) -> Option<&Scalar> {
        self.values.get(row)
    }

    #[must_use]
    pub fn count_present(&self) -> usize {
        self.values.iter().filter(|v| !v.is_missing()).count()
    }

    /// Blank every row where `mask` is true. Length and dtype are unchanged.
    pub fn mask_rows(&self, mask: &[bool]) -> Result<Self, ColumnError> {
        if mask.len() != self.len() {
            return Err(ColumnError::MaskLength {
                rows: self.len(),
                mask: mask.len(),
            });
        }
        let values = self
            .values
            .iter()
            .zip(mask)
            .map(|(value, &hide)| {
                if hide {
                    Scalar::missing_for_dtype(self.dtype)
                } else {
                    value.clone()
                }
            })
            .collect();
        Ok(Self {
            dtype: self.dtype,
            values,
        })
    }

    #[must_use]
    pub fn semantic_eq(&self, other: &Self) -> bool {
        self.dtype == other.dtype
            && self.len() == other.len()
            && self
                .values
                .iter()
                .zip(&other.values)
                .all(|(left, right)| left.semantic_eq(right))
    }
}
