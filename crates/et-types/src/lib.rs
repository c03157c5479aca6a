#![forbid(unsafe_code)]

//! Cell values of an eyetracking sample table.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DType {
    Null,
    Bool,
    Int64,
    Float64,
    Utf8,
}

impl DType {
    /// The narrowest dtype holding both `self` and `other`. Promotion only
    /// widens: bool into int64, either into float64. Text never mixes with
    /// numbers.
    #[must_use]
    pub fn promote(self, other: Self) -> Option<Self> {
        use DType::{Bool, Float64, Int64, Null};

        match (self, other) {
            (a, b) if a == b => Some(a),
            (Null, other) | (other, Null) => Some(other),
            (Bool, Int64) | (Int64, Bool) => Some(Int64),
            (Bool | Int64, Float64) | (Float64, Bool | Int64) => Some(Float64),
            _ => None,
        }
    }

    /// Dtype of a column holding `values`; all-missing input is `Null`.
    pub fn infer<'a>(values: impl IntoIterator<Item = &'a Scalar>) -> Result<Self, TypeError> {
        values.into_iter().try_fold(Self::Null, |current, value| {
            current
                .promote(value.dtype())
                .ok_or(TypeError::Incompatible {
                    left: current,
                    right: value.dtype(),
                })
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NullKind {
    Null,
    NaN,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Scalar {
    Null(NullKind),
    Bool(bool),
    Int64(i64),
    Float64(f64),
    Utf8(String),
}

impl Scalar {
    #[must_use]
    pub fn dtype(&self) -> DType {
        match self {
            Self::Null(_) => DType::Null,
            Self::Bool(_) => DType::Bool,
            Self::Int64(_) => DType::Int64,
            Self::Float64(_) => DType::Float64,
            Self::Utf8(_) => DType::Utf8,
        }
    }

    /// Null markers and float NaN both count as missing.
    #[must_use]
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Null(_)) || matches!(self, Self::Float64(v) if v.is_nan())
    }

    /// Missing marker stored in a column of `dtype`: NaN for floats, null
    /// otherwise.
    #[must_use]
    pub fn missing_for_dtype(dtype: DType) -> Self {
        if dtype == DType::Float64 {
            Self::Null(NullKind::NaN)
        } else {
            Self::Null(NullKind::Null)
        }
    }

    /// Equality where any two missing values match.
    #[must_use]
    pub fn semantic_eq(&self, other: &Self) -> bool {
        (self.is_missing() && other.is_missing()) || self == other
    }

    /// Interpret a 0/1 indicator cell. Anything that is not an exact 0 or 1
    /// (including missing values) is `None`.
    #[must_use]
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            Self::Int64(0) => Some(false),
            Self::Int64(1) => Some(true),
            Self::Float64(v) if *v == 0.0 => Some(false),
            Self::Float64(v) if *v == 1.0 => Some(true),
            _ => None,
        }
    }

    pub fn to_f64(&self) -> Result<f64, TypeError> {
        match self {
            Self::Bool(v) => Ok(f64::from(u8::from(*v))),
            Self::Int64(v) => Ok(*v as f64),
            Self::Float64(v) => Ok(*v),
            Self::Null(_) => Err(TypeError::Missing),
            Self::Utf8(v) => Err(TypeError::NonNumeric { value: v.clone() }),
        }
    }

    /// Convert into a column of `target`. Missing values become the
    /// target's missing marker; everything else may only widen.
    pub fn widen(self, target: DType) -> Result<Self, TypeError> {
        let from = self.dtype();
        match (self, target) {
            (Self::Null(_), _) => Ok(Self::missing_for_dtype(target)),
            (value, target) if from == target => Ok(value),
            (Self::Bool(v), DType::Int64) => Ok(Self::Int64(i64::from(v))),
            (Self::Bool(v), DType::Float64) => Ok(Self::Float64(f64::from(u8::from(v)))),
            (Self::Int64(v), DType::Float64) => Ok(Self::Float64(v as f64)),
            _ => Err(TypeError::NotWidening { from, to: target }),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null(_) => f.write_str("<missing>"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::Float64(v) => write!(f, "{v}"),
            Self::Utf8(v) => f.write_str(v),
        }
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Self::Int64(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Self::Float64(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Self::Utf8(value.to_owned())
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TypeError {
    #[error("cannot store {left:?} and {right:?} values in one column")]
    Incompatible { left: DType, right: DType },
    #[error("{from:?} does not widen to {to:?}")]
    NotWidening { from: DType, to: DType },
    #[error("value {value:?} is not numeric")]
    NonNumeric { value: String },
    #[error("value is missing")]
    Missing,
}

// ── Sample statistics ──────────────────────────────────────────────────

/// The present values of one bin as floats, in row order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Sample {
    values: Vec<f64>,
}

impl Sample {
    /// Skip missing cells; text cells are an error.
    pub fn from_values(values: &[Scalar]) -> Result<Self, TypeError> {
        let values = values
            .iter()
            .filter(|v| !v.is_missing())
            .map(Scalar::to_f64)
            .collect::<Result<_, _>>()?;
        Ok(Self { values })
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
    pub fn mean(&self) -> Option<f64> {
        (!self.is_empty()).then(|| self.values.iter().sum::<f64>() / self.len() as f64)
    }

    #[must_use]
    pub fn median(&self) -> Option<f64> {
        let mut sorted = self.values.clone();
        sorted.sort_by(f64::total_cmp);
        let mid = sorted.len() / 2;
        match sorted.len() {
            0 => None,
            n if n.is_multiple_of(2) => Some((sorted[mid - 1] + sorted[mid]) / 2.0),
            _ => Some(sorted[mid]),
        }
    }

    /// Variance with `ddof` delta degrees of freedom; `None` when there are
    /// not more than `ddof` values.
    #[must_use]
    pub fn variance(&self, ddof: usize) -> Option<f64> {
        if self.len() <= ddof {
            return None;
        }
        let mean = self.mean()?;
        let squares: f64 = self.values.iter().map(|x| (x - mean).powi(2)).sum();
        Some(squares / (self.len() - ddof) as f64)
    }

    #[must_use]
    pub fn std_dev(&self, ddof: usize) -> Option<f64> {
        self.variance(ddof).map(f64::sqrt)
    }
}
