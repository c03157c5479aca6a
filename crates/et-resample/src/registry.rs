use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;

use et_types::{DType, NullKind, Sample, Scalar, TypeError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::key::ScalarKey;

/// Aggregate function selector for one configured output column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateKind {
    Mean,
    Median,
    Mode,
    Sum,
    Min,
    Max,
    Count,
    First,
    Last,
    Std,
    Var,
    UniqueOccurrences,
}

impl AggregateKind {
    pub const ALL: [Self; 12] = [
        Self::Mean,
        Self::Median,
        Self::Mode,
        Self::Sum,
        Self::Min,
        Self::Max,
        Self::Count,
        Self::First,
        Self::Last,
        Self::Std,
        Self::Var,
        Self::UniqueOccurrences,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Median => "median",
            Self::Mode => "mode",
            Self::Sum => "sum",
            Self::Min => "min",
            Self::Max => "max",
            Self::Count => "count",
            Self::First => "first",
            Self::Last => "last",
            Self::Std => "std",
            Self::Var => "var",
            Self::UniqueOccurrences => "unique_occurrences",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Whether the reducer reads or writes carry-over state.
    #[must_use]
    pub fn is_stateful(self) -> bool {
        matches!(self, Self::UniqueOccurrences)
    }

    /// Reduce the values of one bin. Missing values are ignored; a bin with
    /// no present value yields the missing marker for the output dtype
    /// (`count` and `unique_occurrences` yield 0 instead).
    pub fn reduce(
        self,
        values: &[Scalar],
        dtype: DType,
        carry: &mut UniqueOccurrences,
    ) -> Result<Scalar, ReduceError> {
        match self {
            Self::Mean => numeric(self, values, dtype, Sample::mean),
            Self::Median => numeric(self, values, dtype, Sample::median),
            Self::Std => numeric(self, values, dtype, |sample| sample.std_dev(1)),
            Self::Var => numeric(self, values, dtype, |sample| sample.variance(1)),
            Self::Sum => sum(values, dtype),
            Self::Min => Ok(extreme(values, dtype, Ordering::Less)),
            Self::Max => Ok(extreme(values, dtype, Ordering::Greater)),
            Self::Count => Ok(Scalar::Int64(present(values).count() as i64)),
            Self::First => Ok(present(values)
                .next()
                .cloned()
                .unwrap_or_else(|| Scalar::missing_for_dtype(dtype))),
            Self::Last => Ok(present(values)
                .next_back()
                .cloned()
                .unwrap_or_else(|| Scalar::missing_for_dtype(dtype))),
            Self::Mode => Ok(mode(values, dtype)),
            Self::UniqueOccurrences => Ok(carry.count_bin(values)),
        }
    }
}

impl fmt::Display for AggregateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A configured aggregate identifier. Names outside the known set are kept
/// so the configuration loads, and fail when first applied.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AggregateFunctionId {
    Known(AggregateKind),
    Unknown(String),
}

impl AggregateFunctionId {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let name = raw.trim();
        AggregateKind::from_name(name)
            .map_or_else(|| Self::Unknown(name.to_owned()), Self::Known)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Known(kind) => kind.name(),
            Self::Unknown(name) => name,
        }
    }

    #[must_use]
    pub fn is_known(&self) -> bool {
        matches!(self, Self::Known(_))
    }

    pub fn resolve(&self) -> Result<AggregateKind, ReduceError> {
        match self {
            Self::Known(kind) => Ok(*kind),
            Self::Unknown(name) => Err(ReduceError::UnknownFunction { name: name.clone() }),
        }
    }
}

impl From<AggregateKind> for AggregateFunctionId {
    fn from(kind: AggregateKind) -> Self {
        Self::Known(kind)
    }
}

impl fmt::Display for AggregateFunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for AggregateFunctionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for AggregateFunctionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ReduceError {
    #[error("'{name}' is not a known aggregate function")]
    UnknownFunction { name: String },
    #[error("{function} needs a numeric column, found {dtype:?}")]
    NonNumeric { function: AggregateKind, dtype: DType },
    #[error("{function} overflowed int64")]
    Overflow { function: AggregateKind },
    #[error(transparent)]
    Type(#[from] TypeError),
}

/// Carry-over for `unique_occurrences`: the last value counted in the
/// preceding bin of the same column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UniqueOccurrences {
    last_accepted: Option<Scalar>,
}

impl UniqueOccurrences {
    #[must_use]
    pub fn last_accepted(&self) -> Option<&Scalar> {
        self.last_accepted.as_ref()
    }

    pub fn reset(&mut self) {
        self.last_accepted = None;
    }

    /// Count distinct present values in one bin. When the first present
    /// value equals the value carried from the previous bin, that value is
    /// not counted in this bin.
    pub fn count_bin(&mut self, values: &[Scalar]) -> Scalar {
        let mut present = present(values).peekable();
        let excluded = match (present.peek().copied(), self.last_accepted.as_ref()) {
            (Some(first), Some(last)) if first.semantic_eq(last) => {
                Some(ScalarKey::from_scalar(first))
            }
            _ => None,
        };

        let mut seen = HashSet::new();
        let mut last_accepted = None;
        for value in present {
            let key = ScalarKey::from_scalar(value);
            if excluded.as_ref() == Some(&key) {
                continue;
            }
            seen.insert(key);
            last_accepted = Some(value);
        }

        if let Some(value) = last_accepted {
            self.last_accepted = Some(value.clone());
        }
        Scalar::Int64(seen.len() as i64)
    }
}

fn present(values: &[Scalar]) -> impl DoubleEndedIterator<Item = &Scalar> {
    values.iter().filter(|v| !v.is_missing())
}

/// Float statistic over the present values; an empty bin gives NaN.
fn numeric(
    kind: AggregateKind,
    values: &[Scalar],
    dtype: DType,
    statistic: impl FnOnce(&Sample) -> Option<f64>,
) -> Result<Scalar, ReduceError> {
    if dtype == DType::Utf8 {
        return Err(ReduceError::NonNumeric {
            function: kind,
            dtype,
        });
    }
    let sample = Sample::from_values(values)?;
    Ok(statistic(&sample).map_or(Scalar::Null(NullKind::NaN), Scalar::Float64))
}

fn sum(values: &[Scalar], dtype: DType) -> Result<Scalar, ReduceError> {
    let mut items = present(values).peekable();
    if items.peek().is_none() {
        return match dtype {
            DType::Utf8 => Err(ReduceError::NonNumeric {
                function: AggregateKind::Sum,
                dtype,
            }),
            _ => Ok(Scalar::missing_for_dtype(dtype)),
        };
    }

    match dtype {
        DType::Bool | DType::Int64 => {
            let mut total = 0_i64;
            for value in items {
                let term = match value {
                    Scalar::Int64(v) => *v,
                    Scalar::Bool(v) => i64::from(*v),
                    other => {
                        return Err(ReduceError::NonNumeric {
                            function: AggregateKind::Sum,
                            dtype: other.dtype(),
                        });
                    }
                };
                total = total.checked_add(term).ok_or(ReduceError::Overflow {
                    function: AggregateKind::Sum,
                })?;
            }
            Ok(Scalar::Int64(total))
        }
        DType::Float64 | DType::Null => {
            let mut total = 0.0;
            for value in items {
                total += value.to_f64()?;
            }
            Ok(Scalar::Float64(total))
        }
        DType::Utf8 => Err(ReduceError::NonNumeric {
            function: AggregateKind::Sum,
            dtype,
        }),
    }
}

fn compare_present(left: &Scalar, right: &Scalar) -> Ordering {
    match (left, right) {
        (Scalar::Int64(a), Scalar::Int64(b)) => a.cmp(b),
        (Scalar::Float64(a), Scalar::Float64(b)) => a.total_cmp(b),
        (Scalar::Utf8(a), Scalar::Utf8(b)) => a.cmp(b),
        (Scalar::Bool(a), Scalar::Bool(b)) => a.cmp(b),
        _ => match (left.to_f64(), right.to_f64()) {
            (Ok(a), Ok(b)) => a.total_cmp(&b),
            _ => Ordering::Equal,
        },
    }
}

/// Smallest (`Less`) or largest (`Greater`) present value; the first one
/// wins among equals.
fn extreme(values: &[Scalar], dtype: DType, wanted: Ordering) -> Scalar {
    let mut best: Option<&Scalar> = None;
    for value in present(values) {
        best = match best {
            Some(current) if compare_present(value, current) != wanted => Some(current),
            _ => Some(value),
        };
    }
    best.cloned()
        .unwrap_or_else(|| Scalar::missing_for_dtype(dtype))
}

/// Most frequent present value. Ties go to the value that appeared first.
fn mode(values: &[Scalar], dtype: DType) -> Scalar {
    let mut counts = HashMap::<ScalarKey<'_>, (usize, usize)>::new();
    for (pos, value) in values.iter().enumerate() {
        if value.is_missing() {
            continue;
        }
        counts
            .entry(ScalarKey::from_scalar(value))
            .or_insert((pos, 0))
            .1 += 1;
    }

    counts
        .values()
        .max_by(|(pos_a, count_a), (pos_b, count_b)| {
            count_a.cmp(count_b).then_with(|| pos_b.cmp(pos_a))
        })
        .map_or_else(
            || Scalar::missing_for_dtype(dtype),
            |(pos, _)| values[*pos].clone(),
        )
}
