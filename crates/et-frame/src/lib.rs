#![forbid(unsafe_code)]

use std::collections::{BTreeMap, BTreeSet};

use et_columnar::{Column, ColumnError};
use et_types::Scalar;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("column '{name}' has length {column_len}, expected {row_count}")]
    LengthMismatch {
        name: String,
        row_count: usize,
        column_len: usize,
    },
    #[error("duplicate column name: '{0}'")]
    DuplicateColumn(String),
    #[error("column '{0}' not found")]
    MissingColumn(String),
    #[error(transparent)]
    Column(#[from] ColumnError),
}

/// An ordered set of equally long, named columns. Row order is significant:
/// every transformation here keeps rows in their original relative order.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: BTreeMap<String, Column>,
    column_order: Vec<String>,
    row_count: usize,
}

impl Table {
    pub fn new(columns: Vec<(String, Column)>) -> Result<Self, FrameError> {
        let row_count = columns.first().map_or(0, |(_, column)| column.len());
        let mut by_name = BTreeMap::new();
        let mut column_order = Vec::with_capacity(columns.len());

        for (name, column) in columns {
            if column.len() != row_count {
                return Err(FrameError::LengthMismatch {
                    name,
                    row_count,
                    column_len: column.len(),
                });
            }
            if by_name.contains_key(&name) {
                return Err(FrameError::DuplicateColumn(name));
            }
            column_order.push(name.clone());
            by_name.insert(name, column);
        }

        Ok(Self {
            columns: by_name,
            column_order,
            row_count,
        })
    }

    /// Build a table from raw scalar vectors, inferring each column's dtype.
    pub fn from_values<N>(columns: Vec<(N, Vec<Scalar>)>) -> Result<Self, FrameError>
    where
        N: Into<String>,
    {
        let columns = columns
            .into_iter()
            .map(|(name, values)| Ok((name.into(), Column::from_values(values)?)))
            .collect::<Result<Vec<_>, FrameError>>()?;
        Self::new(columns)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.row_count
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.column_order
    }

    #[must_use]
    pub fn column_count(&self) -> usize {
        self.column_order.len()
    }

    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    /// Columns in table order.
    pub fn iter_columns(&self) -> impl Iterator<Item = (&str, &Column)> + '_ {
        self.column_order
            .iter()
            .filter_map(|name| self.columns.get(name).map(|column| (name.as_str(), column)))
    }

    /// Cell at (`row`, `name`), if both exist.
    #[must_use]
    pub fn value(&self, row: usize, name: &str) -> Option<&Scalar> {
        self.columns.get(name).and_then(|column| column.value(row))
    }

    /// Keep the named columns, in table order. Every name must exist.
    pub fn select(&self, names: &[String]) -> Result<Self, FrameError> {
        let wanted: BTreeSet<&str> = names.iter().map(String::as_str).collect();
        if let Some(missing) = names.iter().find(|name| !self.columns.contains_key(*name)) {
            return Err(FrameError::MissingColumn(missing.clone()));
        }

        let column_order: Vec<String> = self
            .column_order
            .iter()
            .filter(|name| wanted.contains(name.as_str()))
            .cloned()
            .collect();
        let columns = column_order
            .iter()
            .filter_map(|name| {
                self.columns
                    .get(name)
                    .map(|column| (name.clone(), column.clone()))
            })
            .collect();

        Ok(Self {
            columns,
            column_order,
            row_count: self.row_count,
        })
    }

    /// Replace every cell of the flagged rows with a missing marker, except in
    /// the `keep` columns. Row count and column set are unchanged.
    pub fn mask_rows(&self, mask: &[bool], keep: &[&str]) -> Result<Self, FrameError> {
        let mut columns = BTreeMap::new();
        for (name, column) in self.iter_columns() {
            let column = if keep.contains(&name) {
                column.clone()
            } else {
                column.mask_rows(mask)?
            };
            columns.insert(name.to_owned(), column);
        }

        Ok(Self {
            columns,
            column_order: self.column_order.clone(),
            row_count: self.row_count,
        })
    }

    #[must_use]
    pub fn semantic_eq(&self, other: &Self) -> bool {
        self.row_count == other.row_count
            && self.column_order == other.column_order
            && self.column_order.iter().all(|name| {
                match (self.columns.get(name), other.columns.get(name)) {
                    (Some(left), Some(right)) => left.semantic_eq(right),
                    _ => false,
                }
            })
    }
}
