#![forbid(unsafe_code)]

use std::fs;
use std::path::Path;

use csv::{ReaderBuilder, WriterBuilder};
use et_columnar::{Column, ColumnError};
use et_frame::{FrameError, Table};
use et_types::{DType, NullKind, Scalar};
use thiserror::Error;

mod ini;

pub use ini::{IniDocument, IniSection, parse_ini, read_ini};

/// Cell text that eyetracking exports use for "no sample".
pub const MISSING_SENTINEL: &str = ".";

#[derive(Debug, Error)]
pub enum IoError {
    #[error("table input has no headers")]
    MissingHeaders,
    #[error("ini line {line}: {message}")]
    Ini { line: usize, message: String },
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error(transparent)]
    Column(#[from] ColumnError),
    #[error(transparent)]
    Frame(#[from] FrameError),
}

pub fn read_tsv(path: &Path) -> Result<Table, IoError> {
    let input = fs::read_to_string(path)?;
    read_tsv_str(&input)
}

pub fn read_tsv_str(input: &str) -> Result<Table, IoError> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .from_reader(input.as_bytes());

    let headers = reader.headers().cloned()?;
    if headers.is_empty() || headers.iter().all(|h| h.trim().is_empty()) {
        return Err(IoError::MissingHeaders);
    }

    let header_count = headers.len();
    let row_hint = input.len() / (header_count * 8).max(1);
    let mut raw: Vec<Vec<String>> = (0..header_count)
        .map(|_| Vec::with_capacity(row_hint))
        .collect();

    for record in reader.records() {
        let record = record?;
        for (idx, col) in raw.iter_mut().enumerate() {
            col.push(record.get(idx).unwrap_or_default().to_owned());
        }
    }

    let mut columns = Vec::with_capacity(header_count);
    for (idx, fields) in raw.into_iter().enumerate() {
        let name = headers.get(idx).unwrap_or_default().trim().to_owned();
        columns.push((name, column_from_fields(fields)?));
    }

    Ok(Table::new(columns)?)
}

/// Infer a column from raw cells. A column whose parsed cells share no
/// common dtype (numbers mixed with text) is kept as text.
fn column_from_fields(fields: Vec<String>) -> Result<Column, IoError> {
    let parsed: Vec<Scalar> = fields.iter().map(|field| parse_scalar(field)).collect();
    match Column::from_values(parsed) {
        Ok(column) => Ok(column),
        Err(ColumnError::Type(_)) => {
            let text = fields
                .into_iter()
                .map(|field| {
                    let trimmed = field.trim();
                    if is_missing_token(trimmed) {
                        Scalar::Null(NullKind::Null)
                    } else {
                        Scalar::Utf8(trimmed.to_owned())
                    }
                })
                .collect();
            Ok(Column::new(DType::Utf8, text)?)
        }
        Err(other) => Err(other.into()),
    }
}

fn is_missing_token(trimmed: &str) -> bool {
    trimmed.is_empty() || trimmed == MISSING_SENTINEL
}

fn parse_scalar(field: &str) -> Scalar {
    let trimmed = field.trim();
    if is_missing_token(trimmed) {
        return Scalar::Null(NullKind::Null);
    }

    if let Ok(value) = trimmed.parse::<i64>() {
        return Scalar::Int64(value);
    }
    if let Ok(value) = trimmed.parse::<f64>() {
        return Scalar::Float64(value);
    }
    if let Ok(value) = trimmed.parse::<bool>() {
        return Scalar::Bool(value);
    }

    Scalar::Utf8(trimmed.to_owned())
}

pub fn write_tsv(path: &Path, table: &Table) -> Result<(), IoError> {
    let out = write_tsv_string(table)?;
    fs::write(path, out)?;
    Ok(())
}

/// Missing cells are written as empty fields. In a one-column table an empty
/// row is written as `""` so it is not read back as a blank line.
pub fn write_tsv_string(table: &Table) -> Result<String, IoError> {
    let mut writer = WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(Vec::new());

    writer.write_record(table.column_names())?;

    for row_idx in 0..table.len() {
        let row = table
            .iter_columns()
            .map(|(_, column)| column.value(row_idx).map_or_else(String::new, scalar_to_cell))
            .collect::<Vec<_>>();
        writer.write_record(&row)?;
    }

    let bytes = writer.into_inner().map_err(|err| err.into_error())?;
    Ok(String::from_utf8(bytes)?)
}

fn scalar_to_cell(scalar: &Scalar) -> String {
    match scalar {
        Scalar::Null(_) => String::new(),
        Scalar::Bool(v) => v.to_string(),
        Scalar::Int64(v) => v.to_string(),
        Scalar::Float64(v) => {
            if v.is_nan() {
                String::new()
            } else if v.fract() == 0.0 && v.abs() < 1e16 {
                // integral floats keep one decimal place
                format!("{v:.1}")
            } else {
                v.to_string()
            }
        }
        Scalar::Utf8(v) => v.clone(),
    }
}
