use crate::database::column::Column;
use crate::database::column::ElementType;
use crate::error::Sheet2PgError;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::Sheet;
use crate::spreadsheet::SpreadsheetError;
use chrono::NaiveDateTime;
use chrono::NaiveTime;
use std::fmt::Display;
use thiserror::Error;
use tracing::debug;

/// Errors related to dataset shape and column naming.
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("Row {row} has {actual} values, expected {expected}")]
    RowWidth { row: usize, expected: usize, actual: usize },

    #[error("Columns {names:?} all normalize to '{identifier}'")]
    ColumnCollision { identifier: String, names: Vec<String> },
}

/// A single cell value of a dataset row.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// Missing value
    Null,
    Text(String),
    Int(i64),
    Float(f64),
    Timestamp(NaiveDateTime),
    Bool(bool),
    /// Time of day without a date
    Time(NaiveTime),
}

impl Value {
    /// True for missing values, NaN included.
    pub fn is_null(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Float(value) => value.is_nan(),
            _ => false,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NaN"),
            Value::Text(value) => write!(f, "{value}"),
            Value::Int(value) => write!(f, "{value}"),
            Value::Float(value) => write!(f, "{value}"),
            Value::Timestamp(value) => write!(f, "{}", value.format("%Y-%m-%d %H:%M:%S%.f")),
            Value::Bool(value) => write!(f, "{value}"),
            Value::Time(value) => write!(f, "{}", value.format("%H:%M:%S%.f")),
        }
    }
}

/// In-memory table read from one sheet: named typed columns and positional rows.
#[derive(Clone, Debug, PartialEq)]
pub struct Dataset {
    columns: Vec<Column>,
    rows: Vec<Vec<Value>>,
}

impl Dataset {
    /// Creates a dataset, rejecting any row whose width differs from the column count.
    pub fn new(columns: Vec<Column>, rows: Vec<Vec<Value>>) -> Result<Self, DatasetError> {
        if let Some((row, values)) = rows.iter().enumerate().find(|(_, values)| values.len() != columns.len()) {
            return Err(DatasetError::RowWidth {
                row,
                expected: columns.len(),
                actual: values.len(),
            });
        }
        Ok(Dataset { columns, rows })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// The first `count` rows, for display before conversion.
    pub fn preview(&self, count: usize) -> &[Vec<Value>] {
        &self.rows[..count.min(self.rows.len())]
    }

    /// Builds a dataset from a sheet.
    ///
    /// The first occupied row is the header, blank rows are skipped, and each column
    /// gets the element type detected from its data cells.
    pub fn from_sheet(sheet: &Sheet) -> Result<Dataset, Sheet2PgError> {
        let grid = sheet.grid();
        let Some((header, records)) = grid.split_first() else {
            return Ok(Dataset::new(Vec::new(), Vec::new())?);
        };
        let records: Vec<&Vec<Option<&Cell>>> = records.iter()
            .filter(|record| record.iter().flatten().any(|cell| !cell.is_empty()))
            .collect();

        let mut columns = Vec::<Column>::with_capacity(header.len());
        for (index, name) in header_names(header).into_iter().enumerate() {
            let cells: Vec<Option<&Cell>> = records.iter().map(|record| record[index]).collect();
            let kind = ElementType::detect(&cells);
            debug!(column = %name, kind = kind.as_str(), "column type detected");
            columns.push(Column::new(name, kind));
        }

        let mut rows = Vec::<Vec<Value>>::with_capacity(records.len());
        for record in records {
            let mut values = Vec::<Value>::with_capacity(columns.len());
            for (column, cell) in columns.iter().zip(record.iter()) {
                let value = to_value(*cell, column.kind).map_err(|message| {
                    SpreadsheetError::CellValueError(
                        sheet.file_name.to_owned(),
                        sheet.name.to_owned(),
                        cell.map(Cell::reference).unwrap_or_default(),
                        message,
                    )
                })?;
                values.push(value);
            }
            rows.push(values);
        }
        Ok(Dataset::new(columns, rows)?)
    }
}

/// Names header cells the way data frames do: blank headers become `Unnamed: <index>`,
/// repeated names get `.1`, `.2`, ... suffixes.
fn header_names(header: &[Option<&Cell>]) -> Vec<String> {
    let mut names = Vec::<String>::with_capacity(header.len());
    for (index, cell) in header.iter().enumerate() {
        let name = match cell.filter(|cell| !cell.is_empty()) {
            Some(cell) => cell.native_value()
                .map(|value| value.to_string())
                .unwrap_or_else(|_| cell.value.to_owned()),
            None => format!("Unnamed: {index}"),
        };
        let mut unique = name.to_owned();
        let mut suffix = 0usize;
        while names.contains(&unique) {
            suffix += 1;
            unique = format!("{name}.{suffix}");
        }
        names.push(unique);
    }
    names
}

/// Converts a cell to the value its column type calls for. Text columns keep native values.
fn to_value(cell: Option<&Cell>, kind: ElementType) -> Result<Value, String> {
    let Some(cell) = cell.filter(|cell| !cell.is_empty()) else {
        return Ok(Value::Null);
    };
    match kind {
        ElementType::Int32 | ElementType::Int64 => Ok(Value::Int(cell.to_bigint()?)),
        ElementType::Float32 | ElementType::Float64 => Ok(Value::Float(cell.to_double()?)),
        ElementType::Timestamp => Ok(Value::Timestamp(cell.to_datetime()?)),
        ElementType::Boolean => Ok(Value::Bool(cell.to_boolean())),
        ElementType::Text | ElementType::Other => cell.native_value(),
    }
}
