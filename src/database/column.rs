use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;

/// Element type of a dataset column, as detected from its cells.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ElementType {
    /// Text or mixed values (values keep their own kind)
    Text,
    /// 32-bit signed integers
    Int32,
    /// 64-bit signed integers
    Int64,
    /// Single-precision floating point numbers
    Float32,
    /// Double-precision floating point numbers
    Float64,
    /// Date and time values
    Timestamp,
    /// Boolean values
    Boolean,
    /// Anything else
    Other,
}

/// SQL column types emitted in the table definition.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SqlType {
    Text,
    Integer,
    Numeric,
    Timestamp,
}

/// A dataset column: the raw header name and its element type.
#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    /// Column name as it appears in the header row
    pub name: String,
    /// Column element type
    pub kind: ElementType,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: ElementType) -> Self {
        Column { name: name.into(), kind }
    }
}

impl ElementType {
    /// Returns the data-frame style name of the element type, used in logs.
    pub const fn as_str(&self) -> &'static str {
        match self {
            ElementType::Text => "object",
            ElementType::Int32 => "int32",
            ElementType::Int64 => "int64",
            ElementType::Float32 => "float32",
            ElementType::Float64 => "float64",
            ElementType::Timestamp => "datetime64",
            ElementType::Boolean => "bool",
            ElementType::Other => "other",
        }
    }

    /// Detects a column's element type from its data cells.
    ///
    /// Missing cells force integers to Float64 and booleans to Text, matching how
    /// data frames promote columns with holes. A column without any value is Float64.
    pub(crate) fn detect(cells: &[Option<&Cell>]) -> ElementType {
        let values: Vec<&Cell> = cells.iter()
            .flatten()
            .filter(|cell| !cell.is_empty())
            .copied()
            .collect();
        let has_missing = values.len() < cells.len();
        if values.is_empty() {
            ElementType::Float64
        } else if values.iter().all(|cell| cell.kind.is_number()) {
            if !has_missing && values.iter().all(|cell| cell.is_integral()) {
                ElementType::Int64
            } else {
                ElementType::Float64
            }
        } else if values.iter().all(|cell| cell.kind.is_timestamp()) {
            ElementType::Timestamp
        } else if !has_missing && values.iter().all(|cell| cell.kind == CellType::Boolean) {
            ElementType::Boolean
        } else {
            ElementType::Text
        }
    }
}

impl SqlType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            SqlType::Text => "TEXT",
            SqlType::Integer => "INTEGER",
            SqlType::Numeric => "NUMERIC",
            SqlType::Timestamp => "TIMESTAMP",
        }
    }
}
