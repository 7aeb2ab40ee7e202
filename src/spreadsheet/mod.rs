//! # Spreadsheet Processing Module
//!
//! Reads xlsx workbooks (the zip container of SpreadsheetML parts) into sheets of
//! positioned, typed cells. Number formats are resolved so date-formatted numbers
//! are recognized, and shared strings are resolved to their text.
use crate::error::Sheet2PgError;
use crate::error::ResultMessage;
use std::path::Path;
use thiserror::Error;

pub(crate) mod cell;
pub(crate) mod excel;
pub(crate) mod reference;
pub mod sheet;
pub mod xlsx;

pub use sheet::Sheet;
pub use xlsx::XlsxSpreadsheet;

/// Errors raised while reading a workbook.
#[derive(Error, Debug)]
pub enum SpreadsheetError {
    /// Unsupported or unrecognized file extension
    #[error("Cannot detect file format for '{0}', expected an .xlsx workbook")]
    InvalidFileFormat(String),

    /// A required package part is missing
    #[error("Missing part '{0}' in workbook")]
    FileError(String),

    /// Workbook lists no worksheets
    #[error("Workbook '{0}' contains no sheets")]
    SpreadsheetEmptyError(String),

    /// Requested sheet not found
    #[error("Sheet '{sheet_name}' not found in '{file_name}'")]
    SheetNotFound { file_name: String, sheet_name: String },

    /// Cell reference attribute could not be parsed
    #[error("Invalid cell reference '{0}'")]
    CellReferenceError(String),

    /// Cell points past the end of the shared string table
    #[error("Shared string index {0} out of range")]
    SharedStringError(usize),

    /// Cell value cannot be converted to the type its format announces
    #[error("Invalid cell value in '{0}' sheet '{1}' at {2}: {3}")]
    CellValueError(String, String, String, String),
}

/// Opens an xlsx workbook after checking its extension.
pub fn open_spreadsheet(file_name: &str) -> Result<XlsxSpreadsheet, Sheet2PgError> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|extension| extension.to_str())
        .map(|extension| extension.to_ascii_lowercase());
    match extension.as_deref() {
        Some("xlsx") | Some("xlsm") => XlsxSpreadsheet::open(file_name).with_prefix(file_name),
        _ => Err(SpreadsheetError::InvalidFileFormat(file_name.to_owned()))?,
    }
}
