use thiserror::Error;

/// Main error type for sheet2pg.
/// Aggregates errors from the standard library, dependencies, and internal modules,
/// always displaying the inner message unchanged.
#[derive(Error, Debug)]
pub enum Sheet2PgError {
    #[error("{0}")]
    WithContextError(String),

    // Standard library errors
    #[error("{0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    ParseIntError(#[from] std::num::ParseIntError),

    #[error("{0}")]
    ParseFloatError(#[from] std::num::ParseFloatError),

    #[error("{0}")]
    StringEncodingError(#[from] std::str::Utf8Error),

    // Third-party library errors
    #[error("{0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("{0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("{0}")]
    XmlEncodingError(#[from] quick_xml::encoding::EncodingError),

    #[error("{0}")]
    XmlAttributeError(#[from] quick_xml::events::attributes::AttrError),

    // Helper module errors
    #[error("{0}")]
    XmlHelperError(#[from] crate::helpers::xml::XmlError),

    // Spreadsheet module errors
    #[error("{0}")]
    SpreadsheetError(#[from] crate::spreadsheet::SpreadsheetError),

    // Database module errors
    #[error("{0}")]
    DatasetError(#[from] crate::database::dataset::DatasetError),

    #[error("{0}")]
    ProvisionError(#[from] crate::database::executor::ProvisionError),

    // Request errors
    #[error("{0}")]
    ConfigError(#[from] crate::config::ConfigError),
}

pub(crate) trait ResultMessage {
    fn with_prefix(self, message: &str) -> Self;
}

impl<T> ResultMessage for Result<T, Sheet2PgError> {
    fn with_prefix(self, message: &str) -> Self {
        self.map_err(|e| Sheet2PgError::WithContextError(format!("{}: {}", message, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;

    #[test]
    fn display_is_inner_message() {
        let error = Sheet2PgError::from(ConfigError::MissingCredentials);
        assert_eq!(error.to_string(), "Please provide both username and password.");
    }

    #[test]
    fn with_prefix_wraps_message() {
        let result: Result<(), Sheet2PgError> = Err(ConfigError::MissingCredentials.into());
        let error = result.with_prefix("book.xlsx").unwrap_err();
        assert_eq!(error.to_string(), "book.xlsx: Please provide both username and password.");
    }
}
