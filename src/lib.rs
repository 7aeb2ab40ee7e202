//! # sheet2pg
//!
//! Loads the first sheet (or a named sheet) of an Excel workbook into PostgreSQL.
//!
//! ## Pipeline
//!
//! - **Read**: the `.xlsx` package is unzipped and its sheet parsed into typed cells;
//!   date-formatted numbers become timestamps and shared strings are resolved.
//! - **Shape**: the first occupied row names the columns, blank rows are dropped and
//!   each column gets an element type detected from its values.
//! - **Generate**: one `CREATE TABLE IF NOT EXISTS` plus one `INSERT` per row, with
//!   normalized column identifiers and escaped literals.
//! - **Provision**: a new database is created through the `postgres` administrative
//!   database, then every statement runs against it in order.
//!
//! The database is reached through the [`Connector`](database::executor::Connector)
//! seam; [`PgConnector`](database::pg::PgConnector) is the production implementation.
mod helpers;

pub mod config;
pub mod database;
pub mod error;
pub mod spreadsheet;

use crate::config::ConversionRequest;
use crate::database::dataset::Dataset;
use crate::database::dataset::DatasetError;
use crate::database::executor::provision_and_apply;
use crate::database::executor::Connector;
use crate::database::executor::ProvisionReport;
use crate::database::statement::find_column_collisions;
use crate::database::statement::generate_statements;
use crate::error::Sheet2PgError;
use tracing::info;
use tracing::warn;

/// Reads one sheet of a workbook into a dataset. The first sheet is used when
/// `sheet_name` is `None`.
pub fn load_dataset(file_name: &str, sheet_name: Option<&str>) -> Result<Dataset, Sheet2PgError> {
    let mut spreadsheet = spreadsheet::open_spreadsheet(file_name)?;
    let sheet = spreadsheet.read_sheet(sheet_name)?;
    let dataset = Dataset::from_sheet(&sheet)?;
    info!(
        file = file_name,
        sheet = sheet.name(),
        columns = dataset.columns().len(),
        rows = dataset.row_count(),
        "dataset loaded"
    );
    Ok(dataset)
}

/// Converts a dataset into a new database and table.
///
/// Credentials are checked before anything touches the server. With
/// `strict_columns`, columns whose names normalize to the same identifier fail
/// the request; otherwise they are only reported.
pub fn convert<C: Connector>(
    connector: &C,
    request: &ConversionRequest,
    dataset: &Dataset,
) -> Result<ProvisionReport, Sheet2PgError> {
    request.validate()?;
    let connection = &request.connection;

    for (identifier, names) in find_column_collisions(dataset.columns()) {
        if request.strict_columns {
            return Err(DatasetError::ColumnCollision { identifier, names }.into());
        } else {
            warn!(%identifier, ?names, "several columns normalize to the same identifier");
        }
    }

    let statements = generate_statements(dataset, &connection.table_name);
    info!(
        database = %connection.database_name,
        table = %connection.table_name,
        statements = statements.len(),
        "statements generated"
    );
    Ok(provision_and_apply(connector, &connection.database_name, &statements)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectionDescriptor;
    use crate::database::column::Column;
    use crate::database::column::ElementType;
    use crate::database::dataset::Value;
    use crate::database::executor::tests::MockConnector;
    use crate::spreadsheet::XlsxSpreadsheet;

    fn request(user: &str, password: &str) -> ConversionRequest {
        ConversionRequest::new(ConnectionDescriptor {
            user: user.to_owned(),
            password: password.to_owned(),
            database_name: "sales".to_owned(),
            table_name: "people".to_owned(),
            ..Default::default()
        })
    }

    fn people() -> Dataset {
        Dataset::new(
            vec![Column::new("First Name", ElementType::Text), Column::new("Age", ElementType::Int64)],
            vec![vec![Value::Text("Ann".to_owned()), Value::Int(30)]],
        )
        .unwrap()
    }

    #[test]
    fn missing_credentials_never_connect() {
        let connector = MockConnector::default();
        let error = convert(&connector, &request("loader", ""), &people()).unwrap_err();
        assert_eq!(error.to_string(), "Please provide both username and password.");
        assert!(connector.events().is_empty());
    }

    #[test]
    fn people_end_to_end() {
        let connector = MockConnector::default();
        let report = convert(&connector, &request("loader", "secret"), &people()).unwrap();
        assert_eq!(report.database, "sales");
        assert_eq!(report.statements_executed, 2);
        assert_eq!(
            connector.events(),
            vec![
                "connect postgres",
                r#"execute CREATE DATABASE "sales""#,
                "close postgres",
                "connect sales",
                r#"execute CREATE TABLE IF NOT EXISTS "people" ("first_name" TEXT, "age" INTEGER);"#,
                r#"execute INSERT INTO "people" ("first_name", "age") VALUES ('Ann', 30);"#,
                "close sales",
            ]
        );
    }

    #[test]
    fn create_database_error_is_reported_verbatim() {
        let connector = MockConnector::failing_on("CREATE DATABASE", r#"database "sales" already exists"#);
        let error = convert(&connector, &request("loader", "secret"), &people()).unwrap_err();
        assert_eq!(error.to_string(), r#"database "sales" already exists"#);
        assert!(!connector.events().iter().any(|event| event.contains("INSERT")));
    }

    #[test]
    fn collisions_fail_only_when_strict() {
        let dataset = Dataset::new(
            vec![Column::new("First Name", ElementType::Text), Column::new("first name", ElementType::Text)],
            vec![vec![Value::Text("Ann".to_owned()), Value::Text("ann".to_owned())]],
        )
        .unwrap();

        let connector = MockConnector::default();
        assert!(convert(&connector, &request("loader", "secret"), &dataset).is_ok());

        let connector = MockConnector::default();
        let mut strict = request("loader", "secret");
        strict.strict_columns = true;
        let error = convert(&connector, &strict, &dataset).unwrap_err();
        assert!(matches!(error, Sheet2PgError::DatasetError(DatasetError::ColumnCollision { .. })));
        assert!(connector.events().is_empty());
    }

    #[test]
    fn workbook_end_to_end() {
        let bytes = crate::spreadsheet::xlsx::tests::workbook_bytes();
        let mut spreadsheet = XlsxSpreadsheet::from_bytes("book.xlsx", bytes).unwrap();
        let dataset = Dataset::from_sheet(&spreadsheet.read_sheet(Some("People")).unwrap()).unwrap();

        let connector = MockConnector::default();
        let report = convert(&connector, &request("loader", "secret"), &dataset).unwrap();
        assert_eq!(report.statements_executed, 4);
        let events = connector.events();
        assert_eq!(
            events[4],
            r#"execute CREATE TABLE IF NOT EXISTS "people" ("first_name" TEXT, "age" INTEGER, "joined" TIMESTAMP, "score" NUMERIC);"#
        );
        assert_eq!(
            events[6],
            r#"execute INSERT INTO "people" ("first_name", "age", "joined", "score") VALUES ('O''Brien', 41, '2024-01-15T12:00:00', NULL);"#
        );
    }

    #[test]
    fn load_dataset_rejects_unknown_extension() {
        let error = load_dataset("people.ods", None).unwrap_err();
        assert_eq!(error.to_string(), "Cannot detect file format for 'people.ods', expected an .xlsx workbook");
    }
}
