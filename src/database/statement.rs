//! SQL generation: one `CREATE TABLE` for the dataset's columns followed by one
//! `INSERT` per row, with values rendered as SQL literals.
use crate::database::column::Column;
use crate::database::column::ElementType;
use crate::database::column::SqlType;
use crate::database::dataset::Dataset;
use crate::database::dataset::Value;
use chrono::NaiveDateTime;
use chrono::NaiveTime;
use chrono::Timelike;
use std::collections::BTreeMap;
use std::fmt::Display;

/// One executable SQL statement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Statement {
    /// The table definition, always first
    CreateTable(String),
    /// One row insertion
    Insert(String),
}

impl Statement {
    pub fn sql(&self) -> &str {
        match self {
            Statement::CreateTable(sql) | Statement::Insert(sql) => sql,
        }
    }
}

impl Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.sql())
    }
}

/// Normalizes a header into a column identifier: lowercase, with every
/// non-alphanumeric character replaced by `_`.
pub fn normalize(raw_name: &str) -> String {
    raw_name
        .to_lowercase()
        .chars()
        .map(|character| if character.is_alphanumeric() { character } else { '_' })
        .collect()
}

/// Maps an element type to the SQL type of its column. Unknown types fall back to TEXT.
pub fn infer_column_type(element_type: ElementType) -> SqlType {
    match element_type {
        ElementType::Text => SqlType::Text,
        ElementType::Int32 | ElementType::Int64 => SqlType::Integer,
        ElementType::Float32 | ElementType::Float64 => SqlType::Numeric,
        ElementType::Timestamp => SqlType::Timestamp,
        ElementType::Boolean | ElementType::Other => SqlType::Text,
    }
}

pub fn build_create_statement(columns: &[Column], table_name: &str) -> Statement {
    let definitions = columns
        .iter()
        .map(|column| format!("\"{}\" {}", normalize(&column.name), infer_column_type(column.kind).as_str()))
        .collect::<Vec<_>>()
        .join(", ");
    Statement::CreateTable(format!("CREATE TABLE IF NOT EXISTS \"{table_name}\" ({definitions});"))
}

pub fn build_insert_statements(dataset: &Dataset, table_name: &str) -> Vec<Statement> {
    let columns = dataset
        .columns()
        .iter()
        .map(|column| format!("\"{}\"", normalize(&column.name)))
        .collect::<Vec<_>>()
        .join(", ");
    dataset
        .rows()
        .iter()
        .map(|row| {
            let values = row.iter().map(render_literal).collect::<Vec<_>>().join(", ");
            Statement::Insert(format!("INSERT INTO \"{table_name}\" ({columns}) VALUES ({values});"))
        })
        .collect()
}

/// The create statement followed by every insert, in row order.
pub fn generate_statements(dataset: &Dataset, table_name: &str) -> Vec<Statement> {
    let mut statements = Vec::with_capacity(dataset.row_count() + 1);
    statements.push(build_create_statement(dataset.columns(), table_name));
    statements.extend(build_insert_statements(dataset, table_name));
    statements
}

/// Renders a value as a SQL literal.
///
/// Text is the only escaped kind (quotes doubled); other non-numeric values are
/// quoted verbatim. Whole floats keep a `.0` so NUMERIC stores them with scale 1.
pub fn render_literal(value: &Value) -> String {
    match value {
        value if value.is_null() => "NULL".to_owned(),
        Value::Text(text) => format!("'{}'", text.replace('\'', "''")),
        Value::Int(number) => number.to_string(),
        Value::Float(number) if number.is_finite() && number.fract() == 0.0 && number.abs() < 1e16 => {
            format!("{number:.1}")
        }
        Value::Float(number) if number.is_finite() => number.to_string(),
        Value::Float(number) if number.is_sign_positive() => "'Infinity'".to_owned(),
        Value::Float(_) => "'-Infinity'".to_owned(),
        Value::Timestamp(timestamp) => format!("'{}'", iso_datetime(timestamp)),
        Value::Time(time) => format!("'{}'", iso_time(time)),
        other => format!("'{other}'"),
    }
}

/// ISO-8601 with microseconds only when present.
fn iso_datetime(timestamp: &NaiveDateTime) -> String {
    format!("{}T{}", timestamp.format("%Y-%m-%d"), iso_time(&timestamp.time()))
}

fn iso_time(time: &NaiveTime) -> String {
    if time.nanosecond() == 0 {
        time.format("%H:%M:%S").to_string()
    } else {
        time.format("%H:%M:%S%.6f").to_string()
    }
}

/// Identifiers shared by more than one raw column name, with the names involved.
pub fn find_column_collisions(columns: &[Column]) -> Vec<(String, Vec<String>)> {
    let mut identifiers = BTreeMap::<String, Vec<String>>::new();
    for column in columns {
        identifiers.entry(normalize(&column.name)).or_default().push(column.name.to_owned());
    }
    identifiers.into_iter().filter(|(_, names)| names.len() > 1).collect()
}
