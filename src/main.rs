use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use sheet2pg::config::ConnectionDescriptor;
use sheet2pg::config::ConversionRequest;
use sheet2pg::config::DEFAULT_DATABASE_NAME;
use sheet2pg::config::DEFAULT_HOST;
use sheet2pg::config::DEFAULT_PORT;
use sheet2pg::config::DEFAULT_TABLE_NAME;
use sheet2pg::database::dataset::Dataset;
use sheet2pg::database::pg::PgConnector;
use sheet2pg::database::statement::generate_statements;
use sheet2pg::error::Sheet2PgError;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sheet2pg")]
#[command(about = "Load an Excel sheet into a new PostgreSQL database", long_about = None)]
struct Cli {
    /// Excel workbook (.xlsx)
    file: PathBuf,

    /// Database server host
    #[arg(long, env = "SHEET2PG_HOST", default_value = DEFAULT_HOST)]
    host: String,

    /// Database server port
    #[arg(long, env = "SHEET2PG_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Database user
    #[arg(long, env = "SHEET2PG_USER", default_value = "")]
    user: String,

    /// Database password
    #[arg(long, env = "SHEET2PG_PASSWORD", default_value = "", hide_env_values = true)]
    password: String,

    /// Name of the database to create
    #[arg(long, default_value = DEFAULT_DATABASE_NAME)]
    database: String,

    /// Name of the table to create
    #[arg(long, default_value = DEFAULT_TABLE_NAME)]
    table: String,

    /// Sheet to read (default: first sheet)
    #[arg(long)]
    sheet: Option<String>,

    /// Number of rows shown before converting
    #[arg(long, default_value = "5")]
    preview_rows: usize,

    /// Print the generated statements instead of executing them
    #[arg(long, default_value = "false")]
    dry_run: bool,

    /// Fail when several columns normalize to the same identifier
    #[arg(long, default_value = "false")]
    strict_columns: bool,
}

impl Cli {
    fn request(&self) -> ConversionRequest {
        ConversionRequest {
            connection: ConnectionDescriptor {
                host: self.host.to_owned(),
                port: self.port,
                user: self.user.to_owned(),
                password: self.password.to_owned(),
                database_name: self.database.to_owned(),
                table_name: self.table.to_owned(),
            },
            strict_columns: self.strict_columns,
        }
    }

    fn execute(self) -> Result<()> {
        let file_name = self.file.to_str().context("file name is not valid UTF-8")?;
        let dataset = sheet2pg::load_dataset(file_name, self.sheet.as_deref())?;
        print_preview(&dataset, self.preview_rows);

        let request = self.request();
        if self.dry_run {
            for statement in generate_statements(&dataset, &request.connection.table_name) {
                println!("{statement}");
            }
            return Ok(());
        }

        let connector = PgConnector::new(&request.connection);
        let report = sheet2pg::convert(&connector, &request, &dataset)?;
        tracing::info!(statements = report.statements_executed, "conversion finished");
        println!(
            "Data successfully inserted into {}.{}",
            report.database, request.connection.table_name
        );
        Ok(())
    }
}

fn print_preview(dataset: &Dataset, rows: usize) {
    if rows == 0 {
        return;
    }
    println!("Preview of the Excel data:");
    let header: Vec<&str> = dataset.columns().iter().map(|column| column.name.as_str()).collect();
    println!("{}", header.join(" | "));
    for row in dataset.preview(rows) {
        let values: Vec<String> = row.iter().map(ToString::to_string).collect();
        println!("{}", values.join(" | "));
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();
    match cli.execute() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{}", user_message(&error));
            ExitCode::FAILURE
        }
    }
}

/// The line shown on failure. Request errors read as-is; anything else carries the
/// underlying message once, unprefixed by its causes.
fn user_message(error: &anyhow::Error) -> String {
    match error.downcast_ref::<Sheet2PgError>() {
        Some(Sheet2PgError::ConfigError(config)) => config.to_string(),
        _ => format!("An error occurred: {error}"),
    }
}
