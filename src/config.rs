//! Connection details and options for one conversion.
use std::fmt::Debug;
use thiserror::Error;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 5432;
pub const DEFAULT_DATABASE_NAME: &str = "your_database_name";
pub const DEFAULT_TABLE_NAME: &str = "your_table_name";

/// Errors raised while validating a conversion request.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Please provide both username and password.")]
    MissingCredentials,
}

/// Where the data goes and with which credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Database to create
    pub database_name: String,
    /// Table to create inside the new database
    pub table_name: String,
}

impl Default for ConnectionDescriptor {
    fn default() -> Self {
        ConnectionDescriptor {
            host: DEFAULT_HOST.to_owned(),
            port: DEFAULT_PORT,
            user: String::new(),
            password: String::new(),
            database_name: DEFAULT_DATABASE_NAME.to_owned(),
            table_name: DEFAULT_TABLE_NAME.to_owned(),
        }
    }
}

// The password never reaches logs.
impl Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionDescriptor")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"********")
            .field("database_name", &self.database_name)
            .field("table_name", &self.table_name)
            .finish()
    }
}

impl ConnectionDescriptor {
    /// Both user and password must be non-empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.user.is_empty() || self.password.is_empty() {
            return Err(ConfigError::MissingCredentials);
        }
        Ok(())
    }
}

/// A full conversion request: target connection plus generation options.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConversionRequest {
    pub connection: ConnectionDescriptor,
    /// Fail instead of warn when several columns normalize to the same identifier
    pub strict_columns: bool,
}

impl ConversionRequest {
    pub fn new(connection: ConnectionDescriptor) -> Self {
        ConversionRequest { connection, strict_columns: false }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.connection.validate()
    }
}
