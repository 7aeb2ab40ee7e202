//! PostgreSQL implementation of the connector seam.
use crate::config::ConnectionDescriptor;
use crate::database::executor::Connector;
use crate::database::executor::DriverError;
use crate::database::executor::Session;
use postgres::Client;
use postgres::Config;
use postgres::NoTls;
use tracing::debug;

/// Connects to databases of one PostgreSQL server with fixed credentials.
#[derive(Clone)]
pub struct PgConnector {
    host: String,
    port: u16,
    user: String,
    password: String,
}

impl PgConnector {
    pub fn new(descriptor: &ConnectionDescriptor) -> Self {
        PgConnector {
            host: descriptor.host.to_owned(),
            port: descriptor.port,
            user: descriptor.user.to_owned(),
            password: descriptor.password.to_owned(),
        }
    }

    fn config(&self, database: &str) -> Config {
        let mut config = Config::new();
        config
            .host(&self.host)
            .port(self.port)
            .user(&self.user)
            .password(&self.password)
            .dbname(database);
        config
    }
}

impl Connector for PgConnector {
    type Session = PgSession;

    fn connect(&self, database: &str) -> Result<PgSession, DriverError> {
        debug!(host = %self.host, port = self.port, database, "opening connection");
        let client = self.config(database).connect(NoTls)?;
        Ok(PgSession { client })
    }
}

/// A client running each statement through the simple query protocol, which
/// commits every statement on its own.
pub struct PgSession {
    client: Client,
}

impl Session for PgSession {
    fn execute(&mut self, sql: &str) -> Result<(), DriverError> {
        self.client.batch_execute(sql)?;
        Ok(())
    }

    fn close(self) -> Result<(), DriverError> {
        self.client.close()?;
        Ok(())
    }
}
