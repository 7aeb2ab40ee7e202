//! Provisioning: create the target database through the administrative database,
//! then run every statement against the new database, in order.
use crate::database::statement::Statement;
use thiserror::Error;
use tracing::debug;
use tracing::info;
use tracing::warn;

/// The engine's default database, used only to issue `CREATE DATABASE`.
pub const ADMIN_DATABASE: &str = "postgres";

/// Error reported by a database driver.
pub type DriverError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// An open connection to one database. Each `execute` commits on its own.
pub trait Session {
    fn execute(&mut self, sql: &str) -> Result<(), DriverError>;

    fn close(self) -> Result<(), DriverError>;
}

/// Opens sessions against databases of one server.
pub trait Connector {
    type Session: Session;

    fn connect(&self, database: &str) -> Result<Self::Session, DriverError>;
}

/// Provisioning failure. Displays exactly the driver's message; the step that
/// failed is kept in the variant. The driver error is not chained as a source,
/// so reporting the whole chain prints the message once.
#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("{cause}")]
    Connect { database: String, cause: DriverError },

    #[error("{cause}")]
    CreateDatabase { database: String, cause: DriverError },

    #[error("{cause}")]
    Execute { index: usize, cause: DriverError },
}

/// Outcome of a successful provisioning run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProvisionReport {
    pub database: String,
    pub statements_executed: usize,
}

/// Quotes an identifier: wrapped in double quotes, embedded double quotes doubled.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Creates `database_name` and applies `statements` to it.
///
/// Steps run strictly in sequence with no rollback: a failure stops the remaining
/// statements and leaves earlier ones committed. Every session is closed before the
/// next one is opened, on error paths too.
pub fn provision_and_apply<C: Connector>(
    connector: &C,
    database_name: &str,
    statements: &[Statement],
) -> Result<ProvisionReport, ProvisionError> {
    info!(database = ADMIN_DATABASE, "connecting to administrative database");
    let mut admin = connector
        .connect(ADMIN_DATABASE)
        .map_err(|cause| ProvisionError::Connect { database: ADMIN_DATABASE.to_owned(), cause })?;
    let created = admin.execute(&format!("CREATE DATABASE {}", quote_identifier(database_name)));
    close(admin, ADMIN_DATABASE);
    created.map_err(|cause| ProvisionError::CreateDatabase { database: database_name.to_owned(), cause })?;
    info!(database = database_name, "database created");

    let mut session = connector
        .connect(database_name)
        .map_err(|cause| ProvisionError::Connect { database: database_name.to_owned(), cause })?;
    for (index, statement) in statements.iter().enumerate() {
        debug!(index, sql = statement.sql(), "executing statement");
        if let Err(cause) = session.execute(statement.sql()) {
            warn!(index, "statement failed, remaining statements skipped");
            close(session, database_name);
            return Err(ProvisionError::Execute { index, cause });
        }
    }
    close(session, database_name);
    info!(database = database_name, statements = statements.len(), "statements applied");

    Ok(ProvisionReport {
        database: database_name.to_owned(),
        statements_executed: statements.len(),
    })
}

/// Releases a session. A failure here cannot undo anything already done, so it is logged only.
fn close<S: Session>(session: S, database: &str) {
    if let Err(error) = session.close() {
        warn!(database, %error, "closing connection failed");
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Records every driver call and fails on request.
    #[derive(Default)]
    pub(crate) struct MockConnector {
        pub(crate) events: Rc<RefCell<Vec<String>>>,
        pub(crate) open: Rc<RefCell<usize>>,
        pub(crate) fail_connect: Option<String>,
        pub(crate) fail_execute: Option<(String, String)>,
    }

    pub(crate) struct MockSession {
        database: String,
        events: Rc<RefCell<Vec<String>>>,
        open: Rc<RefCell<usize>>,
        fail_execute: Option<(String, String)>,
    }

    impl MockConnector {
        /// Fails the first statement containing `pattern` with `message`.
        pub(crate) fn failing_on(pattern: &str, message: &str) -> Self {
            MockConnector {
                fail_execute: Some((pattern.to_owned(), message.to_owned())),
                ..Default::default()
            }
        }

        pub(crate) fn events(&self) -> Vec<String> {
            self.events.borrow().clone()
        }
    }

    impl Connector for MockConnector {
        type Session = MockSession;

        fn connect(&self, database: &str) -> Result<MockSession, DriverError> {
            self.events.borrow_mut().push(format!("connect {database}"));
            if self.fail_connect.as_deref() == Some(database) {
                return Err(format!("connection to {database} refused").into());
            }
            let mut open = self.open.borrow_mut();
            assert_eq!(*open, 0, "a session is already open");
            *open += 1;
            Ok(MockSession {
                database: database.to_owned(),
                events: self.events.clone(),
                open: self.open.clone(),
                fail_execute: self.fail_execute.clone(),
            })
        }
    }

    impl Session for MockSession {
        fn execute(&mut self, sql: &str) -> Result<(), DriverError> {
            self.events.borrow_mut().push(format!("execute {sql}"));
            match &self.fail_execute {
                Some((pattern, message)) if sql.contains(pattern.as_str()) => Err(message.to_owned().into()),
                _ => Ok(()),
            }
        }

        fn close(self) -> Result<(), DriverError> {
            *self.open.borrow_mut() -= 1;
            self.events.borrow_mut().push(format!("close {}", self.database));
            Ok(())
        }
    }

    fn statements() -> Vec<Statement> {
        vec![
            Statement::CreateTable(r#"CREATE TABLE IF NOT EXISTS "t" ("a" INTEGER);"#.to_owned()),
            Statement::Insert(r#"INSERT INTO "t" ("a") VALUES (1);"#.to_owned()),
            Statement::Insert(r#"INSERT INTO "t" ("a") VALUES (2);"#.to_owned()),
        ]
    }

    #[test]
    fn identifiers_are_quoted() {
        assert_eq!(quote_identifier("sales"), r#""sales""#);
        assert_eq!(quote_identifier(r#"my "db""#), r#""my ""db""""#);
    }

    #[test]
    fn applies_statements_in_order() {
        let connector = MockConnector::default();
        let report = provision_and_apply(&connector, "sales", &statements()).unwrap();
        assert_eq!(report, ProvisionReport { database: "sales".to_owned(), statements_executed: 3 });
        assert_eq!(
            connector.events(),
            vec![
                "connect postgres",
                r#"execute CREATE DATABASE "sales""#,
                "close postgres",
                "connect sales",
                r#"execute CREATE TABLE IF NOT EXISTS "t" ("a" INTEGER);"#,
                r#"execute INSERT INTO "t" ("a") VALUES (1);"#,
                r#"execute INSERT INTO "t" ("a") VALUES (2);"#,
                "close sales",
            ]
        );
        assert_eq!(*connector.open.borrow(), 0);
    }

    #[test]
    fn create_database_failure_stops_everything() {
        let connector = MockConnector::failing_on("CREATE DATABASE", r#"database "sales" already exists"#);
        let error = provision_and_apply(&connector, "sales", &statements()).unwrap_err();
        assert_eq!(error.to_string(), r#"database "sales" already exists"#);
        assert!(matches!(error, ProvisionError::CreateDatabase { .. }));
        assert!(std::error::Error::source(&error).is_none());
        assert_eq!(
            connector.events(),
            vec!["connect postgres", r#"execute CREATE DATABASE "sales""#, "close postgres"]
        );
    }

    #[test]
    fn statement_failure_halts_remaining() {
        let connector = MockConnector::failing_on("VALUES (1)", "invalid input syntax for type integer");
        let error = provision_and_apply(&connector, "sales", &statements()).unwrap_err();
        assert_eq!(error.to_string(), "invalid input syntax for type integer");
        assert!(matches!(error, ProvisionError::Execute { index: 1, .. }));
        let events = connector.events();
        assert_eq!(events.last().map(String::as_str), Some("close sales"));
        assert!(!events.iter().any(|event| event.contains("VALUES (2)")));
        assert_eq!(*connector.open.borrow(), 0);
    }

    #[test]
    fn connection_failure_is_surfaced() {
        let connector = MockConnector {
            fail_connect: Some("postgres".to_owned()),
            ..Default::default()
        };
        let error = provision_and_apply(&connector, "sales", &statements()).unwrap_err();
        assert_eq!(error.to_string(), "connection to postgres refused");
        assert_eq!(connector.events(), vec!["connect postgres"]);
    }

    #[test]
    fn target_connection_failure_after_create() {
        let connector = MockConnector {
            fail_connect: Some("sales".to_owned()),
            ..Default::default()
        };
        let error = provision_and_apply(&connector, "sales", &statements()).unwrap_err();
        assert!(matches!(error, ProvisionError::Connect { ref database, .. } if database == "sales"));
        assert_eq!(connector.events().len(), 4);
    }
}
