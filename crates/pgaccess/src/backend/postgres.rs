//! Backend using the synchronous `postgres` client.

use native_tls::TlsConnector;
use postgres::config::SslMode as PgSslMode;
use postgres::{Client, Config};
use postgres_native_tls::MakeTlsConnector;

use crate::backend::{Connector, Session};
use crate::error::{Error, Result, error_chain};
use crate::statement::Statement;
use crate::types::{AdminCredentials, ConnectionSettings, SslMode};

/// Connects as the admin role using resolved connection settings.
pub struct PostgresConnector {
    settings: ConnectionSettings,
    admin: AdminCredentials,
}

impl PostgresConnector {
    pub fn new(settings: ConnectionSettings, admin: AdminCredentials) -> Self {
        Self { settings, admin }
    }

    fn config_for(&self, database: &str) -> Config {
        let mut config = Config::new();
        config
            .host(&self.settings.host)
            .port(self.settings.port)
            .user(&self.admin.user)
            .password(&self.admin.password)
            .dbname(database)
            .ssl_mode(to_pg_ssl_mode(self.settings.ssl_mode))
            .connect_timeout(self.settings.connect_timeout)
            .application_name("kaloupile");
        config
    }
}

impl Connector for PostgresConnector {
    fn connect(&self, database: &str) -> Result<Box<dyn Session>> {
        if database.is_empty() {
            return Err(Error::invalid("database", "database name is empty"));
        }

        log::debug!(
            "Connecting to {}:{}/{} as {} (sslmode={})",
            self.settings.host,
            self.settings.port,
            database,
            self.admin.user,
            self.settings.ssl_mode
        );

        let connect_err = |message: String| Error::Connect {
            database: database.to_string(),
            message,
        };

        let tls = tls_connector().map_err(|e| connect_err(error_chain(&e)))?;
        let client = self
            .config_for(database)
            .connect(tls)
            .map_err(|e| connect_err(error_chain(&e)))?;

        let mut session = PostgresSession {
            client,
            database: database.to_string(),
        };
        session
            .client
            .simple_query("SELECT 1")
            .map_err(|e| connect_err(error_chain(&e)))?;

        Ok(Box::new(session))
    }
}

/// TLS for `prefer` and `require`. Like libpq's `require`, the channel is
/// encrypted but the server certificate and hostname are not verified.
fn tls_connector() -> std::result::Result<MakeTlsConnector, native_tls::Error> {
    let connector = TlsConnector::builder()
        .danger_accept_invalid_certs(true)
        .danger_accept_invalid_hostnames(true)
        .build()?;
    Ok(MakeTlsConnector::new(connector))
}

fn to_pg_ssl_mode(mode: SslMode) -> PgSslMode {
    match mode {
        SslMode::Disable => PgSslMode::Disable,
        SslMode::Prefer => PgSslMode::Prefer,
        SslMode::Require => PgSslMode::Require,
    }
}

/// A live connection to one database.
pub struct PostgresSession {
    client: Client,
    database: String,
}

impl Session for PostgresSession {
    fn database(&self) -> &str {
        &self.database
    }

    fn role_exists(&mut self, role: &str) -> Result<bool> {
        let row = self
            .client
            .query_opt("SELECT 1 FROM pg_roles WHERE rolname = $1", &[&role])?;
        Ok(row.is_some())
    }

    fn database_exists(&mut self, database: &str) -> Result<bool> {
        let row = self
            .client
            .query_opt("SELECT 1 FROM pg_database WHERE datname = $1", &[&database])?;
        Ok(row.is_some())
    }

    fn execute(&mut self, statement: &Statement) -> Result<()> {
        // Simple query protocol: CREATE DATABASE refuses to run inside a
        // transaction block.
        self.client.batch_execute(statement.sql())?;
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<()> {
        log::debug!("Closing connection to {}", self.database);
        self.client.close()?;
        Ok(())
    }
}
