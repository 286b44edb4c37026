//! Statement builder with central quoting.
//!
//! DDL cannot take bind parameters, so role names, database names and
//! passwords have to be spliced into the SQL text. The builder keeps three
//! kinds of fragment apart:
//!
//! - keywords are `&'static str`, so nothing read from a configuration file
//!   can end up in keyword position;
//! - identifiers always go through [`escape_identifier`];
//! - secrets always go through [`escape_literal`] and are masked in the
//!   display form used for logs and dry-run output.

use postgres_protocol::escape::{escape_identifier, escape_literal};
use std::fmt;

const REDACTED: &str = "'********'";

/// A fully quoted SQL statement plus a log-safe rendering of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    sql: String,
    redacted: String,
}

impl Statement {
    /// The SQL text sent to the engine.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// The statement with secrets masked.
    pub fn redacted(&self) -> &str {
        &self.redacted
    }

    /// `CREATE USER <role> WITH PASSWORD <password>`
    pub fn create_user(role: &str, password: &str) -> Self {
        StatementBuilder::new("CREATE USER")
            .ident(role)
            .keyword("WITH PASSWORD")
            .secret(password)
            .build()
    }

    /// `ALTER USER <role> WITH PASSWORD <password>`
    pub fn alter_user_password(role: &str, password: &str) -> Self {
        StatementBuilder::new("ALTER USER")
            .ident(role)
            .keyword("WITH PASSWORD")
            .secret(password)
            .build()
    }

    /// `CREATE DATABASE <database>`
    pub fn create_database(database: &str) -> Self {
        StatementBuilder::new("CREATE DATABASE").ident(database).build()
    }

    /// `GRANT ALL PRIVILEGES ON DATABASE <database> TO <role>`
    pub fn grant_database(database: &str, role: &str) -> Self {
        StatementBuilder::new("GRANT ALL PRIVILEGES ON DATABASE")
            .ident(database)
            .keyword("TO")
            .ident(role)
            .build()
    }

    /// Schema grant plus default privileges for tables and sequences created
    /// later in `public`. Must run on a connection to the target database.
    pub fn grant_public_schema(role: &str) -> [Self; 3] {
        [
            StatementBuilder::new("GRANT ALL ON SCHEMA public TO")
                .ident(role)
                .build(),
            StatementBuilder::new("ALTER DEFAULT PRIVILEGES IN SCHEMA public GRANT ALL ON TABLES TO")
                .ident(role)
                .build(),
            StatementBuilder::new(
                "ALTER DEFAULT PRIVILEGES IN SCHEMA public GRANT ALL ON SEQUENCES TO",
            )
            .ident(role)
            .build(),
        ]
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted)
    }
}

/// Appends typed fragments, quoting each according to its kind.
#[derive(Debug, Default)]
pub struct StatementBuilder {
    sql: String,
    redacted: String,
}

impl StatementBuilder {
    pub fn new(keyword: &'static str) -> Self {
        Self::default().keyword(keyword)
    }

    pub fn keyword(self, keyword: &'static str) -> Self {
        self.push(keyword, keyword)
    }

    pub fn ident(self, name: &str) -> Self {
        let quoted = escape_identifier(name);
        self.push(&quoted, &quoted)
    }

    pub fn secret(self, value: &str) -> Self {
        // escape_literal prefixes " E" when the value contains backslashes
        let quoted = escape_literal(value);
        self.push(quoted.trim_start(), REDACTED)
    }

    pub fn build(self) -> Statement {
        Statement {
            sql: self.sql,
            redacted: self.redacted,
        }
    }

    fn push(mut self, sql: &str, redacted: &str) -> Self {
        if !self.sql.is_empty() {
            self.sql.push(' ');
            self.redacted.push(' ');
        }
        self.sql.push_str(sql);
        self.redacted.push_str(redacted);
        self
    }
}
