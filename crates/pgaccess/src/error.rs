//! Error types for access reconciliation.
//!
//! Errors are grouped into four categories so the caller can tell a bad
//! document from an unreachable engine, an inconclusive existence check, or a
//! rejected mutation. Every variant names the object it was working on.

use thiserror::Error;

/// Broad classes of reconciliation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Desired state is missing required fields or is inconsistent.
    /// Detected before any statement reaches the engine.
    Configuration,
    /// The engine could not be reached.
    Connectivity,
    /// An existence check failed for a reason other than "not found".
    StateQuery,
    /// A create/alter/grant statement was rejected.
    Mutation,
}

impl ErrorCategory {
    /// Whether objects may have been changed before this error surfaced.
    pub fn may_be_partial(&self) -> bool {
        matches!(self, Self::StateQuery | Self::Mutation)
    }

    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Configuration => "Invalid configuration",
            Self::Connectivity => "Database unreachable",
            Self::StateQuery => "Could not inspect database state",
            Self::Mutation => "Database change rejected",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Configuration => "Fix the postgres section of the configuration file",
            Self::Connectivity => "Check PGHOST/PGPORT and that the database is running",
            Self::StateQuery => "Check the admin role can read pg_roles and pg_database",
            Self::Mutation => "Fix the cause and re-run; converged objects are kept",
        }
    }
}

/// Errors that can occur while reconciling roles, databases and grants.
#[derive(Debug, Error)]
pub enum Error {
    /// A field of the desired state is missing or malformed
    #[error("invalid config {field}: {message}")]
    InvalidConfig {
        /// Dotted path of the offending field
        field: String,
        /// What is wrong with it
        message: String,
    },

    /// The same user name appears more than once
    #[error("duplicate user in config: {0}")]
    DuplicateUser(String),

    /// Opening or pinging a connection failed
    #[error("connect database {database}: {message}")]
    Connect {
        /// Database the connection targeted
        database: String,
        /// Driver error message
        message: String,
    },

    /// An existence check could not be answered
    #[error("{operation} {object}: {message}")]
    StateQuery {
        /// What was being checked (e.g. "check role")
        operation: &'static str,
        /// Role or database name
        object: String,
        /// Driver error message
        message: String,
    },

    /// `CREATE USER` failed
    #[error("create user {role}: {message}")]
    RoleCreate {
        /// Role being created
        role: String,
        /// Driver error message
        message: String,
    },

    /// `ALTER USER ... PASSWORD` failed
    #[error("update user {role}: {message}")]
    RoleAlter {
        /// Role being updated
        role: String,
        /// Driver error message
        message: String,
    },

    /// `CREATE DATABASE` failed
    #[error("create database {database}: {message}")]
    DatabaseCreate {
        /// Database being created
        database: String,
        /// Driver error message
        message: String,
    },

    /// A `GRANT` or `ALTER DEFAULT PRIVILEGES` statement failed
    #[error("grant {target} to {role}: {message}")]
    Grant {
        /// Object the privilege is on (database or schema)
        target: String,
        /// Grantee
        role: String,
        /// Driver error message
        message: String,
    },

    /// Unclassified failure reported by a backend
    #[error("{0}")]
    Driver(String),
}

impl Error {
    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidConfig { .. } | Error::DuplicateUser(_) => ErrorCategory::Configuration,
            Error::Connect { .. } => ErrorCategory::Connectivity,
            Error::StateQuery { .. } => ErrorCategory::StateQuery,
            Error::RoleCreate { .. }
            | Error::RoleAlter { .. }
            | Error::DatabaseCreate { .. }
            | Error::Grant { .. }
            | Error::Driver(_) => ErrorCategory::Mutation,
        }
    }

    pub(crate) fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }

    pub(crate) fn state_query(operation: &'static str, object: &str, cause: &Error) -> Self {
        Error::StateQuery {
            operation,
            object: object.to_string(),
            message: cause.to_string(),
        }
    }
}

impl From<postgres::Error> for Error {
    fn from(err: postgres::Error) -> Self {
        match err.as_db_error() {
            Some(db) => Error::Driver(format!("{}: {}", db.code().code(), db.message())),
            None => Error::Driver(err.to_string()),
        }
    }
}

/// Render an error followed by each cause not already in its message.
pub(crate) fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

/// Result type for access reconciliation.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        assert_eq!(
            Error::DuplicateUser("alice".into()).category(),
            ErrorCategory::Configuration
        );
        assert_eq!(
            Error::Connect {
                database: "app".into(),
                message: "refused".into()
            }
            .category(),
            ErrorCategory::Connectivity
        );

        let cause = Error::Driver("permission denied".into());
        let query = Error::state_query("check role", "alice", &cause);
        assert_eq!(query.category(), ErrorCategory::StateQuery);
        assert!(query.category().may_be_partial());
        assert!(!ErrorCategory::Configuration.may_be_partial());
    }

    #[derive(Debug)]
    struct Layer(&'static str, Option<Box<Layer>>);

    impl std::fmt::Display for Layer {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(self.0)
        }
    }

    impl std::error::Error for Layer {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            self.1.as_deref().map(|e| e as _)
        }
    }

    #[test]
    fn test_error_chain_includes_causes() {
        let err = Layer(
            "error performing TLS handshake",
            Some(Box::new(Layer("certificate expired", None))),
        );
        assert_eq!(
            error_chain(&err),
            "error performing TLS handshake: certificate expired"
        );

        // causes already in the message are not repeated
        let err = Layer("db error: boom", Some(Box::new(Layer("boom", None))));
        assert_eq!(error_chain(&err), "db error: boom");
    }

    #[test]
    fn test_messages_name_the_object() {
        let err = Error::DatabaseCreate {
            database: "app".into(),
            message: "42P04: database \"app\" already exists".into(),
        };
        assert_eq!(
            err.to_string(),
            "create database app: 42P04: database \"app\" already exists"
        );

        let cause = Error::Driver("timeout".into());
        assert_eq!(
            Error::state_query("check database", "app", &cause).to_string(),
            "check database app: timeout"
        );
    }
}
