//! Backend abstraction for engine access.
//!
//! The reconciler only needs two existence checks and a way to run a
//! statement, so the [`Session`] trait is deliberately small. A
//! [`Connector`] opens sessions scoped to one database; the reconciler asks
//! for one per target database because schema grants and default privileges
//! are only settable from inside that database.

pub mod postgres;

use crate::error::Result;
use crate::statement::Statement;

/// An open connection to one database.
pub trait Session {
    /// Name of the database this session is connected to.
    fn database(&self) -> &str;

    /// Whether a role with this exact name exists.
    fn role_exists(&mut self, role: &str) -> Result<bool>;

    /// Whether a database with this exact name exists.
    fn database_exists(&mut self, database: &str) -> Result<bool>;

    /// Run a single statement outside of an explicit transaction.
    fn execute(&mut self, statement: &Statement) -> Result<()>;

    /// Release the connection. Called exactly once per session.
    fn close(self: Box<Self>) -> Result<()>;
}

/// Opens sessions with the administrative credentials.
pub trait Connector {
    /// Connect to `database` and verify the connection is usable.
    fn connect(&self, database: &str) -> Result<Box<dyn Session>>;
}
