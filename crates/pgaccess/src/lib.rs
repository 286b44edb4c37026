//! # pgaccess
//!
//! Converges PostgreSQL login roles, databases and privileges to match a
//! declarative document.
//!
//! The engine may be in any starting state: fresh, already converged, or
//! left half-done by a failed run. Every object is checked before it is
//! created, so running the same document again is always safe and picks up
//! where a failed run stopped. Convergence is additive: roles and databases
//! missing from the document are left alone.
//!
//! ## Example
//!
//! ```no_run
//! use pgaccess::backend::postgres::PostgresConnector;
//! use pgaccess::{AdminCredentials, ConnectionSettings, DesiredState, SyncOptions, UserSpec};
//!
//! let admin = AdminCredentials {
//!     user: "admin".into(),
//!     password: "p1".into(),
//!     database: "postgres".into(),
//! };
//! let state = DesiredState::new(
//!     admin.clone(),
//!     vec![UserSpec::new("alice", "secret", &["app"])],
//! )?;
//!
//! let connector = PostgresConnector::new(ConnectionSettings::default(), admin);
//! let report = pgaccess::sync(&connector, &state, SyncOptions::default())?;
//! println!("created {} objects", report.created());
//! # Ok::<(), pgaccess::Error>(())
//! ```
//!
//! ## Quoting
//!
//! Names and passwords are never concatenated into SQL directly; see
//! [`statement`] for how identifiers and literals are kept apart.

#![deny(unsafe_code)]
#![warn(clippy::all)]

/// Session and connector traits plus the `postgres` implementation.
pub mod backend;
/// Error types and categories.
pub mod error;
/// The convergence algorithm.
pub mod reconcile;
/// Typed statement construction.
pub mod statement;
/// Desired-state and connection types.
pub mod types;
/// Document validation.
pub mod validate;

pub use backend::{Connector, Session};
pub use error::{Error, ErrorCategory, Result};
pub use reconcile::{Reconciler, sync};
pub use statement::Statement;
pub use types::{
    AdminCredentials, ConnectionSettings, DesiredState, SslMode, SyncOptions, SyncReport,
    UserSpec,
};
