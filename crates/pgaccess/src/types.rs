//! Desired-state and connection types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};

/// Bootstrap administrative credentials for the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminCredentials {
    pub user: String,
    pub password: String,
    pub database: String,
}

impl AdminCredentials {
    /// Labelled fields in a fixed order, for fingerprinting.
    pub fn fingerprint_fields(&self) -> [(&'static str, &str); 3] {
        [
            ("user", self.user.as_str()),
            ("password", self.password.as_str()),
            ("database", self.database.as_str()),
        ]
    }
}

/// A login role and the databases it should have full access to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSpec {
    pub name: String,
    pub password: String,
    #[serde(default)]
    pub databases: Vec<String>,
}

impl UserSpec {
    pub fn new(name: &str, password: &str, databases: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            password: password.to_string(),
            databases: databases.iter().map(|d| (*d).to_string()).collect(),
        }
    }
}

/// The whole postgres document: admin credentials plus ordered users.
///
/// Build it through [`DesiredState::new`] so the document is validated and
/// each user's database list is deduplicated before anything touches the
/// engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredState {
    pub admin: AdminCredentials,
    pub users: Vec<UserSpec>,
}

impl DesiredState {
    pub fn new(admin: AdminCredentials, users: Vec<UserSpec>) -> Result<Self> {
        let state = Self { admin, users }.normalized();
        crate::validate::validate(&state)?;
        Ok(state)
    }

    /// Collapse repeated database names per user, keeping first-seen order.
    fn normalized(mut self) -> Self {
        for user in &mut self.users {
            let mut seen = std::collections::HashSet::new();
            user.databases.retain(|db| seen.insert(db.clone()));
        }
        self
    }
}

/// SSL negotiation mode for engine connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SslMode {
    #[default]
    Disable,
    Prefer,
    Require,
}

impl FromStr for SslMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disable" => Ok(Self::Disable),
            "prefer" => Ok(Self::Prefer),
            "require" => Ok(Self::Require),
            other => Err(Error::invalid(
                "sslmode",
                format!("unsupported value {other:?} (expected disable, prefer or require)"),
            )),
        }
    }
}

impl fmt::Display for SslMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disable => "disable",
            Self::Prefer => "prefer",
            Self::Require => "require",
        };
        f.write_str(s)
    }
}

/// Where and how to reach the engine. Resolved once per run by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub host: String,
    pub port: u16,
    pub ssl_mode: SslMode,
    pub connect_timeout: Duration,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            ssl_mode: SslMode::Disable,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Options for a reconciliation run.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Only run existence checks; record mutations instead of executing them
    pub dry_run: bool,
}

/// What a reconciliation run did (or, in dry-run, would do).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub roles_created: Vec<String>,
    pub roles_updated: Vec<String>,
    pub databases_created: Vec<String>,
    /// Number of grant / default-privilege statements issued
    pub grants: usize,
    /// Redacted statements in execution order (dry-run only)
    pub planned: Vec<String>,
}

impl SyncReport {
    /// Objects that did not exist before this run.
    pub fn created(&self) -> usize {
        self.roles_created.len() + self.databases_created.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin() -> AdminCredentials {
        AdminCredentials {
            user: "admin".into(),
            password: "p1".into(),
            database: "postgres".into(),
        }
    }

    #[test]
    fn test_ssl_mode_parse() {
        assert_eq!("disable".parse::<SslMode>().unwrap(), SslMode::Disable);
        assert_eq!(" Require ".parse::<SslMode>().unwrap(), SslMode::Require);
        assert!("verify-full".parse::<SslMode>().is_err());
        assert_eq!(SslMode::Prefer.to_string(), "prefer");
    }

    #[test]
    fn test_databases_deduplicated_in_order() {
        let state = DesiredState::new(
            admin(),
            vec![UserSpec::new("alice", "secret", &["app", "audit", "app"])],
        )
        .unwrap();
        assert_eq!(state.users[0].databases, vec!["app", "audit"]);
    }

    #[test]
    fn test_fingerprint_fields_order() {
        let admin = admin();
        let fields = admin.fingerprint_fields();
        assert_eq!(fields[0], ("user", "admin"));
        assert_eq!(fields[1], ("password", "p1"));
        assert_eq!(fields[2], ("database", "postgres"));
    }
}
