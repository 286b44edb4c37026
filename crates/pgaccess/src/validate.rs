//! Document validation, run before any connection is opened.

use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::types::DesiredState;

/// PostgreSQL truncates identifiers longer than this (NAMEDATALEN - 1).
/// A truncated name would never match its own existence check.
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Reject documents that cannot be converged safely.
pub fn validate(state: &DesiredState) -> Result<()> {
    check_identifier("postgres.admin.user", &state.admin.user)?;
    check_identifier("postgres.admin.database", &state.admin.database)?;
    check_secret("postgres.admin.password", &state.admin.password, true)?;

    let mut names = HashSet::new();
    for (i, user) in state.users.iter().enumerate() {
        let field = format!("postgres.users[{i}]");
        check_identifier(&format!("{field}.name"), &user.name)?;
        check_secret(&format!("{field}.password"), &user.password, false)?;

        if !names.insert(user.name.as_str()) {
            return Err(Error::DuplicateUser(user.name.clone()));
        }

        for (j, db) in user.databases.iter().enumerate() {
            check_identifier(&format!("{field}.databases[{j}]"), db)?;
        }
    }

    Ok(())
}

fn check_identifier(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::invalid(field, "must not be empty"));
    }
    if value.contains('\0') {
        return Err(Error::invalid(field, "must not contain NUL bytes"));
    }
    if value.len() > MAX_IDENTIFIER_LEN {
        return Err(Error::invalid(
            field,
            format!(
                "{} bytes exceeds the {MAX_IDENTIFIER_LEN}-byte identifier limit",
                value.len()
            ),
        ));
    }
    Ok(())
}

fn check_secret(field: &str, value: &str, allow_empty: bool) -> Result<()> {
    if !allow_empty && value.is_empty() {
        return Err(Error::invalid(field, "must not be empty"));
    }
    if value.contains('\0') {
        return Err(Error::invalid(field, "must not contain NUL bytes"));
    }
    Ok(())
}
