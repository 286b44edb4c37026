//! Role, database and grant convergence.
//!
//! Each user is converged in document order: role, then for each of its
//! databases the database itself, the database grant, and the schema grants
//! issued from a connection to that database. Every step checks existence
//! first, so a run that stopped halfway is resumed by running again. Nothing
//! outside the document is ever dropped.

use std::collections::{BTreeMap, HashSet};
use std::collections::btree_map::Entry;

use crate::backend::{Connector, Session};
use crate::error::{Error, Result};
use crate::statement::Statement;
use crate::types::{DesiredState, SyncOptions, SyncReport, UserSpec};

/// Converges users against an admin session.
pub struct Reconciler<'a> {
    connector: &'a dyn Connector,
    options: SyncOptions,
}

impl<'a> Reconciler<'a> {
    pub fn new(connector: &'a dyn Connector, options: SyncOptions) -> Self {
        Self { connector, options }
    }

    /// Converge `users` using `admin` for catalog queries and cluster-wide
    /// statements. Per-database sessions are opened lazily and are all
    /// closed before this returns, whether it succeeds or not.
    pub fn converge(&self, admin: &mut dyn Session, users: &[UserSpec]) -> Result<SyncReport> {
        let mut pool = SessionPool::new(self.connector);
        let mut run = Run {
            dry_run: self.options.dry_run,
            report: SyncReport::default(),
            planned_databases: HashSet::new(),
        };

        let result = run.converge_users(admin, &mut pool, users);
        let closed = pool.close_all();

        result?;
        closed?;
        Ok(run.report)
    }
}

/// Open an admin session, converge every user, and close the session.
pub fn sync(
    connector: &dyn Connector,
    state: &DesiredState,
    options: SyncOptions,
) -> Result<SyncReport> {
    let mut admin = connector.connect(&state.admin.database)?;
    let result = Reconciler::new(connector, options).converge(&mut *admin, &state.users);
    let closed = admin.close();

    let report = result?;
    closed?;
    Ok(report)
}

struct Run {
    dry_run: bool,
    report: SyncReport,
    /// Databases a dry run has already planned to create
    planned_databases: HashSet<String>,
}

impl Run {
    fn converge_users(
        &mut self,
        admin: &mut dyn Session,
        pool: &mut SessionPool<'_>,
        users: &[UserSpec],
    ) -> Result<()> {
        for user in users {
            self.converge_user(admin, pool, user)?;
        }
        Ok(())
    }

    fn converge_user(
        &mut self,
        admin: &mut dyn Session,
        pool: &mut SessionPool<'_>,
        user: &UserSpec,
    ) -> Result<()> {
        self.converge_role(admin, user)?;

        for database in &user.databases {
            self.converge_database(admin, database)?;

            let grant = Statement::grant_database(database, &user.name);
            self.apply(admin, &grant)
                .map_err(|e| grant_error(format!("database {database}"), user, &e))?;
            self.report.grants += 1;

            self.grant_schema(pool, database, user)?;
            log::info!(
                "{} {} access to database {}",
                self.verb("Granted", "Would grant"),
                user.name,
                database
            );
        }

        Ok(())
    }

    fn converge_role(&mut self, admin: &mut dyn Session, user: &UserSpec) -> Result<()> {
        let exists = admin
            .role_exists(&user.name)
            .map_err(|e| Error::state_query("check user", &user.name, &e))?;

        if exists {
            // No way to read a password back, so the document always wins.
            let stmt = Statement::alter_user_password(&user.name, &user.password);
            self.apply(admin, &stmt).map_err(|e| Error::RoleAlter {
                role: user.name.clone(),
                message: e.to_string(),
            })?;
            log::info!(
                "{} password for user {}",
                self.verb("Updated", "Would update"),
                user.name
            );
            self.report.roles_updated.push(user.name.clone());
        } else {
            let stmt = Statement::create_user(&user.name, &user.password);
            self.apply(admin, &stmt).map_err(|e| Error::RoleCreate {
                role: user.name.clone(),
                message: e.to_string(),
            })?;
            log::info!("{} user {}", self.verb("Created", "Would create"), user.name);
            self.report.roles_created.push(user.name.clone());
        }

        Ok(())
    }

    fn converge_database(&mut self, admin: &mut dyn Session, database: &str) -> Result<()> {
        let exists = admin
            .database_exists(database)
            .map_err(|e| Error::state_query("check database", database, &e))?;

        if exists || self.planned_databases.contains(database) {
            return Ok(());
        }

        let stmt = Statement::create_database(database);
        self.apply(admin, &stmt)
            .map_err(|e| Error::DatabaseCreate {
                database: database.to_string(),
                message: e.to_string(),
            })?;
        log::info!(
            "{} database {database}",
            self.verb("Created", "Would create")
        );
        self.report.databases_created.push(database.to_string());
        if self.dry_run {
            self.planned_databases.insert(database.to_string());
        }

        Ok(())
    }

    fn grant_schema(
        &mut self,
        pool: &mut SessionPool<'_>,
        database: &str,
        user: &UserSpec,
    ) -> Result<()> {
        let statements = Statement::grant_public_schema(&user.name);

        if self.dry_run {
            // The database may not exist yet, so there is nothing to connect to.
            for stmt in &statements {
                self.report.planned.push(format!("[{database}] {stmt}"));
                self.report.grants += 1;
            }
            return Ok(());
        }

        let session = pool.get(database)?;
        for stmt in &statements {
            log::debug!("[{database}] {stmt}");
            session
                .execute(stmt)
                .map_err(|e| grant_error(format!("schema public on {database}"), user, &e))?;
            self.report.grants += 1;
        }

        Ok(())
    }

    fn verb(&self, done: &'static str, planned: &'static str) -> &'static str {
        if self.dry_run { planned } else { done }
    }

    fn apply(&mut self, session: &mut dyn Session, stmt: &Statement) -> Result<()> {
        if self.dry_run {
            self.report
                .planned
                .push(format!("[{}] {stmt}", session.database()));
            return Ok(());
        }
        log::debug!("[{}] {stmt}", session.database());
        session.execute(stmt)
    }
}

fn grant_error(target: String, user: &UserSpec, cause: &Error) -> Error {
    Error::Grant {
        target,
        role: user.name.clone(),
        message: cause.to_string(),
    }
}

/// Lazily opened per-database sessions, each closed exactly once.
struct SessionPool<'a> {
    connector: &'a dyn Connector,
    sessions: BTreeMap<String, Box<dyn Session>>,
}

impl<'a> SessionPool<'a> {
    fn new(connector: &'a dyn Connector) -> Self {
        Self {
            connector,
            sessions: BTreeMap::new(),
        }
    }

    fn get(&mut self, database: &str) -> Result<&mut dyn Session> {
        let session = match self.sessions.entry(database.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(self.connector.connect(database)?),
        };
        Ok(&mut **session)
    }

    /// Close every open session, returning the first close error.
    fn close_all(&mut self) -> Result<()> {
        let mut first_err = None;
        while let Some((database, session)) = self.sessions.pop_first() {
            if let Err(e) = session.close() {
                log::warn!("Failed to close connection to {database}: {e}");
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

impl Drop for SessionPool<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.close_all() {
            log::warn!("Failed to release database connections: {e}");
        }
    }
}
