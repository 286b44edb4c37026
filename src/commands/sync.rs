use anyhow::Result;
use pgaccess::backend::postgres::PostgresConnector;
use pgaccess::{SyncOptions, SyncReport};

use crate::Context;
use crate::cli::SyncArgs;
use crate::commands::load_config;
use crate::config::{Environment, connection_settings};
use crate::runner::run_step;
use crate::ui;

pub fn run(ctx: &Context, args: &SyncArgs) -> Result<()> {
    let config = load_config(ctx)?;
    let state = config.desired_state()?;
    let settings = connection_settings(&Environment::from_process(), &config.postgres)?;

    log::info!(
        "Connecting to {}:{} as {} (sslmode={})",
        settings.host,
        settings.port,
        state.admin.user,
        settings.ssl_mode
    );

    let connector = PostgresConnector::new(settings, state.admin.clone());
    let options = SyncOptions {
        dry_run: args.dry_run,
    };

    let report = run_step("sync postgresql", || {
        pgaccess::sync(&connector, &state, options.clone()).map_err(|e| {
            explain(&e);
            anyhow::Error::new(e)
        })
    })?;

    if !ctx.quiet {
        print_report(&report, args.dry_run);
    }
    Ok(())
}

fn explain(error: &pgaccess::Error) {
    let category = error.category();
    ui::error(category.description());
    ui::dim(category.advice());
    if category.may_be_partial() {
        ui::dim("Objects converged before the failure are kept; re-running resumes from here");
    }
}

fn print_report(report: &SyncReport, dry_run: bool) {
    if dry_run {
        ui::header("Planned statements");
        if report.planned.is_empty() {
            ui::dim("(none)");
        }
        for statement in &report.planned {
            ui::dim(statement);
        }
        return;
    }

    ui::header("PostgreSQL access");
    ui::kv("roles created", &list(&report.roles_created));
    ui::kv("roles updated", &list(&report.roles_updated));
    ui::kv("databases created", &list(&report.databases_created));
    ui::kv("grants applied", &report.grants.to_string());
}

fn list(names: &[String]) -> String {
    if names.is_empty() {
        "-".to_string()
    } else {
        names.join(", ")
    }
}
