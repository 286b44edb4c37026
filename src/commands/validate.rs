use anyhow::Result;

use crate::Context;
use crate::commands::load_config;
use crate::config::{Config, Environment, connection_settings};
use crate::render;
use crate::ui;

/// Check the config, the connection environment and the manifest template.
///
/// Nothing outside the local filesystem is touched.
pub fn run(ctx: &Context) -> Result<()> {
    let config = load_config(ctx)?;
    let summary = check(&config, &Environment::from_process())?;

    ui::success(&format!(
        "Config is valid: {} user(s), {} database(s)",
        summary.users, summary.databases
    ));
    if !summary.manifest_found {
        ui::warn(&format!(
            "Manifest template {} not found; `postgres` will fail",
            config.manifest_path(None).display()
        ));
    }
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
pub struct Summary {
    pub users: usize,
    pub databases: usize,
    pub manifest_found: bool,
}

pub fn check(config: &Config, env: &Environment) -> Result<Summary> {
    let state = config.desired_state()?;
    connection_settings(env, &config.postgres)?;

    let path = config.manifest_path(None);
    let manifest_found = path.is_file();
    if manifest_found {
        render::render_file(&path, &config.template_data()?)?;
    }

    let mut databases: Vec<&str> = state
        .users
        .iter()
        .flat_map(|u| u.databases.iter().map(String::as_str))
        .collect();
    databases.sort_unstable();
    databases.dedup();

    Ok(Summary {
        users: state.users.len(),
        databases: databases.len(),
        manifest_found,
    })
}
