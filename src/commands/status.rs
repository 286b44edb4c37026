use anyhow::{Context as _, Result};
use colored::Colorize;
use kubekit::{Client, Fingerprint, POSTGRES_FINGERPRINT_ANNOTATION};

use crate::Context;
use crate::commands::{load_config, postgres};
use crate::config::{Environment, connection_settings};
use crate::ui;

pub fn run(ctx: &Context) -> Result<()> {
    let config = load_config(ctx)?;
    let state = config.desired_state()?;
    let settings = connection_settings(&Environment::from_process(), &config.postgres)?;
    let namespace = &config.postgres.namespace;

    ui::header("PostgreSQL");
    ui::kv("endpoint", &format!("{}:{}", settings.host, settings.port));
    ui::kv("sslmode", &settings.ssl_mode.to_string());
    ui::kv("users", &state.users.len().to_string());

    let client = Client::new().context("Cannot reach the cluster")?;
    let gate = client.gate(namespace, POSTGRES_FINGERPRINT_ANNOTATION);
    let decision = gate
        .decide(Fingerprint::compute(&state.admin.fingerprint_fields()))
        .with_context(|| format!("Could not read fingerprint on namespace {namespace}"))?;

    ui::header(&format!("Fingerprint ({namespace})"));
    ui::kv("current", decision.fingerprint.as_str());
    ui::kv("stored", &postgres::describe(&decision.previous));

    let next = if decision.force_recreate {
        "delete, then apply".yellow().to_string()
    } else {
        "apply in place".green().to_string()
    };
    ui::kv("next deploy", &next);
    Ok(())
}
