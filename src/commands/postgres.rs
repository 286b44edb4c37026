use anyhow::{Context as _, Result, bail};
use kubekit::{
    Client, Decision, Fingerprint, POSTGRES_FINGERPRINT_ANNOTATION, Previous, RolloutOptions,
    RolloutOutcome,
};
use pgaccess::AdminCredentials;

use crate::Context;
use crate::cli::PostgresArgs;
use crate::commands::load_config;
use crate::render;
use crate::runner::run_step;
use crate::ui;

const RECREATE_PROMPT: &str =
    "Admin credentials changed. Delete and recreate the PostgreSQL deployment?";

/// Flags for one deployment run.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeployOptions {
    pub recreate: bool,
    pub yes: bool,
    pub dry_run: bool,
}

impl From<&PostgresArgs> for DeployOptions {
    fn from(args: &PostgresArgs) -> Self {
        Self {
            recreate: !args.no_recreate,
            yes: args.yes,
            dry_run: args.dry_run,
        }
    }
}

/// What a deployment run ended with.
#[derive(Debug)]
pub enum Deployment {
    /// Dry run: decision only
    Planned(Decision),
    Done(RolloutOutcome),
}

pub fn run(ctx: &Context, args: &PostgresArgs) -> Result<()> {
    let config = load_config(ctx)?;
    let state = config.desired_state()?;
    let options = DeployOptions::from(args);

    run_step("install postgresql", || {
        let path = config.manifest_path(args.manifest.as_deref());
        let manifest = render::render_file(&path, &config.template_data()?)?;
        let client = Client::new().context("Cannot reach the cluster")?;

        let deployment = deploy(
            &client,
            &config.postgres.namespace,
            &state.admin,
            &manifest,
            options,
            |prompt| ui::confirm(prompt, false),
        )?;
        report(&deployment, &config.postgres.namespace);
        Ok(())
    })
}

/// Decide, confirm a recreation if needed, then roll out.
///
/// `confirm` is only called when the deployment is about to be deleted and
/// `--yes` was not given.
pub fn deploy(
    client: &Client,
    namespace: &str,
    admin: &AdminCredentials,
    manifest: &[u8],
    options: DeployOptions,
    confirm: impl FnOnce(&str) -> Result<bool>,
) -> Result<Deployment> {
    let gate = client.gate(namespace, POSTGRES_FINGERPRINT_ANNOTATION);
    let fingerprint = Fingerprint::compute(&admin.fingerprint_fields());
    let decision = gate
        .decide(fingerprint)
        .with_context(|| format!("Could not read fingerprint on namespace {namespace}"))?;

    log::info!(
        "Fingerprint {} ({})",
        ui::short_hash(decision.fingerprint.as_str()),
        describe(&decision.previous)
    );

    if options.dry_run {
        return Ok(Deployment::Planned(decision));
    }

    let recreate = decision.force_recreate && options.recreate;
    if recreate && !options.yes && !confirm(RECREATE_PROMPT)? {
        bail!("Recreation declined; nothing was changed");
    }

    let outcome = gate
        .rollout(
            &decision,
            manifest,
            RolloutOptions {
                recreate: options.recreate,
            },
        )
        .context("PostgreSQL rollout failed")?;
    Ok(Deployment::Done(outcome))
}

/// One-line description of the stored annotation.
pub fn describe(previous: &Previous) -> String {
    match previous {
        Previous::Absent => "no fingerprint recorded".to_string(),
        Previous::Matching => "unchanged".to_string(),
        Previous::Changed(old) => format!("changed from {}", ui::short_hash(old.as_str())),
        Previous::Unreadable(raw) => format!("stored value unreadable: {raw}"),
    }
}

fn report(deployment: &Deployment, namespace: &str) {
    match deployment {
        Deployment::Planned(decision) => {
            let action = if decision.force_recreate {
                "delete, then apply"
            } else {
                "apply in place"
            };
            ui::info(&format!("Dry run: would {action} ({namespace})"));
        }
        Deployment::Done(RolloutOutcome::Recreated) => {
            ui::success(&format!("PostgreSQL recreated in {namespace}"));
        }
        Deployment::Done(RolloutOutcome::Applied) => {
            ui::success(&format!("PostgreSQL applied in {namespace}"));
        }
    }
}
