use anyhow::{Context, Result, bail};
use pgaccess::{AdminCredentials, ConnectionSettings, DesiredState, SslMode, UserSpec};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file looked up in the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "kaloupile.toml";

/// Namespace carrying the fingerprint annotation
pub const DEFAULT_NAMESPACE: &str = "external";

/// Deployment manifest template, relative to the working directory
pub const DEFAULT_MANIFEST: &str = "cluster/dependencies/postgresql/postgresql.yaml";

/// Environment variables consulted when resolving connection settings
pub const ENV_KEYS: [&str; 4] = ["PGHOST", "PGPORT", "PGSSLMODE", "PGCONNECT_TIMEOUT"];

// ============================================================================
// Document
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub postgres: PostgresConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_mode: Option<SslMode>,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_manifest")]
    pub manifest: String,
    pub admin: AdminCredentials,
    #[serde(default)]
    pub users: Vec<UserSpec>,
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_manifest() -> String {
    DEFAULT_MANIFEST.to_string()
}

impl Config {
    /// Path from `--config`, or the default file in the working directory.
    pub fn path(explicit: Option<&str>) -> PathBuf {
        let raw = explicit.unwrap_or(DEFAULT_CONFIG_FILE);
        PathBuf::from(shellexpand::tilde(raw).as_ref())
    }

    /// Load and parse a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        if config.postgres.namespace.trim().is_empty() {
            bail!("postgres.namespace must not be empty");
        }
        Ok(config)
    }

    /// Validated desired state for the reconciler and the gate.
    pub fn desired_state(&self) -> Result<DesiredState> {
        DesiredState::new(self.postgres.admin.clone(), self.postgres.users.clone())
            .context("Invalid postgres configuration")
    }

    /// Manifest template path with `~` expanded.
    pub fn manifest_path(&self, explicit: Option<&str>) -> PathBuf {
        let raw = explicit.unwrap_or(&self.postgres.manifest);
        PathBuf::from(shellexpand::tilde(raw).as_ref())
    }

    /// The document as a JSON tree, for template lookups.
    pub fn template_data(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self).context("Could not convert config for rendering")
    }
}

// ============================================================================
// Connection settings
// ============================================================================

/// Snapshot of the environment variables that affect connections.
///
/// Taken once per run so resolution never reads process state ad hoc.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: BTreeMap<String, String>,
}

impl Environment {
    pub fn from_process() -> Self {
        Self::from_pairs(
            ENV_KEYS
                .iter()
                .filter_map(|key| std::env::var(key).ok().map(|value| (*key, value))),
        )
    }

    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, String)>) -> Self {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        }
    }

    /// Value of `key`; empty and whitespace-only values count as unset.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// Environment, then configuration, then default.
pub fn resolve<T>(env: Option<T>, config: Option<T>, default: T) -> T {
    env.or(config).unwrap_or(default)
}

/// Resolve host, port, SSL mode and connect timeout for this run.
pub fn connection_settings(env: &Environment, config: &PostgresConfig) -> Result<ConnectionSettings> {
    let defaults = ConnectionSettings::default();

    let env_port = env
        .get("PGPORT")
        .map(|raw| parse_port(raw).with_context(|| format!("Invalid PGPORT {raw:?}")))
        .transpose()?;
    let env_ssl_mode = env
        .get("PGSSLMODE")
        .map(str::parse::<SslMode>)
        .transpose()
        .context("Invalid PGSSLMODE")?;
    let env_timeout = env
        .get("PGCONNECT_TIMEOUT")
        .map(|raw| {
            raw.parse::<u64>()
                .map(Duration::from_secs)
                .with_context(|| format!("Invalid PGCONNECT_TIMEOUT {raw:?}"))
        })
        .transpose()?;

    let config_port = config.local_port.filter(|port| *port != 0);

    Ok(ConnectionSettings {
        host: resolve(
            env.get("PGHOST").map(str::to_string),
            config
                .local_host
                .clone()
                .filter(|host| !host.trim().is_empty()),
            defaults.host,
        ),
        port: resolve(env_port, config_port, defaults.port),
        ssl_mode: resolve(env_ssl_mode, config.ssl_mode, defaults.ssl_mode),
        connect_timeout: resolve(env_timeout, None, defaults.connect_timeout),
    })
}

fn parse_port(raw: &str) -> Result<u16> {
    match raw.parse::<u16>()? {
        0 => bail!("port must be between 1 and 65535"),
        port => Ok(port),
    }
}

// ============================================================================
// Tests
// ============================================================================
