use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

#[derive(Parser)]
#[command(name = "kaloupile")]
#[command(version)]
#[command(about = "Bootstrap the local dev cluster's PostgreSQL and its users", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file (default: ./kaloupile.toml)
    #[arg(short, long, global = true, env = "KALOUPILE_CONFIG")]
    pub config: Option<String>,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Deploy PostgreSQL, recreating it when the admin credentials changed
    Postgres(PostgresArgs),

    /// Create or update PostgreSQL users, databases and grants
    Sync(SyncArgs),

    /// Show the stored and current admin-credential fingerprints
    Status,

    /// Check the config file without touching the cluster or the database
    Validate,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
pub struct PostgresArgs {
    /// Manifest template (default: postgres.manifest from the config)
    #[arg(long)]
    pub manifest: Option<String>,

    /// Never delete before applying, even if the credentials changed
    #[arg(long)]
    pub no_recreate: bool,

    /// Skip the confirmation before deleting the deployment
    #[arg(short, long)]
    pub yes: bool,

    /// Show the decision without applying anything
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args)]
pub struct SyncArgs {
    /// Print the statements that would run; only existence checks execute
    #[arg(long)]
    pub dry_run: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_postgres_flags() {
        let cli = Cli::parse_from([
            "kaloupile",
            "-vv",
            "--config",
            "dev.toml",
            "postgres",
            "--no-recreate",
            "--yes",
        ]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config.as_deref(), Some("dev.toml"));
        match cli.command {
            Command::Postgres(args) => {
                assert!(args.no_recreate);
                assert!(args.yes);
                assert!(!args.dry_run);
                assert!(args.manifest.is_none());
            }
            _ => panic!("expected postgres command"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["kaloupile", "sync", "--dry-run", "-q"]);
        assert!(cli.quiet);
        assert!(matches!(cli.command, Command::Sync(SyncArgs { dry_run: true })));
    }
}
