mod cli;
mod commands;
mod config;
mod render;
mod runner;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;

/// Global context for the application
pub struct Context {
    pub config: Option<String>,
    pub quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        config: cli.config,
        quiet: cli.quiet,
    };

    match cli.command {
        Command::Postgres(args) => commands::postgres::run(&ctx, &args),
        Command::Sync(args) => commands::sync::run(&ctx, &args),
        Command::Status => commands::status::run(&ctx),
        Command::Validate => commands::validate::run(&ctx),
        Command::Completions { shell } => {
            generate(shell, &mut Cli::command(), "kaloupile", &mut io::stdout());
            Ok(())
        }
    }
}
