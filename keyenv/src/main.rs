//! Run commands with environment variables kept in keychain secure notes

use std::process::ExitCode;

use clap::Parser as _;
use rootcause::Report;

use crate::cli_args::{Cli, Commands, Config};

mod cli_args;
mod cli {
    pub mod common;
    pub mod export;
    pub mod run;
    pub mod seed;
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode, Report> {
    let args = Cli::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if args.verbose { "debug" } else { "info" }),
    )
    .init();

    let config = Config::load(&args.config)?;
    log::debug!("{config:?}");

    match args.command {
        Commands::Run { note, command } => {
            let code = cli::run::run(&config, &note, &command).await?;
            return Ok(ExitCode::from(code));
        }
        Commands::Export { note } => cli::export::export(&config, &note).await?,
        Commands::Seed { note } => cli::seed::seed(&config, &note).await?,
    }
    Ok(ExitCode::SUCCESS)
}
