use std::os::unix::process::ExitStatusExt as _;

use log::{info, warn};
use rootcause::{Report, prelude::ResultExt as _, report};
use keyenv_core::Retrieval;
use tokio::process::Command;

use crate::{
    cli::common::{self, Overlay},
    cli_args::{Config, NoteArgs},
};

/// Returns the exit code of the child, `128 + signal` if it was killed.
pub async fn run(config: &Config, note: &NoteArgs, command: &[String]) -> Result<u8, Report> {
    let (program, args) = command
        .split_first()
        .ok_or(report!("No command to run"))?;

    let mut overlay = Overlay::default();
    let retrieval = common::retriever(config)
        .retrieve(&note.name, &config.options(note), &mut overlay)
        .await
        .context("Could not load the secure note")?;

    if retrieval == Retrieval::Seeded {
        warn!(
            "Created secure note {} from the template. Fill it in with Keychain Access, it is used from the next run on",
            note.name
        );
    }

    info!("Running {program}");
    let status = Command::new(program)
        .args(args)
        .envs(&overlay.added)
        .status()
        .await
        .context(format!("Could not run {program}"))?;

    let code = status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(1);
    Ok(u8::try_from(code).unwrap_or(1))
}
