use rootcause::{Report, bail, prelude::ResultExt as _};

use crate::{
    cli::common,
    cli_args::{Config, NoteArgs},
};

pub async fn seed(config: &Config, note: &NoteArgs) -> Result<(), Report> {
    if note.template.is_none() && note.template_path.is_none() {
        bail!("`--template` or `--template-path` required for seed");
    }

    common::retriever(config)
        .seed(&note.name, &config.options(note))
        .await
        .context("Could not create the secure note")?;
    Ok(())
}
