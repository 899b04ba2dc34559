use keyenv_core::{Retrieval, escape::escape_double_quoted};
use log::warn;
use rootcause::{Report, prelude::ResultExt as _};

use crate::{
    cli::common::{self, Overlay},
    cli_args::{Config, NoteArgs},
};

#[expect(clippy::print_stdout, reason = "the output is meant for eval")]
pub async fn export(config: &Config, note: &NoteArgs) -> Result<(), Report> {
    let mut overlay = Overlay::default();
    let retrieval = common::retriever(config)
        .retrieve(&note.name, &config.options(note), &mut overlay)
        .await
        .context("Could not load the secure note")?;

    if retrieval == Retrieval::Seeded {
        warn!("Created secure note {} from the template, nothing to export yet", note.name);
        return Ok(());
    }

    for line in export_lines(&overlay) {
        println!("{line}");
    }
    Ok(())
}

fn export_lines(overlay: &Overlay) -> Vec<String> {
    overlay
        .added
        .iter()
        .filter(|(key, _)| {
            let valid = is_shell_name(key);
            if !valid {
                warn!("Skipping {key:?}: not a valid shell variable name");
            }
            valid
        })
        .map(|(key, value)| format!("export {key}=\"{}\"", escape_double_quoted(value)))
        .collect()
}

fn is_shell_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn quotes_values_for_the_shell() {
        let overlay = Overlay {
            added: [
                ("TOKEN".to_owned(), "a\"b$c".to_owned()),
                ("my-key".to_owned(), "x".to_owned()),
                ("_OK2".to_owned(), "multi\nline".to_owned()),
            ]
            .into_iter()
            .collect(),
        };
        assert_eq!(
            export_lines(&overlay),
            vec![
                r#"export TOKEN="a\"b\$c""#.to_owned(),
                "export _OK2=\"multi\nline\"".to_owned(),
            ]
        );
    }

    #[test]
    fn shell_names() {
        assert!(is_shell_name("API_KEY"));
        assert!(is_shell_name("_x1"));
        assert!(!is_shell_name("1X"));
        assert!(!is_shell_name("a.b"));
        assert!(!is_shell_name(""));
    }
}
