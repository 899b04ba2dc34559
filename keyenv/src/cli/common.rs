use std::env;

use indexmap::IndexMap;
use keyenv_core::{Environment, Retriever};

use crate::cli_args::Config;

pub fn retriever(config: &Config) -> Retriever {
    Retriever::new(config.gateway())
}

/// The environment of this process with the note's variables layered on top.
///
/// Nothing is written to the real environment; `added` is handed to a child process or printed.
#[derive(Debug, Default)]
pub struct Overlay {
    pub added: IndexMap<String, String>,
}

impl Environment for Overlay {
    fn contains(&self, key: &str) -> bool {
        self.added.contains_key(key) || env::var_os(key).is_some()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.added.insert(key.to_owned(), value.to_owned());
    }
}

#[cfg(test)]
mod test {
    use keyenv_core::{ConfigMapping, environment::merge};

    use super::*;

    #[test]
    fn overlay_sees_the_real_environment() {
        let path = env::var("PATH").unwrap();
        let mut overlay = Overlay::default();
        let mapping: ConfigMapping = [
            ("PATH".to_owned(), "/nowhere".to_owned()),
            ("KEYENV_OVERLAY_ONLY".to_owned(), "1".to_owned()),
        ]
        .into_iter()
        .collect();

        let report = merge(&mut overlay, &mapping, false);

        assert_eq!(report.skipped, vec!["PATH"]);
        assert_eq!(overlay.added.keys().collect::<Vec<_>>(), vec!["KEYENV_OVERLAY_ONLY"]);
        assert_eq!(env::var("PATH").unwrap(), path);
        assert!(env::var_os("KEYENV_OVERLAY_ONLY").is_none());
    }
}
