use std::{
    collections::{BTreeMap, HashMap},
    env,
};

use indexmap::IndexMap;
use log::{debug, warn};

/// Keys and values parsed from a note, in the order they appear in it
pub type ConfigMapping = IndexMap<String, String>;

/// Parse dotenv style note text.
pub fn parse_mapping(payload: &str) -> Result<ConfigMapping, dotenvy::Error> {
    dotenvy::from_read_iter(payload.as_bytes()).collect()
}

/// A place environment variables can be merged into.
///
/// Merging only ever asks whether a key is set and sets keys; nothing is removed.
pub trait Environment {
    fn contains(&self, key: &str) -> bool;
    fn set(&mut self, key: &str, value: &str);
}

impl Environment for HashMap<String, String> {
    fn contains(&self, key: &str) -> bool {
        self.contains_key(key)
    }

    fn set(&mut self, key: &str, value: &str) {
        self.insert(key.to_owned(), value.to_owned());
    }
}

impl Environment for BTreeMap<String, String> {
    fn contains(&self, key: &str) -> bool {
        self.contains_key(key)
    }

    fn set(&mut self, key: &str, value: &str) {
        self.insert(key.to_owned(), value.to_owned());
    }
}

impl Environment for IndexMap<String, String> {
    fn contains(&self, key: &str) -> bool {
        self.contains_key(key)
    }

    fn set(&mut self, key: &str, value: &str) {
        self.insert(key.to_owned(), value.to_owned());
    }
}

/// The environment of the running process.
///
/// Setting variables is only sound while no other thread reads the environment, so merge into
/// it early, before spawning threads, or merge into a map and hand that to a child process.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvironment;

impl Environment for ProcessEnvironment {
    fn contains(&self, key: &str) -> bool {
        env::var_os(key).is_some()
    }

    #[expect(unsafe_code, reason = "std::env::set_var is unsafe since edition 2024")]
    fn set(&mut self, key: &str, value: &str) {
        // SAFETY: callers merge into the process environment before other threads read it
        unsafe { env::set_var(key, value) }
    }
}

/// Which keys of a mapping ended up in the environment
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MergeReport {
    pub applied: Vec<String>,
    /// Already set and `overwrite` was off
    pub skipped: Vec<String>,
    /// Names or values no environment can hold (empty, `=` in the name, NUL bytes)
    pub rejected: Vec<String>,
}

/// Apply `mapping` to `env` in parse order. Existing keys are only replaced with `overwrite`.
pub fn merge<E: Environment + ?Sized>(
    env: &mut E,
    mapping: &ConfigMapping,
    overwrite: bool,
) -> MergeReport {
    let mut report = MergeReport::default();
    for (key, value) in mapping {
        if !is_settable(key, value) {
            warn!("Ignoring {key:?}: not a valid environment variable");
            report.rejected.push(key.clone());
            continue;
        }
        if !overwrite && env.contains(key) {
            debug!("Keeping existing value of {key}");
            report.skipped.push(key.clone());
            continue;
        }
        env.set(key, value);
        report.applied.push(key.clone());
    }
    report
}

fn is_settable(key: &str, value: &str) -> bool {
    !key.is_empty() && !key.contains(['=', '\0']) && !value.contains('\0')
}
