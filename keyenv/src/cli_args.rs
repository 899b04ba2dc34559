use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use figment::{
    Figment,
    providers::{Env, Format as _, Serialized, Toml},
};
use keyenv_core::{GatewayConfig, RetrievalOptions, options::DEFAULT_TIMEOUT_MILLIS};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub config: ConfigArgs,

    /// Log what is going on
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a command with the variables of a secure note added to its environment
    Run {
        #[command(flatten)]
        note: NoteArgs,
        /// The command to run
        #[arg(trailing_var_arg = true, required = true)]
        command: Vec<String>,
    },
    /// Print the variables of a secure note as `export` statements for `eval`
    Export {
        #[command(flatten)]
        note: NoteArgs,
    },
    /// Create a secure note from a template
    Seed {
        #[command(flatten)]
        note: NoteArgs,
    },
}

#[derive(Args)]
pub struct NoteArgs {
    /// The name of the secure note
    #[arg(long, short, env = "KEYENV_NAME")]
    pub name: String,
    /// Content to create the note with if it does not exist yet
    #[arg(long)]
    pub template: Option<String>,
    /// File to create the note from if it does not exist yet. `--template` wins over this
    #[arg(long)]
    pub template_path: Option<PathBuf>,
}

/// Flags that override `config.toml` and `KEYENV_*`. Unset flags leave the lower layers alone.
#[derive(Args, Serialize, Default)]
pub struct ConfigArgs {
    /// Path to a config file instead of `$XDG_CONFIG_HOME/keyenv/config.toml`
    #[arg(long, global = true)]
    #[serde(skip)]
    pub config: Option<PathBuf>,
    /// The `security` binary to use
    #[arg(long, global = true)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security: Option<PathBuf>,
    /// Milliseconds to wait for the keychain read
    #[arg(long, global = true)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    /// Milliseconds to wait for the keychain write. Waits indefinitely if unset
    #[arg(long, global = true)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write_timeout: Option<u64>,
    /// Replace variables that are already set
    #[arg(long, global = true)]
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub overwrite: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub security: PathBuf,
    pub shell: PathBuf,
    pub timeout: u64,
    pub write_timeout: Option<u64>,
    pub overwrite: bool,
}

impl Default for Config {
    fn default() -> Self {
        let gateway = GatewayConfig::default();
        Self {
            security: gateway.security,
            shell: gateway.shell,
            timeout: DEFAULT_TIMEOUT_MILLIS,
            write_timeout: None,
            overwrite: false,
        }
    }
}

impl Config {
    /// defaults < config file < `KEYENV_*` < flags
    pub fn load(args: &ConfigArgs) -> Result<Self, figment::Error> {
        let file = args.config.clone().or_else(|| {
            xdg::BaseDirectories::with_prefix("keyenv").find_config_file("config.toml")
        });

        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(file) = file {
            log::debug!("Reading config from {}", file.display());
            figment = figment.merge(Toml::file(file));
        }
        figment
            .merge(Env::prefixed("KEYENV_").ignore(&["name"]))
            .merge(Serialized::defaults(args))
            .extract()
    }

    pub fn gateway(&self) -> GatewayConfig {
        GatewayConfig {
            security: self.security.clone(),
            shell: self.shell.clone(),
        }
    }

    pub fn options(&self, note: &NoteArgs) -> RetrievalOptions {
        RetrievalOptions {
            overwrite: self.overwrite,
            timeout_millis: self.timeout,
            write_timeout_millis: self.write_timeout,
            template: note.template.clone(),
            template_path: note.template_path.clone(),
        }
    }
}
