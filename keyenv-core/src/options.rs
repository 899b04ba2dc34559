use std::{
    borrow::Cow,
    fmt, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::error::RetrieveError;

pub const DEFAULT_TIMEOUT_MILLIS: u64 = 5000;

/// Knobs for a single retrieval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalOptions {
    /// Replace variables that are already set
    pub overwrite: bool,
    /// Upper bound for reading the note
    pub timeout_millis: u64,
    /// Upper bound for seeding the note from the template. `None` waits for `security` to finish.
    pub write_timeout_millis: Option<u64>,
    /// Written as the note when it does not exist yet. Wins over `template_path`.
    pub template: Option<String>,
    pub template_path: Option<PathBuf>,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self {
            overwrite: false,
            timeout_millis: DEFAULT_TIMEOUT_MILLIS,
            write_timeout_millis: None,
            template: None,
            template_path: None,
        }
    }
}

impl RetrievalOptions {
    #[must_use]
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    #[must_use]
    pub fn with_timeout_millis(mut self, millis: u64) -> Self {
        self.timeout_millis = millis;
        self
    }

    #[must_use]
    pub fn with_write_timeout_millis(mut self, millis: u64) -> Self {
        self.write_timeout_millis = Some(millis);
        self
    }

    #[must_use]
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    #[must_use]
    pub fn with_template_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.template_path = Some(path.into());
        self
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_millis)
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        self.write_timeout_millis.map(Duration::from_millis)
    }

    /// The template to seed a missing note with, if any
    pub fn template_source(&self) -> Option<TemplateSource<'_>> {
        match (&self.template, &self.template_path) {
            (Some(template), _) => Some(TemplateSource::Literal(template)),
            (None, Some(path)) => Some(TemplateSource::File(path)),
            (None, None) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateSource<'a> {
    Literal(&'a str),
    File(&'a Path),
}

impl<'a> TemplateSource<'a> {
    pub fn load(self) -> Result<Cow<'a, str>, RetrieveError> {
        match self {
            Self::Literal(template) => Ok(Cow::Borrowed(template)),
            Self::File(path) => fs::read_to_string(path)
                .map(Cow::Owned)
                .map_err(|source| RetrieveError::Filesystem {
                    path: path.to_path_buf(),
                    source,
                }),
        }
    }
}

impl fmt::Display for TemplateSource<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(_) => f.write_str("inline template"),
            Self::File(path) => write!(f, "template {}", path.display()),
        }
    }
}
