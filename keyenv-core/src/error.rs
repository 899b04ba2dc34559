use std::{io, path::PathBuf};

use crate::{decode::DecodeError, keychain::StoreError, wrapper::MalformedRecordError};

#[derive(thiserror::Error, Debug)]
pub enum RetrieveError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error("Secure note {name} does not exist and no template is configured")]
    NotFound { name: String },
    #[error("Secure note is malformed: {0}")]
    MalformedRecord(#[from] MalformedRecordError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Could not read template {}: {source}", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Could not decode secure note: {0}")]
    Decode(#[from] DecodeError),
    #[error("Secure note is not valid dotenv: {0}")]
    Parse(#[from] dotenvy::Error),
    #[error("Could not start the async runtime: {0}")]
    Runtime(#[source] io::Error),
}

impl RetrieveError {
    /// Whether the caller can fix this by configuring a template or creating the note
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
