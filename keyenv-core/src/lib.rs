//! Load dotenv style secure notes from the macOS keychain.
//!
//! A note is read with `security find-generic-password -w`, hex decoded, unwrapped if
//! Keychain Access wrote it as a property list, parsed as dotenv and merged into an
//! [`Environment`]. If the note does not exist it can be created from a template so the next
//! run finds it.
//!
//! # Example
//! ```no_run
//! use keyenv_core::RetrievalOptions;
//!
//! keyenv_core::retrieve(
//!     "MyApp.env",
//!     &RetrievalOptions::default().with_template("API_KEY=changeme\n"),
//! )
//! .expect("could not load MyApp.env");
//! let key = std::env::var("API_KEY");
//! ```

pub mod decode;
pub mod environment;
pub mod error;
pub mod escape;
pub mod keychain;
pub mod options;
pub mod retrieve;
pub mod wrapper;

pub use environment::{ConfigMapping, Environment, MergeReport, ProcessEnvironment};
pub use error::RetrieveError;
pub use keychain::{GatewayConfig, Keychain, StoreError};
pub use options::RetrievalOptions;
pub use retrieve::{Retrieval, Retriever};

/// Load the note `name` into the environment of this process, blocking until done.
///
/// Runs on its own single threaded runtime, so call it early in `main`, before other threads
/// read the environment. Inside a tokio runtime the work moves to a scoped thread.
/// Async callers use [`Retriever::retrieve`].
pub fn retrieve(name: &str, options: &RetrievalOptions) -> Result<(), RetrieveError> {
    if tokio::runtime::Handle::try_current().is_err() {
        return retrieve_on_own_runtime(name, options);
    }

    std::thread::scope(|scope| {
        scope
            .spawn(|| retrieve_on_own_runtime(name, options))
            .join()
            .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
    })
}

fn retrieve_on_own_runtime(name: &str, options: &RetrievalOptions) -> Result<(), RetrieveError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(RetrieveError::Runtime)?;

    let retriever = Retriever::new(GatewayConfig::default());
    runtime.block_on(retriever.retrieve(name, options, &mut ProcessEnvironment))?;
    Ok(())
}
