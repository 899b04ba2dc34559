use log::info;

use crate::{
    decode::decode_hex_text,
    environment::{ConfigMapping, Environment, MergeReport, merge, parse_mapping},
    error::RetrieveError,
    keychain::{CommandRunner, GatewayConfig, Keychain, ReadOutcome, SystemRunner},
    options::RetrievalOptions,
    wrapper::unwrap_note,
};

/// What a successful retrieval did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Retrieval {
    /// The note existed and was merged into the environment
    Loaded(MergeReport),
    /// The note did not exist and was created from the template. The environment is untouched,
    /// the next retrieval will load it.
    Seeded,
}

/// Reads a secure note and merges it into an [`Environment`], seeding the note from a template
/// when it does not exist yet.
#[derive(Debug, Clone, Default)]
pub struct Retriever<R = SystemRunner> {
    keychain: Keychain<R>,
}

impl Retriever<SystemRunner> {
    pub fn new(config: GatewayConfig) -> Self {
        Self::with_keychain(Keychain::new(config))
    }
}

impl<R: CommandRunner> Retriever<R> {
    pub fn with_keychain(keychain: Keychain<R>) -> Self {
        Self { keychain }
    }

    pub fn keychain(&self) -> &Keychain<R> {
        &self.keychain
    }

    pub async fn retrieve<E: Environment + ?Sized>(
        &self,
        name: &str,
        options: &RetrievalOptions,
        env: &mut E,
    ) -> Result<Retrieval, RetrieveError> {
        check_name(name)?;

        match self.keychain.read(name, options.read_timeout()).await? {
            ReadOutcome::Found(raw) => {
                let mapping = load_mapping(&raw)?;
                let report = merge(env, &mapping, options.overwrite);
                info!(
                    "Loaded {} variables from {name} ({} already set, {} invalid)",
                    report.applied.len(),
                    report.skipped.len(),
                    report.rejected.len()
                );
                Ok(Retrieval::Loaded(report))
            }
            ReadOutcome::NotFound => {
                let Some(template) = options.template_source() else {
                    return Err(RetrieveError::NotFound {
                        name: name.to_owned(),
                    });
                };
                info!("Secure note {name} does not exist, creating it from the {template}");
                let contents = template.load()?;
                self.keychain
                    .write(name, &contents, options.write_timeout())
                    .await?;
                Ok(Retrieval::Seeded)
            }
        }
    }

    /// Create the note from the configured template whether or not it exists.
    pub async fn seed(&self, name: &str, options: &RetrievalOptions) -> Result<(), RetrieveError> {
        check_name(name)?;
        let template = options
            .template_source()
            .ok_or(RetrieveError::InvalidArgument("seeding requires a template"))?;
        let contents = template.load()?;
        self.keychain
            .write(name, &contents, options.write_timeout())
            .await?;
        info!("Created secure note {name} from the {template}");
        Ok(())
    }
}

fn check_name(name: &str) -> Result<(), RetrieveError> {
    if name.trim().is_empty() {
        return Err(RetrieveError::InvalidArgument(
            "the secure note name must not be empty or blank",
        ));
    }
    Ok(())
}

/// hex dump -> note text -> dotenv mapping
fn load_mapping(raw: &str) -> Result<ConfigMapping, RetrieveError> {
    let text = decode_hex_text(raw.trim())?;
    let payload = unwrap_note(&text)?;
    Ok(parse_mapping(&payload)?)
}
