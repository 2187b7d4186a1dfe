//! Configuration types for resolved CLI arguments.
//!
//! This module contains Config structs and their TryFrom implementations.
//! Args structs (for CLI parsing) remain in cli.rs and the subcommand modules.

use crate::cli::{AlphabetArgs, ScorerArgs, ScorerSource};
use ctcfuse::alphabet::Alphabet;
use ctcfuse::repo::{ModelRepo, load_scorer_file};
use ctcfuse::scorer::Scorer;
use eyre::{Result, WrapErr};
use hf_hub::Cache;
use hf_hub::api::sync::Api;
use std::path::PathBuf;

/// Resolved scorer package location.
#[derive(Debug)]
pub enum ScorerLocation {
    /// Package file given directly
    File(PathBuf),
    /// Repository holding a package under a well-known name
    Repo(ModelRepo),
}

/// Resolved scorer configuration.
///
/// Converted from ScorerArgs via TryFrom.
#[derive(Debug, Default)]
pub struct ScorerConfig {
    pub location: Option<ScorerLocation>,
}

impl TryFrom<ScorerArgs> for ScorerConfig {
    type Error = eyre::Error;

    fn try_from(args: ScorerArgs) -> Result<Self> {
        let Some(id) = args.scorer else {
            return Ok(Self::default());
        };

        let path = PathBuf::from(&id);
        let location = match args.scorer_source {
            ScorerSource::Auto | ScorerSource::Path if path.is_file() => {
                ScorerLocation::File(path)
            }
            ScorerSource::Auto if path.is_dir() => ScorerLocation::Repo(ModelRepo::Path(path)),
            ScorerSource::Auto => ScorerLocation::Repo(ModelRepo::Api(Api::new()?.model(id))),
            ScorerSource::Path => ScorerLocation::Repo(ModelRepo::Path(path)),
            ScorerSource::Cache => {
                ScorerLocation::Repo(ModelRepo::Cache(Cache::from_env().model(id)))
            }
            ScorerSource::Api => ScorerLocation::Repo(ModelRepo::Api(Api::new()?.model(id))),
        };

        Ok(Self {
            location: Some(location),
        })
    }
}

impl ScorerConfig {
    /// Load the scorer, if one was requested.
    pub fn load(&self, alphabet: Option<&Alphabet>) -> Result<Option<Scorer>> {
        let scorer = match &self.location {
            None => return Ok(None),
            Some(ScorerLocation::File(path)) => load_scorer_file(path, alphabet)?,
            Some(ScorerLocation::Repo(repo)) => repo.load_scorer(alphabet)?,
        };
        Ok(Some(scorer))
    }
}

/// Resolved alphabet source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AlphabetConfig {
    /// Alphabet config file
    File(PathBuf),
    /// Built-in UTF-8 byte table
    Utf8,
    /// Whatever the scorer package carries
    Embedded,
}

impl From<AlphabetArgs> for AlphabetConfig {
    fn from(args: AlphabetArgs) -> Self {
        match (args.alphabet, args.utf8) {
            (Some(path), _) => AlphabetConfig::File(path),
            (None, true) => AlphabetConfig::Utf8,
            (None, false) => AlphabetConfig::Embedded,
        }
    }
}

impl AlphabetConfig {
    /// Load an explicitly selected alphabet; `None` for [`AlphabetConfig::Embedded`].
    pub fn load(&self) -> Result<Option<Alphabet>> {
        match self {
            AlphabetConfig::File(path) => Alphabet::from_file(path)
                .map(Some)
                .wrap_err_with(|| format!("failed to load alphabet: {:?}", path.display())),
            AlphabetConfig::Utf8 => Ok(Some(Alphabet::utf8())),
            AlphabetConfig::Embedded => Ok(None),
        }
    }
}
