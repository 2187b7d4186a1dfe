//! Scorer package sources.

use crate::alphabet::Alphabet;
use crate::scorer::Scorer;
use eyre::{Result, WrapErr};
use hf_hub::CacheRepo;
use hf_hub::api::sync::ApiRepo;
use std::path::{Path, PathBuf};

/// File names tried, in order, when a repository holds a scorer package.
pub const SCORER_FILES: &[&str] = &["kenlm.scorer", "lm.scorer", "scorer"];

/// Model repository sources.
#[derive(Debug)]
pub enum ModelRepo {
    /// Local filesystem path
    Path(PathBuf),
    /// HuggingFace cache repository
    Cache(CacheRepo),
    /// HuggingFace API repository
    Api(ApiRepo),
}

impl ModelRepo {
    /// Resolve a file name to its full path in this repository.
    pub fn resolve(&self, file_name: &str) -> Result<PathBuf> {
        match self {
            ModelRepo::Path(path) => path
                .join(file_name)
                .canonicalize()
                .wrap_err(format!("failed to resolve file: {file_name}")),
            ModelRepo::Cache(cache_repo) => cache_repo
                .get(file_name)
                .ok_or_else(|| eyre::eyre!("not in cache: {file_name}")),
            ModelRepo::Api(api_repo) => api_repo
                .get(file_name)
                .wrap_err(format!("failed to download from api: {file_name}")),
        }
    }

    /// Try resolving multiple file names, return first successful match.
    pub fn resolve_any(&self, candidates: &[&str]) -> Result<PathBuf> {
        use eyre::OptionExt;
        candidates
            .iter()
            .find_map(|name| self.resolve(name).ok())
            .ok_or_eyre("no scorer package found from candidates")
    }

    /// Locate and load the scorer package of this repository.
    ///
    /// With `alphabet` the embedded alphabet must match it; otherwise the
    /// embedded one is used.
    pub fn load_scorer(&self, alphabet: Option<&Alphabet>) -> Result<Scorer> {
        let path = self.resolve_any(SCORER_FILES)?;
        load_scorer_file(&path, alphabet)
    }
}

/// Load a scorer package from a file path.
pub fn load_scorer_file(path: &Path, alphabet: Option<&Alphabet>) -> Result<Scorer> {
    tracing::debug!(path = %path.display(), "loading scorer package");

    match alphabet {
        Some(alphabet) => Scorer::from_package(path, alphabet),
        None => Scorer::from_package_embedded(path),
    }
    .wrap_err_with(|| format!("failed to load scorer: {:?}", path.display()))
}
