//! Scorer package generation.
//!
//! A package is a binary language model followed by a dictionary blob
//! holding the alphabet, the vocabulary trie and default weights.

use crate::alphabet::Alphabet;
use crate::config::validate_weights;
use crate::error::{ConfigError, LoadError, Result};
use crate::lm::{BEGIN_SENTENCE, END_SENTENCE, LanguageModel, UNKNOWN_WORD};
use crate::scorer::Scorer;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

/// Inputs for [`create_package`].
#[derive(Clone, Debug)]
pub struct PackageOptions {
    /// Binary language model without a dictionary
    pub lm: PathBuf,
    /// Whitespace-separated vocabulary
    pub vocab: PathBuf,
    /// Alphabet config file, required unless in UTF-8 mode
    pub alphabet: Option<PathBuf>,
    /// Output package path
    pub package: PathBuf,
    /// Default LM weight stored in the package
    pub default_alpha: f64,
    /// Default word insertion bonus stored in the package
    pub default_beta: f64,
    /// Force UTF-8 mode on or off instead of inferring it from the vocabulary
    pub force_bytes_output_mode: Option<bool>,
}

/// What went into a package.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackageSummary {
    /// Every vocabulary entry is a single codepoint
    pub character_based: bool,
    pub utf8_mode: bool,
    /// Distinct vocabulary words
    pub vocab_words: usize,
    /// Words stored in the dictionary
    pub dictionary_words: usize,
    /// Words left out because a symbol is outside the alphabet
    pub skipped_words: usize,
}

/// Whether every word is exactly one codepoint.
pub fn is_character_based<'a>(words: impl IntoIterator<Item = &'a str>) -> bool {
    words.into_iter().all(|w| w.chars().count() == 1)
}

/// Build a scorer package from a language model and a vocabulary.
pub fn create_package(options: &PackageOptions) -> Result<PackageSummary> {
    validate_weights(options.default_alpha, options.default_beta)?;

    let text = std::fs::read_to_string(&options.vocab).map_err(|source| LoadError::Unreadable {
        path: options.vocab.clone(),
        source,
    })?;
    let vocab: BTreeSet<&str> = text.split_whitespace().collect();

    let character_based = is_character_based(vocab.iter().copied());
    let utf8_mode = options.force_bytes_output_mode.unwrap_or(character_based);
    tracing::info!(
        words = vocab.len(),
        character_based,
        utf8_mode,
        forced = options.force_bytes_output_mode.is_some(),
        "read vocabulary"
    );

    let alphabet = match (&options.alphabet, utf8_mode) {
        (_, true) => Alphabet::utf8(),
        (Some(path), false) => Alphabet::from_file(path)?,
        (None, false) => return Err(ConfigError::MissingAlphabet.into()),
    };

    let (lm, end) = LanguageModel::load_with_offset(&options.lm)?;
    let lm_len = std::fs::metadata(&options.lm)?.len();
    if end != lm_len {
        return Err(LoadError::UnexpectedDictionary.into());
    }

    let mut scorer = Scorer::new(
        Arc::new(lm),
        alphabet,
        options.default_alpha,
        options.default_beta,
    )?;
    scorer.set_utf8_mode(utf8_mode);
    let dictionary_words = scorer.fill_dictionary(vocab.iter().copied());
    let markers = vocab
        .iter()
        .filter(|w| matches!(**w, BEGIN_SENTENCE | END_SENTENCE | UNKNOWN_WORD))
        .count();
    let skipped_words = vocab.len().saturating_sub(markers + dictionary_words);

    std::fs::copy(&options.lm, &options.package)?;
    scorer.save_dictionary(&options.package, true)?;

    tracing::info!(
        package = %options.package.display(),
        dictionary_words,
        skipped_words,
        "created scorer package"
    );

    Ok(PackageSummary {
        character_based,
        utf8_mode,
        vocab_words: vocab.len(),
        dictionary_words,
        skipped_words,
    })
}
