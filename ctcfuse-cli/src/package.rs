//! Package subcommand - build a scorer package from a language model and a vocabulary.

use ctcfuse::config::validate_weights;
use ctcfuse::package::{PackageOptions, create_package};
use eyre::{Result, WrapErr};
use std::path::PathBuf;

/// CLI arguments for scorer package generation.
#[derive(clap::Args, Debug)]
pub struct Args {
    /// Binary language model (see `ctcfuse binarize`)
    #[arg(long)]
    pub lm: PathBuf,

    /// Vocabulary file, whitespace separated
    #[arg(long)]
    pub vocab: PathBuf,

    /// Alphabet config file, required unless in UTF-8 mode
    #[arg(long)]
    pub alphabet: Option<PathBuf>,

    /// Output package path
    #[arg(long)]
    pub package: PathBuf,

    /// Default LM weight stored in the package
    #[arg(long)]
    pub default_alpha: f64,

    /// Default word insertion bonus stored in the package
    #[arg(long)]
    pub default_beta: f64,

    /// Force UTF-8 mode on or off (default: inferred from the vocabulary)
    #[arg(long)]
    pub force_bytes_output_mode: Option<bool>,
}

/// Resolved configuration for package generation.
#[derive(Debug)]
pub struct Config {
    pub options: PackageOptions,
}

impl TryFrom<Args> for Config {
    type Error = eyre::Error;

    fn try_from(args: Args) -> Result<Self> {
        validate_weights(args.default_alpha, args.default_beta)?;

        Ok(Self {
            options: PackageOptions {
                lm: args.lm,
                vocab: args.vocab,
                alphabet: args.alphabet,
                package: args.package,
                default_alpha: args.default_alpha,
                default_beta: args.default_beta,
                force_bytes_output_mode: args.force_bytes_output_mode,
            },
        })
    }
}

pub fn execute(config: Config) -> Result<()> {
    let options = &config.options;

    tracing::info!(
        lm = ?options.lm.display(),
        vocab = ?options.vocab.display(),
        package = ?options.package.display(),
        "creating scorer package"
    );

    let summary = create_package(options)
        .wrap_err_with(|| format!("failed to create package: {:?}", options.package.display()))?;

    tracing::info!(
        character_based = summary.character_based,
        utf8_mode = summary.utf8_mode,
        vocab_words = summary.vocab_words,
        dictionary_words = summary.dictionary_words,
        skipped_words = summary.skipped_words,
        "package written"
    );

    if summary.skipped_words > 0 {
        tracing::warn!(
            skipped = summary.skipped_words,
            "some vocabulary words have symbols outside the alphabet"
        );
    }

    Ok(())
}
