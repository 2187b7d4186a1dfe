//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use eyre::Result;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "ctcfuse")]
#[command(about = "CTC beam-search decoding with n-gram language model fusion")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Decode probability matrices read from a JSON file
    Decode(crate::decode::Args),

    /// Build a scorer package from a binary language model and a vocabulary
    Package(crate::package::Args),

    /// Convert an ARPA language model to the binary format
    Binarize(crate::binarize::Args),
}

/// Where a scorer package comes from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum ScorerSource {
    /// Local file or directory if it exists, otherwise the Hugging Face API
    #[default]
    Auto,
    /// Local file or directory
    Path,
    /// Hugging Face cache only
    Cache,
    /// Hugging Face API
    Api,
}

/// Scorer package selection.
#[derive(clap::Args, Clone, Debug, Default)]
pub struct ScorerArgs {
    /// Scorer package file, directory or Hugging Face model id
    #[arg(long)]
    pub scorer: Option<String>,

    /// How to interpret --scorer
    #[arg(long, value_enum, default_value_t = ScorerSource::Auto)]
    pub scorer_source: ScorerSource,
}

/// Alphabet selection.
#[derive(clap::Args, Clone, Debug, Default)]
pub struct AlphabetArgs {
    /// Alphabet config file (one symbol per line)
    #[arg(long, conflicts_with = "utf8")]
    pub alphabet: Option<PathBuf>,

    /// Use the 255-symbol UTF-8 byte alphabet
    #[arg(long)]
    pub utf8: bool,
}

/// Execute CLI command - separated for testing.
pub fn run_cli(cli: Cli) -> Result<()> {
    tracing::debug!(?cli, "parsed arguments");

    match cli.command {
        Commands::Decode(args) => crate::decode::execute(args.try_into()?),
        Commands::Package(args) => crate::package::execute(args.try_into()?),
        Commands::Binarize(args) => crate::binarize::execute(args.try_into()?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctcfuse::config::DecoderConfig;

    #[test]
    fn parses_decode_defaults() {
        let cli = Cli::parse_from(["ctcfuse", "decode", "probs.json"]);

        match &cli.command {
            Commands::Decode(crate::decode::Args {
                input,
                alphabet_args,
                scorer_args,
                decoder_config,
                scorer_params,
                batch: false,
                workers: None,
            }) if input.to_str() == Some("probs.json") => {
                assert_eq!(alphabet_args.alphabet, None);
                assert!(!alphabet_args.utf8);
                assert_eq!(scorer_args.scorer, None);
                assert_eq!(scorer_args.scorer_source, ScorerSource::Auto);
                assert_eq!(decoder_config, &DecoderConfig::default());
                assert_eq!(scorer_params.alpha, None);
            }
            _ => panic!("unexpected command: {:?}", cli.command),
        }
    }

    #[test]
    fn parses_decode_options() {
        let cli = Cli::parse_from([
            "ctcfuse",
            "decode",
            "probs.json",
            "--alphabet",
            "alphabet.txt",
            "--scorer",
            "kenlm.scorer",
            "--beam-size",
            "32",
            "--cutoff-prob",
            "0.99",
            "--alpha",
            "0.5",
            "--batch",
            "--workers",
            "4",
        ]);

        match &cli.command {
            Commands::Decode(crate::decode::Args {
                alphabet_args,
                scorer_args,
                decoder_config,
                scorer_params,
                batch: true,
                workers: Some(4),
                ..
            }) => {
                assert_eq!(
                    alphabet_args.alphabet.as_deref(),
                    Some(std::path::Path::new("alphabet.txt"))
                );
                assert_eq!(scorer_args.scorer.as_deref(), Some("kenlm.scorer"));
                assert_eq!(decoder_config.beam_size, 32);
                assert!((decoder_config.cutoff_prob - 0.99).abs() < 1e-6);
                assert_eq!(decoder_config.cutoff_top_n, 40);
                assert_eq!(scorer_params.alpha, Some(0.5));
                assert_eq!(scorer_params.beta, None);
            }
            _ => panic!("unexpected command: {:?}", cli.command),
        }
    }

    #[test]
    fn alphabet_and_utf8_conflict() {
        let result = Cli::try_parse_from([
            "ctcfuse",
            "decode",
            "probs.json",
            "--alphabet",
            "a.txt",
            "--utf8",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn parses_package_command() {
        let cli = Cli::parse_from([
            "ctcfuse",
            "package",
            "--lm",
            "lm.bin",
            "--vocab",
            "vocab.txt",
            "--package",
            "kenlm.scorer",
            "--default-alpha",
            "0.93",
            "--default-beta",
            "1.18",
            "--force-bytes-output-mode",
            "true",
        ]);

        match &cli.command {
            Commands::Package(crate::package::Args {
                alphabet: None,
                force_bytes_output_mode: Some(true),
                default_alpha,
                default_beta,
                ..
            }) => {
                assert!((default_alpha - 0.93).abs() < 1e-12);
                assert!((default_beta - 1.18).abs() < 1e-12);
            }
            _ => panic!("unexpected command: {:?}", cli.command),
        }
    }

    #[test]
    fn parses_binarize_command() {
        let cli = Cli::parse_from(["ctcfuse", "binarize", "lm.arpa", "-o", "lm.bin"]);

        assert!(matches!(
            &cli.command,
            Commands::Binarize(crate::binarize::Args { arpa, output: Some(output) })
            if arpa.to_str() == Some("lm.arpa") && output.to_str() == Some("lm.bin")
        ));
    }
}
