//! Binarize subcommand - convert an ARPA language model to the binary format.

use ctcfuse::lm::LanguageModel;
use eyre::{Result, WrapErr};
use std::path::PathBuf;
use std::time::Instant;

/// CLI arguments for ARPA conversion.
#[derive(clap::Args, Debug)]
pub struct Args {
    /// Path to the ARPA file
    pub arpa: PathBuf,

    /// Output path (default: same as input with .bin extension)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Resolved configuration for ARPA conversion.
#[derive(Debug)]
pub struct Config {
    pub arpa: PathBuf,
    pub output: PathBuf,
}

impl TryFrom<Args> for Config {
    type Error = eyre::Error;

    fn try_from(args: Args) -> Result<Self> {
        let output = args
            .output
            .unwrap_or_else(|| args.arpa.with_extension("bin"));

        if output == args.arpa {
            eyre::bail!("output would overwrite the ARPA file: {:?}", output.display());
        }

        Ok(Self {
            arpa: args.arpa,
            output,
        })
    }
}

pub fn execute(config: Config) -> Result<()> {
    tracing::info!(
        input = ?config.arpa.display(),
        output = ?config.output.display(),
        "converting language model"
    );

    let s = Instant::now();

    let lm = LanguageModel::from_arpa(&config.arpa)
        .wrap_err_with(|| format!("failed to read ARPA: {:?}", config.arpa.display()))?;

    lm.save(&config.output)
        .wrap_err_with(|| format!("failed to write model: {:?}", config.output.display()))?;

    tracing::info!(
        order = lm.order(),
        counts = ?lm.counts(),
        duration = ?s.elapsed(),
        "language model written"
    );

    Ok(())
}
