//! Decode subcommand - beam search over probability matrices read from JSON.

use crate::cli::{AlphabetArgs, ScorerArgs};
use crate::config::{AlphabetConfig, ScorerConfig};
use color_eyre::Section;
use ctcfuse::batch::decode_batch;
use ctcfuse::config::{DecoderConfig, ScorerParams};
use ctcfuse::decoder::decode;
use ctcfuse::types::Output;
use eyre::{Result, WrapErr, eyre};
use ndarray::{Array2, Array3};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// CLI arguments for decoding.
#[derive(clap::Args, Debug)]
pub struct Args {
    /// JSON file holding a `[time][class]` matrix, or `-` for stdin
    pub input: PathBuf,

    #[command(flatten)]
    pub alphabet_args: AlphabetArgs,

    #[command(flatten)]
    pub scorer_args: ScorerArgs,

    #[command(flatten)]
    pub decoder_config: DecoderConfig,

    #[command(flatten)]
    pub scorer_params: ScorerParams,

    /// Input holds a list of matrices decoded in parallel
    #[arg(long)]
    pub batch: bool,

    /// Worker threads for --batch (default: available parallelism)
    #[arg(long)]
    pub workers: Option<usize>,
}

/// Resolved configuration for decoding.
#[derive(Debug)]
pub struct Config {
    pub input: PathBuf,
    pub alphabet: AlphabetConfig,
    pub scorer: ScorerConfig,
    pub decoder_config: DecoderConfig,
    pub scorer_params: ScorerParams,
    pub batch: bool,
    pub workers: usize,
}

impl TryFrom<Args> for Config {
    type Error = eyre::Error;

    fn try_from(args: Args) -> Result<Self> {
        args.scorer_params.validate()?;

        let workers = args.workers.unwrap_or_else(|| {
            std::thread::available_parallelism().map_or(1, |n| n.get())
        });

        Ok(Self {
            input: args.input,
            alphabet: args.alphabet_args.into(),
            scorer: args.scorer_args.try_into()?,
            decoder_config: args.decoder_config,
            scorer_params: args.scorer_params,
            batch: args.batch,
            workers,
        })
    }
}

/// Outcome of one sequence in batch mode.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
enum SequenceResult {
    Results(Vec<Output>),
    Error(String),
}

pub fn execute(config: Config) -> Result<()> {
    let explicit = config.alphabet.load()?;
    let mut scorer = config.scorer.load(explicit.as_ref())?;

    if let Some(scorer) = scorer.as_mut() {
        let (alpha, beta) = config
            .scorer_params
            .resolve((scorer.alpha(), scorer.beta()));
        scorer.reset_params(alpha, beta)?;
        tracing::info!(alpha, beta, utf8 = scorer.is_utf8_mode(), "scorer ready");
    }

    let alphabet = match (explicit, scorer.as_ref()) {
        (Some(alphabet), _) => alphabet,
        (None, Some(scorer)) => scorer.alphabet().clone(),
        (None, None) => {
            return Err(eyre!("no alphabet available")
                .suggestion("pass --alphabet <file>, --utf8 or a --scorer package"));
        }
    };

    let s = Instant::now();

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    if config.batch {
        let matrices: Vec<Vec<Vec<f32>>> = read_json(&config.input)?;
        let (probs, lengths, malformed) = stack_batch(&matrices, alphabet.size() + 1);

        tracing::info!(
            sequences = lengths.len(),
            workers = config.workers,
            "decoding batch"
        );

        let results = decode_batch(
            probs.view(),
            &lengths,
            &alphabet,
            &config.decoder_config,
            config.workers,
            scorer.as_ref(),
        )?
        .into_iter()
        .zip(malformed)
        .map(|(result, malformed)| match (malformed, result) {
            (Some(reason), _) => SequenceResult::Error(reason),
            (None, Ok(outputs)) => SequenceResult::Results(outputs),
            (None, Err(e)) => SequenceResult::Error(e.to_string()),
        })
        .collect::<Vec<_>>();

        serde_json::to_writer_pretty(&mut out, &results)?;
    } else {
        let rows: Vec<Vec<f32>> = read_json(&config.input)?;
        let probs = to_matrix(&rows, alphabet.size() + 1)?;

        tracing::info!(steps = probs.nrows(), "decoding");

        let outputs = decode(
            probs.view(),
            &alphabet,
            &config.decoder_config,
            scorer.as_ref(),
        )?;

        serde_json::to_writer_pretty(&mut out, &outputs)?;
    }
    writeln!(out)?;

    tracing::info!(duration = ?s.elapsed(), "decoding completed");

    Ok(())
}

/// Read a JSON document from a file, or stdin for `-`.
fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let reader: Box<dyn Read> = if path == Path::new("-") {
        Box::new(std::io::stdin().lock())
    } else {
        let file = std::fs::File::open(path)
            .wrap_err_with(|| format!("failed to open input: {:?}", path.display()))?;
        Box::new(file)
    };

    serde_json::from_reader(BufReader::new(reader))
        .wrap_err_with(|| format!("failed to parse input: {:?}", path.display()))
}

fn to_matrix(rows: &[Vec<f32>], width: usize) -> Result<Array2<f32>> {
    let mut probs = Array2::zeros((rows.len(), width));
    for (t, row) in rows.iter().enumerate() {
        if row.len() != width {
            return Err(eyre!(
                "row {t} has {} classes, expected {width}",
                row.len()
            ));
        }
        for (c, &p) in row.iter().enumerate() {
            probs[[t, c]] = p;
        }
    }
    Ok(probs)
}

/// Zero-pad matrices into one `[batch, time, width]` tensor with their lengths.
///
/// A ragged matrix gets length zero and its reason in the returned slot, so
/// only that sequence fails.
fn stack_batch(
    matrices: &[Vec<Vec<f32>>],
    width: usize,
) -> (Array3<f32>, Vec<usize>, Vec<Option<String>>) {
    let steps = matrices.iter().map(Vec::len).max().unwrap_or(0);

    let mut probs = Array3::zeros((matrices.len(), steps, width));
    let mut lengths = vec![0; matrices.len()];
    let mut malformed = vec![None; matrices.len()];

    for (i, rows) in matrices.iter().enumerate() {
        match to_matrix(rows, width) {
            Ok(matrix) => {
                probs
                    .slice_mut(ndarray::s![i, ..rows.len(), ..])
                    .assign(&matrix);
                lengths[i] = rows.len();
            }
            Err(e) => {
                tracing::warn!(sequence = i, error = %e, "malformed sequence");
                malformed[i] = Some(e.to_string());
            }
        }
    }
    (probs, lengths, malformed)
}
