//! Parallel decoding of independent sequences.

use crate::alphabet::Alphabet;
use crate::config::DecoderConfig;
use crate::decoder::decode;
use crate::error::{ConfigError, InputError, Result};
use crate::scorer::Scorer;
use crate::types::Output;
use ndarray::{ArrayView3, s};
use rayon::prelude::*;

/// Decode a `[batch, time, alphabet size + 1]` tensor.
///
/// Sequence `i` uses its first `seq_lengths[i]` time steps. Work runs on a
/// dedicated pool of at most `num_workers` threads (capped by the available
/// parallelism). Results come back in input order; a malformed sequence
/// yields an error in its own slot without affecting the others.
///
/// The outer error covers configuration problems that concern the whole
/// batch.
pub fn decode_batch(
    probs: ArrayView3<f32>,
    seq_lengths: &[usize],
    alphabet: &Alphabet,
    config: &DecoderConfig,
    num_workers: usize,
    scorer: Option<&Scorer>,
) -> Result<Vec<Result<Vec<Output>>>> {
    config.validate()?;
    if num_workers == 0 {
        return Err(ConfigError::InvalidWorkers.into());
    }

    let (batch, steps, classes) = probs.dim();
    if seq_lengths.len() != batch {
        return Err(ConfigError::BatchLengthMismatch {
            batch,
            lengths: seq_lengths.len(),
        }
        .into());
    }
    if classes != alphabet.size() + 1 {
        return Err(ConfigError::ClassCountMismatch {
            expected: alphabet.size() + 1,
            got: classes,
        }
        .into());
    }

    let available = std::thread::available_parallelism().map_or(1, |n| n.get());
    let threads = num_workers.min(available);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("ctcfuse-decode-{i}"))
        .build()?;

    tracing::debug!(batch, steps, threads, "decoding batch");

    let results = pool.install(|| {
        (0..batch)
            .into_par_iter()
            .map(|i| {
                let length = seq_lengths[i];
                if length > steps {
                    return Err(InputError::SequenceLength {
                        length,
                        max: steps,
                    }
                    .into());
                }
                let sequence = probs.slice(s![i, ..length, ..]);
                decode(sequence, alphabet, config, scorer).inspect_err(
                    |e| tracing::warn!(sequence = i, error = %e, "sequence failed to decode"),
                )
            })
            .collect::<Vec<_>>()
    });

    Ok(results)
}
