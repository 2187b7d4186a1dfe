//! CTC prefix beam search with optional language model fusion.
//!
//! Every hypothesis is a collapsed label prefix carrying two acoustic
//! probabilities (paths ending in blank, paths ending in the last label).
//! Per time step each prefix is extended by the labels that survive
//! pruning, extensions reaching the same prefix are merged with
//! log-sum-exp, and the best `beam_size` prefixes are kept, ranked by
//! acoustic plus language model score.
//!
//! The language model part of a hypothesis depends only on its prefix, so
//! merged paths always agree on it.

mod beam;
mod prune;
mod state;

pub use state::{DecoderState, ROW_SUM_TOLERANCE};

use crate::alphabet::Alphabet;
use crate::config::DecoderConfig;
use crate::error::Result;
use crate::scorer::Scorer;
use crate::types::Output;
use ndarray::ArrayView2;

/// Decode one `[time, alphabet size + 1]` probability matrix.
///
/// The last column is the blank. Results are sorted by descending
/// confidence, at most `config.result_limit()` of them.
pub fn decode(
    probs: ArrayView2<f32>,
    alphabet: &Alphabet,
    config: &DecoderConfig,
    scorer: Option<&Scorer>,
) -> Result<Vec<Output>> {
    tracing::debug!(
        steps = probs.nrows(),
        classes = probs.ncols(),
        beam_size = config.beam_size,
        scorer = scorer.is_some(),
        "decoding sequence"
    );

    let mut state = DecoderState::new(alphabet, *config, scorer)?;
    state.next(probs)?;
    Ok(state.finish(config.result_limit()))
}
