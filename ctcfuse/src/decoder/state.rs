//! Incremental prefix beam search.

use super::beam::{Beam, BeamSet, NEG_INF, rank};
use super::prune::pruned_log_probs;
use crate::alphabet::Alphabet;
use crate::config::DecoderConfig;
use crate::error::{ConfigError, InputError, Result};
use crate::scorer::Scorer;
use crate::types::Output;
use ndarray::{ArrayView1, ArrayView2, Axis};

/// Largest allowed distance of a row sum from one.
pub const ROW_SUM_TOLERANCE: f32 = 1e-3;

/// Beam search over one sequence, fed in chunks of time steps.
///
/// ```ignore
/// let mut state = DecoderState::new(&alphabet, config, scorer.as_ref())?;
/// state.next(first_chunk.view())?;
/// state.next(second_chunk.view())?;
/// let outputs = state.finish(config.result_limit());
/// ```
#[derive(Debug)]
pub struct DecoderState<'a> {
    alphabet: &'a Alphabet,
    scorer: Option<&'a Scorer>,
    config: DecoderConfig,
    beams: Vec<Beam>,
    time_step: usize,
    candidates: Vec<(u32, f64)>,
}

impl<'a> DecoderState<'a> {
    /// Start a decode. A scorer must use the same alphabet.
    pub fn new(
        alphabet: &'a Alphabet,
        config: DecoderConfig,
        scorer: Option<&'a Scorer>,
    ) -> Result<Self> {
        config.validate()?;
        if let Some(scorer) = scorer {
            let found = scorer.alphabet();
            if found != alphabet {
                return Err(ConfigError::AlphabetMismatch {
                    expected: alphabet.size(),
                    expected_mode: alphabet.mode().as_str(),
                    found: found.size(),
                    found_mode: found.mode().as_str(),
                }
                .into());
            }
        }

        Ok(Self {
            alphabet,
            scorer,
            config,
            beams: vec![Beam::root(scorer)],
            time_step: 0,
            candidates: Vec::with_capacity(config.cutoff_top_n),
        })
    }

    /// Time steps consumed so far.
    pub fn time_step(&self) -> usize {
        self.time_step
    }

    /// Consume a `[steps, alphabet size + 1]` chunk of probabilities.
    ///
    /// The whole chunk is validated first; on error the state is unchanged.
    pub fn next(&mut self, probs: ArrayView2<f32>) -> Result<()> {
        validate(probs, self.alphabet.size() + 1, self.time_step)?;

        for row in probs.axis_iter(Axis(0)) {
            self.step(row);
        }

        tracing::trace!(
            time_step = self.time_step,
            beams = self.beams.len(),
            "consumed chunk"
        );
        Ok(())
    }

    fn step(&mut self, row: ArrayView1<f32>) {
        let blank = self.alphabet.blank_id();
        let scorer = self.scorer;
        let t = self.time_step;

        pruned_log_probs(
            row,
            self.config.cutoff_prob,
            self.config.cutoff_top_n,
            &mut self.candidates,
        );

        let mut next = BeamSet::with_capacity(self.beams.len() * self.candidates.len());
        for beam in &self.beams {
            let total = beam.acoustic();
            for &(label, log_p) in &self.candidates {
                if label == blank {
                    next.same(beam).add_blank(total + log_p, beam);
                } else if beam.last() == Some(label) {
                    if beam.log_p_label > NEG_INF {
                        next.same(beam).add_repeat(beam.log_p_label + log_p, beam);
                    }
                    if beam.log_p_blank > NEG_INF {
                        next.child(beam, label, t, scorer)
                            .add_emission(beam.log_p_blank + log_p, beam, t);
                    }
                } else {
                    next.child(beam, label, t, scorer)
                        .add_emission(total + log_p, beam, t);
                }
            }
        }

        self.beams = next.into_ranked(self.config.beam_size);
        self.time_step += 1;
    }

    /// Best hypotheses so far, with trailing words scored.
    ///
    /// Does not consume the state; decoding can continue afterwards.
    pub fn finish(&self, num_results: usize) -> Vec<Output> {
        let mut beams = self.beams.clone();
        for beam in &mut beams {
            beam.finalize(self.scorer);
        }
        beams.sort_by(rank);
        beams.truncate(num_results.min(self.config.beam_size));

        beams
            .into_iter()
            .map(|beam| Output {
                confidence: beam.score(),
                text: self.alphabet.decode(&beam.labels),
                tokens: beam.labels,
                timesteps: beam.timesteps,
            })
            .collect()
    }
}

/// Check shape and probability values of a chunk starting at `first_row`.
pub(crate) fn validate(
    probs: ArrayView2<f32>,
    width: usize,
    first_row: usize,
) -> std::result::Result<(), InputError> {
    if probs.ncols() != width {
        return Err(InputError::RowWidth {
            row: first_row,
            expected: width,
            got: probs.ncols(),
        });
    }

    for (i, row) in probs.axis_iter(Axis(0)).enumerate() {
        let row_index = first_row + i;
        let mut sum = 0.0f32;
        for (class, &p) in row.iter().enumerate() {
            if !p.is_finite() || p < 0.0 {
                return Err(InputError::InvalidProbability {
                    row: row_index,
                    class,
                    value: p,
                });
            }
            sum += p;
        }
        if (sum - 1.0).abs() > ROW_SUM_TOLERANCE {
            return Err(InputError::RowSum {
                row: row_index,
                sum,
            });
        }
    }
    Ok(())
}
