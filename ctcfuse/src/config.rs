//! Decoder and scorer parameters.

use crate::error::ConfigError;

/// Default number of live hypotheses
const DEFAULT_BEAM_SIZE: usize = 100;

/// Default cumulative probability cutoff (keep everything)
const DEFAULT_CUTOFF_PROB: f32 = 1.0;

/// Default number of candidate labels per time step
const DEFAULT_CUTOFF_TOP_N: usize = 40;

/// Beam search configuration.
#[derive(clap::Args, Clone, Copy, Debug, PartialEq)]
pub struct DecoderConfig {
    /// Number of hypotheses kept after every time step
    #[arg(long, default_value_t = DEFAULT_BEAM_SIZE)]
    pub beam_size: usize,

    /// Only extend with labels inside this cumulative probability mass
    #[arg(long, default_value_t = DEFAULT_CUTOFF_PROB)]
    pub cutoff_prob: f32,

    /// Only extend with the N most probable labels
    #[arg(long, default_value_t = DEFAULT_CUTOFF_TOP_N)]
    pub cutoff_top_n: usize,

    /// Number of hypotheses returned (defaults to beam size)
    #[arg(long)]
    pub num_results: Option<usize>,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            beam_size: DEFAULT_BEAM_SIZE,
            cutoff_prob: DEFAULT_CUTOFF_PROB,
            cutoff_top_n: DEFAULT_CUTOFF_TOP_N,
            num_results: None,
        }
    }
}

impl DecoderConfig {
    /// Create a configuration with the given beam size and default cutoffs.
    pub fn new(beam_size: usize) -> Self {
        Self {
            beam_size,
            ..Self::default()
        }
    }

    pub fn with_cutoffs(mut self, cutoff_prob: f32, cutoff_top_n: usize) -> Self {
        self.cutoff_prob = cutoff_prob;
        self.cutoff_top_n = cutoff_top_n;
        self
    }

    pub fn with_num_results(mut self, num_results: usize) -> Self {
        self.num_results = Some(num_results);
        self
    }

    /// Results to return, never more than the beam size.
    pub fn result_limit(&self) -> usize {
        self.num_results
            .unwrap_or(self.beam_size)
            .min(self.beam_size)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.beam_size == 0 {
            return Err(ConfigError::InvalidBeamSize);
        }
        if !(self.cutoff_prob > 0.0 && self.cutoff_prob <= 1.0) {
            return Err(ConfigError::InvalidCutoffProb(self.cutoff_prob));
        }
        if self.cutoff_top_n == 0 {
            return Err(ConfigError::InvalidCutoffTopN);
        }
        Ok(())
    }
}

/// Optional overrides for the weights stored in a scorer package.
#[derive(clap::Args, Clone, Copy, Debug, Default, PartialEq)]
pub struct ScorerParams {
    /// Language model weight
    #[arg(long)]
    pub alpha: Option<f64>,

    /// Word insertion bonus
    #[arg(long)]
    pub beta: Option<f64>,
}

/// Check scorer weights: `alpha` finite and non-negative, `beta` finite.
pub fn validate_weights(alpha: f64, beta: f64) -> Result<(), ConfigError> {
    if alpha.is_finite() && alpha >= 0.0 && beta.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::InvalidWeights { alpha, beta })
    }
}

impl ScorerParams {
    /// Check the overrides that are set.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_weights(self.alpha.unwrap_or(0.0), self.beta.unwrap_or(0.0))
    }

    /// Fill unset weights from `defaults`.
    pub fn resolve(&self, defaults: (f64, f64)) -> (f64, f64) {
        (
            self.alpha.unwrap_or(defaults.0),
            self.beta.unwrap_or(defaults.1),
        )
    }
}
