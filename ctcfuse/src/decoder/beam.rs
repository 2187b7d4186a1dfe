//! Hypotheses and the per-step hypothesis set.

use crate::lm::LmState;
use crate::scorer::{Boundary, Scorer};
use crate::trie::TrieState;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::f64::consts::LN_2;

pub(crate) const NEG_INF: f64 = f64::NEG_INFINITY;

/// `ln(exp(a) + exp(b))` without overflow.
pub(crate) fn log_sum_exp(a: f64, b: f64) -> f64 {
    if a == NEG_INF {
        return b;
    }
    if b == NEG_INF {
        return a;
    }
    if a == b {
        return a + LN_2;
    }
    let max = a.max(b);
    max + (-(a - b).abs()).exp().ln_1p()
}

/// One prefix hypothesis.
///
/// Everything except the two acoustic probabilities is a function of
/// `labels` alone, so paths that collapse to the same prefix agree on it.
#[derive(Clone, Debug)]
pub(crate) struct Beam {
    /// Collapsed label sequence.
    pub labels: Vec<u32>,
    /// Emission step of every label.
    pub timesteps: Vec<usize>,
    /// ln P(paths ending in blank)
    pub log_p_blank: f64,
    /// ln P(paths ending in the last label)
    pub log_p_label: f64,
    /// Weighted LM score of the completed words.
    pub lm_score: f64,
    pub lm_state: LmState,
    pub trie_state: Option<TrieState>,
    /// Start of the unfinished word in `labels`.
    pub word_start: usize,
    /// Largest single contribution this step; picks `timesteps`.
    best_contribution: f64,
}

impl Beam {
    /// Empty prefix with probability one.
    pub fn root(scorer: Option<&Scorer>) -> Self {
        Self {
            labels: Vec::new(),
            timesteps: Vec::new(),
            log_p_blank: 0.0,
            log_p_label: NEG_INF,
            lm_score: 0.0,
            lm_state: scorer.map(Scorer::begin_state).unwrap_or_default(),
            trie_state: scorer.and_then(Scorer::root_state),
            word_start: 0,
            best_contribution: NEG_INF,
        }
    }

    /// Acoustic log probability of the prefix.
    pub fn acoustic(&self) -> f64 {
        log_sum_exp(self.log_p_blank, self.log_p_label)
    }

    /// Ranking score: acoustic plus LM.
    pub fn score(&self) -> f64 {
        self.acoustic() + self.lm_score
    }

    pub fn last(&self) -> Option<u32> {
        self.labels.last().copied()
    }

    pub fn pending(&self) -> &[u32] {
        &self.labels[self.word_start..]
    }

    /// Same prefix with no probability mass yet.
    fn carried(&self) -> Self {
        Self {
            log_p_blank: NEG_INF,
            log_p_label: NEG_INF,
            best_contribution: NEG_INF,
            ..self.clone()
        }
    }

    /// Prefix extended by `label` emitted at `step`, with LM fields advanced.
    fn extended(&self, label: u32, step: usize, scorer: Option<&Scorer>) -> Self {
        let mut child = self.carried();
        child.labels.push(label);
        child.timesteps.push(step);

        let Some(scorer) = scorer else {
            return child;
        };

        match scorer.boundary(self.pending(), label) {
            Boundary::Continue => {
                child.trie_state = scorer.advance(self.trie_state, label);
            }
            Boundary::Before => {
                let word = self.pending();
                if !word.is_empty() {
                    let text = scorer.alphabet().decode(word);
                    let (state, score) =
                        scorer.score_boundary(self.trie_state, &self.lm_state, &text);
                    child.lm_state = state;
                    child.lm_score += score;
                }
                child.trie_state = scorer.root_state();
                child.word_start = child.labels.len();
            }
            Boundary::After => {
                let trie_state = scorer.advance(self.trie_state, label);
                let text = scorer.alphabet().decode(child.pending());
                let (state, score) = scorer.score_boundary(trie_state, &self.lm_state, &text);
                child.lm_state = state;
                child.lm_score += score;
                child.trie_state = scorer.root_state();
                child.word_start = child.labels.len();
            }
        }
        child
    }

    /// Score the unfinished trailing word, if any.
    pub fn finalize(&mut self, scorer: Option<&Scorer>) {
        let Some(scorer) = scorer else {
            return;
        };
        if self.pending().is_empty() {
            return;
        }
        let text = scorer.alphabet().decode(self.pending());
        let (state, score) = scorer.score_boundary(self.trie_state, &self.lm_state, &text);
        self.lm_state = state;
        self.lm_score += score;
        self.trie_state = scorer.root_state();
        self.word_start = self.labels.len();
    }

    fn offer(&mut self, contribution: f64, timesteps: impl FnOnce() -> Vec<usize>) {
        if contribution > self.best_contribution {
            self.best_contribution = contribution;
            self.timesteps = timesteps();
        }
    }

    /// Path mass ending in blank, from `source` with the same prefix.
    pub fn add_blank(&mut self, contribution: f64, source: &Beam) {
        self.log_p_blank = log_sum_exp(self.log_p_blank, contribution);
        self.offer(contribution, || source.timesteps.clone());
    }

    /// Repeat of the last label, collapsed into the same prefix.
    pub fn add_repeat(&mut self, contribution: f64, source: &Beam) {
        self.log_p_label = log_sum_exp(self.log_p_label, contribution);
        self.offer(contribution, || source.timesteps.clone());
    }

    /// New label emitted at `step` after `parent`.
    pub fn add_emission(&mut self, contribution: f64, parent: &Beam, step: usize) {
        self.log_p_label = log_sum_exp(self.log_p_label, contribution);
        self.offer(contribution, || {
            let mut timesteps = Vec::with_capacity(parent.timesteps.len() + 1);
            timesteps.extend_from_slice(&parent.timesteps);
            timesteps.push(step);
            timesteps
        });
    }
}

/// Best first; ties go to the shorter, then lexicographically smaller prefix.
pub(crate) fn rank(a: &Beam, b: &Beam) -> Ordering {
    b.score()
        .total_cmp(&a.score())
        .then_with(|| a.labels.len().cmp(&b.labels.len()))
        .then_with(|| a.labels.cmp(&b.labels))
}

/// Next generation of hypotheses, merged by prefix.
#[derive(Debug, Default)]
pub(crate) struct BeamSet {
    index: HashMap<Vec<u32>, usize>,
    beams: Vec<Beam>,
    scratch: Vec<u32>,
}

impl BeamSet {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            index: HashMap::with_capacity(capacity),
            beams: Vec::with_capacity(capacity),
            scratch: Vec::new(),
        }
    }

    /// The entry for `beam`'s own prefix.
    pub fn same(&mut self, beam: &Beam) -> &mut Beam {
        let slot = match self.index.get(beam.labels.as_slice()) {
            Some(&slot) => slot,
            None => self.insert(beam.carried()),
        };
        &mut self.beams[slot]
    }

    /// The entry for `beam`'s prefix plus `label`.
    pub fn child(
        &mut self,
        beam: &Beam,
        label: u32,
        step: usize,
        scorer: Option<&Scorer>,
    ) -> &mut Beam {
        self.scratch.clear();
        self.scratch.extend_from_slice(&beam.labels);
        self.scratch.push(label);

        let slot = match self.index.get(self.scratch.as_slice()) {
            Some(&slot) => slot,
            None => self.insert(beam.extended(label, step, scorer)),
        };
        &mut self.beams[slot]
    }

    fn insert(&mut self, beam: Beam) -> usize {
        let slot = self.beams.len();
        self.index.insert(beam.labels.clone(), slot);
        self.beams.push(beam);
        slot
    }

    pub fn len(&self) -> usize {
        self.beams.len()
    }

    /// Ranked hypotheses, at most `limit` of them.
    pub fn into_ranked(self, limit: usize) -> Vec<Beam> {
        let mut beams = self.beams;
        beams.sort_by(rank);
        beams.truncate(limit);
        beams
    }
}
