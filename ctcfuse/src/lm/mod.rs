//! Back-off n-gram language model with incremental scoring state.
//!
//! Scores are base-10 log probabilities, as stored in ARPA files. A model is
//! built from ARPA text ([`arpa`]) or read from the binary layout written by
//! [`binary`]; after that it is immutable and shared across decoder threads.

pub mod arpa;
pub mod binary;

use crate::error::{LoadError, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Highest supported n-gram order.
pub const MAX_ORDER: usize = 6;

/// Log10 probability given to words outside the vocabulary when the model
/// has no `<unk>` entry.
pub const UNKNOWN_LOG10_PROB: f32 = -100.0;

pub const BEGIN_SENTENCE: &str = "<s>";
pub const END_SENTENCE: &str = "</s>";
pub const UNKNOWN_WORD: &str = "<unk>";

/// Index into the model vocabulary.
pub type WordIndex = u32;

/// Fixed-size n-gram key, words in chronological order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct NgramKey {
    words: [WordIndex; MAX_ORDER],
    len: u8,
}

impl NgramKey {
    pub(crate) fn new(words: &[WordIndex]) -> Self {
        let mut key = Self {
            words: [0; MAX_ORDER],
            len: words.len() as u8,
        };
        key.words[..words.len()].copy_from_slice(words);
        key
    }

    pub(crate) fn words(&self) -> &[WordIndex] {
        &self.words[..self.len as usize]
    }
}

/// Probability and back-off weight of one n-gram.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct NgramEntry {
    pub log10_prob: f32,
    pub log10_backoff: f32,
}

/// Scoring context: the most recent words, most recent first.
///
/// Always trimmed to the longest suffix that the model knows, so two
/// histories that score identically share one state value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct LmState {
    context: [WordIndex; MAX_ORDER - 1],
    len: u8,
}

impl LmState {
    /// Number of context words carried.
    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Context words, most recent first.
    pub fn words(&self) -> &[WordIndex] {
        &self.context[..self.len as usize]
    }
}

#[derive(Debug)]
pub struct LanguageModel {
    order: usize,
    vocab: Vec<String>,
    word_index: HashMap<String, WordIndex>,
    ngrams: HashMap<NgramKey, NgramEntry>,
    counts: Vec<u64>,
    begin_sentence: Option<WordIndex>,
    unknown: Option<WordIndex>,
}

impl LanguageModel {
    pub(crate) fn from_parts(
        order: usize,
        vocab: Vec<String>,
        ngrams: HashMap<NgramKey, NgramEntry>,
    ) -> std::result::Result<Self, LoadError> {
        if order == 0 || order > MAX_ORDER {
            return Err(LoadError::InvalidOrder {
                order,
                max: MAX_ORDER,
            });
        }

        let mut word_index = HashMap::with_capacity(vocab.len());
        for (i, word) in vocab.iter().enumerate() {
            if word_index.insert(word.clone(), i as WordIndex).is_some() {
                return Err(LoadError::Corrupt {
                    what: "language model",
                    reason: format!("word {word:?} listed twice"),
                });
            }
        }

        let mut counts = vec![0u64; order];
        for key in ngrams.keys() {
            let n = key.len as usize;
            if n == 0 || n > order {
                return Err(LoadError::Corrupt {
                    what: "language model",
                    reason: format!("{n}-gram in an order {order} model"),
                });
            }
            if let Some(&w) = key.words().iter().find(|&&w| w as usize >= vocab.len()) {
                return Err(LoadError::Corrupt {
                    what: "language model",
                    reason: format!("word index {w} outside vocabulary"),
                });
            }
            counts[n - 1] += 1;
        }

        let begin_sentence = word_index.get(BEGIN_SENTENCE).copied();
        let unknown = word_index.get(UNKNOWN_WORD).copied();

        Ok(Self {
            order,
            vocab,
            word_index,
            ngrams,
            counts,
            begin_sentence,
            unknown,
        })
    }

    /// Load a binary language model file.
    ///
    /// Trailing bytes after the model (a packaged dictionary) are ignored;
    /// see [`LanguageModel::load_with_offset`] to locate them.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::load_with_offset(path).map(|(lm, _)| lm)
    }

    /// Load a binary language model and return the byte offset where it ends.
    pub fn load_with_offset(path: impl AsRef<Path>) -> Result<(Self, u64)> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| LoadError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        let (lm, end) = binary::read(BufReader::new(file))?;

        tracing::info!(
            path = %path.display(),
            order = lm.order,
            vocab = lm.vocab.len(),
            ngrams = lm.ngrams.len(),
            "loaded language model"
        );

        Ok((lm, end))
    }

    pub fn order(&self) -> usize {
        self.order
    }

    /// Number of vocabulary words, including sentence markers.
    pub fn vocab_size(&self) -> usize {
        self.vocab.len()
    }

    pub fn vocabulary(&self) -> impl Iterator<Item = &str> {
        self.vocab.iter().map(String::as_str)
    }

    /// Number of n-grams stored per order, unigrams first.
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    pub fn word_index(&self, word: &str) -> Option<WordIndex> {
        self.word_index.get(word).copied()
    }

    pub fn is_oov(&self, word: &str) -> bool {
        !self.word_index.contains_key(word)
    }

    /// Context at the start of a sentence (`<s>`), or the null context if
    /// the model has no sentence marker.
    pub fn begin_sentence_state(&self) -> LmState {
        match self.begin_sentence {
            Some(bos) => {
                let mut state = LmState::default();
                state.context[0] = bos;
                state.len = 1;
                state
            }
            None => LmState::default(),
        }
    }

    /// Empty context.
    pub fn null_context_state(&self) -> LmState {
        LmState::default()
    }

    /// Score `word` after `state`, returning the next state and log10 P(word | state).
    ///
    /// Words outside the vocabulary score as `<unk>` (or [`UNKNOWN_LOG10_PROB`]
    /// when the model has none) and reset the context.
    pub fn score_transition(&self, state: &LmState, word: &str) -> (LmState, f32) {
        match self.word_index(word) {
            Some(w) if Some(w) != self.unknown => self.score_index(state, w),
            _ => {
                let log10_prob = self
                    .unknown
                    .and_then(|unk| self.ngrams.get(&NgramKey::new(&[unk])))
                    .map(|e| e.log10_prob)
                    .unwrap_or(UNKNOWN_LOG10_PROB);
                (self.null_context_state(), log10_prob)
            }
        }
    }

    /// Log10 probability of a whole sentence, scored from `<s>` through `</s>`.
    pub fn full_score<'a>(&self, words: impl IntoIterator<Item = &'a str>) -> f32 {
        let mut state = self.begin_sentence_state();
        let mut total = 0.0;
        for word in words {
            let (next, log10_prob) = self.score_transition(&state, word);
            total += log10_prob;
            state = next;
        }
        if self.word_index.contains_key(END_SENTENCE) {
            total += self.score_transition(&state, END_SENTENCE).1;
        }
        total
    }

    fn score_index(&self, state: &LmState, word: WordIndex) -> (LmState, f32) {
        let context = state.words();
        let mut scratch = [0 as WordIndex; MAX_ORDER];
        let mut backoff = 0.0f32;
        let mut log10_prob = UNKNOWN_LOG10_PROB;

        // Longest matching n-gram wins; every longer context that missed
        // contributes its back-off weight.
        let max_context = context.len().min(self.order - 1);
        for k in (0..=max_context).rev() {
            let ngram = chronological(&mut scratch, &context[..k], Some(word));
            if let Some(entry) = self.ngrams.get(&NgramKey::new(ngram)) {
                log10_prob = entry.log10_prob + backoff;
                break;
            }
            if k > 0 {
                let history = chronological(&mut scratch, &context[..k], None);
                if let Some(entry) = self.ngrams.get(&NgramKey::new(history)) {
                    backoff += entry.log10_backoff;
                }
            }
        }

        (self.next_state(context, word), log10_prob)
    }

    fn next_state(&self, context: &[WordIndex], word: WordIndex) -> LmState {
        let mut candidate = [0 as WordIndex; MAX_ORDER - 1];
        let keep = (context.len() + 1).min(self.order - 1);
        if keep == 0 {
            return LmState::default();
        }
        candidate[0] = word;
        candidate[1..keep].copy_from_slice(&context[..keep - 1]);

        let mut scratch = [0 as WordIndex; MAX_ORDER];
        for len in (1..=keep).rev() {
            let ngram = chronological(&mut scratch, &candidate[..len], None);
            if self.ngrams.contains_key(&NgramKey::new(ngram)) {
                let mut state = LmState::default();
                state.context[..len].copy_from_slice(&candidate[..len]);
                state.len = len as u8;
                return state;
            }
        }
        LmState::default()
    }

    pub(crate) fn entries(&self) -> impl Iterator<Item = (&NgramKey, &NgramEntry)> {
        self.ngrams.iter()
    }
}

/// Lay out `recent_first` in chronological order, optionally followed by `next`.
fn chronological<'a>(
    scratch: &'a mut [WordIndex; MAX_ORDER],
    recent_first: &[WordIndex],
    next: Option<WordIndex>,
) -> &'a [WordIndex] {
    let n = recent_first.len();
    for (i, &w) in recent_first.iter().rev().enumerate() {
        scratch[i] = w;
    }
    match next {
        Some(w) => {
            scratch[n] = w;
            &scratch[..n + 1]
        }
        None => &scratch[..n],
    }
}
