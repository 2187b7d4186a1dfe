//! Language model fusion for beam search.
//!
//! A [`Scorer`] combines a [`LanguageModel`], an optional [`VocabularyTrie`]
//! and the weights `alpha` (LM weight) and `beta` (word insertion bonus). The
//! decoder asks it where words end and what a finished word is worth:
//!
//! ```text
//! score = alpha * ln P_lm(word | context) + beta
//! ```
//!
//! Words that the LM does not know, or that left the trie, get the fixed
//! [`OOV_SCORE`] instead of the LM term.

use crate::alphabet::Alphabet;
use crate::codec::{BlobReader, PutLe};
use crate::config::validate_weights;
use crate::error::{ConfigError, LoadError, Result};
use crate::lm::{BEGIN_SENTENCE, END_SENTENCE, LanguageModel, LmState, UNKNOWN_WORD};
use crate::trie::{TrieState, VocabularyTrie};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;

/// Natural-log score standing in for the LM term of an unknown word.
pub const OOV_SCORE: f64 = -1000.0;

const MAGIC: &[u8; 4] = b"TRIE";
const VERSION: u32 = 1;
const WHAT: &str = "dictionary";

/// Where a new label leaves the word currently being spelled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Boundary {
    /// The word continues with this label.
    Continue,
    /// The label is a separator: the word ends before it.
    Before,
    /// The label completes a scored unit (one codepoint in UTF-8 mode).
    After,
}

/// Defaults stored in a package and the decoded dictionary contents.
struct Dictionary {
    utf8_mode: bool,
    alpha: f64,
    beta: f64,
    alphabet: Alphabet,
    trie: VocabularyTrie,
}

/// Cheap to clone: the model, trie and alphabet are shared.
#[derive(Clone, Debug)]
pub struct Scorer {
    lm: Arc<LanguageModel>,
    dictionary: Option<Arc<VocabularyTrie>>,
    alphabet: Arc<Alphabet>,
    space_label: Option<u32>,
    utf8_mode: bool,
    alpha: f64,
    beta: f64,
}

impl Scorer {
    /// Scorer without a dictionary. UTF-8 mode follows the alphabet.
    ///
    /// `alpha` must be finite and non-negative, `beta` finite.
    pub fn new(
        lm: Arc<LanguageModel>,
        alphabet: Alphabet,
        alpha: f64,
        beta: f64,
    ) -> Result<Self> {
        validate_weights(alpha, beta)?;
        let space_label = alphabet.space_label().or_else(|| alphabet.encode(b" ").ok());
        Ok(Self {
            lm,
            dictionary: None,
            utf8_mode: alphabet.is_utf8(),
            alphabet: Arc::new(alphabet),
            space_label,
            alpha,
            beta,
        })
    }

    /// Load a package and check its embedded alphabet against `alphabet`.
    pub fn from_package(path: impl AsRef<Path>, alphabet: &Alphabet) -> Result<Self> {
        let scorer = Self::from_package_embedded(path)?;
        if scorer.alphabet.as_ref() != alphabet {
            return Err(ConfigError::AlphabetMismatch {
                expected: alphabet.size(),
                expected_mode: alphabet.mode().as_str(),
                found: scorer.alphabet.size(),
                found_mode: scorer.alphabet.mode().as_str(),
            }
            .into());
        }
        Ok(scorer)
    }

    /// Load a package using the alphabet stored inside it.
    pub fn from_package_embedded(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let (lm, offset) = LanguageModel::load_with_offset(path)?;

        let mut file = File::open(path).map_err(|source| LoadError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        file.seek(SeekFrom::Start(offset))?;
        let mut blob = Vec::new();
        file.read_to_end(&mut blob)?;
        if blob.is_empty() {
            return Err(LoadError::NoDictionary.into());
        }

        let dictionary = read_dictionary(&blob)?;
        tracing::info!(
            path = %path.display(),
            utf8_mode = dictionary.utf8_mode,
            alpha = dictionary.alpha,
            beta = dictionary.beta,
            words = dictionary.trie.word_count(),
            "loaded scorer package"
        );

        let mut scorer = Self::new(
            Arc::new(lm),
            dictionary.alphabet,
            dictionary.alpha,
            dictionary.beta,
        )?;
        scorer.utf8_mode = dictionary.utf8_mode;
        scorer.dictionary = Some(Arc::new(dictionary.trie));
        Ok(scorer)
    }

    /// Change the weights for subsequent decodes.
    ///
    /// Beams scored earlier keep the weights they were scored with. Invalid
    /// weights are rejected and the current ones kept.
    pub fn reset_params(&mut self, alpha: f64, beta: f64) -> Result<()> {
        validate_weights(alpha, beta)?;
        self.alpha = alpha;
        self.beta = beta;
        Ok(())
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    pub fn is_utf8_mode(&self) -> bool {
        self.utf8_mode
    }

    pub fn set_utf8_mode(&mut self, utf8_mode: bool) {
        self.utf8_mode = utf8_mode;
    }

    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    pub fn language_model(&self) -> &LanguageModel {
        &self.lm
    }

    pub fn dictionary(&self) -> Option<&VocabularyTrie> {
        self.dictionary.as_deref()
    }

    /// Build the dictionary from vocabulary words.
    ///
    /// Sentence markers, `<unk>` and words with symbols outside the alphabet
    /// are skipped. Returns the number of distinct words inserted.
    pub fn fill_dictionary<I, S>(&mut self, words: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut trie = VocabularyTrie::new(self.alphabet.size());
        let mut skipped = 0usize;

        for word in words {
            let word = word.as_ref();
            if matches!(word, BEGIN_SENTENCE | END_SENTENCE | UNKNOWN_WORD) {
                continue;
            }
            match self.alphabet.encode_text(word) {
                Ok(labels) => {
                    trie.insert(&labels);
                }
                Err(_) => skipped += 1,
            }
        }

        let inserted = trie.word_count();
        tracing::info!(
            inserted,
            skipped,
            nodes = trie.node_count(),
            "filled dictionary"
        );

        self.dictionary = Some(Arc::new(trie));
        inserted
    }

    /// Serialized dictionary blob, including the alphabet and current weights.
    pub fn dictionary_blob(&self) -> Result<Vec<u8>> {
        let trie = self
            .dictionary
            .as_deref()
            .ok_or(ConfigError::MissingDictionary)?;

        let mut out = Vec::new();
        out.extend_from_slice(MAGIC);
        out.put_u32(VERSION);
        out.put_u8(u8::from(self.utf8_mode));
        out.put_f64(self.alpha);
        out.put_f64(self.beta);
        out.put_length_prefixed(&self.alphabet.serialize());
        out.put_length_prefixed(&trie.serialize());
        Ok(out)
    }

    /// Write the dictionary blob to `path`.
    ///
    /// With `append` the blob goes after the existing file contents (the LM
    /// of a package); otherwise the file is replaced.
    pub fn save_dictionary(&self, path: impl AsRef<Path>, append: bool) -> Result<()> {
        let path = path.as_ref();
        let blob = self.dictionary_blob()?;

        let file = if append {
            OpenOptions::new().append(true).create(true).open(path)?
        } else {
            File::create(path)?
        };
        let mut w = BufWriter::new(file);
        w.write_all(&blob)?;
        w.flush()?;

        tracing::debug!(path = %path.display(), append, bytes = blob.len(), "saved dictionary");
        Ok(())
    }

    /// LM context at the start of an utterance.
    pub fn begin_state(&self) -> LmState {
        self.lm.begin_sentence_state()
    }

    /// Trie position at the start of a word, `None` without a dictionary.
    pub fn root_state(&self) -> Option<TrieState> {
        self.dictionary.as_ref().map(|trie| trie.root())
    }

    /// Follow `label` in the dictionary.
    pub fn advance(&self, state: Option<TrieState>, label: u32) -> Option<TrieState> {
        let trie = self.dictionary.as_ref()?;
        trie.advance(state?, label)
    }

    /// Classify `label` given the labels of the unfinished word so far.
    pub fn boundary(&self, pending: &[u32], label: u32) -> Boundary {
        if self.utf8_mode {
            let lead = pending.first().copied().unwrap_or(label);
            let needed = match self.alphabet.symbol(lead).first() {
                Some(&byte) => utf8_width(byte),
                None => 1,
            };
            if pending.len() + 1 >= needed {
                Boundary::After
            } else {
                Boundary::Continue
            }
        } else if Some(label) == self.space_label {
            Boundary::Before
        } else {
            Boundary::Continue
        }
    }

    /// Weighted natural-log score of a finished word and the next LM context.
    ///
    /// `trie_state` is the dictionary position after the word's last label.
    /// With a dictionary, words that left it or stop short of a word end are
    /// scored as unknown.
    pub fn score_boundary(
        &self,
        trie_state: Option<TrieState>,
        lm_state: &LmState,
        word: &str,
    ) -> (LmState, f64) {
        let in_dictionary = match &self.dictionary {
            Some(trie) => trie_state.is_some_and(|s| trie.is_word_end(s)),
            None => true,
        };

        if !in_dictionary || self.lm.is_oov(word) {
            return (
                self.lm.null_context_state(),
                self.alpha * OOV_SCORE + self.beta,
            );
        }

        let (next, log10_prob) = self.lm.score_transition(lm_state, word);
        let ln_prob = f64::from(log10_prob) * std::f64::consts::LN_10;
        (next, self.alpha * ln_prob + self.beta)
    }
}

/// Bytes in the UTF-8 sequence introduced by `lead`. Invalid leads count as one.
fn utf8_width(lead: u8) -> usize {
    match lead {
        b if b >> 7 == 0 => 1,
        b if b >> 5 == 0b110 => 2,
        b if b >> 4 == 0b1110 => 3,
        b if b >> 3 == 0b11110 => 4,
        _ => 1,
    }
}

fn read_dictionary(blob: &[u8]) -> Result<Dictionary> {
    let mut r = BlobReader::new(blob, WHAT);
    r.expect_magic(MAGIC)?;
    r.expect_version(VERSION)?;

    let utf8_mode = match r.u8()? {
        0 => false,
        1 => true,
        other => return Err(r.corrupt(format!("bad mode flag {other}")).into()),
    };
    let alpha = r.f64()?;
    let beta = r.f64()?;
    validate_weights(alpha, beta)?;
    let alphabet = Alphabet::deserialize(&r.length_prefixed()?)?;
    let trie = VocabularyTrie::deserialize(&r.length_prefixed()?, alphabet.size())?;

    if r.consumed() != blob.len() as u64 {
        return Err(r.corrupt("trailing bytes").into());
    }

    Ok(Dictionary {
        utf8_mode,
        alpha,
        beta,
        alphabet,
        trie,
    })
}
