//! ctcfuse: CTC beam-search decoding with n-gram language model fusion.
//!
//! Turns per-time-step label probabilities from an acoustic model into
//! ranked text hypotheses. Decoding can be purely acoustic or guided by a
//! [`scorer::Scorer`], which combines a back-off n-gram
//! [`lm::LanguageModel`] with a [`trie::VocabularyTrie`] of known words.
//!
//! # Components
//!
//! - [`alphabet::Alphabet`]: label ids for output symbols, plus the blank
//! - [`lm::LanguageModel`]: incremental n-gram scoring (ARPA or binary)
//! - [`trie::VocabularyTrie`]: prefix tree over the vocabulary
//! - [`scorer::Scorer`]: word-level LM fusion and scorer packages
//! - [`decoder`]: prefix beam search, one-shot or incremental
//! - [`batch`]: many sequences in parallel
//!
//! # Quick Start
//!
//! ```ignore
//! use ctcfuse::alphabet::Alphabet;
//! use ctcfuse::config::DecoderConfig;
//! use ctcfuse::decoder::decode;
//! use ctcfuse::scorer::Scorer;
//!
//! let alphabet = Alphabet::from_file("alphabet.txt")?;
//! let scorer = Scorer::from_package("kenlm.scorer", &alphabet)?;
//!
//! // probs: [time, alphabet.size() + 1], blank last
//! let outputs = decode(probs.view(), &alphabet, &DecoderConfig::new(100), Some(&scorer))?;
//! println!("{} ({})", outputs[0].text, outputs[0].confidence);
//! ```

pub mod alphabet;
pub mod batch;
mod codec;
pub mod config;
pub mod decoder;
pub mod error;
pub mod lm;
pub mod package;
pub mod repo;
pub mod scorer;
pub mod trie;
pub mod types;
