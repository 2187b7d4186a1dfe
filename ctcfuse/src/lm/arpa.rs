//! ARPA text import.

use super::{LanguageModel, MAX_ORDER, NgramEntry, NgramKey, WordIndex};
use crate::error::{LoadError, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

enum Section {
    Preamble,
    Data,
    Ngrams(usize),
    End,
}

/// Parse an ARPA model.
///
/// The vocabulary is taken from the unigram section in file order. Declared
/// counts in `\data\` are checked against the entries actually read.
pub fn parse(reader: impl BufRead) -> std::result::Result<LanguageModel, LoadError> {
    let mut section = Section::Preamble;
    let mut declared: Vec<(usize, u64)> = Vec::new();
    let mut vocab: Vec<String> = Vec::new();
    let mut word_index: HashMap<String, WordIndex> = HashMap::new();
    let mut ngrams: HashMap<NgramKey, NgramEntry> = HashMap::new();
    let mut seen = [0u64; MAX_ORDER];

    for (i, line) in reader.lines().enumerate() {
        let line_no = i + 1;
        let line = line.map_err(|e| arpa_error(line_no, e.to_string()))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if line == "\\data\\" {
            section = Section::Data;
            continue;
        }
        if line == "\\end\\" {
            section = Section::End;
            continue;
        }
        if let Some(n) = section_header(line) {
            let n = n.map_err(|reason| arpa_error(line_no, reason))?;
            if n == 0 || n > MAX_ORDER {
                return Err(LoadError::InvalidOrder {
                    order: n,
                    max: MAX_ORDER,
                });
            }
            section = Section::Ngrams(n);
            continue;
        }

        match section {
            Section::Preamble | Section::End => {}
            Section::Data => {
                let (n, count) = parse_count(line).map_err(|r| arpa_error(line_no, r))?;
                declared.push((n, count));
            }
            Section::Ngrams(n) => {
                let mut fields = line.split_whitespace();
                let log10_prob = fields
                    .next()
                    .and_then(|f| f.parse::<f32>().ok())
                    .ok_or_else(|| arpa_error(line_no, "missing probability"))?;

                let mut words = [0 as WordIndex; MAX_ORDER];
                for slot in words.iter_mut().take(n) {
                    let word = fields
                        .next()
                        .ok_or_else(|| arpa_error(line_no, format!("expected {n} words")))?;
                    *slot = if n == 1 {
                        let index = vocab.len() as WordIndex;
                        if word_index.insert(word.to_string(), index).is_some() {
                            return Err(arpa_error(line_no, format!("duplicate unigram {word:?}")));
                        }
                        vocab.push(word.to_string());
                        index
                    } else {
                        *word_index.get(word).ok_or_else(|| {
                            arpa_error(line_no, format!("word {word:?} has no unigram"))
                        })?
                    };
                }

                let log10_backoff = match fields.next() {
                    Some(f) => f
                        .parse::<f32>()
                        .map_err(|_| arpa_error(line_no, format!("bad back-off {f:?}")))?,
                    None => 0.0,
                };
                if fields.next().is_some() {
                    return Err(arpa_error(line_no, "trailing fields"));
                }

                ngrams.insert(
                    NgramKey::new(&words[..n]),
                    NgramEntry {
                        log10_prob,
                        log10_backoff,
                    },
                );
                seen[n - 1] += 1;
            }
        }
    }

    let order = declared.iter().map(|&(n, _)| n).max().unwrap_or(0);
    for &(n, count) in &declared {
        if n == 0 || n > MAX_ORDER {
            return Err(LoadError::InvalidOrder {
                order: n,
                max: MAX_ORDER,
            });
        }
        if seen[n - 1] != count {
            return Err(LoadError::Corrupt {
                what: "ARPA model",
                reason: format!("declared {count} {n}-grams, found {}", seen[n - 1]),
            });
        }
    }

    LanguageModel::from_parts(order, vocab, ngrams)
}

impl LanguageModel {
    /// Read an ARPA text file.
    pub fn from_arpa(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| LoadError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        let lm = parse(BufReader::new(file))?;

        tracing::info!(
            path = %path.display(),
            order = lm.order(),
            vocab = lm.vocab_size(),
            "parsed ARPA model"
        );

        Ok(lm)
    }
}

fn section_header(line: &str) -> Option<std::result::Result<usize, String>> {
    let inner = line.strip_prefix('\\')?.strip_suffix("-grams:")?;
    Some(
        inner
            .parse::<usize>()
            .map_err(|_| format!("bad section header {line:?}")),
    )
}

fn parse_count(line: &str) -> std::result::Result<(usize, u64), String> {
    let rest = line
        .strip_prefix("ngram ")
        .ok_or_else(|| format!("unexpected line in \\data\\: {line:?}"))?;
    let (n, count) = rest
        .split_once('=')
        .ok_or_else(|| format!("bad count line {line:?}"))?;
    let n = n.trim().parse().map_err(|_| format!("bad order {n:?}"))?;
    let count = count
        .trim()
        .parse()
        .map_err(|_| format!("bad count {count:?}"))?;
    Ok((n, count))
}

fn arpa_error(line: usize, reason: impl Into<String>) -> LoadError {
    LoadError::Arpa {
        line,
        reason: reason.into(),
    }
}
