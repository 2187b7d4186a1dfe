//! Binary language model layout.
//!
//! ```text
//! magic    b"CTCNGRAM"
//! version  u32
//! order    u8
//! vocab    u32 count, then per word: u32 length + UTF-8 bytes
//! per order n = 1..=order:
//!     u64 count, then per entry: n x u32 word ids, f32 log10 prob, f32 log10 back-off
//! ```
//!
//! All integers are little-endian. Entries are written sorted by word ids so
//! the output is deterministic. The model ends exactly where a packaged
//! dictionary would begin.

use super::{LanguageModel, MAX_ORDER, NgramEntry, NgramKey, WordIndex};
use crate::codec::{BlobReader, write_f32, write_u8, write_u32, write_u64};
use crate::error::{LoadError, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;

pub const MAGIC: &[u8; 8] = b"CTCNGRAM";
pub const VERSION: u32 = 1;

const WHAT: &str = "language model";

/// Read a model, returning it with the number of bytes consumed.
pub fn read(reader: impl Read) -> std::result::Result<(LanguageModel, u64), LoadError> {
    let mut r = BlobReader::new(reader, WHAT);
    r.expect_magic(MAGIC)?;
    r.expect_version(VERSION)?;

    let order = r.u8()? as usize;
    if order == 0 || order > MAX_ORDER {
        return Err(LoadError::InvalidOrder {
            order,
            max: MAX_ORDER,
        });
    }

    let vocab_size = r.u32()? as usize;
    let mut vocab = Vec::with_capacity(vocab_size.min(1 << 20));
    for _ in 0..vocab_size {
        let bytes = r.length_prefixed()?;
        let word = String::from_utf8(bytes).map_err(|_| r.corrupt("word is not UTF-8"))?;
        vocab.push(word);
    }

    let mut ngrams = HashMap::new();
    for n in 1..=order {
        let count = r.u64()?;
        let mut words = [0 as WordIndex; MAX_ORDER];
        for _ in 0..count {
            for slot in words.iter_mut().take(n) {
                *slot = r.u32()?;
            }
            let entry = NgramEntry {
                log10_prob: r.f32()?,
                log10_backoff: r.f32()?,
            };
            if ngrams.insert(NgramKey::new(&words[..n]), entry).is_some() {
                return Err(r.corrupt(format!("duplicate {n}-gram")));
            }
        }
    }

    let consumed = r.consumed();
    let lm = LanguageModel::from_parts(order, vocab, ngrams)?;
    Ok((lm, consumed))
}

/// Write `lm` in binary form.
pub fn write(lm: &LanguageModel, w: &mut impl Write) -> io::Result<()> {
    w.write_all(MAGIC)?;
    write_u32(w, VERSION)?;
    write_u8(w, lm.order as u8)?;

    write_u32(w, lm.vocab.len() as u32)?;
    for word in &lm.vocab {
        write_u32(w, word.len() as u32)?;
        w.write_all(word.as_bytes())?;
    }

    let mut entries: Vec<_> = lm.entries().collect();
    entries.sort_by_key(|(key, _)| (key.len, key.words));

    for n in 1..=lm.order {
        let group: Vec<_> = entries
            .iter()
            .filter(|(key, _)| key.len as usize == n)
            .collect();
        write_u64(w, group.len() as u64)?;
        for (key, entry) in group {
            for &word in key.words() {
                write_u32(w, word)?;
            }
            write_f32(w, entry.log10_prob)?;
            write_f32(w, entry.log10_backoff)?;
        }
    }
    Ok(())
}

impl LanguageModel {
    /// Write the model to `path` in binary form, replacing any existing file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut w = BufWriter::new(File::create(path)?);
        write(self, &mut w)?;
        w.flush()?;

        tracing::debug!(path = %path.display(), "wrote language model");
        Ok(())
    }
}
