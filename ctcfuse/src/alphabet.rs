//! Bidirectional mapping between output symbols and dense label ids.
//!
//! An [`Alphabet`] is either a symbol table read from a config file (one
//! symbol per line, usually one codepoint each) or the fixed UTF-8 byte table
//! used in bytes output mode. Label `size()` is reserved for the CTC blank.

use crate::codec::{BlobReader, PutLe};
use crate::error::{ConfigError, Error, LoadError, Result};
use std::collections::HashMap;
use std::path::Path;

const MAGIC: &[u8; 4] = b"CTCA";
const VERSION: u16 = 1;

/// How symbols are interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AlphabetMode {
    /// Explicit symbol table, one entry per line of the config file.
    SymbolTable,
    /// 255 single-byte symbols; text is decoded as UTF-8.
    Utf8,
}

impl AlphabetMode {
    pub fn as_str(self) -> &'static str {
        match self {
            AlphabetMode::SymbolTable => "symbol table",
            AlphabetMode::Utf8 => "utf-8",
        }
    }

    fn flag(self) -> u8 {
        match self {
            AlphabetMode::SymbolTable => 0,
            AlphabetMode::Utf8 => 1,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Alphabet {
    mode: AlphabetMode,
    symbols: Vec<Vec<u8>>,
    labels: HashMap<Vec<u8>, u32>,
    space_label: Option<u32>,
}

impl PartialEq for Alphabet {
    fn eq(&self, other: &Self) -> bool {
        self.mode == other.mode && self.symbols == other.symbols
    }
}

impl Eq for Alphabet {}

impl Alphabet {
    fn from_symbols(mode: AlphabetMode, symbols: Vec<Vec<u8>>) -> Result<Self> {
        if symbols.is_empty() {
            return Err(ConfigError::EmptyAlphabet.into());
        }
        if symbols.len() > u16::MAX as usize {
            return Err(ConfigError::TooManySymbols(symbols.len()).into());
        }

        let mut labels = HashMap::with_capacity(symbols.len());
        for (label, symbol) in symbols.iter().enumerate() {
            if labels.insert(symbol.clone(), label as u32).is_some() {
                return Err(ConfigError::DuplicateSymbol {
                    symbol: String::from_utf8_lossy(symbol).into_owned(),
                    line: label + 1,
                }
                .into());
            }
        }

        let space_label = match mode {
            AlphabetMode::SymbolTable => labels.get(b" ".as_slice()).copied(),
            AlphabetMode::Utf8 => None,
        };

        Ok(Self {
            mode,
            symbols,
            labels,
            space_label,
        })
    }

    /// Byte table used in UTF-8 mode: label `i` is byte `i + 1`.
    pub fn utf8() -> Self {
        let symbols: Vec<Vec<u8>> = (1..=u8::MAX).map(|b| vec![b]).collect();
        let labels = symbols
            .iter()
            .enumerate()
            .map(|(i, s)| (s.clone(), i as u32))
            .collect();
        Self {
            mode: AlphabetMode::Utf8,
            symbols,
            labels,
            space_label: None,
        }
    }

    /// Parse alphabet config text.
    ///
    /// Lines starting with `#` are comments, `\#` is the literal `#`, empty
    /// lines are skipped. LF, CRLF and lone CR line endings are accepted.
    pub fn from_config_str(text: &str) -> Result<Self> {
        let mut symbols = Vec::new();
        let mut seen: HashMap<&str, usize> = HashMap::new();

        for (i, line) in split_lines(text).enumerate() {
            let symbol = match line {
                "\\#" => "#",
                l if l.starts_with('#') => continue,
                "" => continue,
                l => l,
            };
            if seen.insert(symbol, i + 1).is_some() {
                return Err(ConfigError::DuplicateSymbol {
                    symbol: symbol.to_string(),
                    line: i + 1,
                }
                .into());
            }
            symbols.push(symbol.as_bytes().to_vec());
        }

        Self::from_symbols(AlphabetMode::SymbolTable, symbols)
    }

    /// Read an alphabet config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::AlphabetUnreadable {
            path: path.to_path_buf(),
            source,
        })?;
        let alphabet = Self::from_config_str(&text)?;
        tracing::debug!(path = %path.display(), size = alphabet.size(), "loaded alphabet");
        Ok(alphabet)
    }

    pub fn mode(&self) -> AlphabetMode {
        self.mode
    }

    pub fn is_utf8(&self) -> bool {
        self.mode == AlphabetMode::Utf8
    }

    /// Number of symbols, excluding the blank.
    pub fn size(&self) -> usize {
        self.symbols.len()
    }

    /// Label reserved for the CTC blank.
    pub fn blank_id(&self) -> u32 {
        self.symbols.len() as u32
    }

    /// Label of the single-space symbol, if the table has one.
    pub fn space_label(&self) -> Option<u32> {
        self.space_label
    }

    /// Look up the label of one symbol.
    pub fn encode(&self, symbol: impl AsRef<[u8]>) -> Result<u32> {
        let symbol = symbol.as_ref();
        self.labels
            .get(symbol)
            .copied()
            .ok_or_else(|| Error::unknown_symbol(symbol))
    }

    /// Split text into symbols (codepoints, or bytes in UTF-8 mode) and encode each.
    pub fn encode_text(&self, text: &str) -> Result<Vec<u32>> {
        match self.mode {
            AlphabetMode::Utf8 => text.bytes().map(|b| self.encode([b])).collect(),
            AlphabetMode::SymbolTable => {
                let mut buf = [0u8; 4];
                text.chars()
                    .map(|c| self.encode(c.encode_utf8(&mut buf).as_bytes()))
                    .collect()
            }
        }
    }

    /// Raw bytes of one label. The blank and out-of-range labels are empty.
    pub fn symbol(&self, label: u32) -> &[u8] {
        self.symbols
            .get(label as usize)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Concatenate the bytes of every label.
    pub fn decode_bytes(&self, labels: &[u32]) -> Vec<u8> {
        labels
            .iter()
            .flat_map(|&l| self.symbol(l).iter().copied())
            .collect()
    }

    /// Concatenate the symbols of every label into text.
    ///
    /// Total over any input: the blank decodes to nothing, and byte
    /// sequences that are not valid UTF-8 are replaced lossily.
    pub fn decode(&self, labels: &[u32]) -> String {
        String::from_utf8_lossy(&self.decode_bytes(labels)).into_owned()
    }

    /// Serialize into the versioned blob embedded in scorer packages.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(9 + self.symbols.iter().map(|s| s.len() + 4).sum::<usize>());
        out.extend_from_slice(MAGIC);
        out.put_u16(VERSION);
        out.put_u8(self.mode.flag());
        out.put_u16(self.symbols.len() as u16);
        for (label, symbol) in self.symbols.iter().enumerate() {
            out.put_u16(label as u16);
            out.put_u16(symbol.len() as u16);
            out.extend_from_slice(symbol);
        }
        out
    }

    /// Inverse of [`Alphabet::serialize`].
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let mut reader = BlobReader::new(bytes, "alphabet");
        reader.expect_magic(MAGIC)?;

        let version = reader.u16()?;
        if version != VERSION {
            return Err(LoadError::VersionMismatch {
                what: "alphabet",
                found: version as u32,
                expected: VERSION as u32,
            }
            .into());
        }

        let mode = match reader.u8()? {
            0 => AlphabetMode::SymbolTable,
            1 => AlphabetMode::Utf8,
            other => return Err(reader.corrupt(format!("unknown mode flag {other}")).into()),
        };

        let count = reader.u16()? as usize;
        let mut symbols = vec![None; count];
        for _ in 0..count {
            let label = reader.u16()? as usize;
            let len = reader.u16()? as usize;
            let symbol = reader.bytes(len)?;
            let slot = symbols
                .get_mut(label)
                .ok_or_else(|| reader.corrupt(format!("label {label} out of range")))?;
            if slot.replace(symbol).is_some() {
                return Err(reader.corrupt(format!("label {label} repeated")).into());
            }
        }

        let symbols = symbols
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| reader.corrupt("missing labels"))?;

        Self::from_symbols(mode, symbols)
    }
}

/// Split on LF, CRLF or lone CR.
fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    let mut rest = Some(text);
    std::iter::from_fn(move || {
        let s = rest?;
        match s.find(&['\n', '\r'][..]) {
            Some(i) => {
                let skip = if s[i..].starts_with("\r\n") { 2 } else { 1 };
                rest = Some(&s[i + skip..]).filter(|r| !r.is_empty());
                Some(&s[..i])
            }
            None => {
                rest = None;
                Some(s)
            }
        }
    })
}
