//! Error types for ctcfuse organized by failure stage.

use std::path::PathBuf;
use thiserror::Error;

/// Decoder error variants organized by stage.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration stage error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Model and package loading error
    #[error(transparent)]
    Load(#[from] LoadError),

    /// Malformed probability input for one sequence
    #[error(transparent)]
    InvalidInput(#[from] InputError),

    /// Symbol absent from the alphabet
    #[error("unknown symbol: {symbol:?}")]
    UnknownSymbol { symbol: String },

    /// IO error while writing files
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Configuration errors (alphabet files, decoder parameters, mismatches).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Alphabet file could not be read
    #[error("failed to read alphabet file {path:?}")]
    AlphabetUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Alphabet contains no symbols
    #[error("alphabet has no symbols")]
    EmptyAlphabet,

    /// Same symbol listed twice
    #[error("duplicate alphabet symbol {symbol:?} on line {line}")]
    DuplicateSymbol { symbol: String, line: usize },

    /// Alphabet too large for the serialized label width
    #[error("alphabet has {0} symbols (maximum 65535)")]
    TooManySymbols(usize),

    /// Caller alphabet differs from the one embedded in a package
    #[error("alphabet mismatch: expected {expected} symbols ({expected_mode}), found {found} symbols ({found_mode})")]
    AlphabetMismatch {
        expected: usize,
        expected_mode: &'static str,
        found: usize,
        found_mode: &'static str,
    },

    /// Trie was built for a different alphabet size
    #[error("trie alphabet size {found} does not match alphabet size {expected}")]
    TrieAlphabetMismatch { expected: usize, found: usize },

    /// Beam size must be positive
    #[error("beam size must be at least 1")]
    InvalidBeamSize,

    /// Cumulative probability cutoff outside (0, 1]
    #[error("invalid cutoff probability: {0} (expected 0 < p <= 1)")]
    InvalidCutoffProb(f32),

    /// Top-n cutoff must be positive
    #[error("cutoff top-n must be at least 1")]
    InvalidCutoffTopN,

    /// LM weight negative or not finite, or word bonus not finite
    #[error("invalid scorer weights: alpha {alpha}, beta {beta} (expected finite alpha >= 0 and finite beta)")]
    InvalidWeights { alpha: f64, beta: f64 },

    /// Worker count must be positive
    #[error("number of workers must be at least 1")]
    InvalidWorkers,

    /// Batch and sequence-length counts disagree
    #[error("batch has {batch} sequences but {lengths} sequence lengths were given")]
    BatchLengthMismatch { batch: usize, lengths: usize },

    /// Probability matrix width does not cover the alphabet plus blank
    #[error("probability matrix has {got} classes, alphabet requires {expected}")]
    ClassCountMismatch { expected: usize, got: usize },

    /// Worker pool construction failed
    #[error(transparent)]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// Symbol-table mode requires an explicit alphabet file
    #[error("no alphabet given and not in UTF-8 mode")]
    MissingAlphabet,

    /// Dictionary requested before it was filled
    #[error("scorer has no dictionary")]
    MissingDictionary,
}

/// Language model, trie and package loading errors.
#[derive(Debug, Error)]
pub enum LoadError {
    /// File missing or unreadable
    #[error("failed to read {path:?}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Header magic does not match
    #[error("invalid {what} header")]
    BadMagic { what: &'static str },

    /// Unsupported format version
    #[error("{what} version mismatch: found {found}, expected {expected}")]
    VersionMismatch {
        what: &'static str,
        found: u32,
        expected: u32,
    },

    /// Blob ended early
    #[error("truncated {what}")]
    Truncated { what: &'static str },

    /// Declared n-gram order unsupported
    #[error("n-gram order {order} outside 1..={max}")]
    InvalidOrder { order: usize, max: usize },

    /// Structurally invalid content
    #[error("corrupt {what}: {reason}")]
    Corrupt { what: &'static str, reason: String },

    /// Malformed ARPA text
    #[error("ARPA line {line}: {reason}")]
    Arpa { line: usize, reason: String },

    /// Package ends right after the language model
    #[error("package has no dictionary after the language model")]
    NoDictionary,

    /// Language model already carries a dictionary
    #[error("language model file already contains a dictionary")]
    UnexpectedDictionary,
}

/// Per-sequence input validation errors.
#[derive(Debug, Error)]
pub enum InputError {
    /// Row width differs from alphabet size + 1
    #[error("row {row} has {got} classes, expected {expected}")]
    RowWidth {
        row: usize,
        expected: usize,
        got: usize,
    },

    /// NaN, infinite or negative probability
    #[error("row {row}, class {class}: invalid probability {value}")]
    InvalidProbability { row: usize, class: usize, value: f32 },

    /// Row does not sum close to 1
    #[error("row {row} sums to {sum}, expected 1")]
    RowSum { row: usize, sum: f32 },

    /// Sequence length exceeds the time dimension
    #[error("sequence length {length} exceeds {max} time steps")]
    SequenceLength { length: usize, max: usize },
}

/// Result type alias for ctcfuse operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn unknown_symbol(symbol: &[u8]) -> Self {
        Error::UnknownSymbol {
            symbol: String::from_utf8_lossy(symbol).into_owned(),
        }
    }
}

// rayon::ThreadPoolBuildError → ConfigError → Error
impl From<rayon::ThreadPoolBuildError> for Error {
    fn from(e: rayon::ThreadPoolBuildError) -> Self {
        Error::Config(ConfigError::ThreadPool(e))
    }
}
