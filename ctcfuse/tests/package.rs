//! Integration tests for scorer package generation and loading.

use ctcfuse::alphabet::Alphabet;
use ctcfuse::config::DecoderConfig;
use ctcfuse::decoder::decode;
use ctcfuse::error::{ConfigError, Error, LoadError};
use ctcfuse::lm::{LanguageModel, arpa};
use ctcfuse::package::{PackageOptions, create_package};
use ctcfuse::scorer::Scorer;
use ndarray::Array2;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const ARPA: &str = "\
\\data\\
ngram 1=6
ngram 2=3

\\1-grams:
-1.0\t<s>\t-0.5
-1.2\t</s>
-0.6\tthe\t-0.3
-0.9\tcat\t-0.2
-1.1\tsat\t-0.25
-2.0\t<unk>

\\2-grams:
-0.2\t<s> the
-0.3\tthe cat
-0.4\tcat sat

\\end\\
";

const CHAR_ARPA: &str = "\
\\data\\
ngram 1=4

\\1-grams:
-1.0\t<s>
-1.0\t</s>
-0.3\té
-0.5\te

\\end\\
";

const ALPHABET: &str = "# letters\n \nt\nh\ne\nc\na\ns\n";
const VOCAB: &str = "the cat sat\nthe cat\n";

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("alphabet.txt"), ALPHABET).unwrap();
        std::fs::write(dir.path().join("vocab.txt"), VOCAB).unwrap();
        arpa::parse(ARPA.as_bytes())
            .unwrap()
            .save(dir.path().join("lm.bin"))
            .unwrap();
        Self { dir }
    }

    fn path(&self, name: &str) -> std::path::PathBuf {
        self.dir.path().join(name)
    }

    fn options(&self) -> PackageOptions {
        PackageOptions {
            lm: self.path("lm.bin"),
            vocab: self.path("vocab.txt"),
            alphabet: Some(self.path("alphabet.txt")),
            package: self.path("kenlm.scorer"),
            default_alpha: 0.8,
            default_beta: 1.2,
            force_bytes_output_mode: None,
        }
    }
}

/// Spell `labels` with probability `p`, spreading the rest over other classes.
fn spelled(classes: usize, labels: &[usize], p: f32) -> Array2<f32> {
    let rest = (1.0 - p) / (classes - 1) as f32;
    let mut probs = Array2::from_elem((labels.len(), classes), rest);
    for (t, &label) in labels.iter().enumerate() {
        probs[[t, label]] = p;
    }
    probs
}

fn file_len(path: &Path) -> u64 {
    std::fs::metadata(path).unwrap().len()
}

#[test]
fn package_decodes_like_direct_scorer() {
    let fixture = Fixture::new();
    let summary = create_package(&fixture.options()).unwrap();

    assert!(!summary.character_based);
    assert!(!summary.utf8_mode);
    assert_eq!(summary.vocab_words, 3);
    assert_eq!(summary.dictionary_words, 3);
    assert_eq!(summary.skipped_words, 0);

    let alphabet = Alphabet::from_file(fixture.path("alphabet.txt")).unwrap();
    let packaged = Scorer::from_package(fixture.path("kenlm.scorer"), &alphabet).unwrap();
    assert_eq!((packaged.alpha(), packaged.beta()), (0.8, 1.2));

    let lm = Arc::new(LanguageModel::load(fixture.path("lm.bin")).unwrap());
    let mut direct = Scorer::new(lm, alphabet.clone(), 0.8, 1.2).unwrap();
    direct.fill_dictionary(["the", "cat", "sat"]);

    // "the cas" with a noisy last letter; blank is 7.
    let mut probs = spelled(8, &[1, 2, 3, 0, 4, 5, 6], 0.7);
    probs[[6, 1]] = 0.25;
    probs[[6, 6]] = 0.7 - 0.25 + (0.3 / 7.0);
    let config = DecoderConfig::new(16);

    let from_package = decode(probs.view(), &alphabet, &config, Some(&packaged)).unwrap();
    let from_direct = decode(probs.view(), &alphabet, &config, Some(&direct)).unwrap();
    assert_eq!(from_package, from_direct);
}

#[test]
fn package_keeps_language_model_bytes() {
    let fixture = Fixture::new();
    create_package(&fixture.options()).unwrap();

    let lm_bytes = std::fs::read(fixture.path("lm.bin")).unwrap();
    let package_bytes = std::fs::read(fixture.path("kenlm.scorer")).unwrap();

    assert!(package_bytes.len() > lm_bytes.len());
    assert_eq!(&package_bytes[..lm_bytes.len()], lm_bytes.as_slice());
    assert_eq!(&package_bytes[lm_bytes.len()..lm_bytes.len() + 4], b"TRIE");
}

#[test]
fn package_cannot_be_repackaged() {
    let fixture = Fixture::new();
    create_package(&fixture.options()).unwrap();

    let mut options = fixture.options();
    options.lm = fixture.path("kenlm.scorer");
    options.package = fixture.path("again.scorer");

    assert!(matches!(
        create_package(&options),
        Err(Error::Load(LoadError::UnexpectedDictionary))
    ));
}

#[test]
fn markers_are_not_counted_as_skipped() {
    let fixture = Fixture::new();
    std::fs::write(fixture.path("vocab.txt"), "<s> the cat </s>\n<s> dog <unk>\n").unwrap();

    let summary = create_package(&fixture.options()).unwrap();

    assert_eq!(summary.vocab_words, 6);
    assert_eq!(summary.dictionary_words, 2);
    // "dog" has letters outside the alphabet
    assert_eq!(summary.skipped_words, 1);
}

#[test]
fn invalid_default_weights_are_rejected() {
    let fixture = Fixture::new();
    let mut options = fixture.options();
    options.default_alpha = -1.0;

    assert!(matches!(
        create_package(&options),
        Err(Error::Config(ConfigError::InvalidWeights { .. }))
    ));
    assert!(!fixture.path("kenlm.scorer").exists());
}

#[test]
fn symbol_table_mode_requires_alphabet() {
    let fixture = Fixture::new();
    let mut options = fixture.options();
    options.alphabet = None;

    assert!(matches!(
        create_package(&options),
        Err(Error::Config(ConfigError::MissingAlphabet))
    ));
    assert!(!fixture.path("kenlm.scorer").exists());
}

#[test]
fn forced_bytes_mode_uses_utf8_alphabet() {
    let fixture = Fixture::new();
    let mut options = fixture.options();
    options.alphabet = None;
    options.force_bytes_output_mode = Some(true);

    let summary = create_package(&options).unwrap();
    assert!(summary.utf8_mode);

    let scorer = Scorer::from_package_embedded(fixture.path("kenlm.scorer")).unwrap();
    assert!(scorer.is_utf8_mode());
    assert_eq!(scorer.alphabet(), &Alphabet::utf8());
}

#[test]
fn character_vocabulary_decodes_in_utf8_mode() {
    let dir = tempfile::tempdir().unwrap();
    let lm_path = dir.path().join("chars.bin");
    arpa::parse(CHAR_ARPA.as_bytes())
        .unwrap()
        .save(&lm_path)
        .unwrap();
    std::fs::write(dir.path().join("vocab.txt"), "é e é\n").unwrap();

    let summary = create_package(&PackageOptions {
        lm: lm_path.clone(),
        vocab: dir.path().join("vocab.txt"),
        alphabet: None,
        package: dir.path().join("chars.scorer"),
        default_alpha: 1.0,
        default_beta: 0.0,
        force_bytes_output_mode: None,
    })
    .unwrap();
    assert!(summary.character_based);
    assert!(summary.utf8_mode);
    assert!(file_len(&dir.path().join("chars.scorer")) > file_len(&lm_path));

    let alphabet = Alphabet::utf8();
    let scorer = Scorer::from_package(dir.path().join("chars.scorer"), &alphabet).unwrap();

    // 'é' is 0xC3 0xA9; label = byte - 1, blank = 255.
    let probs = spelled(256, &[0xC3 - 1, 0xA9 - 1], 0.9);
    let outputs = decode(probs.view(), &alphabet, &DecoderConfig::new(8), Some(&scorer)).unwrap();

    assert_eq!(outputs[0].text, "é");
    assert_eq!(outputs[0].tokens, vec![0xC2, 0xA8]);
    assert_eq!(outputs[0].timesteps, vec![0, 1]);
}

#[test]
fn wrong_alphabet_is_rejected_at_load() {
    let fixture = Fixture::new();
    create_package(&fixture.options()).unwrap();

    assert!(matches!(
        Scorer::from_package(fixture.path("kenlm.scorer"), &Alphabet::utf8()),
        Err(Error::Config(ConfigError::AlphabetMismatch { .. }))
    ));
}

#[test]
fn corrupt_package_is_rejected() {
    let fixture = Fixture::new();
    create_package(&fixture.options()).unwrap();

    let path = fixture.path("kenlm.scorer");
    let mut bytes = std::fs::read(&path).unwrap();
    bytes.truncate(bytes.len() - 2);
    std::fs::write(&path, bytes).unwrap();

    let alphabet = Alphabet::from_file(fixture.path("alphabet.txt")).unwrap();
    assert!(matches!(
        Scorer::from_package(&path, &alphabet),
        Err(Error::Load(LoadError::Truncated { .. }))
    ));
}
