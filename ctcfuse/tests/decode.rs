//! Integration tests for beam search decoding.

use ctcfuse::alphabet::Alphabet;
use ctcfuse::config::DecoderConfig;
use ctcfuse::decoder::decode;
use ctcfuse::lm::arpa;
use ctcfuse::scorer::Scorer;
use ndarray::{Array2, array};
use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

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

const ALPHABET: &str = " \nt\nh\ne\nc\na\ns\n";

fn scorer(alpha: f64, beta: f64) -> Scorer {
    let alphabet = Alphabet::from_config_str(ALPHABET).unwrap();
    let lm = Arc::new(arpa::parse(ARPA.as_bytes()).unwrap());
    let mut scorer = Scorer::new(lm, alphabet, alpha, beta).unwrap();
    scorer.fill_dictionary(["the", "cat", "sat"]);
    scorer
}

/// Probability row with `peaks` and the remaining mass spread evenly.
fn row(classes: usize, peaks: &[(usize, f32)]) -> Vec<f32> {
    let mass: f32 = peaks.iter().map(|&(_, p)| p).sum();
    let rest = (1.0 - mass) / (classes - peaks.len()) as f32;
    let mut row = vec![rest; classes];
    for &(label, p) in peaks {
        row[label] = p;
    }
    row
}

fn matrix(rows: Vec<Vec<f32>>) -> Array2<f32> {
    let cols = rows[0].len();
    let flat: Vec<f32> = rows.into_iter().flatten().collect();
    Array2::from_shape_vec((flat.len() / cols, cols), flat).unwrap()
}

/// Sum the probability of every frame-level path by its collapsed labels.
fn brute_force(probs: &Array2<f32>, blank: usize) -> HashMap<Vec<usize>, f64> {
    let (steps, classes) = probs.dim();
    let mut totals = HashMap::new();

    for mut code in 0..classes.pow(steps as u32) {
        let mut path = Vec::with_capacity(steps);
        for _ in 0..steps {
            path.push(code % classes);
            code /= classes;
        }

        let p: f64 = path
            .iter()
            .enumerate()
            .map(|(t, &c)| f64::from(probs[[t, c]]))
            .product();

        let mut collapsed = Vec::new();
        let mut prev = None;
        for &c in &path {
            if c != blank && prev != Some(c) {
                collapsed.push(c);
            }
            prev = Some(c);
        }
        *totals.entry(collapsed).or_insert(0.0) += p;
    }
    totals
}

#[test]
fn exhaustive_beam_matches_path_enumeration() {
    let alphabet = Alphabet::from_config_str("a\nb\n").unwrap();
    let probs = array![[0.5f32, 0.3, 0.2], [0.2, 0.4, 0.4], [0.6, 0.1, 0.3]];

    let outputs = decode(probs.view(), &alphabet, &DecoderConfig::new(64), None).unwrap();
    let exact = brute_force(&probs, 2);

    assert_eq!(outputs.len(), exact.len());
    for output in &outputs {
        let key: Vec<usize> = output.tokens.iter().map(|&l| l as usize).collect();
        let expected = exact[&key];
        assert!(
            (output.confidence.exp() - expected).abs() < 1e-9,
            "{:?}: {} vs {expected}",
            output.text,
            output.confidence.exp()
        );
    }
}

#[test]
fn repeated_label_merges_into_one_hypothesis() {
    // Only the path a _ a collapses to "aa".
    let alphabet = Alphabet::from_config_str("a\nb\n").unwrap();
    let probs = array![[0.8f32, 0.0, 0.2], [0.3, 0.0, 0.7], [0.8, 0.0, 0.2]];

    let outputs = decode(probs.view(), &alphabet, &DecoderConfig::new(16), None).unwrap();
    let aa: Vec<_> = outputs.iter().filter(|o| o.text == "aa").collect();

    assert_eq!(aa.len(), 1);
    let expected = 0.8 * 0.7 * 0.8;
    assert!((aa[0].confidence.exp() - expected).abs() < 1e-6);
}

#[test]
fn single_symbol_scenario() {
    let alphabet = Alphabet::from_config_str("a\n").unwrap();
    let probs = array![[0.6f32, 0.4], [0.6, 0.4], [0.6, 0.4]];

    let narrow = decode(probs.view(), &alphabet, &DecoderConfig::new(1), None).unwrap();
    assert_eq!(narrow.len(), 1);
    assert_eq!(narrow[0].text, "a");
    assert!((narrow[0].confidence - 0.6f64.ln()).abs() < 1e-6);

    let wide = decode(probs.view(), &alphabet, &DecoderConfig::new(8), None).unwrap();
    assert_eq!(wide[0].text, "a");
    assert!((wide[0].confidence.exp() - 0.792).abs() < 1e-6);
    assert!(wide[0].confidence >= narrow[0].confidence);
}

#[test]
fn num_results_limits_output() {
    let alphabet = Alphabet::from_config_str("a\n").unwrap();
    let probs = array![[0.6f32, 0.4], [0.6, 0.4], [0.6, 0.4]];
    let config = DecoderConfig::new(8).with_num_results(2);

    let outputs = decode(probs.view(), &alphabet, &config, None).unwrap();
    assert_eq!(outputs.len(), 2);
}

fn spelled(classes: usize, labels: &[usize], p: f32) -> Array2<f32> {
    matrix(labels.iter().map(|&l| row(classes, &[(l, p)])).collect())
}

#[test]
fn zero_weights_rank_like_no_scorer() {
    let scorer = scorer(0.0, 0.0);
    let alphabet = scorer.alphabet().clone();
    // "the cat" with some noise; blank is 7.
    let probs = spelled(8, &[1, 2, 3, 7, 0, 4, 5, 1], 0.6);
    let config = DecoderConfig::new(16);

    let plain = decode(probs.view(), &alphabet, &config, None).unwrap();
    let fused = decode(probs.view(), &alphabet, &config, Some(&scorer)).unwrap();

    assert_eq!(plain, fused);
}

#[test]
fn language_model_prefers_known_words() {
    let scorer = scorer(1.0, 0.0);
    let alphabet = scorer.alphabet().clone();
    let probs = matrix(vec![
        row(8, &[(4, 0.9)]),
        row(8, &[(5, 0.9)]),
        row(8, &[(6, 0.5), (1, 0.45)]),
    ]);
    let config = DecoderConfig::new(16);

    let plain = decode(probs.view(), &alphabet, &config, None).unwrap();
    assert_eq!(plain[0].text, "cas");

    let fused = decode(probs.view(), &alphabet, &config, Some(&scorer)).unwrap();
    assert_eq!(fused[0].text, "cat");
}

#[test]
fn word_bonus_counts_completed_words() {
    let alphabet = Alphabet::from_config_str(ALPHABET).unwrap();
    let probs = spelled(8, &[1, 2, 3, 0, 4, 5, 1], 0.9);
    let config = DecoderConfig::new(4);

    let base = decode(probs.view(), &alphabet, &config, Some(&scorer(0.0, 0.0))).unwrap();
    let bonus = decode(probs.view(), &alphabet, &config, Some(&scorer(0.0, 1.5))).unwrap();

    assert_eq!(base[0].text, "the cat");
    assert_eq!(bonus[0].text, "the cat");
    assert!((bonus[0].confidence - base[0].confidence - 3.0).abs() < 1e-9);
}

#[test]
fn rejected_weights_keep_scores_finite() {
    let mut scorer = scorer(1.0, 0.0);
    assert!(scorer.reset_params(f64::NAN, 0.0).is_err());
    assert!(scorer.reset_params(-5.0, 0.0).is_err());
    assert_eq!((scorer.alpha(), scorer.beta()), (1.0, 0.0));

    let alphabet = scorer.alphabet().clone();
    let probs = spelled(8, &[4, 5, 1], 0.9);
    let outputs = decode(probs.view(), &alphabet, &DecoderConfig::new(8), Some(&scorer)).unwrap();

    assert_eq!(outputs[0].text, "cat");
    assert!(outputs.iter().all(|o| o.confidence.is_finite()));
    assert!(outputs.windows(2).all(|w| w[0].confidence >= w[1].confidence));
}

#[test]
fn mismatched_scorer_alphabet_is_rejected() {
    let scorer = scorer(1.0, 0.0);
    let other = Alphabet::from_config_str("a\nb\n").unwrap();
    let probs = array![[0.5f32, 0.3, 0.2]];

    assert!(decode(probs.view(), &other, &DecoderConfig::new(4), Some(&scorer)).is_err());
}

fn normalized(raw: Vec<Vec<f32>>) -> Array2<f32> {
    matrix(
        raw.into_iter()
            .map(|r| {
                let sum: f32 = r.iter().sum();
                r.into_iter().map(|x| x / sum).collect()
            })
            .collect(),
    )
}

fn probability_matrix() -> impl Strategy<Value = Array2<f32>> {
    prop::collection::vec(prop::collection::vec(0.01f32..1.0, 3), 1..6).prop_map(normalized)
}

proptest! {
    #[test]
    fn results_are_bounded_and_sorted(probs in probability_matrix(), beam_size in 1usize..8) {
        let alphabet = Alphabet::from_config_str("a\nb\n").unwrap();
        let outputs = decode(probs.view(), &alphabet, &DecoderConfig::new(beam_size), None).unwrap();

        prop_assert!(!outputs.is_empty());
        prop_assert!(outputs.len() <= beam_size);
        prop_assert!(outputs.windows(2).all(|w| w[0].confidence >= w[1].confidence));
    }

    #[test]
    fn decoding_is_deterministic(probs in probability_matrix(), beam_size in 1usize..8) {
        let alphabet = Alphabet::from_config_str("a\nb\n").unwrap();
        let config = DecoderConfig::new(beam_size);

        let first = decode(probs.view(), &alphabet, &config, None).unwrap();
        let second = decode(probs.view(), &alphabet, &config, None).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn narrow_beam_never_beats_exhaustive(probs in probability_matrix(), beam_size in 1usize..8) {
        let alphabet = Alphabet::from_config_str("a\nb\n").unwrap();

        let narrow = decode(probs.view(), &alphabet, &DecoderConfig::new(beam_size), None).unwrap();
        let exhaustive = decode(probs.view(), &alphabet, &DecoderConfig::new(1000), None).unwrap();
        prop_assert!(narrow[0].confidence <= exhaustive[0].confidence + 1e-9);
    }
}
