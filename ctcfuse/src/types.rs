//! Core types for ctcfuse

use serde::Serialize;

/// One decoded hypothesis.
///
/// `confidence` is the natural-log combined score: acoustic log probability
/// plus the weighted language model terms. It is not exponentiated.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Output {
    /// Combined natural-log score
    pub confidence: f64,
    /// Decoded text
    pub text: String,
    /// Label ids after collapsing blanks and repeats
    pub tokens: Vec<u32>,
    /// Time step at which each token was emitted
    pub timesteps: Vec<usize>,
}
