//! ctcfuse command-line tool: decoding, scorer packaging and ARPA conversion.

pub mod binarize;
pub mod cli;
pub mod config;
pub mod decode;
pub mod package;
