//! Reporting utilities: run, EOS and permutation summaries.

pub mod format;

pub use format::*;
