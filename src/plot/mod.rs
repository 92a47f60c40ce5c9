//! Terminal plotting of output histories.

pub mod ascii;

pub use ascii::*;
