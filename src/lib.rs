//! `mps-driver` library crate.
//!
//! Drives a single material point through a load path of mixed
//! strain/stress-controlled legs. The binary (`mps`) is a thin wrapper
//! around this library so that:
//!
//! - the integrator is testable without spawning processes
//! - materials and output sinks can be swapped in from other crates

pub mod app;
pub mod cli;
pub mod config;
pub mod domain;
pub mod eos;
pub mod error;
pub mod legs;
pub mod material;
pub mod math;
pub mod output;
pub mod permutate;
pub mod plot;
pub mod report;
pub mod solver;
