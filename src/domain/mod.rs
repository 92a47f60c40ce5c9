//! Domain types used throughout the driver.
//!
//! This module defines:
//!
//! - the control-code table and validated legs/paths (`ControlCode`, `Leg`, `Path`)
//! - the mutable point state (`DriverState`)
//! - committed output records and per-step statistics

pub mod types;

pub use types::*;
