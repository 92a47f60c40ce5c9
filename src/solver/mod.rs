//! Mixed-control integration of a load path.
//!
//! Layering, innermost first:
//!
//! - `ControlPartition`: which components are strain-known, which are solved for
//! - `StepSolver`: Newton on one sub-step, with bisection cutback
//! - `LegStepper`: fixed sub-division of a leg, one record per sub-step
//! - `PathDriver`: sequences the legs and owns the point state

pub mod driver;
pub mod leg;
pub mod partition;
pub mod step;

pub use driver::*;
pub use leg::*;
pub use partition::*;
pub use step::*;
