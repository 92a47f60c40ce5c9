//! Mathematical utilities: tensor kinematics and small dense linear solves.

pub mod linsolve;
pub mod tensor;

pub use linsolve::*;
pub use tensor::*;
