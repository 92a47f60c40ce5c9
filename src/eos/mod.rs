//! Equation-of-state driver: a non-iterative walk over a density/temperature
//! surface, plus Hugoniot extraction.

pub mod driver;
pub mod hugoniot;
pub mod surface;

pub use driver::*;
pub use hugoniot::*;
pub use surface::*;
