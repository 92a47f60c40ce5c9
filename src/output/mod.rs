//! Output: variable layout, record sinks, and reloading written histories.
//!
//! A record is `TIME`, the global scalars, the element variables, and the
//! nodal displacements of a unit cube deformed by `F`, in that order.

pub mod layout;
pub mod sink;

pub use layout::*;
pub use sink::*;
