//! Tensor helpers for running image models over frame batches.

mod common;
pub mod region;
pub mod square;
pub mod temporal;

pub use region::*;
pub use square::*;
pub use temporal::*;
